//! Pack directory header structures and parsing

use crate::pack::error::{FormatError, FormatResult};
use binrw::io::Cursor;
use binrw::{BinRead, BinReaderExt, BinWrite};

/// Directory file signature (little-endian on disk)
pub const PACK_SIGNATURE: u32 = 0x55AA_1234;
/// Header size of a version 1 directory
pub const HEADER_SIZE_V1: usize = 12;
/// Header size of a version 2 directory
pub const HEADER_SIZE_V2: usize = 28;

/// Section sizes present only in version 2 headers.
///
/// None of these sections are interpreted; they only matter for locating
/// the embedded data region that follows the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct SectionSizes {
    /// Size of the embedded file data section
    pub file_data_size: u32,
    /// Size of the archive MD5 section
    pub archive_md5_size: u32,
    /// Size of the "other" MD5 section
    pub other_md5_size: u32,
    /// Size of the signature section
    pub signature_size: u32,
}

/// Pack directory header (12 bytes for v1, 28 bytes for v2)
#[derive(Debug, Clone, PartialEq, Eq, BinWrite)]
#[bw(little)]
pub struct PackHeader {
    /// Signature, always [`PACK_SIGNATURE`]
    pub signature: u32,

    /// Format version (1 or 2)
    pub version: u32,

    /// Size of the directory tree in bytes
    pub tree_size: u32,

    /// Additional section sizes (version 2 only)
    #[bw(if(*version == 2))]
    pub sections: Option<SectionSizes>,
}

impl PackHeader {
    /// Create a header for the given version with an empty tree
    pub fn new(version: u32) -> Self {
        Self {
            signature: PACK_SIGNATURE,
            version,
            tree_size: 0,
            sections: (version == 2).then(SectionSizes::default),
        }
    }

    /// Parse a header from the start of `data`.
    ///
    /// The signature is checked before anything else, then the version,
    /// so garbage input reports `BadSignature` rather than truncation.
    pub fn parse(data: &[u8]) -> FormatResult<Self> {
        let mut cursor = Cursor::new(data);

        let signature: u32 = cursor.read_le().map_err(header_error)?;
        if signature != PACK_SIGNATURE {
            return Err(FormatError::BadSignature(signature));
        }

        let version: u32 = cursor.read_le().map_err(header_error)?;
        if !(1..=2).contains(&version) {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let tree_size: u32 = cursor.read_le().map_err(header_error)?;
        let sections = if version == 2 {
            Some(SectionSizes::read(&mut cursor).map_err(header_error)?)
        } else {
            None
        };

        Ok(Self {
            signature,
            version,
            tree_size,
            sections,
        })
    }

    /// Encoded size of this header
    pub const fn header_size(&self) -> usize {
        if self.version == 2 {
            HEADER_SIZE_V2
        } else {
            HEADER_SIZE_V1
        }
    }

    /// Header size implied by a version number, if the version is known
    pub const fn header_size_for(version: u32) -> Option<usize> {
        match version {
            1 => Some(HEADER_SIZE_V1),
            2 => Some(HEADER_SIZE_V2),
            _ => None,
        }
    }

    /// Absolute offset of the tree within the directory file
    pub const fn tree_offset(&self) -> u64 {
        self.header_size() as u64
    }

    /// Absolute offset of the embedded data region.
    ///
    /// Entries stored with the embedded archive index are addressed
    /// relative to this offset.
    pub const fn data_offset(&self) -> u64 {
        self.header_size() as u64 + self.tree_size as u64
    }

    /// Size of the embedded data section, when the header records it
    pub fn file_data_size(&self) -> Option<u32> {
        self.sections.map(|s| s.file_data_size)
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> FormatResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.header_size()));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

fn header_error(err: binrw::Error) -> FormatError {
    if is_eof(&err) {
        FormatError::TruncatedHeader
    } else {
        FormatError::BinRw(err)
    }
}

pub(crate) fn is_eof(err: &binrw::Error) -> bool {
    matches!(err, binrw::Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
}
