//! Directory entry records and catalog entries

use binrw::{BinRead, BinWrite};
use bytes::Bytes;

/// Archive index meaning "data lives in the directory file itself"
pub const EMBEDDED_ARCHIVE_INDEX: u16 = 0x7FFF;
/// Value every entry record must end with
pub const ENTRY_TERMINATOR: u16 = 0xFFFF;
/// Encoded size of an [`EntryRecord`]
pub const ENTRY_RECORD_SIZE: usize = 18;

/// Fixed-size record that follows each filename in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct EntryRecord {
    /// CRC-32 of the complete file content
    pub crc32: u32,
    /// Number of preload bytes following the record
    pub preload_bytes: u16,
    /// Data part index, or [`EMBEDDED_ARCHIVE_INDEX`]
    pub archive_index: u16,
    /// Offset of the remainder within the backing file
    pub entry_offset: u32,
    /// Length of the remainder
    pub entry_length: u32,
    /// Always [`ENTRY_TERMINATOR`] in a well-formed tree
    pub terminator: u16,
}

/// Where the non-preloaded part of an entry is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveRef {
    /// Data region of the directory file
    Embedded,
    /// Numbered data part (`<base>_NNN`)
    Part(u16),
}

impl ArchiveRef {
    /// Decode a raw archive index
    pub const fn from_index(index: u16) -> Self {
        if index == EMBEDDED_ARCHIVE_INDEX {
            Self::Embedded
        } else {
            Self::Part(index)
        }
    }

    /// Raw archive index as stored in the record
    pub const fn index(self) -> u16 {
        match self {
            Self::Embedded => EMBEDDED_ARCHIVE_INDEX,
            Self::Part(index) => index,
        }
    }
}

/// A single file in a pack catalog.
///
/// The logical file is `preload ++ remainder`, where the remainder is
/// `entry_length` bytes at `entry_offset` in the backing file named by
/// `archive_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// CRC-32 of the complete content
    pub crc32: u32,
    /// Raw archive index
    pub archive_index: u16,
    /// Offset of the remainder, relative to the backing file or embedded data region
    pub entry_offset: u32,
    /// Length of the remainder
    pub entry_length: u32,
    /// Inline preload bytes
    pub preload: Bytes,
}

impl CatalogEntry {
    /// Build an entry from its record and the preload blob that follows it
    pub fn from_record(record: &EntryRecord, preload: Bytes) -> Self {
        Self {
            crc32: record.crc32,
            archive_index: record.archive_index,
            entry_offset: record.entry_offset,
            entry_length: record.entry_length,
            preload,
        }
    }

    /// Record that encodes this entry (terminator included)
    pub fn to_record(&self) -> EntryRecord {
        EntryRecord {
            crc32: self.crc32,
            preload_bytes: self.preload.len() as u16,
            archive_index: self.archive_index,
            entry_offset: self.entry_offset,
            entry_length: self.entry_length,
            terminator: ENTRY_TERMINATOR,
        }
    }

    /// Backing location of the remainder
    pub const fn archive(&self) -> ArchiveRef {
        ArchiveRef::from_index(self.archive_index)
    }

    /// Whether the remainder lives in the directory file
    pub const fn is_embedded(&self) -> bool {
        self.archive_index == EMBEDDED_ARCHIVE_INDEX
    }

    /// Number of preload bytes (`P`)
    pub fn preload_len(&self) -> u64 {
        self.preload.len() as u64
    }

    /// Logical file size (`P + L`)
    pub fn size(&self) -> u64 {
        self.preload_len() + u64::from(self.entry_length)
    }
}
