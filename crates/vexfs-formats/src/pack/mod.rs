//! Packed archive directory format
//!
//! A pack is one directory file (`<base>_dir.vpk`) and zero or more numbered
//! data parts (`<base>_000.vpk`, `<base>_001.vpk`, ...). The directory file
//! holds a header, a tree mapping paths to entry records, and optionally an
//! embedded data region addressed by entries whose archive index is
//! [`EMBEDDED_ARCHIVE_INDEX`].
//!
//! # Layout
//!
//! ```text
//! u32 signature (0x55AA1234)
//! u32 version   (1 or 2)
//! u32 tree_size
//! v2: u32 file_data_size, u32 archive_md5_size, u32 other_md5_size, u32 signature_size
//! tree (tree_size bytes)
//! embedded data
//! ```
//!
//! All integers are little-endian.

mod builder;
mod catalog;
mod entry;
mod error;
mod header;
mod tree;

pub use builder::{BuiltPack, PackBuilder, Placement};
pub use catalog::{Catalog, EMPTY_TOKEN, canonical_path, split_path};
pub use entry::{
    ArchiveRef, CatalogEntry, EMBEDDED_ARCHIVE_INDEX, ENTRY_RECORD_SIZE, ENTRY_TERMINATOR,
    EntryRecord,
};
pub use error::{FormatError, FormatResult};
pub use header::{HEADER_SIZE_V1, HEADER_SIZE_V2, PACK_SIGNATURE, PackHeader, SectionSizes};
pub use tree::parse_tree;

use std::io::Read;
use tracing::debug;

/// Parsed directory file: header plus catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackDirectory {
    /// Directory header
    pub header: PackHeader,
    /// Catalog decoded from the tree
    pub catalog: Catalog,
}

impl PackDirectory {
    /// Parse a directory from bytes that start at the header.
    ///
    /// `data` must cover at least the header and tree; anything after the
    /// tree (embedded data, checksum sections) is ignored.
    pub fn parse(data: &[u8]) -> FormatResult<Self> {
        let header = PackHeader::parse(data)?;

        let tree_start = header.header_size();
        let tree_end = tree_start.saturating_add(header.tree_size as usize);
        let tree = &data[tree_start..tree_end.min(data.len())];

        let catalog = parse_tree(tree)?;

        debug!(
            "Parsed pack directory v{}: {} entries, tree size {}",
            header.version,
            catalog.len(),
            header.tree_size
        );

        Ok(Self { header, catalog })
    }

    /// Read the header and tree from `reader` and parse them.
    ///
    /// Only the header and tree bytes are consumed.
    pub fn read_from<R: Read>(mut reader: R) -> FormatResult<Self> {
        let mut data = Vec::with_capacity(HEADER_SIZE_V2);
        (&mut reader)
            .take(HEADER_SIZE_V1 as u64)
            .read_to_end(&mut data)?;

        // Version 2 headers carry four extra section sizes.
        if data.len() >= 8 {
            let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
            if version == 2 {
                (&mut reader)
                    .take((HEADER_SIZE_V2 - HEADER_SIZE_V1) as u64)
                    .read_to_end(&mut data)?;
            }
        }
        let header = PackHeader::parse(&data)?;

        (&mut reader)
            .take(u64::from(header.tree_size))
            .read_to_end(&mut data)?;

        Self::parse(&data)
    }

    /// Absolute offset of the embedded data region in the directory file
    pub const fn data_offset(&self) -> u64 {
        self.header.data_offset()
    }
}
