//! Directory tree decoding
//!
//! The tree is three nested levels of NUL-terminated strings: extension,
//! then directory, then file name. Each level ends with an empty string and
//! the whole tree ends with an empty extension. Every file name is followed
//! by an [`EntryRecord`] and its preload bytes.

use crate::pack::catalog::{Catalog, canonical_path};
use crate::pack::entry::{CatalogEntry, ENTRY_RECORD_SIZE, ENTRY_TERMINATOR, EntryRecord};
use crate::pack::error::{FormatError, FormatResult};
use crate::pack::header::is_eof;
use binrw::BinRead;
use binrw::io::Cursor;
use bytes::Bytes;
use tracing::trace;

/// Bounds-checked reader over the tree bytes
struct TreeReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TreeReader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_str(&mut self) -> FormatResult<&'a str> {
        let start = self.pos;
        let rest = &self.data[start..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(FormatError::TruncatedTree {
                offset: self.data.len(),
            })?;
        let value = std::str::from_utf8(&rest[..len])
            .map_err(|_| FormatError::InvalidName { offset: start })?;
        self.pos += len + 1;
        Ok(value)
    }

    fn read_record(&mut self) -> FormatResult<EntryRecord> {
        let start = self.pos;
        let end = start + ENTRY_RECORD_SIZE;
        if end > self.data.len() {
            return Err(FormatError::TruncatedTree {
                offset: self.data.len(),
            });
        }

        let record = EntryRecord::read(&mut Cursor::new(&self.data[start..end])).map_err(|e| {
            if is_eof(&e) {
                FormatError::TruncatedTree { offset: start }
            } else {
                FormatError::BinRw(e)
            }
        })?;

        if record.terminator != ENTRY_TERMINATOR {
            return Err(FormatError::BadTerminator {
                offset: end - 2,
                found: record.terminator,
            });
        }

        self.pos = end;
        Ok(record)
    }

    fn read_bytes(&mut self, len: usize) -> FormatResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(FormatError::TruncatedTree {
                offset: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}

/// Decode a complete tree into a catalog.
///
/// Fails on the first malformed record; no partial catalog escapes.
pub fn parse_tree(tree: &[u8]) -> FormatResult<Catalog> {
    let mut reader = TreeReader::new(tree);
    let mut catalog = Catalog::new();

    loop {
        let extension = reader.read_str()?;
        if extension.is_empty() {
            break;
        }

        loop {
            let dir = reader.read_str()?;
            if dir.is_empty() {
                break;
            }

            loop {
                let name = reader.read_str()?;
                if name.is_empty() {
                    break;
                }

                let record = reader.read_record()?;
                let preload = reader.read_bytes(record.preload_bytes as usize)?;
                let path = canonical_path(extension, dir, name);

                trace!(
                    "entry {}: archive={}, offset={}, length={}, preload={}",
                    path,
                    record.archive_index,
                    record.entry_offset,
                    record.entry_length,
                    record.preload_bytes
                );

                let entry = CatalogEntry::from_record(&record, Bytes::copy_from_slice(preload));
                catalog.insert(path, entry)?;
            }
        }
    }

    if reader.pos < tree.len() {
        trace!("{} trailing bytes after tree terminator", tree.len() - reader.pos);
    }

    Ok(catalog)
}
