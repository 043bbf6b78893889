//! Pack builder
//!
//! Encodes a set of files into a directory file plus numbered data parts.
//! This is the reference encoder used by tests and fixtures; archives it
//! produces parse back to the same catalog.

use crate::pack::catalog::split_path;
use crate::pack::entry::{EMBEDDED_ARCHIVE_INDEX, ENTRY_TERMINATOR, EntryRecord};
use crate::pack::error::{FormatError, FormatResult};
use crate::pack::header::{PackHeader, SectionSizes};
use binrw::BinWrite;
use binrw::io::Cursor;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Where the builder stores the remainder of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// In the directory file's embedded data region
    Embedded,
    /// In numbered data part `n`
    Part(u16),
}

#[derive(Debug, Clone)]
struct PendingEntry {
    record: EntryRecord,
    preload: Vec<u8>,
}

/// Builder for pack directories and their data parts
#[derive(Debug, Clone)]
pub struct PackBuilder {
    version: u32,
    // extension -> directory -> name -> entry
    tree: BTreeMap<String, BTreeMap<String, BTreeMap<String, PendingEntry>>>,
    embedded: Vec<u8>,
    parts: BTreeMap<u16, Vec<u8>>,
}

/// Output of [`PackBuilder::build`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPack {
    /// Directory file bytes (header, tree, embedded data)
    pub directory: Vec<u8>,
    /// Numbered data part contents
    pub parts: BTreeMap<u16, Vec<u8>>,
}

impl PackBuilder {
    /// Create a builder for the given format version (1 or 2)
    pub fn new(version: u32) -> FormatResult<Self> {
        if PackHeader::header_size_for(version).is_none() {
            return Err(FormatError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            tree: BTreeMap::new(),
            embedded: Vec::new(),
            parts: BTreeMap::new(),
        })
    }

    /// Add a file.
    ///
    /// The first `preload_len` bytes (clamped to the data length) are stored
    /// inline in the tree; the rest goes to `placement`.
    pub fn add_file(
        &mut self,
        path: &str,
        data: &[u8],
        preload_len: usize,
        placement: Placement,
    ) -> FormatResult<&mut Self> {
        let (extension, dir, name) = split_path(path).ok_or_else(|| FormatError::Unencodable {
            path: path.to_string(),
            reason: "empty file or directory name",
        })?;
        if path.contains('\0') {
            return Err(FormatError::Unencodable {
                path: path.to_string(),
                reason: "name contains NUL",
            });
        }

        let preload_len = preload_len.min(data.len());
        let preload_bytes = u16::try_from(preload_len).map_err(|_| FormatError::Unencodable {
            path: path.to_string(),
            reason: "preload longer than 65535 bytes",
        })?;
        let (preload, remainder) = data.split_at(preload_len);

        let entry_length = u32::try_from(remainder.len()).map_err(|_| FormatError::Unencodable {
            path: path.to_string(),
            reason: "entry longer than 4 GiB",
        })?;

        if placement == Placement::Part(EMBEDDED_ARCHIVE_INDEX) {
            return Err(FormatError::Unencodable {
                path: path.to_string(),
                reason: "part index collides with embedded index",
            });
        }

        let names = self
            .tree
            .entry(extension.to_string())
            .or_default()
            .entry(dir.to_string())
            .or_default();
        if names.contains_key(name) {
            return Err(FormatError::DuplicateEntry(path.to_string()));
        }

        let (archive_index, target) = match placement {
            Placement::Embedded => (EMBEDDED_ARCHIVE_INDEX, &mut self.embedded),
            Placement::Part(index) => (index, self.parts.entry(index).or_default()),
        };
        let entry_offset = u32::try_from(target.len()).map_err(|_| FormatError::Unencodable {
            path: path.to_string(),
            reason: "backing file larger than 4 GiB",
        })?;

        target.extend_from_slice(remainder);

        let record = EntryRecord {
            crc32: crc32fast::hash(data),
            preload_bytes,
            archive_index,
            entry_offset,
            entry_length,
            terminator: ENTRY_TERMINATOR,
        };
        names.insert(
            name.to_string(),
            PendingEntry {
                record,
                preload: preload.to_vec(),
            },
        );

        Ok(self)
    }

    /// Encode the tree section alone
    pub fn build_tree(&self) -> FormatResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        for (extension, dirs) in &self.tree {
            write_str(&mut cursor, extension)?;
            for (dir, names) in dirs {
                write_str(&mut cursor, dir)?;
                for (name, entry) in names {
                    write_str(&mut cursor, name)?;
                    entry.record.write(&mut cursor)?;
                    io::Write::write_all(&mut cursor, &entry.preload)?;
                }
                write_str(&mut cursor, "")?;
            }
            write_str(&mut cursor, "")?;
        }
        write_str(&mut cursor, "")?;
        Ok(cursor.into_inner())
    }

    /// Encode the directory file and data parts
    pub fn build(&self) -> FormatResult<BuiltPack> {
        let tree = self.build_tree()?;

        let mut header = PackHeader::new(self.version);
        header.tree_size = u32::try_from(tree.len()).map_err(|_| FormatError::Unencodable {
            path: String::new(),
            reason: "tree larger than 4 GiB",
        })?;
        if self.version == 2 {
            let file_data_size =
                u32::try_from(self.embedded.len()).map_err(|_| FormatError::Unencodable {
                    path: String::new(),
                    reason: "embedded data larger than 4 GiB",
                })?;
            header.sections = Some(SectionSizes {
                file_data_size,
                ..SectionSizes::default()
            });
        }

        let mut directory = header.to_bytes()?;
        directory.extend_from_slice(&tree);
        directory.extend_from_slice(&self.embedded);

        Ok(BuiltPack {
            directory,
            parts: self.parts.clone(),
        })
    }
}

impl BuiltPack {
    /// Write `<base>_dir.vpk` and `<base>_NNN.vpk` into `dir`.
    ///
    /// Returns the directory file path.
    pub fn write_to(&self, dir: &Path, base: &str) -> io::Result<PathBuf> {
        let directory_path = dir.join(format!("{base}_dir.vpk"));
        std::fs::write(&directory_path, &self.directory)?;
        for (index, data) in &self.parts {
            std::fs::write(dir.join(format!("{base}_{index:03}.vpk")), data)?;
        }
        Ok(directory_path)
    }
}

fn write_str(cursor: &mut Cursor<Vec<u8>>, value: &str) -> io::Result<()> {
    io::Write::write_all(cursor, value.as_bytes())?;
    io::Write::write_all(cursor, &[0])
}
