//! Mounted packs

use crate::error::{MountError, Result};
use crate::path::{pack_base, part_path};
use crate::pool::{ArchiveHandle, ArchivePool};
use crate::stream::{ArchiveStream, Remainder};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use vexfs_formats::pack::{Catalog, CatalogEntry, HEADER_SIZE_V2, PackDirectory, PackHeader};

/// Opaque identifier of a mounted pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MountHandle(pub(crate) u64);

impl MountHandle {
    /// Raw identifier
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Summary of a mounted pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackInfo {
    /// Mount handle
    pub handle: MountHandle,
    /// Directory file path
    pub directory_path: PathBuf,
    /// Format version
    pub version: u32,
    /// Tree section size in bytes
    pub tree_size: u32,
    /// Number of catalog entries
    pub entry_count: usize,
    /// Distinct numbered data parts referenced
    pub archive_count: usize,
    /// Entries stored in the directory file itself
    pub embedded_count: usize,
    /// Sum of logical file sizes
    pub total_size: u64,
}

/// A parsed pack registered with the file system
pub struct MountedPack {
    handle: MountHandle,
    directory_path: PathBuf,
    base: PathBuf,
    directory: PackDirectory,
    // lower-cased path -> catalog path, only for case-insensitive lookups
    folded: Option<HashMap<String, String>>,
    directory_file: Arc<ArchiveHandle>,
    loose_root: Option<PathBuf>,
    pool: Arc<ArchivePool>,
}

impl fmt::Debug for MountedPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedPack")
            .field("handle", &self.handle)
            .field("directory_path", &self.directory_path)
            .field("entries", &self.directory.catalog.len())
            .field("loose_root", &self.loose_root)
            .finish_non_exhaustive()
    }
}

impl MountedPack {
    /// Open and parse the directory file at `directory_path`.
    ///
    /// Nothing is registered anywhere; the caller decides whether to keep
    /// the result.
    pub fn open(
        handle: MountHandle,
        directory_path: &Path,
        pool: Arc<ArchivePool>,
        memory_map: bool,
        case_insensitive: bool,
        loose_root: Option<PathBuf>,
    ) -> std::result::Result<Self, MountError> {
        let directory_file = ArchiveHandle::open(directory_path, memory_map).map_err(|source| {
            MountError::Open {
                path: directory_path.to_path_buf(),
                source,
            }
        })?;
        let directory = read_directory(&directory_file)?;

        let base = pack_base(directory_path);
        for index in directory.catalog.archive_indices() {
            let part = part_path(&base, index);
            if !part.is_file() {
                warn!(
                    "Pack {} references missing data part {}",
                    directory_path.display(),
                    part.display()
                );
            }
        }

        let folded = case_insensitive.then(|| fold_paths(directory_path, &directory.catalog));

        debug!(
            "Mounted pack {} as {}: {} entries",
            directory_path.display(),
            handle,
            directory.catalog.len()
        );

        Ok(Self {
            handle,
            directory_path: directory_path.to_path_buf(),
            base,
            directory,
            folded,
            directory_file: Arc::new(directory_file),
            loose_root,
            pool,
        })
    }

    /// Mount handle
    pub const fn handle(&self) -> MountHandle {
        self.handle
    }

    /// Directory file path
    pub fn directory_path(&self) -> &Path {
        &self.directory_path
    }

    /// Base path shared with the data parts
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory header
    pub const fn header(&self) -> &PackHeader {
        &self.directory.header
    }

    /// Parsed catalog
    pub const fn catalog(&self) -> &Catalog {
        &self.directory.catalog
    }

    /// Loose-file directory consulted before this pack's entries
    pub fn loose_root(&self) -> Option<&Path> {
        self.loose_root.as_deref()
    }

    /// Find a normalized key in the catalog.
    ///
    /// Returns the catalog's own spelling of the path with the entry.
    pub fn lookup<'a>(&'a self, key: &'a str) -> Option<(&'a str, &'a CatalogEntry)> {
        let path = match &self.folded {
            Some(folded) => folded.get(key)?.as_str(),
            None => key,
        };
        self.directory.catalog.get(path).map(|entry| (path, entry))
    }

    /// Open a stream over `entry`.
    ///
    /// Numbered parts come from the shared pool; sentinel-indexed entries
    /// read from this pack's directory file.
    pub fn open_entry(&self, entry: &CatalogEntry, block_size: usize) -> Result<ArchiveStream> {
        let length = u64::from(entry.entry_length);
        let remainder = if length == 0 {
            None
        } else {
            let (handle, offset) = if entry.is_embedded() {
                (
                    Arc::clone(&self.directory_file),
                    self.directory.data_offset() + u64::from(entry.entry_offset),
                )
            } else {
                (
                    self.pool.acquire(&self.base, entry.archive_index)?,
                    u64::from(entry.entry_offset),
                )
            };
            if entry.is_embedded()
                && let Some(region) = self.directory.header.file_data_size()
                && u64::from(entry.entry_offset) + length > u64::from(region)
            {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "embedded entry range {}..{} exceeds the {} byte data section of {}",
                        entry.entry_offset,
                        u64::from(entry.entry_offset) + length,
                        region,
                        self.directory_path.display()
                    ),
                )
                .into());
            }
            if offset + length > handle.size() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "entry range {}..{} exceeds {} ({} bytes)",
                        offset,
                        offset + length,
                        handle.path().display(),
                        handle.size()
                    ),
                )
                .into());
            }
            Some(Remainder {
                handle,
                offset,
                length,
            })
        };

        Ok(ArchiveStream::new(entry.preload.clone(), remainder, block_size))
    }

    /// Whether streams over this pack's files are still alive
    pub fn has_open_streams(&self) -> bool {
        Arc::strong_count(&self.directory_file) > 1
            || self
                .directory
                .catalog
                .archive_indices()
                .into_iter()
                .any(|index| self.pool.is_open(&self.base, index))
    }

    /// Summary of this pack
    pub fn info(&self) -> PackInfo {
        let catalog = &self.directory.catalog;
        PackInfo {
            handle: self.handle,
            directory_path: self.directory_path.clone(),
            version: self.directory.header.version,
            tree_size: self.directory.header.tree_size,
            entry_count: catalog.len(),
            archive_count: catalog.archive_indices().len(),
            embedded_count: catalog.iter().filter(|(_, e)| e.is_embedded()).count(),
            total_size: catalog.total_size(),
        }
    }
}

impl Drop for MountedPack {
    fn drop(&mut self) {
        self.pool.prune();
    }
}

/// Map lower-cased catalog paths to their catalog spelling.
///
/// Paths that differ only in case keep the first in catalog order.
fn fold_paths(directory_path: &Path, catalog: &Catalog) -> HashMap<String, String> {
    let mut folded = HashMap::with_capacity(catalog.len());
    for path in catalog.paths() {
        match folded.entry(path.to_lowercase()) {
            Entry::Vacant(slot) => {
                slot.insert(path.to_string());
            }
            Entry::Occupied(slot) => warn!(
                "Pack {}: {} differs from {} only by case and cannot be looked up",
                directory_path.display(),
                path,
                slot.get()
            ),
        }
    }
    folded
}

/// Read and parse the header and tree of a directory file
fn read_directory(file: &ArchiveHandle) -> std::result::Result<PackDirectory, MountError> {
    let path = file.path().to_path_buf();
    let size = usize::try_from(file.size()).unwrap_or(usize::MAX);

    let mut head = vec![0u8; HEADER_SIZE_V2.min(size)];
    file.read_exact_at(0, &mut head)
        .map_err(|source| MountError::Read {
            path: path.clone(),
            source,
        })?;
    let header = PackHeader::parse(&head).map_err(|e| MountError::from_format(path.clone(), e))?;

    // A short file still gets parsed so the tree error names the offset.
    let tree_end = header
        .header_size()
        .saturating_add(header.tree_size as usize)
        .min(size);
    let mut bytes = vec![0u8; tree_end];
    file.read_exact_at(0, &mut bytes)
        .map_err(|source| MountError::Read {
            path: path.clone(),
            source,
        })?;

    PackDirectory::parse(&bytes).map_err(|e| MountError::from_format(path, e))
}
