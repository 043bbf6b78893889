//! In-memory catalog of pack entries keyed by canonical path

use crate::pack::entry::CatalogEntry;
use crate::pack::error::{FormatError, FormatResult};
use std::collections::{BTreeMap, BTreeSet};

/// Token used in the tree for "no extension" and for the root directory
pub const EMPTY_TOKEN: &str = " ";

/// Mapping from canonical path (`dir/name.ext`) to entry metadata.
///
/// Built once when a directory is parsed and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, rejecting duplicate paths
    pub fn insert(&mut self, path: String, entry: CatalogEntry) -> FormatResult<()> {
        if self.entries.contains_key(&path) {
            return Err(FormatError::DuplicateEntry(path));
        }
        self.entries.insert(path, entry);
        Ok(())
    }

    /// Look up an entry by canonical path
    pub fn get(&self, path: &str) -> Option<&CatalogEntry> {
        self.entries.get(path)
    }

    /// Whether the catalog contains `path`
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    /// Iterate canonical paths in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Paths under `dir` (a `/`-separated prefix, empty for everything)
    pub fn paths_under<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.paths().filter(move |path| {
            dir.is_empty()
                || path
                    .strip_prefix(dir)
                    .is_some_and(|rest| rest.starts_with('/') || dir.ends_with('/'))
        })
    }

    /// Distinct numbered data parts referenced by the catalog
    pub fn archive_indices(&self) -> BTreeSet<u16> {
        self.entries
            .values()
            .filter(|entry| !entry.is_embedded())
            .map(|entry| entry.archive_index)
            .collect()
    }

    /// Sum of logical file sizes
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(CatalogEntry::size).sum()
    }
}

/// Assemble `dir/name.ext` from the three tree levels.
///
/// The root directory and the "no extension" token are both a single space.
pub fn canonical_path(extension: &str, dir: &str, name: &str) -> String {
    let mut path = String::with_capacity(dir.len() + name.len() + extension.len() + 2);
    if dir != EMPTY_TOKEN {
        path.push_str(dir);
        path.push('/');
    }
    path.push_str(name);
    if extension != EMPTY_TOKEN {
        path.push('.');
        path.push_str(extension);
    }
    path
}

/// Split a canonical path into `(extension, dir, name)` tree components.
///
/// Returns `None` when the file name is empty, which the tree cannot encode.
pub fn split_path(path: &str) -> Option<(&str, &str, &str)> {
    let (dir, file) = match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => (EMPTY_TOKEN, path),
    };
    let (name, extension) = match file.rfind('.') {
        Some(pos) if pos + 1 < file.len() => (&file[..pos], &file[pos + 1..]),
        _ => (file, EMPTY_TOKEN),
    };
    if name.is_empty() || dir.is_empty() {
        return None;
    }
    Some((extension, dir, name))
}
