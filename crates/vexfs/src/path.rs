//! Virtual path handling
//!
//! Lookup keys are `/`-separated relative paths. Callers may hand in
//! Windows separators, `./` noise, `..` segments or a leading asset root;
//! [`normalize`] folds all of these into the canonical key used by both
//! loose-file roots and pack catalogs.

use crate::error::{Result, VfsError};
use std::path::{Path, PathBuf};

/// Suffix that marks a directory file
pub const DIRECTORY_SUFFIX: &str = "_dir";

/// File extension shared by directory files and data parts
pub const PACK_EXTENSION: &str = "vpk";

/// Normalize `path` into a lookup key.
///
/// `strip_prefix` removes one leading component when it matches exactly
/// (case-insensitively when `lowercase` is set).
pub fn normalize(path: &str, strip_prefix: Option<&str>, lowercase: bool) -> Result<String> {
    if path.contains('\0') {
        return Err(VfsError::InvalidPath(path.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(VfsError::InvalidPath(path.to_string()));
                }
            }
            other => segments.push(other),
        }
    }

    if let (Some(prefix), Some(first)) = (strip_prefix, segments.first())
        && (*first == prefix || (lowercase && first.eq_ignore_ascii_case(prefix)))
    {
        segments.remove(0);
    }

    if segments.is_empty() {
        return Err(VfsError::InvalidPath(path.to_string()));
    }

    let joined = segments.join("/");
    Ok(if lowercase {
        joined.to_lowercase()
    } else {
        joined
    })
}

/// Resolve `relative` against the directory containing `base_file`.
///
/// A rooted `relative` ignores the base. The result is not normalized.
pub fn resolve_relative(base_file: &str, relative: &str) -> String {
    if relative.starts_with(['/', '\\']) {
        return relative.to_string();
    }
    match base_file.rfind(['/', '\\']) {
        Some(pos) => format!("{}/{}", &base_file[..pos], relative),
        None => relative.to_string(),
    }
}

/// Last path component
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Base path shared by a directory file and its data parts.
///
/// `maps/city_dir.vpk` yields `maps/city`; a file stem without the
/// directory suffix is used as-is.
pub fn pack_base(directory_path: &Path) -> PathBuf {
    let stem = directory_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = stem.strip_suffix(DIRECTORY_SUFFIX).unwrap_or(&stem);
    directory_path.with_file_name(base)
}

/// Path of numbered data part `index` for `base`
pub fn part_path(base: &Path, index: u16) -> PathBuf {
    let name = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{name}_{index:03}.{PACK_EXTENSION}"))
}
