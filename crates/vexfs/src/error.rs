//! Error types for virtual file system operations

use crate::pack::MountHandle;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use vexfs_formats::FormatError;

/// Failure to register a pack.
///
/// A failed mount leaves the mount list untouched.
#[derive(Debug, Error)]
pub enum MountError {
    /// Directory file could not be opened
    #[error("failed to open pack directory {path}: {source}")]
    Open {
        /// Directory file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Directory file could not be read
    #[error("failed to read pack directory {path}: {source}")]
    Read {
        /// Directory file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Directory contents are malformed
    #[error("invalid pack directory {path}: {source}")]
    Format {
        /// Directory file path
        path: PathBuf,
        /// Parser error
        #[source]
        source: FormatError,
    },
}

impl MountError {
    pub(crate) fn from_format(path: PathBuf, err: FormatError) -> Self {
        match err {
            FormatError::Io(source) => Self::Read { path, source },
            source => Self::Format { path, source },
        }
    }
}

/// Errors that can occur during virtual file system operations
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path is not present in any loose root or mounted pack
    #[error("not found: {0}")]
    NotFound(String),

    /// Backing storage failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Mount failure
    #[error("mount failed: {0}")]
    Mount(#[from] MountError),

    /// Handle does not name a mounted pack
    #[error("pack not mounted: {0}")]
    NotMounted(MountHandle),

    /// Seek target outside `0..=size`
    #[error("seek target {target} outside 0..={size}")]
    OutOfRange {
        /// Requested absolute position
        target: i128,
        /// Stream size
        size: u64,
    },

    /// Stream hit an I/O error earlier and must be discarded
    #[error("stream unusable after an earlier I/O failure")]
    StreamFailed,

    /// Path cannot be normalized
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl VfsError {
    /// Whether this is the ordinary "absent path" condition
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::Io(err) => err,
            VfsError::NotFound(_) => Self::new(io::ErrorKind::NotFound, err),
            VfsError::OutOfRange { .. } | VfsError::InvalidPath(_) => {
                Self::new(io::ErrorKind::InvalidInput, err)
            }
            other => Self::other(other),
        }
    }
}

/// Result type for virtual file system operations
pub type Result<T> = std::result::Result<T, VfsError>;
