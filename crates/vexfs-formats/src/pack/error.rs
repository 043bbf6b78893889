//! Pack directory error types

use thiserror::Error;

/// Pack directory error type
#[derive(Debug, Error)]
pub enum FormatError {
    /// Header does not start with the pack signature
    #[error("invalid pack signature: expected 0x55AA1234, got 0x{0:08X}")]
    BadSignature(u32),

    /// Only versions 1 and 2 are understood
    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    /// Input ends before the header is complete
    #[error("pack header truncated")]
    TruncatedHeader,

    /// Input ends inside the directory tree
    #[error("directory tree truncated at offset {offset}")]
    TruncatedTree {
        /// Byte offset into the tree where the read failed
        offset: usize,
    },

    /// Entry record terminator is not 0xFFFF
    #[error("bad entry terminator at offset {offset}: 0x{found:04X}")]
    BadTerminator {
        /// Byte offset of the terminator field within the tree
        offset: usize,
        /// Value found instead of the terminator
        found: u16,
    },

    /// The same canonical path appears twice
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// A tree string is not valid UTF-8
    #[error("invalid name at offset {offset}")]
    InvalidName {
        /// Byte offset of the string within the tree
        offset: usize,
    },

    /// Builder input that cannot be encoded
    #[error("cannot encode {path}: {reason}")]
    Unencodable {
        /// Canonical path of the entry
        path: String,
        /// What made the entry unencodable
        reason: &'static str,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for pack directory operations
pub type FormatResult<T> = Result<T, FormatError>;
