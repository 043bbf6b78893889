//! Read-only virtual file system over packed asset archives
//!
//! A pack is a directory file (`<base>_dir.vpk`) plus numbered data parts
//! (`<base>_000.vpk`, ...). [`Vfs`] mounts any number of packs, layers
//! loose-file directories over them and opens seekable streams by virtual
//! path.
//!
//! # Example
//!
//! ```no_run
//! use std::io::Read;
//! use vexfs::{Vfs, VfsConfig};
//!
//! # fn main() -> Result<(), vexfs::VfsError> {
//! let vfs = Vfs::new(VfsConfig::default())?;
//! let core = vfs.mount("data/core_dir.vpk")?;
//!
//! let mut stream = vfs.open("Assets/models/crate.mdl")?;
//! let mut header = [0u8; 4];
//! stream.read_exact(&mut header)?;
//!
//! for path in vfs.enumerate(core)? {
//!     println!("{path}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! [`Vfs`] is `Sync`. Streams are independent values; any number may read
//! concurrently, including from the same data part, because part handles
//! use positioned reads.

pub mod config;
pub mod error;
pub mod import;
pub mod loose;
pub mod pack;
pub mod path;
pub mod pool;
pub mod stream;
pub mod verify;
pub mod vfs;

pub use config::{MountOptions, MountPrecedence, VfsConfig};
pub use error::{MountError, Result, VfsError};
pub use import::{IoStream, IoSystem, Origin, VfsIoStream, VfsIoSystem};
pub use loose::LooseStream;
pub use pack::{MountHandle, MountedPack, PackInfo};
pub use pool::{ArchiveHandle, ArchivePool};
pub use stream::{ArchiveStream, VfsStream};
pub use verify::{ChecksumMismatch, VerifyReport};
pub use vfs::{ResolvedLocation, Vfs};

pub use vexfs_formats::{Catalog, CatalogEntry, FormatError};
