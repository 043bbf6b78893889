//! IO bridge for external asset importers
//!
//! Mesh and scene importers usually ask the host for an "IO system" that
//! can test for and open files by name, plus an "IO stream" with item-based
//! reads. [`IoSystem`] and [`IoStream`] describe that contract;
//! [`VfsIoSystem`] and [`VfsIoStream`] implement it on top of [`Vfs`], so
//! an importer loading `models/crate.obj` can pull `crate.mtl` and its
//! textures from the same packs.

use crate::error::{Result, VfsError};
use crate::path::{file_name, resolve_relative};
use crate::stream::VfsStream;
use crate::vfs::Vfs;
use std::io::{self, Read, SeekFrom};
use tracing::{debug, warn};

/// Seek origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// From the start of the stream
    Set,
    /// From the current position
    Current,
    /// From the end of the stream
    End,
}

/// Stream handed to an importer
pub trait IoStream: Send {
    /// Read up to `count` items of `size` bytes into `buf`.
    ///
    /// Returns the number of whole items read.
    fn read(&mut self, buf: &mut [u8], size: usize, count: usize) -> usize;

    /// Write items; read-only streams return 0
    fn write(&mut self, buf: &[u8], size: usize, count: usize) -> usize;

    /// Move the cursor
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<()>;

    /// Current position
    fn tell(&self) -> u64;

    /// Total size in bytes
    fn file_size(&self) -> u64;

    /// Flush pending writes
    fn flush(&mut self) {}
}

/// File system handed to an importer
pub trait IoSystem {
    /// Whether `path` can be opened
    fn exists(&self, path: &str) -> bool;

    /// Path separator the importer should use
    fn separator(&self) -> char {
        '/'
    }

    /// Open `path` with a C-style `mode` (`"rb"`, ...)
    fn open(&self, path: &str, mode: &str) -> Option<Box<dyn IoStream>>;

    /// Release a stream returned by [`open`](Self::open)
    fn close(&self, stream: Box<dyn IoStream>) {
        drop(stream);
    }
}

/// [`IoStream`] over a [`VfsStream`]
#[derive(Debug)]
pub struct VfsIoStream {
    inner: VfsStream,
}

impl VfsIoStream {
    /// Wrap an open stream
    pub const fn new(inner: VfsStream) -> Self {
        Self { inner }
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> VfsStream {
        self.inner
    }
}

impl IoStream for VfsIoStream {
    fn read(&mut self, buf: &mut [u8], size: usize, count: usize) -> usize {
        if size == 0 {
            return 0;
        }
        let wanted = size.saturating_mul(count).min(buf.len() / size * size);

        let mut filled = 0;
        while filled < wanted {
            match self.inner.read(&mut buf[filled..wanted]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Importer read failed after {} bytes: {}", filled, e);
                    break;
                }
            }
        }
        filled / size
    }

    fn write(&mut self, _buf: &[u8], _size: usize, _count: usize) -> usize {
        0
    }

    fn seek(&mut self, offset: i64, origin: Origin) -> Result<()> {
        let from = match origin {
            Origin::Set => {
                SeekFrom::Start(u64::try_from(offset).map_err(|_| VfsError::OutOfRange {
                    target: i128::from(offset),
                    size: self.inner.size(),
                })?)
            }
            Origin::Current => SeekFrom::Current(offset),
            Origin::End => SeekFrom::End(offset),
        };
        self.inner.seek_to(from)?;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn file_size(&self) -> u64 {
        self.inner.size()
    }
}

/// [`IoSystem`] that resolves names through a [`Vfs`].
///
/// Names are tried as given, then relative to the directory of the model
/// being imported, then as a bare file name.
#[derive(Debug, Clone)]
pub struct VfsIoSystem<'a> {
    vfs: &'a Vfs,
    model_path: String,
}

impl<'a> VfsIoSystem<'a> {
    /// IO system for importing `model_path`
    pub fn new(vfs: &'a Vfs, model_path: &str) -> Self {
        Self {
            vfs,
            model_path: model_path.to_string(),
        }
    }

    /// Path of the model being imported
    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    /// First candidate spelling of `path` that exists
    pub fn locate(&self, path: &str) -> Option<String> {
        let candidates = [
            path.to_string(),
            resolve_relative(&self.model_path, path),
            file_name(path).to_string(),
        ];
        let found = candidates
            .into_iter()
            .find(|candidate| self.vfs.exists(candidate));
        match &found {
            Some(candidate) => debug!("Importer path {} found as {}", path, candidate),
            None => debug!("Importer path {} not found", path),
        }
        found
    }
}

impl IoSystem for VfsIoSystem<'_> {
    fn exists(&self, path: &str) -> bool {
        self.locate(path).is_some()
    }

    fn open(&self, path: &str, mode: &str) -> Option<Box<dyn IoStream>> {
        if !mode.contains('r') {
            warn!("Importer asked to open {} with unsupported mode {:?}", path, mode);
            return None;
        }
        let Some(found) = self.locate(path) else {
            warn!("Importer could not find {}", path);
            return None;
        };
        match self.vfs.open(&found) {
            Ok(stream) => Some(Box::new(VfsIoStream::new(stream))),
            Err(e) => {
                warn!("Importer failed to open {}: {}", found, e);
                None
            }
        }
    }
}
