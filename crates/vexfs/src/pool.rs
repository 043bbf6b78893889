//! Shared handles to numbered data parts
//!
//! Every open stream over a packed entry holds an `Arc<ArchiveHandle>` for
//! the part its remainder lives in. The pool only keeps weak references, so
//! a part file is closed as soon as the last stream or pack reading it goes
//! away, and reopened lazily on the next access.

use crate::error::Result;
use crate::path::part_path;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

#[cfg(not(any(unix, windows)))]
use parking_lot::Mutex;

/// Pool key: pack base path plus part index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    /// Base path shared by the pack's files (`maps/city`)
    pub base: PathBuf,
    /// Numbered part index
    pub index: u16,
}

enum Backing {
    /// Positioned reads straight from the file
    #[cfg(any(unix, windows))]
    File(File),
    /// Seek + read under a lock where positioned reads are unavailable
    #[cfg(not(any(unix, windows)))]
    Locked(Mutex<File>),
    /// Read-only memory map
    Mapped(Mmap),
}

/// Read-only handle to one backing file.
///
/// Reads take an absolute offset and never touch a shared cursor, so any
/// number of threads may read through the same handle at once.
pub struct ArchiveHandle {
    path: PathBuf,
    size: u64,
    backing: Backing,
}

impl std::fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("mapped", &matches!(self.backing, Backing::Mapped(_)))
            .finish()
    }
}

impl ArchiveHandle {
    /// Open `path` for positioned reads, optionally memory-mapped
    pub fn open(path: &Path, memory_map: bool) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        let backing = if memory_map && size > 0 {
            // SAFETY: pack files are immutable once built; a concurrent
            // truncation by another process is outside what we support.
            #[allow(unsafe_code)]
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            Backing::Mapped(mmap)
        } else {
            Self::file_backing(file)
        };

        debug!("Opened archive handle {} ({} bytes)", path.display(), size);

        Ok(Self {
            path: path.to_path_buf(),
            size,
            backing,
        })
    }

    #[cfg(any(unix, windows))]
    fn file_backing(file: File) -> Backing {
        Backing::File(file)
    }

    #[cfg(not(any(unix, windows)))]
    fn file_backing(file: File) -> Backing {
        Backing::Locked(Mutex::new(file))
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backing file size at open time
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Whether reads are served from a memory map
    pub const fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Fill `buf` from absolute `offset`.
    ///
    /// Fails with `UnexpectedEof` if the file ends first.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        trace!(
            "Positioned read {} bytes at {} from {}",
            buf.len(),
            offset,
            self.path.display()
        );
        match &self.backing {
            Backing::Mapped(mmap) => {
                let start = usize::try_from(offset)
                    .map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))?;
                let end = start
                    .checked_add(buf.len())
                    .filter(|end| *end <= mmap.len())
                    .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
                buf.copy_from_slice(&mmap[start..end]);
                Ok(())
            }
            #[cfg(unix)]
            Backing::File(file) => std::os::unix::fs::FileExt::read_exact_at(file, buf, offset),
            #[cfg(windows)]
            Backing::File(file) => {
                use std::os::windows::fs::FileExt;
                let mut filled = 0;
                while filled < buf.len() {
                    match file.seek_read(&mut buf[filled..], offset + filled as u64) {
                        Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                        Ok(n) => filled += n,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
            #[cfg(not(any(unix, windows)))]
            Backing::Locked(file) => {
                use std::io::{Read, Seek, SeekFrom};
                let mut file = file.lock();
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(buf)
            }
        }
    }
}

impl Drop for ArchiveHandle {
    fn drop(&mut self) {
        debug!("Closing archive handle {}", self.path.display());
    }
}

/// Lazily opened, shared data part handles
#[derive(Debug, Default)]
pub struct ArchivePool {
    handles: DashMap<PoolKey, Weak<ArchiveHandle>>,
    memory_map: bool,
}

impl ArchivePool {
    /// Create an empty pool
    pub fn new(memory_map: bool) -> Self {
        Self {
            handles: DashMap::new(),
            memory_map,
        }
    }

    /// Get the handle for part `index` of the pack at `base`, opening it if
    /// no live handle exists.
    ///
    /// Creation for a key happens under that key's map entry lock, so two
    /// threads racing on the same part end up sharing one handle.
    pub fn acquire(&self, base: &Path, index: u16) -> Result<Arc<ArchiveHandle>> {
        let key = PoolKey {
            base: base.to_path_buf(),
            index,
        };

        match self.handles.entry(key) {
            Entry::Occupied(mut occupied) => {
                if let Some(handle) = occupied.get().upgrade() {
                    return Ok(handle);
                }
                let handle = Arc::new(self.open_part(base, index)?);
                occupied.insert(Arc::downgrade(&handle));
                Ok(handle)
            }
            Entry::Vacant(vacant) => {
                let handle = Arc::new(self.open_part(base, index)?);
                vacant.insert(Arc::downgrade(&handle));
                Ok(handle)
            }
        }
    }

    /// Give up a reference obtained from [`acquire`](Self::acquire).
    ///
    /// The file closes once no other reference remains. Dropping the `Arc`
    /// has the same effect; this also forgets the pool slot.
    pub fn release(&self, handle: Arc<ArchiveHandle>) {
        drop(handle);
        self.prune();
    }

    /// Forget slots whose handles have all been dropped
    pub fn prune(&self) {
        self.handles.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of parts currently open
    pub fn open_handles(&self) -> usize {
        self.handles
            .iter()
            .filter(|slot| slot.value().strong_count() > 0)
            .count()
    }

    /// Whether part `index` of `base` is currently open
    pub fn is_open(&self, base: &Path, index: u16) -> bool {
        let key = PoolKey {
            base: base.to_path_buf(),
            index,
        };
        self.handles
            .get(&key)
            .is_some_and(|slot| slot.strong_count() > 0)
    }

    fn open_part(&self, base: &Path, index: u16) -> io::Result<ArchiveHandle> {
        ArchiveHandle::open(&part_path(base, index), self.memory_map)
    }
}
