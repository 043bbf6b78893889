//! Loose-file streams and lookups

use crate::error::Result;
use crate::stream::seek_target;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Sequential file stream over a loose file on disk
#[derive(Debug)]
pub struct LooseStream {
    reader: BufReader<File>,
    path: PathBuf,
    size: u64,
    pos: u64,
}

impl LooseStream {
    /// Open `path`
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            size,
            pos: 0,
        })
    }

    /// Path on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size at open time
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Current position
    pub const fn tell(&self) -> u64 {
        self.pos
    }

    /// Seek without clamping; targets past the end fail with
    /// [`VfsError::OutOfRange`](crate::VfsError::OutOfRange)
    pub fn seek_to(&mut self, from: SeekFrom) -> Result<u64> {
        let target = seek_target(self.pos, self.size, from)?;
        // seek_relative keeps the buffer when the target is inside it
        let delta = i128::from(target) - i128::from(self.pos);
        match i64::try_from(delta) {
            Ok(delta) => self.reader.seek_relative(delta)?,
            Err(_) => {
                self.reader.seek(SeekFrom::Start(target))?;
            }
        }
        self.pos = target;
        Ok(target)
    }

    /// Step back one byte; `false` at position 0
    pub fn unread(&mut self) -> bool {
        self.pos > 0 && self.seek_to(SeekFrom::Current(-1)).is_ok()
    }
}

impl Read for LooseStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl BufRead for LooseStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt);
        self.pos += amt as u64;
    }
}

impl Seek for LooseStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_to(pos).map_err(io::Error::from)
    }
}

/// Look `key` up under `root`.
///
/// With `case_insensitive`, `key` is lower-case and each component is
/// matched against lower-cased directory listings.
pub fn find_loose(root: &Path, key: &str, case_insensitive: bool) -> Option<PathBuf> {
    if !case_insensitive {
        let candidate = root.join(key);
        return candidate.is_file().then_some(candidate);
    }

    let mut current = root.to_path_buf();
    let mut components = key.split('/').peekable();
    while let Some(component) = components.next() {
        let entries = std::fs::read_dir(&current).ok()?;
        let found = entries.filter_map(std::result::Result::ok).find(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.to_lowercase() == component)
        })?;
        current = found.path();
        if components.peek().is_some() && !current.is_dir() {
            return None;
        }
    }
    trace!("Case-folded {} to {}", key, current.display());
    current.is_file().then_some(current)
}
