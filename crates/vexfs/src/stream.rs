//! Archive entry streams
//!
//! An entry's logical content is the preload blob from the catalog followed
//! by `L` bytes in a backing file. [`ArchiveStream`] presents both as one
//! seekable range `[0, P + L)`. A read that crosses the preload boundary is
//! served in two pieces and returned as one; the only short read is the one
//! that ends at end of stream.

use crate::error::{Result, VfsError};
use crate::loose::LooseStream;
use crate::pool::ArchiveHandle;
use bytes::Bytes;
use std::io::{self, BufRead, Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::trace;

/// Backing range of an entry's remainder
#[derive(Debug, Clone)]
pub struct Remainder {
    /// File the bytes live in
    pub handle: Arc<ArchiveHandle>,
    /// Absolute offset of the first remainder byte
    pub offset: u64,
    /// Remainder length (`L`)
    pub length: u64,
}

/// Resolve a seek request against a stream of `size` bytes at `pos`
pub(crate) fn seek_target(pos: u64, size: u64, from: SeekFrom) -> Result<u64> {
    let target = match from {
        SeekFrom::Start(offset) => i128::from(offset),
        SeekFrom::Current(delta) => i128::from(pos) + i128::from(delta),
        SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
    };
    match u64::try_from(target) {
        Ok(target) if target <= size => Ok(target),
        _ => Err(VfsError::OutOfRange { target, size }),
    }
}

/// Seekable stream over one packed entry
#[derive(Debug)]
pub struct ArchiveStream {
    preload: Bytes,
    remainder: Option<Remainder>,
    size: u64,
    pos: u64,
    block: Vec<u8>,
    // remainder-relative offset of block[0]
    block_start: u64,
    block_size: usize,
    failed: bool,
}

impl ArchiveStream {
    /// Create a stream over `preload ++ remainder`.
    ///
    /// `block_size` bounds the read-ahead buffer for small sequential reads;
    /// zero disables it.
    pub fn new(preload: Bytes, remainder: Option<Remainder>, block_size: usize) -> Self {
        let length = remainder.as_ref().map_or(0, |r| r.length);
        Self {
            size: preload.len() as u64 + length,
            preload,
            remainder,
            pos: 0,
            block: Vec::new(),
            block_start: 0,
            block_size,
            failed: false,
        }
    }

    /// Logical size (`P + L`)
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Current position
    pub const fn tell(&self) -> u64 {
        self.pos
    }

    /// Bytes left before end of stream
    pub const fn remaining(&self) -> u64 {
        self.size - self.pos
    }

    /// Length of the inline preload region (`P`)
    pub fn preload_len(&self) -> u64 {
        self.preload.len() as u64
    }

    /// Whether an earlier read failed and the stream must be discarded
    pub const fn is_failed(&self) -> bool {
        self.failed
    }

    /// Seek without clamping.
    ///
    /// Targets outside `0..=size` fail with [`VfsError::OutOfRange`] and
    /// leave the position unchanged.
    pub fn seek_to(&mut self, from: SeekFrom) -> Result<u64> {
        if self.failed {
            return Err(VfsError::StreamFailed);
        }
        self.pos = seek_target(self.pos, self.size, from)?;
        Ok(self.pos)
    }

    /// Step back one byte so the next read returns it again.
    ///
    /// Returns `false` at position 0.
    pub fn unread(&mut self) -> bool {
        if self.pos == 0 {
            return false;
        }
        self.pos -= 1;
        true
    }

    /// Next byte without consuming it
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.fill_buf()?.first().copied())
    }

    fn check_usable(&self) -> io::Result<()> {
        if self.failed {
            Err(VfsError::StreamFailed.into())
        } else {
            Ok(())
        }
    }

    fn fail(&mut self, err: io::Error) -> io::Error {
        self.failed = true;
        self.block.clear();
        err
    }

    /// Whether the block buffer holds remainder bytes `[rel, rel + len)`
    fn block_covers(&self, rel: u64, len: usize) -> bool {
        rel >= self.block_start && rel + len as u64 <= self.block_start + self.block.len() as u64
    }

    /// Load the block buffer starting at remainder offset `rel`
    fn fill_block(&mut self, rel: u64, block_size: usize) -> io::Result<()> {
        let Some(remainder) = &self.remainder else {
            return Ok(());
        };
        let len = (remainder.length - rel).min(block_size as u64) as usize;
        self.block.resize(len, 0);
        remainder
            .handle
            .read_exact_at(remainder.offset + rel, &mut self.block)?;
        self.block_start = rel;
        Ok(())
    }

    /// Fill `out` from the remainder starting at remainder offset `rel`.
    ///
    /// The caller guarantees `rel + out.len() <= L`.
    fn read_remainder(&mut self, rel: u64, out: &mut [u8]) -> io::Result<()> {
        if self.block_size == 0 || out.len() >= self.block_size {
            let Some(remainder) = &self.remainder else {
                return Err(io::ErrorKind::UnexpectedEof.into());
            };
            return remainder.handle.read_exact_at(remainder.offset + rel, out);
        }

        if !self.block_covers(rel, out.len()) {
            self.fill_block(rel, self.block_size)?;
        }
        let start = (rel - self.block_start) as usize;
        out.copy_from_slice(&self.block[start..start + out.len()]);
        Ok(())
    }
}

impl Read for ArchiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_usable()?;

        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            return Ok(0);
        }

        let preload_len = self.preload_len();
        let mut filled = 0;

        if self.pos < preload_len {
            let start = self.pos as usize;
            let n = want.min(self.preload.len() - start);
            buf[..n].copy_from_slice(&self.preload[start..start + n]);
            filled = n;
        }

        if filled < want {
            let rel = self.pos + filled as u64 - preload_len;
            if filled > 0 {
                trace!(
                    "Read straddles preload boundary: {} preload + {} remainder bytes",
                    filled,
                    want - filled
                );
            }
            if let Err(e) = self.read_remainder(rel, &mut buf[filled..want]) {
                return Err(self.fail(e));
            }
        }

        self.pos += want as u64;
        Ok(want)
    }
}

impl BufRead for ArchiveStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.check_usable()?;

        let preload_len = self.preload_len();
        if self.pos < preload_len {
            return Ok(&self.preload[self.pos as usize..]);
        }
        if self.pos >= self.size {
            return Ok(&[]);
        }

        let rel = self.pos - preload_len;
        if !self.block_covers(rel, 1) {
            let block_size = self.block_size.max(1);
            if let Err(e) = self.fill_block(rel, block_size) {
                return Err(self.fail(e));
            }
        }
        let start = (rel - self.block_start) as usize;
        Ok(&self.block[start..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt as u64).min(self.size);
    }
}

impl Seek for ArchiveStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_to(pos).map_err(io::Error::from)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

/// Stream returned by [`Vfs::open`](crate::Vfs::open)
#[derive(Debug)]
pub enum VfsStream {
    /// Entry inside a mounted pack
    Packed(ArchiveStream),
    /// File in a loose-file root
    Loose(LooseStream),
}

impl VfsStream {
    /// Total size in bytes
    pub fn size(&self) -> u64 {
        match self {
            Self::Packed(s) => s.size(),
            Self::Loose(s) => s.size(),
        }
    }

    /// Current position
    pub fn tell(&self) -> u64 {
        match self {
            Self::Packed(s) => s.tell(),
            Self::Loose(s) => s.tell(),
        }
    }

    /// Seek without clamping; see [`ArchiveStream::seek_to`]
    pub fn seek_to(&mut self, from: SeekFrom) -> Result<u64> {
        match self {
            Self::Packed(s) => s.seek_to(from),
            Self::Loose(s) => s.seek_to(from),
        }
    }

    /// Step back one byte; `false` at position 0
    pub fn unread(&mut self) -> bool {
        match self {
            Self::Packed(s) => s.unread(),
            Self::Loose(s) => s.unread(),
        }
    }

    /// Next byte without consuming it
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.fill_buf()?.first().copied())
    }

    /// Whether the stream reads from a pack
    pub const fn is_packed(&self) -> bool {
        matches!(self, Self::Packed(_))
    }
}

impl Read for VfsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Packed(s) => s.read(buf),
            Self::Loose(s) => s.read(buf),
        }
    }
}

impl BufRead for VfsStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Self::Packed(s) => s.fill_buf(),
            Self::Loose(s) => s.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Packed(s) => s.consume(amt),
            Self::Loose(s) => s.consume(amt),
        }
    }
}

impl Seek for VfsStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_to(pos).map_err(io::Error::from)
    }
}
