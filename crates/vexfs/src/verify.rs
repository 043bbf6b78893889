//! Entry checksum verification

use crate::error::Result;
use crate::pack::MountedPack;
use crc32fast::Hasher;
use std::io::Read;
use tracing::{debug, warn};
use vexfs_formats::CatalogEntry;

/// Entry whose content does not hash to its catalog checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    /// Catalog path
    pub path: String,
    /// Checksum recorded in the catalog
    pub expected: u32,
    /// Checksum of the bytes actually read
    pub actual: u32,
}

/// Outcome of verifying a whole pack
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Entries read and hashed
    pub checked: usize,
    /// Entries with a wrong checksum
    pub mismatches: Vec<ChecksumMismatch>,
    /// Entries that could not be read, with the error text
    pub failures: Vec<(String, String)>,
}

impl VerifyReport {
    /// Whether every entry was read and matched
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty() && self.failures.is_empty()
    }
}

/// CRC-32 of an entry's full content (`P + L` bytes)
pub fn entry_checksum(pack: &MountedPack, entry: &CatalogEntry, block_size: usize) -> Result<u32> {
    let mut stream = pack.open_entry(entry, block_size)?;
    let mut hasher = Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Check one entry against its catalog checksum
pub fn verify_entry(
    pack: &MountedPack,
    path: &str,
    entry: &CatalogEntry,
    block_size: usize,
) -> Result<Option<ChecksumMismatch>> {
    let actual = entry_checksum(pack, entry, block_size)?;
    Ok((actual != entry.crc32).then(|| ChecksumMismatch {
        path: path.to_string(),
        expected: entry.crc32,
        actual,
    }))
}

/// Check every entry of `pack`; read errors are collected, not returned
pub fn verify_pack(pack: &MountedPack, block_size: usize) -> VerifyReport {
    let mut report = VerifyReport::default();
    for (path, entry) in pack.catalog().iter() {
        match verify_entry(pack, path, entry, block_size) {
            Ok(None) => report.checked += 1,
            Ok(Some(mismatch)) => {
                warn!(
                    "Checksum mismatch for {}: expected {:08x}, got {:08x}",
                    path, mismatch.expected, mismatch.actual
                );
                report.checked += 1;
                report.mismatches.push(mismatch);
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path, e);
                report.failures.push((path.to_string(), e.to_string()));
            }
        }
    }
    debug!(
        "Verified {}: {} checked, {} mismatched, {} unreadable",
        pack.directory_path().display(),
        report.checked,
        report.mismatches.len(),
        report.failures.len()
    );
    report
}
