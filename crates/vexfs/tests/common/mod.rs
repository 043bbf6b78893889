//! Shared on-disk pack fixtures
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use vexfs_formats::pack::{PackBuilder, Placement};

/// One file to put in a fixture pack
pub struct Fixture {
    pub path: String,
    pub data: Vec<u8>,
    pub preload: usize,
    pub placement: Placement,
}

impl Fixture {
    pub fn new(path: impl Into<String>, data: &[u8], preload: usize, placement: Placement) -> Self {
        Self {
            path: path.into(),
            data: data.to_vec(),
            preload,
            placement,
        }
    }
}

/// Deterministic pseudo-random content
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Write a pack named `base` into `dir` and return its directory file path
pub fn write_pack(dir: &Path, base: &str, version: u32, files: &[Fixture]) -> PathBuf {
    let mut builder = PackBuilder::new(version).unwrap();
    for file in files {
        builder
            .add_file(&file.path, &file.data, file.preload, file.placement)
            .unwrap();
    }
    builder.build().unwrap().write_to(dir, base).unwrap()
}
