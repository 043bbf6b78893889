//! Configuration for the virtual file system

use crate::error::{Result, VfsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted stream block buffer
pub const MAX_READ_BLOCK_SIZE: usize = 1024 * 1024;

/// Which pack wins when several mounted packs contain the same path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountPrecedence {
    /// Packs are searched in mount order
    #[default]
    FirstMounted,
    /// Packs are searched in reverse mount order
    LastMounted,
}

/// Configuration for the virtual file system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Loose-file roots searched before any mounted pack
    pub loose_roots: Vec<PathBuf>,

    /// Search each mount's companion directory for loose overrides
    pub companion_dirs: bool,

    /// Overlap rule between mounted packs
    pub precedence: MountPrecedence,

    /// Memory-map data parts instead of issuing positioned reads
    pub memory_map: bool,

    /// Archive stream block buffer size (0 disables buffering)
    pub read_block_size: usize,

    /// Leading virtual directory removed during normalization
    pub strip_prefix: Option<String>,

    /// Lower-case lookup keys
    pub case_insensitive: bool,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            loose_roots: Vec::new(),
            companion_dirs: true,
            precedence: MountPrecedence::FirstMounted,
            memory_map: false,
            read_block_size: 4096,
            strip_prefix: Some("Assets".to_string()),
            case_insensitive: false,
        }
    }
}

impl VfsConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| VfsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Add a global loose-file root
    #[must_use]
    pub fn with_loose_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.loose_roots.push(root.as_ref().to_path_buf());
        self
    }

    /// Enable or disable per-mount companion directories
    #[must_use]
    pub const fn with_companion_dirs(mut self, enable: bool) -> Self {
        self.companion_dirs = enable;
        self
    }

    /// Set the overlap rule between packs
    #[must_use]
    pub const fn with_precedence(mut self, precedence: MountPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Enable or disable memory-mapped data parts
    #[must_use]
    pub const fn with_memory_map(mut self, enable: bool) -> Self {
        self.memory_map = enable;
        self
    }

    /// Set the archive stream block buffer size
    #[must_use]
    pub const fn with_read_block_size(mut self, size: usize) -> Self {
        self.read_block_size = size;
        self
    }

    /// Set or clear the stripped leading directory
    #[must_use]
    pub fn with_strip_prefix(mut self, prefix: Option<&str>) -> Self {
        self.strip_prefix = prefix.map(str::to_string);
        self
    }

    /// Enable or disable case-insensitive lookups
    #[must_use]
    pub const fn with_case_insensitive(mut self, enable: bool) -> Self {
        self.case_insensitive = enable;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.read_block_size > MAX_READ_BLOCK_SIZE {
            return Err(VfsError::Config(format!(
                "read_block_size {} exceeds {}",
                self.read_block_size, MAX_READ_BLOCK_SIZE
            )));
        }
        if let Some(prefix) = &self.strip_prefix
            && (prefix.is_empty() || prefix.contains(['/', '\\']))
        {
            return Err(VfsError::Config(format!(
                "strip_prefix must be a single path component, got {prefix:?}"
            )));
        }
        Ok(())
    }
}

/// Per-mount options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Loose-file directory for this pack, overriding the companion directory
    pub loose_root: Option<PathBuf>,
}

impl MountOptions {
    /// Use `root` as this pack's loose-file directory
    #[must_use]
    pub fn with_loose_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.loose_root = Some(root.as_ref().to_path_buf());
        self
    }
}
