//! Virtual file system facade

use crate::config::{MountOptions, MountPrecedence, VfsConfig};
use crate::error::{Result, VfsError};
use crate::loose::{LooseStream, find_loose};
use crate::pack::{MountHandle, MountedPack, PackInfo};
use crate::path::{normalize, pack_base};
use crate::pool::ArchivePool;
use crate::stream::VfsStream;
use crate::verify::{VerifyReport, verify_pack};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use vexfs_formats::CatalogEntry;
use walkdir::WalkDir;

/// Where a virtual path lives
#[derive(Debug, Clone)]
pub enum ResolvedLocation {
    /// File on disk under a loose-file root
    Loose(PathBuf),
    /// Entry in a mounted pack
    Packed {
        /// Pack holding the entry
        pack: Arc<MountedPack>,
        /// Catalog path of the entry
        path: String,
        /// Entry metadata
        entry: CatalogEntry,
    },
}

impl ResolvedLocation {
    /// Whether the path resolved to a loose file
    pub const fn is_loose(&self) -> bool {
        matches!(self, Self::Loose(_))
    }

    /// Mount handle of the owning pack, if packed
    pub fn mount_handle(&self) -> Option<MountHandle> {
        match self {
            Self::Loose(_) => None,
            Self::Packed { pack, .. } => Some(pack.handle()),
        }
    }
}

/// Read-only virtual file system over loose roots and mounted packs.
///
/// Lookups check loose-file roots first (global roots, then each pack's
/// companion directory), then pack catalogs in precedence order. All
/// methods take `&self`; mounting and unmounting are serialized by an
/// internal lock and may run alongside reads on other threads.
#[derive(Debug)]
pub struct Vfs {
    config: VfsConfig,
    pool: Arc<ArchivePool>,
    mounts: RwLock<Vec<Arc<MountedPack>>>,
    next_handle: AtomicU64,
}

impl Default for Vfs {
    fn default() -> Self {
        let config = VfsConfig::default();
        Self {
            pool: Arc::new(ArchivePool::new(config.memory_map)),
            config,
            mounts: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }
}

impl Vfs {
    /// Create an empty file system
    pub fn new(config: VfsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pool: Arc::new(ArchivePool::new(config.memory_map)),
            config,
            mounts: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Active configuration
    pub const fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Shared data part pool
    pub const fn pool(&self) -> &Arc<ArchivePool> {
        &self.pool
    }

    /// Normalize `path` into a lookup key
    pub fn key(&self, path: &str) -> Result<String> {
        normalize(
            path,
            self.config.strip_prefix.as_deref(),
            self.config.case_insensitive,
        )
    }

    /// Mount the pack whose directory file is `directory_path`
    pub fn mount<P: AsRef<Path>>(&self, directory_path: P) -> Result<MountHandle> {
        self.mount_with(directory_path, MountOptions::default())
    }

    /// Mount a pack with per-mount options.
    ///
    /// On failure the mount list is left as it was.
    pub fn mount_with<P: AsRef<Path>>(
        &self,
        directory_path: P,
        options: MountOptions,
    ) -> Result<MountHandle> {
        let directory_path = directory_path.as_ref();
        let handle = MountHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));

        let loose_root = match options.loose_root {
            Some(root) => {
                if !root.is_dir() {
                    warn!(
                        "Loose root {} for {} does not exist",
                        root.display(),
                        directory_path.display()
                    );
                }
                Some(root)
            }
            None if self.config.companion_dirs => Some(pack_base(directory_path)),
            None => None,
        };

        let pack = MountedPack::open(
            handle,
            directory_path,
            Arc::clone(&self.pool),
            self.config.memory_map,
            self.config.case_insensitive,
            loose_root,
        )?;

        info!(
            "Mounted {} as {} ({} entries)",
            directory_path.display(),
            handle,
            pack.catalog().len()
        );
        self.mounts.write().push(Arc::new(pack));
        Ok(handle)
    }

    /// Remove a pack from lookups.
    ///
    /// Streams already open on the pack keep working; its files close when
    /// the last of them is dropped.
    pub fn unmount(&self, handle: MountHandle) -> Result<()> {
        let pack = {
            let mut mounts = self.mounts.write();
            let index = mounts
                .iter()
                .position(|pack| pack.handle() == handle)
                .ok_or(VfsError::NotMounted(handle))?;
            mounts.remove(index)
        };

        if pack.has_open_streams() {
            warn!(
                "Unmounted {} while streams are still open; files close when they drop",
                pack.directory_path().display()
            );
        }
        info!("Unmounted {} ({})", pack.directory_path().display(), handle);
        Ok(())
    }

    /// Mounted packs in mount order
    pub fn mounts(&self) -> Vec<MountHandle> {
        self.mounts.read().iter().map(|pack| pack.handle()).collect()
    }

    /// Mounted pack by handle
    pub fn pack(&self, handle: MountHandle) -> Result<Arc<MountedPack>> {
        self.mounts
            .read()
            .iter()
            .find(|pack| pack.handle() == handle)
            .cloned()
            .ok_or(VfsError::NotMounted(handle))
    }

    /// Snapshot of the mounts in lookup order
    fn search_order(&self) -> Vec<Arc<MountedPack>> {
        let mut packs = self.mounts.read().clone();
        if self.config.precedence == MountPrecedence::LastMounted {
            packs.reverse();
        }
        packs
    }

    /// Loose roots in lookup order: global roots, then companion dirs
    fn loose_roots(&self, packs: &[Arc<MountedPack>]) -> Vec<PathBuf> {
        let mut roots = self.config.loose_roots.clone();
        roots.extend(
            packs
                .iter()
                .filter_map(|pack| pack.loose_root().map(Path::to_path_buf)),
        );
        roots
    }

    /// Find where `path` lives
    pub fn resolve(&self, path: &str) -> Result<ResolvedLocation> {
        let key = self.key(path)?;
        let packs = self.search_order();

        for root in self.loose_roots(&packs) {
            if let Some(file) = find_loose(&root, &key, self.config.case_insensitive) {
                debug!("Resolved {} to loose file {}", key, file.display());
                return Ok(ResolvedLocation::Loose(file));
            }
        }

        for pack in packs {
            if let Some((found, entry)) = pack.lookup(&key) {
                debug!("Resolved {} in pack {}", key, pack.handle());
                let path = found.to_string();
                let entry = entry.clone();
                return Ok(ResolvedLocation::Packed { pack, path, entry });
            }
        }

        Err(VfsError::NotFound(path.to_string()))
    }

    /// Open `path` for reading
    pub fn open(&self, path: &str) -> Result<VfsStream> {
        match self.resolve(path)? {
            ResolvedLocation::Loose(file) => Ok(VfsStream::Loose(LooseStream::open(&file)?)),
            ResolvedLocation::Packed { pack, entry, .. } => Ok(VfsStream::Packed(
                pack.open_entry(&entry, self.config.read_block_size)?,
            )),
        }
    }

    /// Whether `path` resolves anywhere
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Catalog paths of a mounted pack, in catalog order
    pub fn enumerate(&self, handle: MountHandle) -> Result<impl Iterator<Item = String> + use<>> {
        let pack = self.pack(handle)?;
        let paths: Vec<String> = pack.catalog().paths().map(str::to_string).collect();
        Ok(paths.into_iter())
    }

    /// Read the whole of `path`
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let mut stream = self.open(path)?;
        let mut data = Vec::with_capacity(usize::try_from(stream.size()).unwrap_or(0));
        stream.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Size of `path` without opening any data part
    pub fn file_size(&self, path: &str) -> Result<u64> {
        match self.resolve(path)? {
            ResolvedLocation::Loose(file) => Ok(std::fs::metadata(file)?.len()),
            ResolvedLocation::Packed { entry, .. } => Ok(entry.size()),
        }
    }

    /// Files under virtual directory `dir` across loose roots and packs.
    ///
    /// An empty `dir` (or `/`) lists everything. Results are lookup keys,
    /// sorted and de-duplicated.
    pub fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let dir_key = if dir.trim_matches(['/', '\\']).is_empty() {
            String::new()
        } else {
            self.key(dir)?
        };
        let fold = self.config.case_insensitive;
        let packs = self.search_order();
        let mut files = BTreeSet::new();

        for root in self.loose_roots(&packs) {
            for entry in WalkDir::new(&root)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_file())
            {
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let Some(relative) = relative.to_str() else {
                    continue;
                };
                let mut key = relative.replace('\\', "/");
                if fold {
                    key = key.to_lowercase();
                }
                if is_under(&key, &dir_key) {
                    files.insert(key);
                }
            }
        }

        for pack in &packs {
            for path in pack.catalog().paths() {
                let key = if fold { path.to_lowercase() } else { path.to_string() };
                if is_under(&key, &dir_key) {
                    files.insert(key);
                }
            }
        }

        Ok(files.into_iter().collect())
    }

    /// Summary of a mounted pack
    pub fn pack_info(&self, handle: MountHandle) -> Result<PackInfo> {
        Ok(self.pack(handle)?.info())
    }

    /// Recompute every entry checksum of a mounted pack
    pub fn verify_pack(&self, handle: MountHandle) -> Result<VerifyReport> {
        let pack = self.pack(handle)?;
        Ok(verify_pack(&pack, self.config.read_block_size))
    }
}

fn is_under(key: &str, dir: &str) -> bool {
    dir.is_empty()
        || key
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}
