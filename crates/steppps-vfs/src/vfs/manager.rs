//! Mount routing and whole-file convenience operations.
//!
//! The manager maps external paths onto mounted backends by longest prefix
//! and tracks a current working directory for relative paths.

use parking_lot::RwLock as SyncRwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{MountKind, Permissions, VfsConfig};

use super::backends::{HostBackend, VirtualFileSystem};
use super::error::{VfsError, VfsResult};
use super::ops::{Backend, BackendKind};
use super::path::{self, ROOT};
use super::types::{FsStats, OpenMode, PathEntry};

/// Information about a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// The mount path (e.g., "/data").
    pub path: String,
    /// Human-readable name given at mount time.
    pub name: String,
    pub kind: BackendKind,
    pub read_only: bool,
}

/// Result of routing a path to a backend.
#[derive(Clone)]
pub struct Resolved {
    pub store: Arc<dyn Backend>,
    /// Mount path that matched.
    pub mount_point: String,
    /// Name of the matched mount.
    pub name: String,
    /// Path within the backend, rooted at `/`.
    pub path: String,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("mount_point", &self.mount_point)
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

struct Mount {
    name: String,
    store: Arc<dyn Backend>,
}

/// Routes filesystem operations to mounted backends.
///
/// Mount points are matched by longest prefix on whole path segments. With
/// mounts at `/` and `/data`, `/data/x` goes to `/data` and `/database`
/// goes to `/`.
pub struct FileSystemManager {
    /// Mount points, keyed by normalized path.
    mounts: RwLock<BTreeMap<String, Mount>>,
    cwd: SyncRwLock<String>,
}

impl std::fmt::Debug for FileSystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemManager")
            .field("mounts", &"<locked>")
            .field("cwd", &*self.cwd.read())
            .finish()
    }
}

impl Default for FileSystemManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemManager {
    /// Create a manager with nothing mounted.
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(BTreeMap::new()),
            cwd: SyncRwLock::new(ROOT.to_string()),
        }
    }

    /// Build a manager and mount every backend listed in `config`.
    ///
    /// With no mounts configured, a single virtual store is mounted at `/`.
    pub async fn from_config(config: &VfsConfig) -> VfsResult<Self> {
        let manager = Self::new();
        if config.mounts.is_empty() {
            manager
                .mount(ROOT, Arc::new(VirtualFileSystem::with_config(config)), "root")
                .await?;
            return Ok(manager);
        }

        for mount in &config.mounts {
            let store: Arc<dyn Backend> = match mount.kind {
                MountKind::Virtual => Arc::new(VirtualFileSystem::with_config(config)),
                MountKind::Host => {
                    let root = mount.root.clone().ok_or_else(|| {
                        VfsError::Config(format!("host mount {} needs a root", mount.path))
                    })?;
                    if mount.read_only {
                        Arc::new(HostBackend::read_only(root, config))
                    } else {
                        Arc::new(HostBackend::new(root, config))
                    }
                }
            };
            manager.mount(&mount.path, store, &mount.name).await?;
        }
        Ok(manager)
    }

    /// Mount a backend at the given path.
    ///
    /// Relative mount paths are taken from the root. Fails if something is
    /// already mounted there.
    pub async fn mount(
        &self,
        mount_path: &str,
        store: Arc<dyn Backend>,
        name: impl Into<String>,
    ) -> VfsResult<()> {
        let mount_path = path::resolve(ROOT, mount_path);
        let name = name.into();
        let mut mounts = self.mounts.write().await;
        if mounts.contains_key(&mount_path) {
            return Err(VfsError::already_exists(mount_path));
        }
        tracing::debug!(path = %mount_path, name = %name, kind = %store.kind(), "mounted");
        mounts.insert(mount_path, Mount { name, store });
        Ok(())
    }

    /// Unmount the backend at the given path.
    pub async fn unmount(&self, mount_path: &str) -> VfsResult<()> {
        let mount_path = path::resolve(ROOT, mount_path);
        let mut mounts = self.mounts.write().await;
        match mounts.remove(&mount_path) {
            Some(mount) => {
                tracing::debug!(path = %mount_path, name = %mount.name, "unmounted");
                Ok(())
            }
            None => Err(VfsError::no_mount_point(mount_path)),
        }
    }

    /// List all current mounts, ordered by path.
    pub async fn list_mounts(&self) -> Vec<MountInfo> {
        let mounts = self.mounts.read().await;
        mounts
            .iter()
            .map(|(path, mount)| MountInfo {
                path: path.clone(),
                name: mount.name.clone(),
                kind: mount.store.kind(),
                read_only: mount.store.read_only(),
            })
            .collect()
    }

    /// Normalize `path` against the current directory.
    pub fn absolute(&self, path: &str) -> String {
        path::resolve(&self.cwd.read(), path)
    }

    /// Find the backend responsible for `path`.
    pub async fn resolve(&self, path: &str) -> VfsResult<Resolved> {
        let absolute = self.absolute(path);
        let mounts = self.mounts.read().await;

        // BTreeMap order is lexical, so scan for the longest matching prefix
        let best = mounts
            .iter()
            .filter(|(mount_path, _)| path::is_under(&absolute, mount_path))
            .max_by_key(|(mount_path, _)| mount_path.len());

        match best {
            Some((mount_path, mount)) => Ok(Resolved {
                store: Arc::clone(&mount.store),
                mount_point: mount_path.clone(),
                name: mount.name.clone(),
                path: path::strip_mount(&absolute, mount_path),
            }),
            None => Err(VfsError::no_mount_point(absolute)),
        }
    }

    /// Read a whole file: open, read to end, close.
    pub async fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        let target = self.resolve(path).await?;
        let handle = target.store.open(&target.path, OpenMode::Read).await?;
        let data = target.store.read(handle, None).await;
        let closed = target.store.close(handle).await;
        let data = data?;
        closed?;
        Ok(data)
    }

    /// Replace a file's content, creating it if missing.
    pub async fn write_file(&self, path: &str, content: &[u8]) -> VfsResult<()> {
        self.write_with(path, OpenMode::Write, content).await
    }

    /// Append to a file, creating it if missing.
    pub async fn append_file(&self, path: &str, content: &[u8]) -> VfsResult<()> {
        self.write_with(path, OpenMode::Append, content).await
    }

    async fn write_with(&self, path: &str, mode: OpenMode, content: &[u8]) -> VfsResult<()> {
        let target = self.resolve(path).await?;
        let store = &target.store;
        match store.create_file(&target.path, &[]).await {
            Ok(_) => {}
            Err(VfsError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }

        let handle = store.open(&target.path, mode).await?;
        if let Err(e) = store.write(handle, content).await {
            // Nothing was committed; release without replacing content
            if let Err(abort_err) = store.abort(handle).await {
                tracing::warn!(
                    handle = %handle,
                    path = %target.path,
                    error = %abort_err,
                    "abort after failed write"
                );
            }
            return Err(e);
        }
        store.close(handle).await
    }

    /// Create a directory. The parent must exist.
    pub async fn create_directory(&self, path: &str) -> VfsResult<PathEntry> {
        let target = self.resolve(path).await?;
        let entry = target.store.create_directory(&target.path).await?;
        Ok(Self::externalize(entry, &target))
    }

    /// Create a file with initial content. The parent must exist.
    pub async fn create_file(&self, path: &str, content: &[u8]) -> VfsResult<PathEntry> {
        let target = self.resolve(path).await?;
        let entry = target.store.create_file(&target.path, content).await?;
        Ok(Self::externalize(entry, &target))
    }

    /// Remove a file or empty directory.
    pub async fn delete_file(&self, path: &str) -> VfsResult<()> {
        let target = self.resolve(path).await?;
        target.store.delete_file(&target.path).await
    }

    /// Metadata for one path, reported under its external path.
    pub async fn stat(&self, path: &str) -> VfsResult<PathEntry> {
        let target = self.resolve(path).await?;
        let entry = target.store.stat(&target.path).await?;
        Ok(Self::externalize(entry, &target))
    }

    /// List a directory; `None` lists the current directory.
    ///
    /// Mount points directly beneath the directory appear as directory
    /// entries even when the parent backend has no such entry. They carry
    /// the metadata of the mounted store's root.
    pub async fn list_directory(&self, path: Option<&str>) -> VfsResult<Vec<PathEntry>> {
        let absolute = match path {
            Some(p) => self.absolute(p),
            None => self.current_directory(),
        };
        let target = self.resolve(&absolute).await?;
        let mut entries: Vec<PathEntry> = target
            .store
            .list_directory(&target.path)
            .await?
            .into_iter()
            .map(|e| Self::externalize(e, &target))
            .collect();

        let children: Vec<(String, Arc<dyn Backend>)> = {
            let mounts = self.mounts.read().await;
            mounts
                .iter()
                .filter(|(mount_path, _)| path::parent(mount_path) == Some(absolute.as_str()))
                .filter(|(mount_path, _)| {
                    let name = path::file_name(mount_path);
                    entries.iter().all(|e| e.name != name)
                })
                .map(|(mount_path, mount)| (mount_path.clone(), Arc::clone(&mount.store)))
                .collect()
        };
        for (mount_path, store) in children {
            let entry = match store.stat(ROOT).await {
                Ok(mut root) => {
                    root.name = path::file_name(&mount_path).to_string();
                    root.path = mount_path;
                    root
                }
                Err(_) => PathEntry::directory(mount_path, Permissions::default().directory),
            };
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Change the current directory. Leaves it unchanged on failure.
    pub async fn change_directory(&self, path: &str) -> VfsResult<()> {
        let absolute = self.absolute(path);
        self.list_directory(Some(&absolute)).await?;
        tracing::debug!(cwd = %absolute, "changed directory");
        *self.cwd.write() = absolute;
        Ok(())
    }

    pub fn current_directory(&self) -> String {
        self.cwd.read().clone()
    }

    /// Usage statistics for every mount.
    pub async fn stats(&self) -> VfsResult<Vec<(MountInfo, FsStats)>> {
        let mounts: Vec<(MountInfo, Arc<dyn Backend>)> = {
            let mounts = self.mounts.read().await;
            mounts
                .iter()
                .map(|(path, mount)| {
                    let info = MountInfo {
                        path: path.clone(),
                        name: mount.name.clone(),
                        kind: mount.store.kind(),
                        read_only: mount.store.read_only(),
                    };
                    (info, Arc::clone(&mount.store))
                })
                .collect()
        };

        let mut out = Vec::with_capacity(mounts.len());
        for (info, store) in mounts {
            let stats = store.stats().await?;
            out.push((info, stats));
        }
        Ok(out)
    }

    /// Rewrite a backend entry's path into the external namespace.
    fn externalize(mut entry: PathEntry, target: &Resolved) -> PathEntry {
        if target.mount_point != ROOT {
            entry.path = if entry.path == ROOT {
                target.mount_point.clone()
            } else {
                format!("{}{}", target.mount_point, entry.path)
            };
            entry.name = path::file_name(&entry.path).to_string();
        }
        entry
    }
}
