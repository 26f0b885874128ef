//! Host filesystem backend.
//!
//! Passes operations through to a directory on the host, with path security
//! to prevent escaping the root directory. Handle semantics match the
//! virtual store: read handles snapshot the file at open, write and append
//! handles buffer privately and write the file at close.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use crate::config::{Limits, VfsConfig, WritePolicy};
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::handle::HandleTable;
use crate::vfs::ops::{Backend, BackendKind};
use crate::vfs::path::{self, ROOT};
use crate::vfs::types::{EntryKind, FsStats, HandleId, OpenMode, PathEntry, checksum};

/// Host filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/workspace`, then `stat("/src/main.rs")` looks at
/// `/srv/workspace/src/main.rs`.
#[derive(Debug)]
pub struct HostBackend {
    root: PathBuf,
    read_only: bool,
    handles: Mutex<HandleTable>,
    limits: Limits,
    write_policy: WritePolicy,
}

impl HostBackend {
    /// Create a writable backend rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>, config: &VfsConfig) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            read_only: false,
            handles: Mutex::new(HandleTable::new(config.limits.max_open_handles)),
            limits: config.limits.clone(),
            write_policy: config.write_policy,
        }
    }

    /// Create a read-only backend.
    pub fn read_only(root: impl Into<PathBuf>, config: &VfsConfig) -> Self {
        Self {
            read_only: true,
            ..Self::new(root, config)
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalize a backend path and map it onto the host.
    ///
    /// Returns an error if the result escapes the root (via symlinks).
    fn resolve(&self, path: &str) -> VfsResult<(String, PathBuf)> {
        let normalized = path::normalize(path)?;
        if normalized == ROOT {
            return Ok((normalized, self.root.clone()));
        }
        let full = self.root.join(normalized.trim_start_matches('/'));

        // Canonicalize what exists; for new entries check the parent instead
        let probe = if full.exists() {
            full.canonicalize()?
        } else {
            match full.parent().filter(|p| p.exists()) {
                Some(parent) => parent.canonicalize()?,
                None => return Ok((normalized, full)),
            }
        };
        if !probe.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                probe.display(),
                self.root.display()
            )));
        }
        Ok((normalized, full))
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Verify the parent of `full` is an existing directory.
    async fn check_parent(&self, path: &str, full: &Path) -> VfsResult<()> {
        let parent = full.parent().ok_or_else(|| VfsError::invalid_parent(path))?;
        match fs::metadata(parent).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(VfsError::invalid_parent(path)),
        }
    }

    async fn entry_at(&self, path: &str, full: &Path) -> VfsResult<PathEntry> {
        let meta = fs::metadata(full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        Ok(metadata_to_entry(path, &meta))
    }
}

/// Convert `std::fs::Metadata` to a `PathEntry`.
///
/// Host entries carry no checksum, and `access_count` and `modify_count` are
/// always 0: reads and commits through a `HostBackend` handle are not
/// counted. `accessed_at` is whatever the host reports.
fn metadata_to_entry(path: &str, meta: &std::fs::Metadata) -> PathEntry {
    let kind = if meta.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::Regular
    };
    let modified_at = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    PathEntry {
        name: path::file_name(path).to_string(),
        path: path.to_string(),
        kind,
        size: if meta.is_dir() { 0 } else { meta.len() },
        permissions: permission_string(meta),
        created_at: meta.created().unwrap_or(modified_at),
        modified_at,
        accessed_at: meta.accessed().unwrap_or(modified_at),
        checksum: None,
        access_count: 0,
        modify_count: 0,
    }
}

#[cfg(unix)]
fn permission_string(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = meta.permissions().mode();
    let mut out = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn permission_string(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "r--r--r--".to_string()
    } else {
        "rw-rw-rw-".to_string()
    }
}

/// Identity of a host entry, used to detect replacement while a handle is open.
#[cfg(unix)]
fn entry_identity(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn entry_identity(_meta: &std::fs::Metadata) -> u64 {
    0
}

#[async_trait]
impl Backend for HostBackend {
    async fn create_directory(&self, path: &str) -> VfsResult<PathEntry> {
        self.check_writable()?;
        let (path, full) = self.resolve(path)?;
        if path == ROOT || fs::symlink_metadata(&full).await.is_ok() {
            return Err(VfsError::already_exists(path));
        }
        self.check_parent(&path, &full).await?;

        fs::create_dir(&full)
            .await
            .map_err(|e| VfsError::from_io(e, &path))?;
        tracing::debug!(path = %path, root = %self.root.display(), "created host directory");
        self.entry_at(&path, &full).await
    }

    async fn create_file(&self, path: &str, initial: &[u8]) -> VfsResult<PathEntry> {
        use tokio::io::AsyncWriteExt;

        self.check_writable()?;
        let (path, full) = self.resolve(path)?;
        self.limits.check_file_size(&path, initial.len() as u64)?;
        if path == ROOT {
            return Err(VfsError::already_exists(path));
        }
        self.check_parent(&path, &full).await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| VfsError::from_io(e, &path))?;
        file.write_all(initial).await?;
        file.flush().await?;
        tracing::debug!(path = %path, size = initial.len(), "created host file");

        let mut entry = self.entry_at(&path, &full).await?;
        entry.checksum = Some(checksum(initial));
        Ok(entry)
    }

    async fn delete_file(&self, path: &str) -> VfsResult<()> {
        self.check_writable()?;
        let (path, full) = self.resolve(path)?;
        if path == ROOT {
            return Err(VfsError::invalid_path("cannot remove root"));
        }
        let meta = fs::symlink_metadata(&full)
            .await
            .map_err(|e| VfsError::from_io(e, &path))?;
        let result = if meta.is_dir() {
            fs::remove_dir(&full).await
        } else {
            fs::remove_file(&full).await
        };
        result.map_err(|e| VfsError::from_io(e, &path))?;
        tracing::debug!(path = %path, "deleted host entry");
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> VfsResult<Vec<PathEntry>> {
        let (path, full) = self.resolve(path)?;
        let meta = fs::metadata(&full)
            .await
            .map_err(|e| VfsError::from_io(e, &path))?;
        if !meta.is_dir() {
            return Err(VfsError::not_a_directory(path));
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full).await?;
        while let Some(child) = dir.next_entry().await? {
            let name = child.file_name().to_string_lossy().into_owned();
            let meta = child.metadata().await?;
            entries.push(metadata_to_entry(&path::join(&path, &name), &meta));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> VfsResult<PathEntry> {
        let (path, full) = self.resolve(path)?;
        self.entry_at(&path, &full).await
    }

    async fn open(&self, path: &str, mode: OpenMode) -> VfsResult<HandleId> {
        if mode.is_writer() {
            self.check_writable()?;
        }
        let (path, full) = self.resolve(path)?;
        let meta = fs::metadata(&full)
            .await
            .map_err(|e| VfsError::from_io(e, &path))?;
        if meta.is_dir() {
            return Err(VfsError::is_a_directory(path));
        }

        let buffer = match mode {
            OpenMode::Write => Vec::new(),
            OpenMode::Read | OpenMode::Append => fs::read(&full)
                .await
                .map_err(|e| VfsError::from_io(e, &path))?,
        };

        let id = self.handles.lock().open(
            path.clone(),
            entry_identity(&meta),
            mode,
            buffer,
            self.write_policy,
        )?;
        tracing::trace!(handle = %id, path = %path, %mode, "opened host file");
        Ok(id)
    }

    async fn read(&self, handle: HandleId, size: Option<usize>) -> VfsResult<Vec<u8>> {
        self.handles.lock().get_mut(handle)?.read(size)
    }

    async fn write(&self, handle: HandleId, data: &[u8]) -> VfsResult<usize> {
        self.handles
            .lock()
            .get_mut(handle)?
            .write(data, &self.limits)
    }

    async fn seek(&self, handle: HandleId, offset: u64) -> VfsResult<u64> {
        self.handles.lock().get_mut(handle)?.seek(offset)
    }

    async fn close(&self, handle: HandleId) -> VfsResult<()> {
        let h = self.handles.lock().remove(handle)?;
        let full = self.root.join(h.path.trim_start_matches('/'));

        let current = fs::metadata(&full).await.ok().filter(|m| m.is_file());
        match current {
            Some(meta) if entry_identity(&meta) == h.entry_id => {}
            _ => {
                tracing::warn!(handle = %handle, path = %h.path, "close on deleted host target");
                return Err(VfsError::StaleHandle {
                    handle,
                    path: h.path,
                });
            }
        }

        if h.mode.is_writer() {
            fs::write(&full, &h.buffer)
                .await
                .map_err(|e| VfsError::from_io(e, &h.path))?;
            tracing::debug!(handle = %handle, path = %h.path, size = h.buffer.len(), "committed host file");
        }
        Ok(())
    }

    async fn abort(&self, handle: HandleId) -> VfsResult<()> {
        self.handles.lock().remove(handle).map(|_| ())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Host
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn stats(&self) -> VfsResult<FsStats> {
        let mut stats = FsStats {
            open_handles: self.handles.lock().len() as u64,
            ..FsStats::default()
        };
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            stats.directories += 1;
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(child) = entries.next_entry().await? {
                let meta = child.metadata().await?;
                if meta.is_dir() {
                    pending.push(child.path());
                } else {
                    stats.files += 1;
                    stats.total_bytes += meta.len();
                }
            }
        }
        Ok(stats)
    }
}
