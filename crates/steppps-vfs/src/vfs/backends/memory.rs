//! In-memory filesystem backend.
//!
//! All data is ephemeral and lost when the store is dropped.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::SystemTime;

use crate::config::{Limits, Permissions, VfsConfig, WritePolicy};
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::handle::HandleTable;
use crate::vfs::ops::{Backend, BackendKind};
use crate::vfs::path::{self, ROOT};
use crate::vfs::types::{FsStats, HandleId, OpenMode, PathEntry, checksum};

/// A namespace node: metadata plus committed content.
#[derive(Debug)]
struct Node {
    /// Identity, distinct for every entry ever created in this store.
    id: u64,
    entry: PathEntry,
    /// Always empty for directories.
    data: Vec<u8>,
}

#[derive(Debug)]
struct State {
    nodes: HashMap<String, Node>,
    handles: HandleTable,
    next_node_id: u64,
}

impl State {
    fn insert(&mut self, entry: PathEntry, data: Vec<u8>) {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.insert(entry.path.clone(), Node { id, entry, data });
    }

    /// Check that `path` is free and its parent is a directory.
    fn check_creatable(&self, path: &str) -> VfsResult<()> {
        if self.nodes.contains_key(path) {
            return Err(VfsError::already_exists(path));
        }
        let parent = path::parent(path).ok_or_else(|| VfsError::already_exists(path))?;
        match self.nodes.get(parent) {
            Some(node) if node.entry.is_dir() => Ok(()),
            _ => Err(VfsError::invalid_parent(path)),
        }
    }

    fn touch_parent(&mut self, path: &str) {
        if let Some(parent) = path::parent(path).and_then(|p| self.nodes.get_mut(p)) {
            parent.entry.modified_at = SystemTime::now();
        }
    }

    fn has_children(&self, dir: &str) -> bool {
        self.nodes.keys().any(|k| path::parent(k) == Some(dir))
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via an internal `RwLock`; each operation takes the lock once,
/// so operations are atomic with respect to each other.
#[derive(Debug)]
pub struct VirtualFileSystem {
    state: RwLock<State>,
    limits: Limits,
    write_policy: WritePolicy,
    permissions: Permissions,
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileSystem {
    /// Create an empty store with default limits.
    pub fn new() -> Self {
        Self::with_config(&VfsConfig::default())
    }

    /// Create an empty store using the limits, policy and permissions from `config`.
    pub fn with_config(config: &VfsConfig) -> Self {
        let mut state = State {
            nodes: HashMap::new(),
            handles: HandleTable::new(config.limits.max_open_handles),
            next_node_id: 1,
        };
        // Root directory always exists
        state.insert(PathEntry::directory(ROOT, config.permissions.directory.clone()), Vec::new());

        Self {
            state: RwLock::new(state),
            limits: config.limits.clone(),
            write_policy: config.write_policy,
            permissions: config.permissions.clone(),
        }
    }
}

#[async_trait]
impl Backend for VirtualFileSystem {
    async fn create_directory(&self, path: &str) -> VfsResult<PathEntry> {
        let path = path::normalize(path)?;
        let mut state = self.state.write();
        state.check_creatable(&path)?;

        let entry = PathEntry::directory(path.clone(), self.permissions.directory.clone());
        state.insert(entry.clone(), Vec::new());
        state.touch_parent(&path);
        tracing::debug!(path = %path, "created directory");
        Ok(entry)
    }

    async fn create_file(&self, path: &str, initial: &[u8]) -> VfsResult<PathEntry> {
        let path = path::normalize(path)?;
        self.limits.check_file_size(&path, initial.len() as u64)?;
        let mut state = self.state.write();
        state.check_creatable(&path)?;

        let entry = PathEntry::file(path.clone(), self.permissions.file.clone(), initial);
        state.insert(entry.clone(), initial.to_vec());
        state.touch_parent(&path);
        tracing::debug!(path = %path, size = initial.len(), "created file");
        Ok(entry)
    }

    async fn delete_file(&self, path: &str) -> VfsResult<()> {
        let path = path::normalize(path)?;
        if path == ROOT {
            return Err(VfsError::invalid_path("cannot remove root"));
        }
        let mut state = self.state.write();
        match state.nodes.get(&path) {
            None => return Err(VfsError::not_found(path)),
            Some(node) if node.entry.is_dir() && state.has_children(&path) => {
                return Err(VfsError::directory_not_empty(path));
            }
            Some(_) => {}
        }
        state.nodes.remove(&path);
        state.touch_parent(&path);
        tracing::debug!(path = %path, "deleted");
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> VfsResult<Vec<PathEntry>> {
        let path = path::normalize(path)?;
        let state = self.state.read();
        match state.nodes.get(&path) {
            Some(node) if node.entry.is_dir() => {}
            Some(_) => return Err(VfsError::not_a_directory(path)),
            None => return Err(VfsError::not_found(path)),
        }

        let mut result: Vec<PathEntry> = state
            .nodes
            .iter()
            .filter(|(k, _)| path::parent(k) == Some(path.as_str()))
            .map(|(_, node)| node.entry.clone())
            .collect();

        // Sort for consistent ordering
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn stat(&self, path: &str) -> VfsResult<PathEntry> {
        let path = path::normalize(path)?;
        let state = self.state.read();
        state
            .nodes
            .get(&path)
            .map(|node| node.entry.clone())
            .ok_or_else(|| VfsError::not_found(path))
    }

    async fn open(&self, path: &str, mode: OpenMode) -> VfsResult<HandleId> {
        let path = path::normalize(path)?;
        let mut state = self.state.write();
        let (entry_id, buffer) = match state.nodes.get(&path) {
            None => return Err(VfsError::not_found(path)),
            Some(node) if node.entry.is_dir() => return Err(VfsError::is_a_directory(path)),
            Some(node) => match mode {
                OpenMode::Write => (node.id, Vec::new()),
                OpenMode::Read | OpenMode::Append => (node.id, node.data.clone()),
            },
        };

        let id = state
            .handles
            .open(path.clone(), entry_id, mode, buffer, self.write_policy)?;
        tracing::trace!(handle = %id, path = %path, %mode, "opened");
        Ok(id)
    }

    async fn read(&self, handle: HandleId, size: Option<usize>) -> VfsResult<Vec<u8>> {
        let mut state = self.state.write();
        let h = state.handles.get_mut(handle)?;
        let data = h.read(size)?;
        let (path, entry_id) = (h.path.clone(), h.entry_id);

        if let Some(node) = state.nodes.get_mut(&path).filter(|n| n.id == entry_id) {
            node.entry.accessed_at = SystemTime::now();
            node.entry.access_count += 1;
        }
        tracing::trace!(handle = %handle, bytes = data.len(), "read");
        Ok(data)
    }

    async fn write(&self, handle: HandleId, data: &[u8]) -> VfsResult<usize> {
        let mut state = self.state.write();
        let written = state
            .handles
            .get_mut(handle)?
            .write(data, &self.limits)?;
        tracing::trace!(handle = %handle, bytes = written, "write");
        Ok(written)
    }

    async fn seek(&self, handle: HandleId, offset: u64) -> VfsResult<u64> {
        let mut state = self.state.write();
        state.handles.get_mut(handle)?.seek(offset)
    }

    async fn close(&self, handle: HandleId) -> VfsResult<()> {
        let mut state = self.state.write();
        let h = state.handles.remove(handle)?;

        let Some(node) = state
            .nodes
            .get_mut(&h.path)
            .filter(|n| n.id == h.entry_id)
        else {
            tracing::warn!(handle = %handle, path = %h.path, "close on deleted target");
            return Err(VfsError::StaleHandle {
                handle,
                path: h.path,
            });
        };

        if h.mode.is_writer() {
            let now = SystemTime::now();
            node.entry.size = h.buffer.len() as u64;
            node.entry.checksum = Some(checksum(&h.buffer));
            node.entry.modified_at = now;
            node.entry.modify_count += 1;
            node.data = h.buffer;
            tracing::debug!(handle = %handle, path = %h.path, size = node.entry.size, "committed");
        }
        Ok(())
    }

    async fn abort(&self, handle: HandleId) -> VfsResult<()> {
        let h = self.state.write().handles.remove(handle)?;
        tracing::trace!(handle = %handle, path = %h.path, "aborted");
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Virtual
    }

    fn read_only(&self) -> bool {
        false
    }

    async fn stats(&self) -> VfsResult<FsStats> {
        let state = self.state.read();
        let mut stats = FsStats {
            open_handles: state.handles.len() as u64,
            ..FsStats::default()
        };
        for node in state.nodes.values() {
            if node.entry.is_dir() {
                stats.directories += 1;
            } else {
                stats.files += 1;
                stats.total_bytes += node.entry.size;
            }
        }
        Ok(stats)
    }
}
