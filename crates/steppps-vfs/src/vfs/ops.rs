//! Backend operations trait.
//!
//! All paths are absolute within the backend. The [`FileSystemManager`]
//! handles mount routing and strips mount prefixes before calling in.
//!
//! [`FileSystemManager`]: super::FileSystemManager

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::{FsStats, HandleId, OpenMode, PathEntry};
use super::VfsResult;

/// The closed set of backend implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// In-memory namespace ([`VirtualFileSystem`](super::VirtualFileSystem)).
    Virtual,
    /// Passthrough to a host directory ([`HostBackend`](super::HostBackend)).
    Host,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Virtual => f.write_str("virtual"),
            BackendKind::Host => f.write_str("host"),
        }
    }
}

/// Core filesystem operations.
#[async_trait]
pub trait Backend: Send + Sync {
    // ========================================================================
    // Namespace
    // ========================================================================

    /// Create a directory. The parent must already exist as a directory.
    async fn create_directory(&self, path: &str) -> VfsResult<PathEntry>;

    /// Create a regular file holding `initial`. The parent must already exist.
    async fn create_file(&self, path: &str, initial: &[u8]) -> VfsResult<PathEntry>;

    /// Remove a file or an empty directory.
    async fn delete_file(&self, path: &str) -> VfsResult<()>;

    /// Direct children of a directory, sorted by name.
    async fn list_directory(&self, path: &str) -> VfsResult<Vec<PathEntry>>;

    /// Metadata for one path.
    async fn stat(&self, path: &str) -> VfsResult<PathEntry>;

    // ========================================================================
    // Handles
    // ========================================================================

    /// Open a regular file.
    async fn open(&self, path: &str, mode: OpenMode) -> VfsResult<HandleId>;

    /// Read up to `size` bytes from the cursor; `None` reads to the end.
    async fn read(&self, handle: HandleId, size: Option<usize>) -> VfsResult<Vec<u8>>;

    /// Write into the handle's buffer. Returns the number of bytes written.
    async fn write(&self, handle: HandleId, data: &[u8]) -> VfsResult<usize>;

    /// Move a read or write handle's cursor.
    async fn seek(&self, handle: HandleId, offset: u64) -> VfsResult<u64>;

    /// End a session, committing write/append buffers.
    async fn close(&self, handle: HandleId) -> VfsResult<()>;

    /// End a session without committing anything.
    async fn abort(&self, handle: HandleId) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    fn kind(&self) -> BackendKind;

    /// Returns true if this backend rejects mutations.
    fn read_only(&self) -> bool;

    async fn stats(&self) -> VfsResult<FsStats>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }
}
