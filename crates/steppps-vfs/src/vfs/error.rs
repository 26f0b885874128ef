//! VFS error types.

use std::io;
use thiserror::Error;

use super::types::HandleId;

/// Coarse error classification.
///
/// Several [`VfsError`] variants share a kind; callers that only care about
/// the category (e.g. "was it missing?") match on this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A path or handle does not exist.
    NotFound,
    /// A create targeted an existing path.
    AlreadyExists,
    /// The parent of a path is missing or not a directory.
    InvalidParent,
    /// Expected a file but found a directory, or vice versa.
    WrongKind,
    /// The handle's mode does not allow the operation.
    InvalidHandleState,
    /// The path is malformed or refers to something that cannot be touched.
    InvalidPath,
    /// Directory still has children.
    DirectoryNotEmpty,
    /// Another writer holds the path.
    Busy,
    /// A configured limit would be exceeded.
    LimitExceeded,
    /// The backend does not accept mutations.
    ReadOnly,
    /// No backend is mounted for the path.
    NoMountPoint,
    /// Host I/O or configuration failure.
    Io,
}

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Parent directory is missing or not a directory.
    #[error("invalid parent: {0}")]
    InvalidParent(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Path escapes root (security violation).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Handle id is not open.
    #[error("unknown handle: {0}")]
    UnknownHandle(HandleId),

    /// Handle was opened in a mode that forbids the operation.
    #[error("handle {handle} is {mode}-only, cannot {op}")]
    InvalidHandleMode {
        handle: HandleId,
        mode: &'static str,
        op: &'static str,
    },

    /// The handle's target was deleted or replaced while it was open.
    #[error("stale handle {handle}: {path} no longer exists")]
    StaleHandle { handle: HandleId, path: String },

    /// Another write handle is open on the path.
    #[error("busy: {0} is open for writing")]
    Busy(String),

    /// Open handle limit reached.
    #[error("too many open handles (limit {0})")]
    TooManyOpenHandles(usize),

    /// Content would exceed the configured size limit.
    #[error("file too large: {path} ({size} > {limit} bytes)")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    /// Backend is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// No mount point for path.
    #[error("no mount point for path: {0}")]
    NoMountPoint(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create an InvalidParent error.
    pub fn invalid_parent(path: impl Into<String>) -> Self {
        Self::InvalidParent(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create a NoMountPoint error.
    pub fn no_mount_point(path: impl Into<String>) -> Self {
        Self::NoMountPoint(path.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::NotFound(_) | VfsError::UnknownHandle(_) | VfsError::StaleHandle { .. } => {
                ErrorKind::NotFound
            }
            VfsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            VfsError::InvalidParent(_) => ErrorKind::InvalidParent,
            VfsError::NotADirectory(_) | VfsError::IsADirectory(_) => ErrorKind::WrongKind,
            VfsError::InvalidHandleMode { .. } => ErrorKind::InvalidHandleState,
            VfsError::InvalidPath(_) | VfsError::PathEscapesRoot(_) => ErrorKind::InvalidPath,
            VfsError::DirectoryNotEmpty(_) => ErrorKind::DirectoryNotEmpty,
            VfsError::Busy(_) => ErrorKind::Busy,
            VfsError::TooManyOpenHandles(_) | VfsError::FileTooLarge { .. } => {
                ErrorKind::LimitExceeded
            }
            VfsError::ReadOnly => ErrorKind::ReadOnly,
            VfsError::NoMountPoint(_) => ErrorKind::NoMountPoint,
            VfsError::Config(_) | VfsError::Io(_) => ErrorKind::Io,
        }
    }

    /// Map a host I/O error, keeping the path for the common cases.
    pub(crate) fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(path),
            io::ErrorKind::AlreadyExists => Self::already_exists(path),
            io::ErrorKind::NotADirectory => Self::not_a_directory(path),
            io::ErrorKind::IsADirectory => Self::is_a_directory(path),
            io::ErrorKind::DirectoryNotEmpty => Self::directory_not_empty(path),
            _ => Self::Io(err),
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::InvalidParent(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            e @ VfsError::UnknownHandle(_) | e @ VfsError::StaleHandle { .. } => {
                io::Error::new(io::ErrorKind::NotFound, e.to_string())
            }
            e @ VfsError::InvalidHandleMode { .. } => {
                io::Error::new(io::ErrorKind::PermissionDenied, e.to_string())
            }
            VfsError::Busy(msg) => io::Error::new(io::ErrorKind::ResourceBusy, msg),
            e @ VfsError::TooManyOpenHandles(_) => io::Error::other(e.to_string()),
            e @ VfsError::FileTooLarge { .. } => {
                io::Error::new(io::ErrorKind::FileTooLarge, e.to_string())
            }
            VfsError::ReadOnly => {
                io::Error::new(io::ErrorKind::ReadOnlyFilesystem, "filesystem is read-only")
            }
            VfsError::NoMountPoint(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::Config(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            VfsError::Io(e) => e,
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(VfsError::not_found("/x").kind(), ErrorKind::NotFound);
        assert_eq!(VfsError::UnknownHandle(HandleId(3)).kind(), ErrorKind::NotFound);
        assert_eq!(VfsError::is_a_directory("/d").kind(), ErrorKind::WrongKind);
        assert_eq!(VfsError::not_a_directory("/f").kind(), ErrorKind::WrongKind);
        assert_eq!(VfsError::invalid_parent("/a/b").kind(), ErrorKind::InvalidParent);
        assert_eq!(
            VfsError::InvalidHandleMode {
                handle: HandleId(1),
                mode: "read",
                op: "write",
            }
            .kind(),
            ErrorKind::InvalidHandleState
        );
    }

    #[test]
    fn test_io_conversion() {
        let err: io::Error = VfsError::not_found("/missing").into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err: io::Error = VfsError::Busy("/f".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::ResourceBusy);
    }

    #[test]
    fn test_from_io_keeps_path() {
        let err = VfsError::from_io(io::Error::from(io::ErrorKind::NotFound), "/gone");
        assert!(matches!(err, VfsError::NotFound(p) if p == "/gone"));
    }
}
