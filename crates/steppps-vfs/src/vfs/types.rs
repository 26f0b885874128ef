//! Core VFS types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Kind of a namespace node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file with a byte buffer.
    Regular,
    /// Directory.
    Directory,
}

impl EntryKind {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::Regular)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Metadata for one namespace node.
///
/// Content lives separately; `size` always tracks the committed content length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEntry {
    /// Last path segment (empty for the root).
    pub name: String,
    /// Normalized absolute path.
    pub path: String,
    /// Entry kind (immutable after creation).
    pub kind: EntryKind,
    /// Content length in bytes (0 for directories).
    pub size: u64,
    /// Advisory POSIX-style permission string, e.g. `rw-r--r--`.
    pub permissions: String,
    pub created_at: SystemTime,
    pub modified_at: SystemTime,
    pub accessed_at: SystemTime,
    /// BLAKE3 hex digest of the content; `None` for directories.
    pub checksum: Option<String>,
    /// Number of reads served from handles on this entry.
    pub access_count: u64,
    /// Number of committed modifications.
    pub modify_count: u64,
}

impl PathEntry {
    /// Create metadata for a new directory.
    pub fn directory(path: impl Into<String>, permissions: impl Into<String>) -> Self {
        Self::new(path.into(), EntryKind::Directory, 0, permissions.into(), None)
    }

    /// Create metadata for a new regular file holding `content`.
    pub fn file(path: impl Into<String>, permissions: impl Into<String>, content: &[u8]) -> Self {
        Self::new(
            path.into(),
            EntryKind::Regular,
            content.len() as u64,
            permissions.into(),
            Some(checksum(content)),
        )
    }

    fn new(
        path: String,
        kind: EntryKind,
        size: u64,
        permissions: String,
        checksum: Option<String>,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            name: super::path::file_name(&path).to_string(),
            path,
            kind,
            size,
            permissions,
            created_at: now,
            modified_at: now,
            accessed_at: now,
            checksum,
            access_count: 0,
            modify_count: 0,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// BLAKE3 hex digest of `content`.
pub fn checksum(content: &[u8]) -> String {
    hex::encode(blake3::hash(content).as_bytes())
}

/// Identifier for an open handle, unique within one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mode a handle was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    /// Read from a snapshot taken at open.
    Read,
    /// Start from an empty buffer; replaces content at close.
    Write,
    /// Start from existing content; writes always go to the end.
    Append,
}

impl OpenMode {
    /// True for modes that commit at close.
    pub fn is_writer(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::Read => "read",
            OpenMode::Write => "write",
            OpenMode::Append => "append",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsStats {
    /// Regular files.
    pub files: u64,
    /// Directories, including the root.
    pub directories: u64,
    /// Sum of committed file sizes.
    pub total_bytes: u64,
    /// Live handles.
    pub open_handles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind() {
        assert!(EntryKind::Regular.is_file());
        assert!(!EntryKind::Regular.is_dir());
        assert!(EntryKind::Directory.is_dir());
    }

    #[test]
    fn test_path_entry_constructors() {
        let file = PathEntry::file("/home/note.txt", "rw-r--r--", b"hi");
        assert!(file.is_file());
        assert_eq!(file.name, "note.txt");
        assert_eq!(file.size, 2);
        assert_eq!(file.checksum.as_deref(), Some(checksum(b"hi").as_str()));

        let dir = PathEntry::directory("/home", "rwxr-xr-x");
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
        assert!(dir.checksum.is_none());
    }

    #[test]
    fn test_checksum_is_blake3_hex() {
        let sum = checksum(b"");
        assert_eq!(sum.len(), 64);
        assert_eq!(
            sum,
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
        assert_ne!(checksum(b"a"), checksum(b"b"));
    }

    #[test]
    fn test_open_mode() {
        assert!(!OpenMode::Read.is_writer());
        assert!(OpenMode::Write.is_writer());
        assert!(OpenMode::Append.is_writer());
        assert_eq!(OpenMode::Append.to_string(), "append");
    }
}
