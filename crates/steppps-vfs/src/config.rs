//! Filesystem configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file is valid:
//!
//! ```toml
//! write_policy = "exclusive"      # or "last_close_wins"
//!
//! [limits]
//! max_open_handles = 1024
//! max_file_size = 1073741824      # bytes
//!
//! [permissions]
//! file = "rw-r--r--"
//! directory = "rwxr-xr-x"
//!
//! [[mounts]]
//! path = "/"
//! name = "root"
//!
//! [[mounts]]
//! path = "/host"
//! name = "workspace"
//! kind = "host"
//! root = "/srv/workspace"
//! read_only = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vfs::{VfsError, VfsResult};

/// Default maximum number of live handles per backend.
pub const DEFAULT_MAX_OPEN_HANDLES: usize = 1024;

/// Default largest content a single file may hold (1 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    pub limits: Limits,
    pub write_policy: WritePolicy,
    pub permissions: Permissions,
    /// Backends to mount at startup. Empty means one virtual store at `/`.
    pub mounts: Vec<MountConfig>,
}

impl VfsConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> VfsResult<Self> {
        toml::from_str(text).map_err(|e| VfsError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VfsError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

/// Resource limits applied per backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_open_handles: usize,
    /// Largest content a single file may hold, in bytes.
    pub max_file_size: u64,
}

impl Limits {
    /// Fail with `FileTooLarge` if `size` bytes would exceed `max_file_size`.
    pub fn check_file_size(&self, path: &str, size: u64) -> VfsResult<()> {
        if size > self.max_file_size {
            return Err(VfsError::FileTooLarge {
                path: path.to_string(),
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_open_handles: DEFAULT_MAX_OPEN_HANDLES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// How concurrent writers on one path are arbitrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// At most one write/append handle per path; further writer opens fail with `Busy`.
    #[default]
    Exclusive,
    /// Any number of writers; the last one to close replaces the content.
    LastCloseWins,
}

/// Advisory permission strings assigned to new entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub file: String,
    pub directory: String,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            file: "rw-r--r--".to_string(),
            directory: "rwxr-xr-x".to_string(),
        }
    }
}

/// Kind of backend a mount entry creates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountKind {
    #[default]
    Virtual,
    Host,
}

/// One `[[mounts]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub kind: MountKind,
    /// Host directory, required for `kind = "host"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub read_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = VfsConfig::from_toml_str("").unwrap();
        assert_eq!(config, VfsConfig::default());
        assert_eq!(config.limits.max_open_handles, DEFAULT_MAX_OPEN_HANDLES);
        assert_eq!(config.limits.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.write_policy, WritePolicy::Exclusive);
        assert_eq!(config.permissions.file, "rw-r--r--");
        assert!(config.mounts.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config = VfsConfig::from_toml_str(
            r#"
            write_policy = "last_close_wins"

            [limits]
            max_open_handles = 8
            max_file_size = 4096

            [[mounts]]
            path = "/"
            name = "root"

            [[mounts]]
            path = "/host"
            name = "workspace"
            kind = "host"
            root = "/srv/workspace"
            read_only = true
            "#,
        )
        .unwrap();

        assert_eq!(config.write_policy, WritePolicy::LastCloseWins);
        assert_eq!(config.limits.max_open_handles, 8);
        assert_eq!(config.limits.max_file_size, 4096);
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.mounts[0].kind, MountKind::Virtual);
        assert_eq!(config.mounts[1].kind, MountKind::Host);
        assert_eq!(config.mounts[1].root.as_deref(), Some(Path::new("/srv/workspace")));
        assert!(config.mounts[1].read_only);
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = VfsConfig::from_toml_str("write_policy = \"sometimes\"").unwrap_err();
        assert!(matches!(err, VfsError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vfs.toml");
        std::fs::write(&path, "[limits]\nmax_open_handles = 2\n").unwrap();

        let config = VfsConfig::load(&path).unwrap();
        assert_eq!(config.limits.max_open_handles, 2);

        assert!(VfsConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
