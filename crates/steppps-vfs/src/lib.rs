//! # steppps-vfs
//!
//! In-memory virtual filesystem for the STEPPPS shell.
//!
//! A [`VirtualFileSystem`] is one backing store: a namespace of directories
//! and byte-buffer files, served through open/read/write/close handles.
//! A [`FileSystemManager`] mounts one or more stores (or host directories)
//! and resolves paths to them by longest prefix.
//!
//! ```no_run
//! use std::sync::Arc;
//! use steppps_vfs::{FileSystemManager, VirtualFileSystem};
//!
//! # async fn demo() -> steppps_vfs::VfsResult<()> {
//! let manager = FileSystemManager::new();
//! manager.mount("/", Arc::new(VirtualFileSystem::new()), "root").await?;
//! manager.create_directory("/home").await?;
//! manager.write_file("/home/note.txt", b"hi").await?;
//! assert_eq!(manager.read_file("/home/note.txt").await?, b"hi");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod vfs;

pub use config::{Limits, MountConfig, MountKind, Permissions, VfsConfig, WritePolicy};
pub use vfs::{
    Backend, BackendKind, EntryKind, ErrorKind, FileSystemManager, FsStats, HandleId,
    HostBackend, MountInfo, OpenMode, PathEntry, Resolved, VfsError, VfsResult,
    VirtualFileSystem,
};
