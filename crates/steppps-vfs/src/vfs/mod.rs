//! Virtual Filesystem abstraction.
//!
//! Key components:
//!
//! - [`Backend`] - Core trait for filesystem operations
//! - [`VirtualFileSystem`] - In-memory namespace with handle-based I/O
//! - [`HostBackend`] - Host directory passthrough (with path security)
//! - [`FileSystemManager`] - Routes paths to backends and tracks the cwd
//!
//! ## Design Decisions
//!
//! - **String paths**: Backend paths are normalized absolute strings; mount
//!   prefixes are stripped before a backend sees them.
//! - **Commit at close**: Write and append handles buffer privately. Content,
//!   size, checksum and modification metadata change only when the handle
//!   closes.
//! - **No implicit parents**: Creating `/a/b` requires `/a` to exist.
//! - **Longest-prefix routing**: The manager routes to the most specific
//!   mount point that matches on whole segments.

pub mod backends;
mod error;
mod handle;
mod manager;
mod ops;
pub mod path;
mod types;

pub use backends::{HostBackend, VirtualFileSystem};
pub use error::{ErrorKind, VfsError, VfsResult};
pub use handle::{HandleTable, OpenHandle};
pub use manager::{FileSystemManager, MountInfo, Resolved};
pub use ops::{Backend, BackendKind};
pub use types::{EntryKind, FsStats, HandleId, OpenMode, PathEntry, checksum};
