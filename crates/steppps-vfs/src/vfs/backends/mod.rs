//! VFS backends.
//!
//! Backends implement [`Backend`](super::Backend) for different storage types.

mod host;
mod memory;

pub use host::HostBackend;
pub use memory::VirtualFileSystem;
