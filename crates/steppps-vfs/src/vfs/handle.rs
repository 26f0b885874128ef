//! Open handles.
//!
//! A handle owns a private buffer for its session. Read handles see the
//! content as it was at open; write and append handles accumulate into their
//! buffer and the backend commits it at close. The table only tracks handle
//! state. Backends decide what a commit means.

use std::collections::HashMap;

use crate::config::{Limits, WritePolicy};

use super::error::{VfsError, VfsResult};
use super::types::{HandleId, OpenMode};

/// One open file session.
#[derive(Debug)]
pub struct OpenHandle {
    pub id: HandleId,
    /// Normalized path within the backend.
    pub path: String,
    /// Identity of the entry at open time (0 where the backend has no identity).
    pub entry_id: u64,
    pub mode: OpenMode,
    pub cursor: u64,
    pub buffer: Vec<u8>,
}

impl OpenHandle {
    fn mode_error(&self, op: &'static str) -> VfsError {
        VfsError::InvalidHandleMode {
            handle: self.id,
            mode: self.mode.as_str(),
            op,
        }
    }

    /// Read up to `size` bytes from the cursor (`None` reads to the end).
    pub fn read(&mut self, size: Option<usize>) -> VfsResult<Vec<u8>> {
        if self.mode != OpenMode::Read {
            return Err(self.mode_error("read"));
        }
        let len = self.buffer.len();
        let start = (self.cursor as usize).min(len);
        let end = match size {
            Some(n) => start.saturating_add(n).min(len),
            None => len,
        };
        self.cursor = end as u64;
        Ok(self.buffer[start..end].to_vec())
    }

    /// Write `data` into the buffer.
    ///
    /// Write mode overwrites at the cursor, zero-filling any gap past the end.
    /// Append mode always lands at the end. The end offset is checked against
    /// `limits.max_file_size` before the buffer grows.
    pub fn write(&mut self, data: &[u8], limits: &Limits) -> VfsResult<usize> {
        let start = match self.mode {
            OpenMode::Read => return Err(self.mode_error("write")),
            OpenMode::Write => self.cursor,
            OpenMode::Append => self.buffer.len() as u64,
        };
        let too_large = |size: u64| VfsError::FileTooLarge {
            path: self.path.clone(),
            size,
            limit: limits.max_file_size,
        };
        let end = start
            .checked_add(data.len() as u64)
            .ok_or_else(|| too_large(u64::MAX))?;
        limits.check_file_size(&self.path, end)?;

        let start = usize::try_from(start).map_err(|_| too_large(end))?;
        let end = usize::try_from(end).map_err(|_| too_large(end))?;
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[start..end].copy_from_slice(data);
        self.cursor = end as u64;
        Ok(data.len())
    }

    /// Move the cursor. Not allowed on append handles.
    pub fn seek(&mut self, offset: u64) -> VfsResult<u64> {
        if self.mode == OpenMode::Append {
            return Err(self.mode_error("seek"));
        }
        self.cursor = offset;
        Ok(offset)
    }
}

/// Live handles of one backend.
#[derive(Debug)]
pub struct HandleTable {
    handles: HashMap<HandleId, OpenHandle>,
    next_id: u64,
    max_open: usize,
}

impl HandleTable {
    pub fn new(max_open: usize) -> Self {
        Self {
            handles: HashMap::new(),
            next_id: 1,
            max_open,
        }
    }

    /// Register a new handle. Ids are never reused.
    ///
    /// Append handles start with the cursor at the end of `buffer`.
    pub fn open(
        &mut self,
        path: String,
        entry_id: u64,
        mode: OpenMode,
        buffer: Vec<u8>,
        policy: WritePolicy,
    ) -> VfsResult<HandleId> {
        if self.handles.len() >= self.max_open {
            return Err(VfsError::TooManyOpenHandles(self.max_open));
        }
        if mode.is_writer() && policy == WritePolicy::Exclusive && self.has_writer(&path, entry_id)
        {
            return Err(VfsError::Busy(path));
        }

        let id = HandleId(self.next_id);
        self.next_id += 1;

        let cursor = match mode {
            OpenMode::Append => buffer.len() as u64,
            _ => 0,
        };
        self.handles.insert(
            id,
            OpenHandle {
                id,
                path,
                entry_id,
                mode,
                cursor,
                buffer,
            },
        );
        Ok(id)
    }

    pub fn get_mut(&mut self, id: HandleId) -> VfsResult<&mut OpenHandle> {
        self.handles.get_mut(&id).ok_or(VfsError::UnknownHandle(id))
    }

    /// Remove a handle, ending its session.
    pub fn remove(&mut self, id: HandleId) -> VfsResult<OpenHandle> {
        self.handles.remove(&id).ok_or(VfsError::UnknownHandle(id))
    }

    /// True if a write or append handle is open on the entry `entry_id` at `path`.
    ///
    /// Handles left over from a deleted entry do not count against a new
    /// entry at the same path.
    pub fn has_writer(&self, path: &str, entry_id: u64) -> bool {
        self.handles
            .values()
            .any(|h| h.mode.is_writer() && h.path == path && h.entry_id == entry_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HandleTable {
        HandleTable::new(4)
    }

    fn limits() -> Limits {
        Limits::default()
    }

    #[test]
    fn test_ids_increase_and_are_not_reused() {
        let mut t = table();
        let a = t.open("/a".into(), 1, OpenMode::Read, vec![], WritePolicy::Exclusive).unwrap();
        t.remove(a).unwrap();
        let b = t.open("/a".into(), 1, OpenMode::Read, vec![], WritePolicy::Exclusive).unwrap();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_read_advances_cursor() {
        let mut t = table();
        let id = t
            .open("/f".into(), 1, OpenMode::Read, b"hello world".to_vec(), WritePolicy::Exclusive)
            .unwrap();
        let h = t.get_mut(id).unwrap();
        assert_eq!(h.read(Some(5)).unwrap(), b"hello");
        assert_eq!(h.read(Some(100)).unwrap(), b" world");
        assert_eq!(h.read(None).unwrap(), b"");
        assert_eq!(h.read(Some(1)).unwrap(), b"");
    }

    #[test]
    fn test_write_zero_fills_past_end() {
        let mut t = table();
        let id = t
            .open("/f".into(), 1, OpenMode::Write, vec![], WritePolicy::Exclusive)
            .unwrap();
        let h = t.get_mut(id).unwrap();
        h.write(b"ab", &limits()).unwrap();
        h.seek(5).unwrap();
        h.write(b"cd", &limits()).unwrap();
        assert_eq!(h.buffer, b"ab\0\0\0cd");
        assert_eq!(h.cursor, 7);

        h.seek(1).unwrap();
        h.write(b"X", &limits()).unwrap();
        assert_eq!(h.buffer, b"aX\0\0\0cd");
    }

    #[test]
    fn test_append_ignores_cursor() {
        let mut t = table();
        let id = t
            .open("/f".into(), 1, OpenMode::Append, b"abc".to_vec(), WritePolicy::Exclusive)
            .unwrap();
        let h = t.get_mut(id).unwrap();
        assert_eq!(h.cursor, 3);
        h.write(b"de", &limits()).unwrap();
        assert_eq!(h.buffer, b"abcde");
        assert_eq!(h.cursor, 5);
        assert!(h.seek(0).is_err());
    }

    #[test]
    fn test_mode_enforcement() {
        let mut t = table();
        let r = t.open("/r".into(), 1, OpenMode::Read, vec![], WritePolicy::Exclusive).unwrap();
        let w = t.open("/w".into(), 2, OpenMode::Write, vec![], WritePolicy::Exclusive).unwrap();
        assert!(matches!(
            t.get_mut(r).unwrap().write(b"x", &limits()),
            Err(VfsError::InvalidHandleMode { op: "write", .. })
        ));
        assert!(matches!(
            t.get_mut(w).unwrap().read(None),
            Err(VfsError::InvalidHandleMode { op: "read", .. })
        ));
    }

    #[test]
    fn test_size_limit() {
        let mut t = table();
        let id = t.open("/f".into(), 1, OpenMode::Write, vec![], WritePolicy::Exclusive).unwrap();
        let h = t.get_mut(id).unwrap();
        let small = Limits {
            max_file_size: 4,
            ..Limits::default()
        };
        h.write(b"1234", &small).unwrap();
        assert!(matches!(
            h.write(b"5", &small),
            Err(VfsError::FileTooLarge { size: 5, limit: 4, .. })
        ));
        assert_eq!(h.buffer, b"1234");
    }

    #[test]
    fn test_far_cursor_write_is_rejected() {
        let mut t = table();
        let id = t.open("/f".into(), 1, OpenMode::Write, vec![], WritePolicy::Exclusive).unwrap();
        let h = t.get_mut(id).unwrap();

        // End offset overflows u64
        h.seek(u64::MAX).unwrap();
        assert!(matches!(
            h.write(b"x", &limits()),
            Err(VfsError::FileTooLarge { size: u64::MAX, .. })
        ));

        // Zero-fill past the default cap would allocate far too much
        h.seek(1 << 40).unwrap();
        assert!(matches!(
            h.write(b"x", &limits()),
            Err(VfsError::FileTooLarge { .. })
        ));
        assert!(h.buffer.is_empty());

        h.seek(0).unwrap();
        assert_eq!(h.write(b"ok", &limits()).unwrap(), 2);
    }

    #[test]
    fn test_writer_on_replaced_entry_does_not_block() {
        let mut t = table();
        t.open("/f".into(), 1, OpenMode::Write, vec![], WritePolicy::Exclusive).unwrap();
        // Same path, new entry identity
        t.open("/f".into(), 2, OpenMode::Write, vec![], WritePolicy::Exclusive).unwrap();
        assert!(t.has_writer("/f", 1));
        assert!(t.has_writer("/f", 2));
        assert!(!t.has_writer("/f", 3));
        assert!(matches!(
            t.open("/f".into(), 2, OpenMode::Append, vec![], WritePolicy::Exclusive),
            Err(VfsError::Busy(_))
        ));
    }

    #[test]
    fn test_exclusive_writer() {
        let mut t = table();
        t.open("/f".into(), 1, OpenMode::Write, vec![], WritePolicy::Exclusive).unwrap();
        let err = t
            .open("/f".into(), 1, OpenMode::Append, vec![], WritePolicy::Exclusive)
            .unwrap_err();
        assert!(matches!(err, VfsError::Busy(_)));
        // Readers and other paths are unaffected
        t.open("/f".into(), 1, OpenMode::Read, vec![], WritePolicy::Exclusive).unwrap();
        t.open("/g".into(), 2, OpenMode::Write, vec![], WritePolicy::Exclusive).unwrap();
        // The permissive policy lets a second writer in
        t.open("/g".into(), 2, OpenMode::Write, vec![], WritePolicy::LastCloseWins).unwrap();
    }

    #[test]
    fn test_limit_and_unknown_ids() {
        let mut t = HandleTable::new(1);
        let id = t.open("/a".into(), 1, OpenMode::Read, vec![], WritePolicy::Exclusive).unwrap();
        assert!(matches!(
            t.open("/b".into(), 2, OpenMode::Read, vec![], WritePolicy::Exclusive),
            Err(VfsError::TooManyOpenHandles(1))
        ));
        t.remove(id).unwrap();
        assert!(matches!(t.remove(id), Err(VfsError::UnknownHandle(_))));
        assert!(t.get_mut(HandleId(99)).is_err());
        assert!(t.is_empty());
    }
}
