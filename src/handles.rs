//! Native string handles for selected folders.
//!
//! A [`FolderHandle`] is a null-terminated UTF-16 copy of a folder path that is
//! handed to the shell as the item of a change notification. The buffer is
//! reference counted: a notification in flight keeps it alive even if the
//! folder is removed from the selection meanwhile, and the last owner frees it.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Clone)]
pub struct FolderHandle(Arc<[u16]>);

impl FolderHandle {
    pub fn new(path: &Path) -> Self {
        Self(Arc::from(wide_path(path)))
    }

    /// Pointer to the null-terminated buffer. Valid while `self` is alive.
    pub fn as_ptr(&self) -> *const u16 {
        self.0.as_ptr()
    }

    /// The buffer including its terminating null.
    pub fn as_wide(&self) -> &[u16] {
        &self.0
    }
}

impl fmt::Debug for FolderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf16_lossy(&self.0[..self.0.len().saturating_sub(1)]);
        f.debug_tuple("FolderHandle").field(&text).finish()
    }
}

#[cfg(windows)]
fn wide_path(path: &Path) -> Vec<u16> {
    crate::windows_utils::path_to_wide(path)
}

#[cfg(not(windows))]
fn wide_path(path: &Path) -> Vec<u16> {
    path.to_string_lossy().encode_utf16().chain(Some(0)).collect()
}

/// One handle per selected folder.
#[derive(Debug, Default)]
pub struct HandleTable {
    handles: HashMap<PathBuf, FolderHandle>,
}

impl HandleTable {
    /// Returns the folder's handle, allocating it on first use.
    pub fn allocate(&mut self, path: &Path) -> FolderHandle {
        self.handles
            .entry(path.to_path_buf())
            .or_insert_with(|| FolderHandle::new(path))
            .clone()
    }

    pub fn get(&self, path: &Path) -> Option<&FolderHandle> {
        self.handles.get(path)
    }

    /// Drops the table's reference. Returns `false` if the folder had none.
    pub fn release(&mut self, path: &Path) -> bool {
        self.handles.remove(path).is_some()
    }

    /// Empties the table, handing the handles to the caller for a last use.
    pub fn drain(&mut self) -> Vec<(PathBuf, FolderHandle)> {
        self.handles.drain().collect()
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

    #[test]
    fn handle_is_null_terminated_utf16() {
        let handle = FolderHandle::new(Path::new("Ünïcode dir"));
        let wide = handle.as_wide();

        assert_eq!(wide.last(), Some(&0));
        assert_eq!(String::from_utf16(&wide[..wide.len() - 1]).unwrap(), "Ünïcode dir");
        assert_eq!(format!("{handle:?}"), "FolderHandle(\"Ünïcode dir\")");
    }

    #[test]
    fn allocate_reuses_existing_handle() {
        let mut table = HandleTable::default();
        let first = table.allocate(Path::new("/work/a"));
        let second = table.allocate(Path::new("/work/a"));

        assert_eq!(table.len(), 1);
        assert_eq!(first.as_ptr(), second.as_ptr());
    }

    #[test]
    fn release_frees_once_last_owner_drops() {
        let mut table = HandleTable::default();
        let in_flight = table.allocate(Path::new("/work/a"));
        let weak = Arc::downgrade(&in_flight.0);

        assert!(table.release(Path::new("/work/a")));
        assert!(!table.release(Path::new("/work/a")));
        assert!(weak.upgrade().is_some());

        drop(in_flight);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn drain_empties_table() {
        let mut table = HandleTable::default();
        table.allocate(Path::new("/work/a"));
        table.allocate(Path::new("/work/b"));

        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert!(table.is_empty());
        assert!(table.get(Path::new("/work/a")).is_none());
    }
}
