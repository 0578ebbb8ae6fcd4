use std::path::{Path, PathBuf};

use crate::{
    handles::{FolderHandle, HandleTable},
    notifier::ShellNotifier,
};

/// A folder queued for marking, together with its notification handle.
#[derive(Debug, Clone)]
pub struct SelectedFolder {
    pub path: PathBuf,
    pub handle: FolderHandle,
}

/// Ordered, duplicate-free set of folders. Every entry owns one handle for
/// exactly as long as it stays selected.
#[derive(Debug, Default)]
pub struct FolderSelection {
    order: Vec<PathBuf>,
    handles: HandleTable,
}

impl FolderSelection {
    /// Adds `path` unless it is empty or already selected.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if path.as_os_str().is_empty() || self.contains(&path) {
            return false;
        }

        self.handles.allocate(&path);
        self.order.push(path);
        true
    }

    /// Adds every path and returns how many were new.
    pub fn extend<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .fold(0, |added, path| if self.add(path) { added + 1 } else { added })
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let Some(index) = self.order.iter().position(|entry| entry == path) else {
            return false;
        };

        self.order.remove(index);
        self.handles.release(path);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.order.iter().any(|entry| entry == path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Copies the current entries for a batch. The snapshot shares the handles,
    /// so later selection changes do not invalidate it.
    pub fn snapshot(&self) -> Vec<SelectedFolder> {
        self.order
            .iter()
            .map(|path| SelectedFolder {
                path: path.clone(),
                handle: self
                    .handles
                    .get(path)
                    .cloned()
                    .unwrap_or_else(|| FolderHandle::new(path)),
            })
            .collect()
    }

    /// Sends each handle a final update and releases all of them.
    pub fn shutdown(&mut self, notifier: &dyn ShellNotifier) {
        for (_, handle) in self.handles.drain() {
            notifier.flush_handle(&handle);
        }
        self.order.clear();
    }
}
