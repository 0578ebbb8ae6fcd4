//! Tells Explorer that a folder's appearance changed.
//!
//! Everything here is best effort: failures are logged and swallowed.

use std::{
    ffi::OsStr,
    path::Path,
    process::Command,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
};

use log::{debug, warn};
use sysinfo::{ProcessesToUpdate, System};

use crate::handles::FolderHandle;

pub const EXPLORER_PROCESS: &str = "explorer.exe";

pub trait ShellNotifier: Send + Sync {
    /// Called after a folder's marker changed.
    fn notify_changed(&self, folder: &Path, handle: Option<&FolderHandle>);

    /// Invalidates shell caches the hard way (association broadcast plus a
    /// browser restart). Never blocks the caller.
    fn hard_refresh(&self);

    /// Last notification for a handle that is about to be released.
    fn flush_handle(&self, _handle: &FolderHandle) {}

    /// Blocks until background refresh work has finished. Called before the
    /// process exits.
    fn wait_idle(&self) {}
}

/// Notifier backed by `SHChangeNotify` and an Explorer restart.
pub struct ExplorerNotifier {
    restart_on_change: bool,
    restart_pending: Arc<AtomicBool>,
    restart_worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExplorerNotifier {
    pub fn new(restart_on_change: bool) -> Self {
        Self {
            restart_on_change,
            restart_pending: Arc::new(AtomicBool::new(false)),
            restart_worker: Mutex::new(None),
        }
    }

    // Restarts are coalesced: while one is running, further requests are dropped.
    fn schedule_restart(&self) {
        if self.restart_pending.swap(true, Ordering::AcqRel) {
            debug!("explorer restart already pending");
            return;
        }

        let pending = Arc::clone(&self.restart_pending);
        let spawned = thread::Builder::new()
            .name("explorer-restart".into())
            .spawn(move || {
                restart_explorer();
                pending.store(false, Ordering::Release);
            });

        match spawned {
            Ok(worker) => {
                // The previous worker has cleared the pending flag, so it is done.
                let previous = self.worker_slot().replace(worker);
                join_worker(previous);
            }
            Err(err) => {
                warn!("failed to spawn explorer restart: {err}");
                self.restart_pending.store(false, Ordering::Release);
            }
        }
    }

    /// Whether an Explorer restart is running right now.
    pub fn is_restarting(&self) -> bool {
        self.restart_pending.load(Ordering::Acquire)
    }

    fn worker_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.restart_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn join_worker(worker: Option<JoinHandle<()>>) {
    if let Some(worker) = worker {
        if worker.join().is_err() {
            warn!("explorer restart thread panicked");
        }
    }
}

impl ShellNotifier for ExplorerNotifier {
    fn notify_changed(&self, folder: &Path, handle: Option<&FolderHandle>) {
        shell::update_dir(folder);
        if let Some(handle) = handle {
            shell::update_item(handle);
        }

        if self.restart_on_change {
            self.schedule_restart();
        }
    }

    fn hard_refresh(&self) {
        shell::associations_changed();
        shell::broadcast_setting_change();
        self.schedule_restart();
    }

    fn flush_handle(&self, handle: &FolderHandle) {
        shell::update_dir_handle(handle);
    }

    fn wait_idle(&self) {
        let worker = self.worker_slot().take();
        join_worker(worker);
    }
}

/// Kills every running Explorer and starts a fresh one.
fn restart_explorer() {
    if !cfg!(windows) {
        debug!("explorer restart skipped on this platform");
        return;
    }

    let killed = terminate_processes(EXPLORER_PROCESS);
    debug!("terminated {killed} explorer process(es)");

    if let Err(err) = Command::new(EXPLORER_PROCESS).spawn() {
        warn!("failed to relaunch explorer: {err}");
    }
}

/// Terminates all processes with the exact image name. Returns how many were
/// signalled successfully.
pub fn terminate_processes(name: &str) -> usize {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    system
        .processes_by_exact_name(OsStr::new(name))
        .filter(|process| {
            let killed = process.kill();
            if !killed {
                debug!("could not terminate {name} (pid {})", process.pid());
            }
            killed
        })
        .count()
}

#[cfg(windows)]
mod shell {
    use std::{ffi::OsStr, path::Path};

    use windows::Win32::{
        Foundation::{LPARAM, WPARAM},
        UI::{
            Shell::{
                SHChangeNotify, SHCNE_ASSOCCHANGED, SHCNE_UPDATEDIR, SHCNE_UPDATEITEM,
                SHCNF_FLAGS, SHCNF_FLUSH, SHCNF_FLUSHNOWAIT, SHCNF_IDLIST, SHCNF_PATHW,
            },
            WindowsAndMessaging::{
                SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
            },
        },
    };

    use crate::{
        handles::FolderHandle,
        windows_utils::{os_str_to_wide, path_to_wide},
    };

    const BROADCAST_TIMEOUT_MS: u32 = 1000;

    fn path_flush() -> SHCNF_FLAGS {
        SHCNF_FLAGS(SHCNF_PATHW.0 | SHCNF_FLUSH.0)
    }

    pub(super) fn update_dir(folder: &Path) {
        let wide = path_to_wide(folder);
        unsafe {
            SHChangeNotify(
                SHCNE_UPDATEDIR,
                path_flush(),
                Some(wide.as_ptr() as *const _),
                None,
            );
        }
    }

    pub(super) fn update_dir_handle(handle: &FolderHandle) {
        unsafe {
            SHChangeNotify(
                SHCNE_UPDATEDIR,
                SHCNF_PATHW,
                Some(handle.as_ptr() as *const _),
                None,
            );
        }
    }

    pub(super) fn update_item(handle: &FolderHandle) {
        unsafe {
            SHChangeNotify(
                SHCNE_UPDATEITEM,
                path_flush(),
                Some(handle.as_ptr() as *const _),
                None,
            );
        }
    }

    pub(super) fn associations_changed() {
        unsafe {
            SHChangeNotify(
                SHCNE_ASSOCCHANGED,
                SHCNF_FLAGS(SHCNF_IDLIST.0 | SHCNF_FLUSHNOWAIT.0),
                None,
                None,
            );
        }
    }

    pub(super) fn broadcast_setting_change() {
        let area = os_str_to_wide(OsStr::new("Environment"));
        let mut result = 0usize;
        unsafe {
            let _ = SendMessageTimeoutW(
                HWND_BROADCAST,
                WM_SETTINGCHANGE,
                WPARAM(0),
                LPARAM(area.as_ptr() as isize),
                SMTO_ABORTIFHUNG,
                BROADCAST_TIMEOUT_MS,
                Some(&mut result),
            );
        }
    }
}

#[cfg(not(windows))]
mod shell {
    use std::path::Path;

    use log::trace;

    use crate::handles::FolderHandle;

    pub(super) fn update_dir(folder: &Path) {
        trace!("no shell to notify for {}", folder.display());
    }

    pub(super) fn update_dir_handle(_handle: &FolderHandle) {}

    pub(super) fn update_item(_handle: &FolderHandle) {}

    pub(super) fn associations_changed() {}

    pub(super) fn broadcast_setting_change() {}
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{path::PathBuf, sync::Mutex};

    use super::*;

    /// Records every call for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub changed: Mutex<Vec<(PathBuf, bool)>>,
        pub hard_refreshes: Mutex<usize>,
        pub flushed: Mutex<usize>,
        pub idle_waits: Mutex<usize>,
    }

    impl ShellNotifier for RecordingNotifier {
        fn notify_changed(&self, folder: &Path, handle: Option<&FolderHandle>) {
            self.changed
                .lock()
                .unwrap()
                .push((folder.to_path_buf(), handle.is_some()));
        }

        fn hard_refresh(&self) {
            *self.hard_refreshes.lock().unwrap() += 1;
        }

        fn flush_handle(&self, _handle: &FolderHandle) {
            *self.flushed.lock().unwrap() += 1;
        }

        fn wait_idle(&self) {
            *self.idle_waits.lock().unwrap() += 1;
        }
    }

    #[test]
    fn terminate_processes_ignores_unknown_names() {
        assert_eq!(terminate_processes("no-such-process-7f3a.exe"), 0);
    }

    #[test]
    fn pending_restart_suppresses_new_requests() {
        let notifier = ExplorerNotifier::new(true);
        notifier.restart_pending.store(true, Ordering::Release);

        notifier.schedule_restart();
        assert!(notifier.restart_pending.load(Ordering::Acquire));
    }

    #[cfg(not(windows))]
    #[test]
    fn wait_idle_returns_after_restart_finished() {
        for _ in 0..50 {
            let notifier = ExplorerNotifier::new(false);
            notifier.hard_refresh();
            notifier.wait_idle();

            assert!(!notifier.restart_pending.load(Ordering::Acquire));
            assert!(notifier.worker_slot().is_none());
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn back_to_back_refreshes_keep_a_single_worker() {
        let notifier = ExplorerNotifier::new(true);
        notifier.hard_refresh();
        notifier.wait_idle();
        notifier.notify_changed(Path::new("/work/a"), None);
        notifier.hard_refresh();
        notifier.wait_idle();

        assert!(!notifier.restart_pending.load(Ordering::Acquire));
    }

    #[test]
    fn wait_idle_without_restart_returns_immediately() {
        let notifier = ExplorerNotifier::new(false);
        notifier.notify_changed(Path::new("/work/a"), None);
        notifier.wait_idle();
        assert!(notifier.worker_slot().is_none());
    }
}
