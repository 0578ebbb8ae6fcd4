//! Applies one color to every selected folder concurrently.
//!
//! Each batch owns a [`CancellationToken`]. Starting a batch cancels the
//! previous one: its units that have not begun yet skip their work, units that
//! already started run to completion and still count.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, PoisonError,
};

use log::{debug, info, warn};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    marker,
    notifier::ShellNotifier,
    palette::ColorOption,
    selection::SelectedFolder,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub color: String,
    pub requested: usize,
    pub applied: usize,
    pub skipped: usize,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.requested - self.applied - self.skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Applied,
    Failed,
    Skipped,
}

pub struct BatchApplier {
    notifier: Arc<dyn ShellNotifier>,
    generation: Mutex<CancellationToken>,
}

impl BatchApplier {
    pub fn new(notifier: Arc<dyn ShellNotifier>) -> Self {
        Self {
            notifier,
            generation: Mutex::new(CancellationToken::new()),
        }
    }

    /// Supersedes any running batch and schedules one unit per folder on the
    /// blocking pool. Must be called from within a tokio runtime.
    pub fn start(&self, folders: Vec<SelectedFolder>, color: ColorOption) -> PendingBatch {
        let token = self.renew_generation();
        let applied = Arc::new(AtomicUsize::new(0));
        let color = Arc::new(color);
        let requested = folders.len();
        let mut units = JoinSet::new();

        for folder in folders {
            let token = token.clone();
            let applied = Arc::clone(&applied);
            let color = Arc::clone(&color);
            let notifier = Arc::clone(&self.notifier);

            units.spawn_blocking(move || {
                run_unit(&folder, &color, &token, notifier.as_ref(), &applied)
            });
        }

        debug!("scheduled {requested} folder(s) for {}", color.name);
        PendingBatch {
            color: color.name.clone(),
            requested,
            applied,
            units,
        }
    }

    /// Cancels the current batch without starting a new one.
    pub fn cancel(&self) {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    fn renew_generation(&self) -> CancellationToken {
        let mut current = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = CancellationToken::new();
        current.clone()
    }
}

fn run_unit(
    folder: &SelectedFolder,
    color: &ColorOption,
    token: &CancellationToken,
    notifier: &dyn ShellNotifier,
    applied: &AtomicUsize,
) -> UnitOutcome {
    // Checked once, before any I/O. A unit that got past this point finishes.
    if token.is_cancelled() {
        return UnitOutcome::Skipped;
    }

    match marker::apply_marker(&folder.path, color) {
        Ok(true) => {
            applied.fetch_add(1, Ordering::AcqRel);
            notifier.notify_changed(&folder.path, Some(&folder.handle));
            UnitOutcome::Applied
        }
        Ok(false) => UnitOutcome::Failed,
        Err(err) => {
            warn!("failed to mark {}: {err}", folder.path.display());
            UnitOutcome::Failed
        }
    }
}

/// A started batch. Awaiting it yields the report once every unit finished
/// or was skipped.
pub struct PendingBatch {
    color: String,
    requested: usize,
    applied: Arc<AtomicUsize>,
    units: JoinSet<UnitOutcome>,
}

impl PendingBatch {
    pub async fn wait(mut self) -> BatchReport {
        let mut skipped = 0;
        while let Some(joined) = self.units.join_next().await {
            match joined {
                Ok(UnitOutcome::Skipped) => skipped += 1,
                Ok(_) => {}
                Err(err) => warn!("folder task aborted: {err}"),
            }
        }

        let report = BatchReport {
            color: self.color,
            requested: self.requested,
            applied: self.applied.load(Ordering::Acquire),
            skipped,
        };
        info!(
            "applied {} to {} of {} folder(s) ({} skipped)",
            report.color, report.applied, report.requested, report.skipped
        );
        report
    }
}
