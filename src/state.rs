use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use log::error;

use crate::{
    batch::BatchApplier,
    config::AppConfig,
    integration::IntegrationRegistrar,
    notifier::{ExplorerNotifier, ShellNotifier},
    palette::Palette,
    registry::{system_registry, RegistryBackend},
    selection::FolderSelection,
};

/// Process-wide components, created once per run.
pub struct AppState {
    pub config: AppConfig,
    pub config_path: Option<PathBuf>,
    pub palette: Palette,
    pub selection: Mutex<FolderSelection>,
    pub notifier: Arc<dyn ShellNotifier>,
    pub applier: BatchApplier,
    pub registrar: IntegrationRegistrar,
}

impl AppState {
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        let palette = load_palette(&config);
        let notifier: Arc<dyn ShellNotifier> =
            Arc::new(ExplorerNotifier::new(config.restart_explorer));
        let backend = system_registry(config.registry_scope);
        Self::with_parts(config, config_path, palette, notifier, backend)
    }

    pub fn with_parts(
        config: AppConfig,
        config_path: Option<PathBuf>,
        palette: Palette,
        notifier: Arc<dyn ShellNotifier>,
        backend: Box<dyn RegistryBackend>,
    ) -> Self {
        let registrar = IntegrationRegistrar::new(
            backend,
            Arc::clone(&notifier),
            config.integration_name.clone(),
            config.menu_label.clone(),
        );

        Self {
            applier: BatchApplier::new(Arc::clone(&notifier)),
            selection: Mutex::new(FolderSelection::default()),
            config,
            config_path,
            palette,
            notifier,
            registrar,
        }
    }

    pub fn selection(&self) -> std::sync::MutexGuard<'_, FolderSelection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels pending work, releases every selection handle and waits for
    /// a running Explorer restart to finish.
    pub fn shutdown(&self) {
        self.applier.cancel();
        self.selection().shutdown(self.notifier.as_ref());
        self.notifier.wait_idle();
    }
}

fn load_palette(config: &AppConfig) -> Palette {
    let Some(icons_dir) = config.resolved_icons_dir() else {
        error!("could not locate the icons folder");
        return Palette::default();
    };

    Palette::load(&icons_dir).unwrap_or_else(|err| {
        error!("{err}. Please ensure an 'icons' folder exists in the application directory.");
        Palette::default()
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{notifier::tests::RecordingNotifier, registry::tests::MemoryRegistry};

    fn state_with(notifier: Arc<dyn ShellNotifier>) -> AppState {
        AppState::with_parts(
            AppConfig::default(),
            None,
            Palette::default(),
            notifier,
            Box::new(MemoryRegistry::default()),
        )
    }

    #[test]
    fn shutdown_flushes_handles_then_waits_for_notifier() {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state_with(notifier.clone());
        state.selection().add(Path::new("/work/a").to_path_buf());
        state.selection().add(Path::new("/work/b").to_path_buf());

        state.shutdown();

        assert!(state.selection().is_empty());
        assert_eq!(*notifier.flushed.lock().unwrap(), 2);
        assert_eq!(*notifier.idle_waits.lock().unwrap(), 1);
    }

    #[cfg(not(windows))]
    #[test]
    fn shutdown_returns_after_explorer_restart_completes() {
        for _ in 0..50 {
            let notifier = Arc::new(ExplorerNotifier::new(true));
            let state = state_with(notifier.clone());

            state.notifier.hard_refresh();
            state.shutdown();

            assert!(!notifier.is_restarting());
        }
    }
}
