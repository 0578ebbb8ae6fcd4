//! Explorer context-menu integration.
//!
//! The integration is a registry subtree under `Directory\shell\<name>` whose
//! `shell` subkey holds one command per color. Its state is never cached: every
//! query reads the registry, and `install`/`uninstall` return the state they
//! produced.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, error, info, warn};

use crate::{
    notifier::ShellNotifier,
    palette::Palette,
    registry::{RegistryBackend, RegistryKeyTree},
};

pub const DEFAULT_INTEGRATION_NAME: &str = "FolderColorChanger";
pub const DEFAULT_MENU_LABEL: &str = "Change Folder Color";

/// Argument an elevated relaunch receives to install without interaction.
pub const ELEVATED_INSTALL_FLAG: &str = "--install-context-menu";

/// Placeholder Explorer replaces with the clicked folder.
const FOLDER_PLACEHOLDER: &str = "%1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationState {
    Installed,
    NotInstalled,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    #[error("writing the context menu requires administrator rights")]
    PermissionDenied,
    #[error("could not get application path: {0}")]
    ExecutablePath(#[source] io::Error),
    #[error("registry error: {0}")]
    Registry(#[source] io::Error),
    #[error("elevation failed: {0}")]
    Elevation(String),
    #[error("context menu integration is only available on Windows")]
    Unsupported,
}

impl From<io::Error> for RegistrarError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::Unsupported => Self::Unsupported,
            _ => Self::Registry(err),
        }
    }
}

/// What the startup check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    AlreadyInstalled,
    Installed,
    /// Installation needs an elevated relaunch; offer it to the user.
    NeedsElevation,
    Failed(String),
}

pub struct IntegrationRegistrar {
    backend: Box<dyn RegistryBackend>,
    notifier: Arc<dyn ShellNotifier>,
    name: String,
    label: String,
}

impl IntegrationRegistrar {
    pub fn new(
        backend: Box<dyn RegistryBackend>,
        notifier: Arc<dyn ShellNotifier>,
        name: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            notifier,
            name: name.into(),
            label: label.into(),
        }
    }

    pub fn key_path(&self) -> String {
        format!(r"Directory\shell\{}", self.name)
    }

    /// Reads the registry. Errors count as not installed.
    pub fn probe(&self) -> IntegrationState {
        match self.backend.key_exists(&self.key_path()) {
            Ok(true) => IntegrationState::Installed,
            Ok(false) => IntegrationState::NotInstalled,
            Err(err) => {
                warn!("failed to probe {}: {err}", self.key_path());
                IntegrationState::NotInstalled
            }
        }
    }

    /// Builds the subtree that [`install`](Self::install) writes.
    pub fn menu_tree(&self, exe: &Path, palette: &Palette) -> RegistryKeyTree {
        let exe_value = exe.display().to_string();
        let commands = palette
            .options()
            .iter()
            .fold(RegistryKeyTree::new(), |shell, color| {
                let command = command_line(exe, FOLDER_PLACEHOLDER, &color.name);
                debug!("context menu command for {}: {command}", color.name);

                shell.subkey(
                    color.name.clone(),
                    RegistryKeyTree::new()
                        .value("", color.name.clone())
                        .value("Icon", color.icon_path.display().to_string())
                        .subkey("command", RegistryKeyTree::new().value("", command)),
                )
            });

        RegistryKeyTree::new()
            .value("", self.label.clone())
            .value("Icon", exe_value)
            .value("ExtendedSubCommandsKey", self.key_path())
            .subkey("shell", commands)
    }

    /// Writes the integration for `exe` and refreshes Explorer.
    ///
    /// A failed write may leave part of the subtree behind; a later
    /// `uninstall` removes it.
    pub fn install(
        &self,
        exe: &Path,
        palette: &Palette,
    ) -> Result<IntegrationState, RegistrarError> {
        let tree = self.menu_tree(exe, palette);
        if let Err(err) = self.backend.write_tree(&self.key_path(), &tree) {
            let err = RegistrarError::from(err);
            warn!("context menu installation failed: {err}");
            return Err(err);
        }

        info!(
            "installed context menu {} with {} color(s)",
            self.key_path(),
            palette.options().len()
        );
        self.notifier.hard_refresh();
        Ok(IntegrationState::Installed)
    }

    /// Removes the integration. Failures are logged and the state actually
    /// found in the registry is returned.
    pub fn uninstall(&self) -> IntegrationState {
        match self.backend.delete_tree(&self.key_path()) {
            Ok(()) => {
                info!("removed context menu {}", self.key_path());
                self.notifier.hard_refresh();
                IntegrationState::NotInstalled
            }
            Err(err) => {
                error!("uninstall error: {err}");
                self.probe()
            }
        }
    }

    /// Startup self-heal: installs the integration when it is missing.
    pub fn reconcile_on_startup(
        &self,
        exe: Result<PathBuf, RegistrarError>,
        palette: &Palette,
    ) -> StartupOutcome {
        if self.probe() == IntegrationState::Installed {
            return StartupOutcome::AlreadyInstalled;
        }

        let exe = match exe {
            Ok(exe) => exe,
            Err(err) => return StartupOutcome::Failed(err.to_string()),
        };

        match self.install(&exe, palette) {
            Ok(_) => StartupOutcome::Installed,
            Err(RegistrarError::PermissionDenied) => StartupOutcome::NeedsElevation,
            Err(err) => StartupOutcome::Failed(err.to_string()),
        }
    }
}

/// `"<exe>" "<folder>" "<color>"`
pub fn command_line(exe: &Path, folder: &str, color: &str) -> String {
    format!("\"{}\" \"{folder}\" \"{color}\"", exe.display())
}

/// Path of the running executable.
pub fn current_exe() -> Result<PathBuf, RegistrarError> {
    std::env::current_exe().map_err(RegistrarError::ExecutablePath)
}
