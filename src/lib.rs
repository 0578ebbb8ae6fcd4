mod attributes;
mod batch;
mod cli;
mod commands;
mod config;
mod elevation;
mod handles;
mod integration;
mod marker;
mod notifier;
mod palette;
mod registry;
mod selection;
mod state;
#[cfg(windows)]
mod windows_utils;

use std::process::ExitCode;

use clap::Parser;

pub use batch::{BatchApplier, BatchReport, PendingBatch};
pub use config::AppConfig;
pub use handles::{FolderHandle, HandleTable};
pub use integration::{
    IntegrationRegistrar, IntegrationState, RegistrarError, StartupOutcome, ELEVATED_INSTALL_FLAG,
};
pub use marker::{apply_marker, clear_marker, read_marker};
pub use notifier::{ExplorerNotifier, ShellNotifier};
pub use palette::{ColorOption, Palette, PaletteError};
pub use registry::{RegistryBackend, RegistryKeyTree, RegistryScope};
pub use selection::{FolderSelection, SelectedFolder};
pub use state::AppState;

use cli::Cli;

/// Entry point shared by the binary.
pub fn run() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().or_else(config::default_config_path);
    let config = AppConfig::load(config_path.as_deref());

    let state = AppState::new(config, config_path);
    let code = commands::execute(&state, cli);
    state.shutdown();
    code
}
