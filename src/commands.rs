use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use crate::{
    batch::BatchReport,
    cli::{Cli, Command},
    elevation::request_elevated_install,
    integration::{current_exe, IntegrationState, RegistrarError, StartupOutcome},
    palette::{ColorOption, DEFAULT_COLOR},
    state::AppState,
};

/// Runs whatever the command line asked for.
pub fn execute(state: &AppState, cli: Cli) -> ExitCode {
    if cli.install_context_menu {
        return elevated_install(state);
    }

    if let (Some(folder), Some(color)) = (cli.folder, cli.color) {
        return apply_and_report(state, &[folder], &color);
    }

    match cli.command {
        None => startup(state),
        Some(Command::Apply { color, folders }) => apply_and_report(state, &folders, &color),
        Some(Command::Clear { folders }) => apply_and_report(state, &folders, DEFAULT_COLOR),
        Some(Command::Install) => install(state),
        Some(Command::Uninstall) => {
            match state.registrar.uninstall() {
                IntegrationState::NotInstalled => println!("Removed from context menu"),
                IntegrationState::Installed => println!("Context menu could not be removed"),
            }
            ExitCode::SUCCESS
        }
        Some(Command::Elevate) => elevate(state),
        Some(Command::Status) => {
            print_status(state);
            ExitCode::SUCCESS
        }
        Some(Command::Colors) => {
            print_colors(state);
            ExitCode::SUCCESS
        }
        Some(Command::Config { write }) => config(state, write),
    }
}

/// Applies `color_name` to `folders` through the batch applier.
pub async fn apply_color(
    state: &AppState,
    folders: &[PathBuf],
    color_name: &str,
) -> Result<BatchReport> {
    let color = resolve_color(state, color_name)?;
    if folders.is_empty() {
        bail!("No folders selected");
    }

    let snapshot = {
        let mut selection = state.selection();
        let added = selection.extend(folders.iter().map(|folder| absolute(folder)));
        info!("{added} folder(s) added");
        selection.snapshot()
    };

    Ok(state.applier.start(snapshot, color).wait().await)
}

fn resolve_color(state: &AppState, name: &str) -> Result<ColorOption> {
    if let Some(color) = state.palette.find(name) {
        return Ok(color.clone());
    }

    // Clearing needs no icon, so it works even without default.ico.
    if name.trim().eq_ignore_ascii_case(DEFAULT_COLOR) {
        return Ok(ColorOption::default_marker());
    }

    let available = state.palette.names();
    if available.is_empty() {
        bail!("unknown color {name:?}: no colors are available");
    }
    bail!("unknown color {name:?}; available: {}", available.join(", "))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn apply_and_report(state: &AppState, folders: &[PathBuf], color: &str) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start worker pool")
    {
        Ok(runtime) => runtime,
        Err(err) => return report_error(err),
    };

    println!("Applying changes...");
    match runtime.block_on(apply_color(state, folders, color)) {
        Ok(report) => {
            println!("Applied {} to {} folder(s)", report.color, report.applied);
            if report.failed() > 0 {
                warn!("{} folder(s) could not be changed", report.failed());
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => report_error(err),
    }
}

/// How a user-initiated install ended.
#[derive(Debug)]
enum InstallRoute {
    Installed,
    /// Writing was denied; the result is that of the elevated relaunch.
    Elevated(Result<(), RegistrarError>),
    Failed(RegistrarError),
}

fn try_install(state: &AppState) -> InstallRoute {
    let result = current_exe().and_then(|exe| state.registrar.install(&exe, &state.palette));
    match result {
        Ok(_) => InstallRoute::Installed,
        Err(RegistrarError::PermissionDenied) => {
            println!("Administrator rights required, relaunching elevated...");
            InstallRoute::Elevated(relaunch_elevated(state))
        }
        Err(err) => InstallRoute::Failed(err),
    }
}

fn install(state: &AppState) -> ExitCode {
    match try_install(state) {
        InstallRoute::Installed => {
            println!("Context menu installed!");
            ExitCode::SUCCESS
        }
        InstallRoute::Elevated(result) => elevation_exit_code(result),
        InstallRoute::Failed(err) => {
            println!("Install failed: {err}");
            ExitCode::FAILURE
        }
    }
}

// The elevated half of the relaunch protocol. Never elevates again.
fn elevated_install(state: &AppState) -> ExitCode {
    let result = current_exe().and_then(|exe| state.registrar.install(&exe, &state.palette));
    match result {
        Ok(_) => {
            info!("context menu installed by elevated instance");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("elevated install failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn relaunch_elevated(state: &AppState) -> Result<(), RegistrarError> {
    current_exe().and_then(|exe| request_elevated_install(&exe, state.config_path.as_deref()))
}

fn elevate(state: &AppState) -> ExitCode {
    elevation_exit_code(relaunch_elevated(state))
}

fn elevation_exit_code(result: Result<(), RegistrarError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("admin install error: {err}");
            println!("Admin installation failed");
            ExitCode::FAILURE
        }
    }
}

fn startup(state: &AppState) -> ExitCode {
    match state
        .registrar
        .reconcile_on_startup(current_exe(), &state.palette)
    {
        StartupOutcome::AlreadyInstalled => {}
        StartupOutcome::Installed => println!("Context menu installed!"),
        StartupOutcome::NeedsElevation => {
            println!("Run `folder-color elevate` to install the context menu as administrator.")
        }
        StartupOutcome::Failed(message) => println!("Install failed: {message}"),
    }

    print_status(state);
    print_colors(state);
    ExitCode::SUCCESS
}

fn print_status(state: &AppState) {
    let state_text = match state.registrar.probe() {
        IntegrationState::Installed => "installed",
        IntegrationState::NotInstalled => "not installed",
    };
    println!(
        "Context menu {} ({:?} scope): {state_text}",
        state.registrar.key_path(),
        state.config.registry_scope
    );
}

fn print_colors(state: &AppState) {
    if state.palette.is_empty() {
        println!("No colors available");
        return;
    }
    for color in state.palette.options() {
        println!("{:<8} {}", color.name, color.icon_path.display());
    }
}

fn config(state: &AppState, write: bool) -> ExitCode {
    let path = state.config_path.as_deref();
    match path {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no settings location available"),
    }

    match serde_json::to_string_pretty(&state.config) {
        Ok(json) => println!("{json}"),
        Err(err) => return report_error(err.into()),
    }

    if !write {
        return ExitCode::SUCCESS;
    }
    let Some(path) = path else {
        return report_error(anyhow::anyhow!("no settings location available"));
    };
    match state.config.save(path) {
        Ok(()) => {
            println!("Settings written");
            ExitCode::SUCCESS
        }
        Err(err) => report_error(anyhow::anyhow!(err)),
    }
}

fn report_error(err: anyhow::Error) -> ExitCode {
    error!("{err:#}");
    eprintln!("Error: {err:#}");
    ExitCode::FAILURE
}
