use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Color-tag folders and manage the Explorer context menu.
///
/// Invoked as `folder-color <FOLDER> <COLOR>` the color is applied right away;
/// this is the form the context menu uses.
#[derive(Debug, Parser)]
#[command(
    name = "folder-color",
    version,
    about,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Install the context menu without interaction (used by the elevated relaunch)
    #[arg(long = "install-context-menu")]
    pub install_context_menu: bool,

    /// Settings file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Folder to mark
    #[arg(requires = "color")]
    pub folder: Option<PathBuf>,

    /// Color to apply to FOLDER
    pub color: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply a color to one or more folders
    Apply {
        #[arg(short, long)]
        color: String,
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
    /// Remove the color marker from folders
    Clear {
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
    /// Add the context menu to Explorer, elevating if needed
    Install,
    /// Remove the context menu from Explorer
    Uninstall,
    /// Relaunch elevated to install the context menu
    Elevate,
    /// Show whether the context menu is installed
    Status,
    /// List the available colors
    Colors,
    /// Show the effective settings
    Config {
        /// Write the effective settings to the settings file
        #[arg(long)]
        write: bool,
    },
}
