use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{cmd, Shell};

const BINARY: &str = "folder-color";
const ICONS_DIR: &str = "icons";
const DIST_DIR: &str = "dist";

#[derive(Parser)]
#[command(name = "cargo-xtask", version, about = "Project automation tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format Rust sources
    Fmt,
    /// Run lint and static analysis checks
    Check,
    /// Run the test suite
    Test,
    /// Build the release binary and stage it with its icons in dist/
    Package,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_root = project_root();
    let shell = Shell::new()?;
    let _dir = shell.push_dir(&project_root);

    match cli.command {
        Command::Fmt => run_fmt(&shell),
        Command::Check => run_check(&shell),
        Command::Test => run_test(&shell),
        Command::Package => run_package(&shell, &project_root),
    }
}

fn run_fmt(shell: &Shell) -> Result<()> {
    cmd!(shell, "cargo fmt --all")
        .run()
        .context("failed to run cargo fmt")?;
    Ok(())
}

fn run_check(shell: &Shell) -> Result<()> {
    cmd!(shell, "cargo fmt --all -- --check")
        .run()
        .context("cargo fmt --check failed")?;
    cmd!(
        shell,
        "cargo clippy --workspace --all-targets --all-features -- -D warnings"
    )
    .run()
    .context("cargo clippy failed")?;
    Ok(())
}

fn run_test(shell: &Shell) -> Result<()> {
    cmd!(shell, "cargo test --workspace")
        .run()
        .context("cargo test failed")?;
    Ok(())
}

fn run_package(shell: &Shell, root: &Path) -> Result<()> {
    cmd!(shell, "cargo build --release --bin {BINARY}")
        .run()
        .context("release build failed")?;

    let dist = root.join(DIST_DIR);
    shell.remove_path(&dist)?;
    shell.create_dir(&dist)?;

    let binary = root
        .join("target")
        .join("release")
        .join(format!("{BINARY}{}", std::env::consts::EXE_SUFFIX));
    shell
        .copy_file(&binary, &dist)
        .with_context(|| format!("failed to copy {}", binary.display()))?;

    let icons = root.join(ICONS_DIR);
    if shell.path_exists(&icons) {
        let staged = dist.join(ICONS_DIR);
        shell.create_dir(&staged)?;
        for icon in shell.read_dir(&icons)? {
            shell.copy_file(&icon, &staged)?;
        }
    } else {
        eprintln!(
            "warning: {} not found; the packaged app will have no colors",
            icons.display()
        );
    }

    println!("packaged into {}", dist.display());
    Ok(())
}

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
