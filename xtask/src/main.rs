//! Developer tasks for the shiplog workspace.
//!
//! Run `cargo xtask <task>`:
//! - `completions` - generate shell completions into dist/
//! - `man` - generate the manpage into dist/
//! - `install` - release-build shiplog and copy it into ~/.bin

#![deny(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use clap_complete::{Shell, generate_to};

const BIN: &str = "shiplog";

#[derive(Parser, Debug)]
#[command(name = "xtask")]
#[command(about = "Project maintenance tasks")]
struct Xtask {
    #[command(subcommand)]
    task: Task,
}

#[derive(Subcommand, Debug)]
enum Task {
    /// Generate shell completions for the shiplog CLI.
    Completions {
        /// Output directory, relative to the workspace root.
        #[arg(long = "out-dir", default_value = "dist/share/completions")]
        out_dir: PathBuf,

        /// Generate only for a specific shell (default: all).
        #[arg(long, value_enum)]
        shell: Option<Shell>,
    },

    /// Generate the shiplog manpage.
    Man {
        /// Output directory, relative to the workspace root.
        #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
        out_dir: PathBuf,
    },

    /// Build shiplog in release mode and install it for local testing.
    Install {
        /// Destination directory (default: ~/.bin).
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    match Xtask::parse().task {
        Task::Completions { out_dir, shell } => completions(&out_dir, shell),
        Task::Man { out_dir } => man(&out_dir),
        Task::Install { dest } => install(dest),
    }
}

fn completions(out_dir: &PathBuf, only: Option<Shell>) -> anyhow::Result<()> {
    let out_dir = workspace_root().join(out_dir);
    fs::create_dir_all(&out_dir).with_context(|| out_dir.display().to_string())?;

    let mut cmd = shiplog::command();
    let shells = match only {
        Some(shell) => vec![shell],
        None => vec![Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell],
    };
    for shell in shells {
        let path = generate_to(shell, &mut cmd, BIN, &out_dir)
            .with_context(|| format!("generate {shell} completions"))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn man(out_dir: &PathBuf) -> anyhow::Result<()> {
    let out_dir = workspace_root().join(out_dir);
    fs::create_dir_all(&out_dir).with_context(|| out_dir.display().to_string())?;

    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(shiplog::command())
        .render(&mut buffer)
        .context("render manpage")?;

    let path = out_dir.join(format!("{BIN}.1"));
    fs::write(&path, buffer).with_context(|| path.display().to_string())?;
    println!("wrote {}", path.display());
    Ok(())
}

fn install(dest: Option<PathBuf>) -> anyhow::Result<()> {
    let dest = match dest {
        Some(dir) => dir,
        None => {
            let home = std::env::var_os("HOME").context("HOME is not set")?;
            PathBuf::from(home).join(".bin")
        }
    };

    let root = workspace_root();
    let status = Command::new("cargo")
        .args(["build", "--release", "-p", BIN])
        .current_dir(&root)
        .status()
        .context("run cargo build")?;
    if !status.success() {
        bail!("cargo build --release failed");
    }

    fs::create_dir_all(&dest).with_context(|| dest.display().to_string())?;
    let built = root.join("target").join("release").join(BIN);
    let installed = dest.join(BIN);
    fs::copy(&built, &installed).with_context(|| format!("copy {}", built.display()))?;
    println!("installed {}", installed.display());
    Ok(())
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap_or(&manifest_dir).to_path_buf()
}
