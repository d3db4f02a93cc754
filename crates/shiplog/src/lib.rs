//! Library interface for the `shiplog` CLI.
//!
//! This crate exposes the CLI's argument parser and command implementation as a
//! library, primarily for documentation generation and testing. The actual entry
//! point is in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`commands`] - Command implementation
//!
//! # Documentation Generation
//!
//! The [`command()`] function returns the clap `Command` for generating man pages
//! and shell completions via `xtask`.

pub mod commands;

use clap::{CommandFactory, Parser};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                  Log filter (e.g., debug, shiplog=trace)
    SHIPLOG_LOG_PATH          Explicit log file path
    SHIPLOG_LOG_DIR           Log directory
    SHIPLOG_BRANCH            Branch name override for the pre-release branch policy
    SHIPLOG_DEFAULT_BRANCH    Default-branch override for the pre-release branch policy
";
/// Command-line interface definition for shiplog.
///
/// `-v` is reserved for `--version`, so verbosity is the long-only
/// `--verbose` flag.
#[derive(Parser)]
#[command(name = "shiplog")]
#[command(about = "Changelog-driven release automation for manifest-based projects", long_about = None)]
#[command(version, disable_version_flag = true)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// Version to release: an explicit semver string or a bump keyword
    /// (major, minor, patch, premajor, preminor, prepatch, prerelease)
    #[arg(value_name = "VERSION|KEYWORD", value_parser = parse_target)]
    pub target: String,

    /// Pre-release identifier for pre* bumps (e.g. beta)
    #[arg(long, value_name = "ID")]
    pub preid: Option<String>,

    /// Commit and tag locally without pushing
    #[arg(short = 'n', long)]
    pub no_push: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Treat changelog warnings as fatal
    #[arg(long)]
    pub strict: bool,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. --verbose --verbose)
    #[arg(long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: (),
}

/// Validate the positional target so bad values fail at argument parsing.
fn parse_target(s: &str) -> Result<String, String> {
    shiplog_core::version::VersionArg::parse(s)
        .map(|_| s.to_string())
        .map_err(|err| err.to_string())
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}
