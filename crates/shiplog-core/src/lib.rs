//! Core library for shiplog.
//!
//! This crate provides the foundational types and functionality used by the
//! `shiplog` CLI and any downstream consumers.
//!
//! # Modules
//!
//! - [`changelog`] - Tolerant changelog parsing and release promotion
//! - [`config`] - Configuration loading and management
//! - [`git`] - Git operations for release workflows
//! - [`project`] - Project metadata documents and consistency checks
//! - [`release`] - The release workflow orchestrator
//! - [`version`] - Version resolution and bump keywords
//!
//! # Quick Start
//!
//! ```no_run
//! use shiplog_core::{Config, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Log level: {:?}", config.log_level);
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod config;

pub mod git;

pub mod project;

pub mod release;

pub mod version;

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult, LogLevel};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
