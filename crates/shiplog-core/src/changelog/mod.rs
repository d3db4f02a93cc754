//! Changelog model, parser, and writer.
//!
//! A changelog is treated as a title, an optional free-text preamble, and an
//! ordered list of `##`-delimited entries. Parsing is tolerant: malformed
//! headings degrade to warnings carried on the returned model, never to
//! errors. Whether a warning is fatal is the caller's policy.

pub mod parse;
pub mod write;

pub use parse::parse;
pub use write::{Promotion, promote, promote_on};

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use thiserror::Error;

/// Heading line of the pending section, as written by this tool.
pub const UNRELEASED_HEADING: &str = "## [Unreleased]";

/// Title used when a document has none of its own.
pub const DEFAULT_TITLE: &str = "# Changelog";

/// Errors from changelog I/O and rewriting.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// No unreleased entry exists, or its content is empty.
    #[error("nothing to release: the [Unreleased] section is missing or empty")]
    MissingUnreleasedContent,

    /// Failed to read the changelog document.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write the changelog document.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// Classification of an entry heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryVersion {
    /// The pending section accumulating not-yet-released changes.
    Unreleased,
    /// A released version parsed from the heading.
    Release(Version),
    /// A heading that is neither a version nor an unreleased marker.
    ///
    /// Preserved verbatim on rewrite, excluded from ordering checks.
    Unknown,
}

impl EntryVersion {
    /// Whether this is the unreleased marker.
    #[must_use]
    pub const fn is_unreleased(&self) -> bool {
        matches!(self, Self::Unreleased)
    }
}

/// One `##`-delimited section of a changelog document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    /// Heading classification.
    pub version: EntryVersion,
    /// The heading line, verbatim.
    pub header: String,
    /// Trimmed body text.
    pub content: String,
}

/// A changelog document in structured form, plus parse diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Changelog {
    /// First-level heading line, or empty if the document has none.
    pub title: String,
    /// Trimmed free text between the title and the first entry.
    pub description: String,
    /// Entries in document order.
    pub entries: Vec<ChangelogEntry>,
    /// Non-fatal problems found while parsing, in detection order.
    pub warnings: Vec<String>,
}

impl Changelog {
    /// The unreleased entry, wherever it sits in the document.
    #[must_use]
    pub fn unreleased(&self) -> Option<&ChangelogEntry> {
        self.entries.iter().find(|e| e.version.is_unreleased())
    }

    /// Mutable access to the unreleased entry.
    pub fn unreleased_mut(&mut self) -> Option<&mut ChangelogEntry> {
        self.entries.iter_mut().find(|e| e.version.is_unreleased())
    }

    /// Versions recorded by released entries, in document order.
    pub fn released_versions(&self) -> impl Iterator<Item = &Version> {
        self.entries.iter().filter_map(|e| match &e.version {
            EntryVersion::Release(v) => Some(v),
            _ => None,
        })
    }
}

/// Read and parse a changelog document from disk.
///
/// Warnings are prefixed with the file name, matching what `parse` was told.
pub fn load(path: &Utf8Path) -> ChangelogResult<Changelog> {
    let text = std::fs::read_to_string(path).map_err(|source| ChangelogError::Read {
        path: path.to_owned(),
        source,
    })?;
    let name = path.file_name().unwrap_or("CHANGELOG.md");
    Ok(parse(&text, name))
}

/// Write replacement changelog text to disk.
pub fn save(path: &Utf8Path, text: &str) -> ChangelogResult<()> {
    std::fs::write(path, text).map_err(|source| ChangelogError::Write {
        path: path.to_owned(),
        source,
    })
}
