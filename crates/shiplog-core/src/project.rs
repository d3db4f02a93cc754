//! Project metadata state: the three version-bearing JSON documents.
//!
//! `manifest.json` carries identity and the current version, `package.json`
//! mirrors that version for the packaging toolchain, and `versions.json`
//! maps every released version to the minimum platform version it supports.
//! The trio is read fresh on every run, verified for mutual consistency,
//! and rewritten together after version resolution. JSON fields this tool
//! does not interpret survive the rewrite.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

use crate::config::ProjectConfig;

/// Errors from reading, validating, or writing project metadata.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// Failed to read a metadata document.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A metadata document is not valid JSON of the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to serialize a metadata document.
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to write a metadata document.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest and package documents disagree about the version.
    #[error(
        "inconsistent project state: manifest.json has version {manifest} but package.json has {package}"
    )]
    VersionMismatch {
        /// Version recorded in the manifest.
        manifest: String,
        /// Version recorded in the package descriptor.
        package: String,
    },

    /// The versions map has no entry for the current version.
    #[error("inconsistent project state: versions.json has no entry for current version {version}")]
    MissingVersionEntry {
        /// The current version.
        version: String,
    },
}

/// Result alias for project-state operations.
pub type ProjectResult<T> = Result<T, ProjectError>;

/// Locations of the documents a release touches.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    /// The manifest document.
    pub manifest: Utf8PathBuf,
    /// The package descriptor.
    pub package: Utf8PathBuf,
    /// The version-compatibility map.
    pub versions: Utf8PathBuf,
    /// The changelog document.
    pub changelog: Utf8PathBuf,
}

impl ProjectPaths {
    /// Default layout under `root`, honoring configured overrides.
    #[must_use]
    pub fn resolve(root: &Utf8Path, overrides: Option<&ProjectConfig>) -> Self {
        let pick = |field: Option<&Utf8PathBuf>, default: &str| match field {
            Some(p) => root.join(p),
            None => root.join(default),
        };
        Self {
            manifest: pick(overrides.and_then(|o| o.manifest.as_ref()), "manifest.json"),
            package: pick(overrides.and_then(|o| o.package.as_ref()), "package.json"),
            versions: pick(overrides.and_then(|o| o.versions.as_ref()), "versions.json"),
            changelog: pick(overrides.and_then(|o| o.changelog.as_ref()), "CHANGELOG.md"),
        }
    }
}

/// `manifest.json`: identity, current version, minimum platform version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Project identifier.
    pub id: String,
    /// Current released version.
    pub version: String,
    /// Minimum platform version this project supports.
    #[serde(rename = "minAppVersion")]
    pub min_app_version: String,
    /// Fields this tool does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `package.json`: the packaging toolchain's view of the version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Current released version; must match the manifest.
    pub version: String,
    /// Named commands, if any. A `build` entry signals a build task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Map<String, Value>>,
    /// Fields this tool does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Package {
    /// Whether a named script exists.
    #[must_use]
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.as_ref().is_some_and(|s| s.contains_key(name))
    }
}

/// `versions.json`: released version → minimum-compatible platform version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionsMap(pub Map<String, Value>);

impl VersionsMap {
    /// Whether a released version is recorded.
    #[must_use]
    pub fn contains(&self, version: &str) -> bool {
        self.0.contains_key(version)
    }

    /// Record a version if absent. Returns `false` when it already existed.
    pub fn insert_if_absent(&mut self, version: &str, min_app_version: &str) -> bool {
        if self.0.contains_key(version) {
            return false;
        }
        self.0
            .insert(version.to_string(), Value::String(min_app_version.to_string()));
        true
    }
}

/// The project's version-bearing state, read fresh each run.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    /// Parsed manifest document.
    pub manifest: Manifest,
    /// Parsed package descriptor.
    pub package: Package,
    /// Parsed version-compatibility map.
    pub versions: VersionsMap,
    /// Where the documents live.
    pub paths: ProjectPaths,
}

impl ProjectInfo {
    /// Load all three metadata documents.
    #[instrument(skip(paths), fields(manifest = %paths.manifest))]
    pub fn load(paths: ProjectPaths) -> ProjectResult<Self> {
        let manifest: Manifest = read_json(&paths.manifest)?;
        let package: Package = read_json(&paths.package)?;
        let versions: VersionsMap = read_json(&paths.versions)?;
        tracing::debug!(id = %manifest.id, version = %manifest.version, "project state loaded");
        Ok(Self {
            manifest,
            package,
            versions,
            paths,
        })
    }

    /// Project identifier from the manifest.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// Current version from the manifest.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Current version from the package descriptor.
    #[must_use]
    pub fn pkg_version(&self) -> &str {
        &self.package.version
    }

    /// Minimum platform version from the manifest.
    #[must_use]
    pub fn min_app_version(&self) -> &str {
        &self.manifest.min_app_version
    }

    /// Check the cross-document invariants: manifest and package agree on
    /// the version, and the versions map records it.
    pub fn verify(&self) -> ProjectResult<()> {
        if self.manifest.version != self.package.version {
            return Err(ProjectError::VersionMismatch {
                manifest: self.manifest.version.clone(),
                package: self.package.version.clone(),
            });
        }
        if !self.versions.contains(&self.manifest.version) {
            return Err(ProjectError::MissingVersionEntry {
                version: self.manifest.version.clone(),
            });
        }
        Ok(())
    }

    /// Record `next` in all three documents, keyed in the versions map by
    /// the current minimum platform version.
    ///
    /// Returns `false` when the versions map already had an entry for
    /// `next`, which callers report without failing.
    pub fn apply_version(&mut self, next: &str) -> bool {
        self.manifest.version = next.to_string();
        self.package.version = next.to_string();
        let min_app = self.manifest.min_app_version.clone();
        self.versions.insert_if_absent(next, &min_app)
    }

    /// Write all three documents back to disk.
    pub fn save(&self) -> ProjectResult<()> {
        write_json(&self.paths.manifest, &self.manifest)?;
        write_json(&self.paths.package, &self.package)?;
        write_json(&self.paths.versions, &self.versions)?;
        Ok(())
    }

    /// The documents a release mutates, in commit order.
    #[must_use]
    pub fn release_files(&self) -> [&Utf8Path; 4] {
        [
            &self.paths.manifest,
            &self.paths.package,
            &self.paths.versions,
            &self.paths.changelog,
        ]
    }
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> ProjectResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ProjectError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> ProjectResult<()> {
    let mut text =
        serde_json::to_string_pretty(value).map_err(|source| ProjectError::Serialize {
            path: path.to_owned(),
            source,
        })?;
    text.push('\n');
    std::fs::write(path, text).map_err(|source| ProjectError::Write {
        path: path.to_owned(),
        source,
    })
}
