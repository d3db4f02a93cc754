//! Release orchestrator — the full changelog-driven release workflow.
//!
//! Wires together project-state verification, changelog parsing, version
//! resolution, metadata mutation, changelog rewriting, external checks,
//! and git operations into a single sequential pipeline.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_release`]) — verify project state, parse the
//!    changelog, resolve the next version, apply branch policy. Nothing
//!    on disk is touched.
//! 2. **Execute** ([`ReadyRelease::execute`]) — mutate metadata, rewrite
//!    the changelog, run checks, commit, tag, and push, with event
//!    callbacks for progress display.
//!
//! The CLI confirms with the operator between the two phases; declining
//! leaves the working tree untouched. Once execution starts, failures
//! are terminal and nothing is rolled back.

use std::process::Command;

use camino::Utf8Path;
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::changelog::{self, Changelog, ChangelogEntry, ChangelogError, EntryVersion};
use crate::config::Config;
use crate::git::{self, GitError};
use crate::project::{ProjectError, ProjectInfo, ProjectPaths};
use crate::version::{self, VersionArg, VersionError};

/// Environment override naming the current branch.
///
/// Bypasses the git query so branch policy can be tested deterministically.
pub const ENV_BRANCH: &str = "SHIPLOG_BRANCH";

/// Environment override naming the default branch.
pub const ENV_DEFAULT_BRANCH: &str = "SHIPLOG_DEFAULT_BRANCH";

/// Bullet injected when the unreleased section has nothing recorded.
const PLACEHOLDER_NOTE: &str = "- No notable changes recorded.";

/// Fallback checks command when `package.json` declares a `build` script.
const NPM_BUILD: &str = "npm run build";

/// Commit subject prefix; the release notes follow as the body.
const COMMIT_PREFIX: &str = "chore: release ";

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from the release workflow.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Project metadata failed to load or verify.
    #[error(transparent)]
    Project(#[from] ProjectError),

    /// Changelog failed to load or had nothing releasable.
    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    /// Version resolution failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Strict mode treats changelog warnings as fatal.
    #[error("strict mode aborted: {}", .warnings.join("; "))]
    StrictWarnings {
        /// The warnings that caused the abort.
        warnings: Vec<String>,
    },

    /// Pre-release bump attempted from the default branch.
    #[error(
        "pre-release bumps are not allowed on the default branch ({branch}); switch to a feature branch or pass an explicit version"
    )]
    PrereleaseOnDefaultBranch {
        /// The branch both queries agreed on.
        branch: String,
    },

    /// The checks command failed or cannot run.
    #[error("checks failed ({command}): {detail}")]
    ChecksFailed {
        /// The command that was (or would be) run.
        command: String,
        /// Captured stderr, exit status, or spawn error.
        detail: String,
    },

    /// A git step failed.
    #[error("git {step} failed: {source}")]
    Git {
        /// Which step failed.
        step: GitStep,
        /// The underlying git error.
        source: GitError,
    },
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Git steps that can fail during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitStep {
    /// Creating the release commit.
    Commit,
    /// Creating the annotated tag.
    Tag,
    /// Pushing the branch or tags.
    Push,
}

impl std::fmt::Display for GitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Tag => write!(f, "tag"),
            Self::Push => write!(f, "push"),
        }
    }
}

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Options controlling a release run.
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// The target: an explicit version or a bump keyword (e.g. `"patch"`).
    pub target: String,
    /// Pre-release identifier for `pre*` bumps (e.g. `"beta"`).
    pub preid: Option<String>,
    /// Skip git push (still commits and tags locally).
    pub no_push: bool,
    /// Treat changelog warnings as fatal.
    pub strict: bool,
}

// ──────────────────────────────────────────────
// Steps and events
// ──────────────────────────────────────────────

/// Steps of release execution, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStep {
    /// Write the resolved version into the metadata documents.
    Metadata,
    /// Promote the unreleased section into a dated entry.
    Changelog,
    /// Run the external checks command.
    Checks,
    /// Create the release commit.
    Commit,
    /// Create the annotated tag.
    Tag,
    /// Push the branch and tags.
    Push,
}

impl std::fmt::Display for ReleaseStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::Changelog => write!(f, "changelog"),
            Self::Checks => write!(f, "checks"),
            Self::Commit => write!(f, "commit"),
            Self::Tag => write!(f, "tag"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Events emitted during execution for progress reporting.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A step has started.
    StepStarted(ReleaseStep),
    /// A step has completed.
    StepCompleted(ReleaseStep, StepOutcome),
}

/// Outcome of a single step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StepOutcome {
    /// Step completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Step was skipped.
    Skipped {
        /// Why the step was skipped.
        reason: String,
    },
}

/// Outcome of a completed release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// The released version.
    pub version: Version,
    /// The version the project carried before.
    pub previous: Version,
    /// The created tag, named exactly as the version.
    pub tag: String,
    /// The release commit hash.
    pub commit: String,
    /// The branch that was pushed (`None` when push was skipped).
    pub branch: Option<String>,
    /// Whether the push happened.
    pub pushed: bool,
    /// The promoted release notes.
    pub notes: String,
    /// Files mutated on disk.
    pub files: Vec<String>,
    /// Results of each step.
    pub steps: Vec<(ReleaseStep, StepOutcome)>,
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// The resolved release plan, shown to the operator before confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlan {
    /// The version currently recorded in the metadata documents.
    pub current: Version,
    /// The version being released.
    pub next: Version,
    /// Whether the bump falls under the pre-release branch policy.
    pub is_prerelease: bool,
    /// Whether push will be skipped.
    pub no_push: bool,
    /// Whether changelog warnings abort the run.
    pub strict: bool,
    /// The checks command that will run, if any.
    pub checks: Option<String>,
    /// The remote the branch and tags go to.
    pub remote: String,
    /// The current branch, when known.
    pub branch: Option<String>,
}

/// A release that has passed every pre-mutation gate.
#[derive(Debug)]
pub struct ReadyRelease {
    /// The resolved plan, for display.
    pub plan: ReleasePlan,
    /// Parser warnings surfaced during planning.
    pub warnings: Vec<String>,
    /// Whether a placeholder bullet was injected for an empty
    /// unreleased section.
    pub placeholder_injected: bool,
    /// The loaded project state, mutated during execution.
    pub project: ProjectInfo,
    /// The parsed changelog, promoted during execution.
    pub changelog: Changelog,
}

/// Plan a release: verify project state, parse the changelog, resolve the
/// next version, and apply branch policy.
///
/// Nothing on disk is touched. The returned [`ReadyRelease`] carries
/// everything [`ReadyRelease::execute`] needs.
#[instrument(skip(config, options), fields(%root, target = %options.target))]
pub fn plan_release(
    root: &Utf8Path,
    config: &Config,
    options: ReleaseOptions,
) -> ReleaseResult<ReadyRelease> {
    // Verify cross-document state
    let paths = ProjectPaths::resolve(root, config.project.as_ref());
    let project = ProjectInfo::load(paths)?;
    project.verify()?;
    let current = version::parse_version(project.version())?;

    // Parse the changelog; strict mode turns warnings fatal
    let mut log = changelog::load(&project.paths.changelog)?;
    if options.strict && !log.warnings.is_empty() {
        return Err(ReleaseError::StrictWarnings {
            warnings: std::mem::take(&mut log.warnings),
        });
    }

    // Ensure releasable content. The parser recovers a missing unreleased
    // section, so the insert below is a defensive re-check.
    if log.unreleased().is_none() {
        log.entries.insert(
            0,
            ChangelogEntry {
                version: EntryVersion::Unreleased,
                header: changelog::UNRELEASED_HEADING.to_string(),
                content: String::new(),
            },
        );
    }
    let mut placeholder_injected = false;
    if let Some(entry) = log.unreleased_mut()
        && entry.content.is_empty()
    {
        if options.strict {
            return Err(ReleaseError::Changelog(
                ChangelogError::MissingUnreleasedContent,
            ));
        }
        entry.content = PLACEHOLDER_NOTE.to_string();
        placeholder_injected = true;
        debug!("injected placeholder release note");
    }

    // Resolve the next version against the recorded history
    let arg = VersionArg::parse(&options.target)?;
    let resolved = version::resolve_next(
        &current,
        &arg,
        options.preid.as_deref(),
        log.released_versions(),
    )?;

    // Branch policy: no pre-release bumps from the default branch
    let (branch, default) = branch_names();
    if resolved.is_prerelease_bump {
        check_branch_policy(branch.as_deref(), default.as_deref())?;
    }

    let checks = resolve_checks(config, &project)?;
    let remote = config
        .release
        .as_ref()
        .and_then(|r| r.remote.clone())
        .unwrap_or_else(|| "origin".to_string());

    info!(current = %current, next = %resolved.version, "release planned");

    Ok(ReadyRelease {
        plan: ReleasePlan {
            current,
            next: resolved.version,
            is_prerelease: resolved.is_prerelease_bump,
            no_push: options.no_push,
            strict: options.strict,
            checks,
            remote,
            branch,
        },
        warnings: std::mem::take(&mut log.warnings),
        placeholder_injected,
        project,
        changelog: log,
    })
}

/// Branch names for policy and display, best-effort.
///
/// Environment overrides win; otherwise git is queried, and a failed
/// query leaves the name unknown.
fn branch_names() -> (Option<String>, Option<String>) {
    let current = std::env::var(ENV_BRANCH)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| git::current_branch().ok().flatten());
    let default = std::env::var(ENV_DEFAULT_BRANCH)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| git::default_branch().ok().flatten());
    (current, default)
}

/// Reject a pre-release when both branch names are known and equal.
fn check_branch_policy(current: Option<&str>, default: Option<&str>) -> ReleaseResult<()> {
    if let (Some(cur), Some(def)) = (current, default)
        && cur == def
    {
        return Err(ReleaseError::PrereleaseOnDefaultBranch {
            branch: cur.to_string(),
        });
    }
    Ok(())
}

/// Decide the external checks command, if any.
///
/// A config override always wins. Otherwise `npm run build` is used when
/// `package.json` declares a `build` script; a declared build script
/// without `npm` on `PATH` is a failure, not a silent skip.
fn resolve_checks(config: &Config, project: &ProjectInfo) -> ReleaseResult<Option<String>> {
    if let Some(command) = config.release.as_ref().and_then(|r| r.checks.clone()) {
        return Ok(Some(command));
    }
    if !project.package.has_script("build") {
        return Ok(None);
    }
    if which::which("npm").is_err() {
        return Err(ReleaseError::ChecksFailed {
            command: NPM_BUILD.to_string(),
            detail: "package.json declares a build script but npm is not on PATH".to_string(),
        });
    }
    Ok(Some(NPM_BUILD.to_string()))
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

impl ReadyRelease {
    /// Execute the release: mutate metadata, rewrite the changelog, run
    /// checks, then commit, tag, and push.
    ///
    /// Calls `on_event` at step boundaries so the CLI can update progress
    /// display. A failure after the metadata step leaves the mutated
    /// files on disk; recovery is manual.
    #[instrument(skip(self, on_event), fields(
        version = %self.plan.next,
        no_push = self.plan.no_push
    ))]
    pub fn execute(
        mut self,
        root: &Utf8Path,
        mut on_event: impl FnMut(ReleaseEvent),
    ) -> ReleaseResult<ReleaseOutcome> {
        let mut steps = Vec::new();
        let next = self.plan.next.clone();
        let next_str = next.to_string();

        // ── Metadata ──
        on_event(ReleaseEvent::StepStarted(ReleaseStep::Metadata));
        let newly_recorded = self.project.apply_version(&next_str);
        if !newly_recorded {
            warn!(version = %next, "versions map already records this release");
        }
        self.project.save()?;
        let outcome = StepOutcome::Success {
            message: format!("Metadata updated to {next}"),
        };
        on_event(ReleaseEvent::StepCompleted(
            ReleaseStep::Metadata,
            outcome.clone(),
        ));
        steps.push((ReleaseStep::Metadata, outcome));

        // ── Changelog ──
        on_event(ReleaseEvent::StepStarted(ReleaseStep::Changelog));
        let promotion = changelog::promote(&self.changelog, &next)?;
        changelog::save(&self.project.paths.changelog, &promotion.text)?;
        let outcome = StepOutcome::Success {
            message: format!("Promoted unreleased changes to {next}"),
        };
        on_event(ReleaseEvent::StepCompleted(
            ReleaseStep::Changelog,
            outcome.clone(),
        ));
        steps.push((ReleaseStep::Changelog, outcome));

        // ── Checks ──
        on_event(ReleaseEvent::StepStarted(ReleaseStep::Checks));
        let outcome = match self.plan.checks.as_deref() {
            Some(command) => {
                run_checks(root, command)?;
                StepOutcome::Success {
                    message: format!("Checks passed ({command})"),
                }
            }
            None => StepOutcome::Skipped {
                reason: "no checks command configured or detected".to_string(),
            },
        };
        on_event(ReleaseEvent::StepCompleted(
            ReleaseStep::Checks,
            outcome.clone(),
        ));
        steps.push((ReleaseStep::Checks, outcome));

        // ── Commit ──
        on_event(ReleaseEvent::StepStarted(ReleaseStep::Commit));
        let files: Vec<String> = self
            .project
            .release_files()
            .iter()
            .map(|p| p.to_string())
            .collect();
        let file_args: Vec<&str> = files.iter().map(String::as_str).collect();
        let commit_message = format!("{COMMIT_PREFIX}{next}\n\n{}", promotion.notes);
        let commit = git::commit(&file_args, &commit_message).map_err(|source| {
            ReleaseError::Git {
                step: GitStep::Commit,
                source,
            }
        })?;
        let outcome = StepOutcome::Success {
            message: format!("Committed {commit}"),
        };
        on_event(ReleaseEvent::StepCompleted(
            ReleaseStep::Commit,
            outcome.clone(),
        ));
        steps.push((ReleaseStep::Commit, outcome));

        // ── Tag ── (named exactly as the version string, no prefix)
        on_event(ReleaseEvent::StepStarted(ReleaseStep::Tag));
        let tag = next_str.clone();
        let tag_message = format!("Release {next}\n\n{}", promotion.notes);
        git::create_tag(&tag, &tag_message).map_err(|source| ReleaseError::Git {
            step: GitStep::Tag,
            source,
        })?;
        let outcome = StepOutcome::Success {
            message: format!("Tagged {tag}"),
        };
        on_event(ReleaseEvent::StepCompleted(ReleaseStep::Tag, outcome.clone()));
        steps.push((ReleaseStep::Tag, outcome));

        // ── Push ──
        on_event(ReleaseEvent::StepStarted(ReleaseStep::Push));
        let (branch, pushed, outcome) = if self.plan.no_push {
            (
                None,
                false,
                StepOutcome::Skipped {
                    reason: "--no-push flag".to_string(),
                },
            )
        } else {
            let branch = git::current_branch()
                .map_err(|source| ReleaseError::Git {
                    step: GitStep::Push,
                    source,
                })?
                .unwrap_or_else(|| "HEAD".to_string());
            let remote = &self.plan.remote;
            git::push(remote, &branch).map_err(|source| ReleaseError::Git {
                step: GitStep::Push,
                source,
            })?;
            git::push_tags(remote).map_err(|source| ReleaseError::Git {
                step: GitStep::Push,
                source,
            })?;
            let message = format!("Pushed {branch} and tags to {remote}");
            (Some(branch), true, StepOutcome::Success { message })
        };
        on_event(ReleaseEvent::StepCompleted(
            ReleaseStep::Push,
            outcome.clone(),
        ));
        steps.push((ReleaseStep::Push, outcome));

        let outcome = ReleaseOutcome {
            version: next,
            previous: self.plan.current,
            tag,
            commit,
            branch,
            pushed,
            notes: promotion.notes,
            files,
            steps,
        };

        info!(
            version = %outcome.version,
            tag = %outcome.tag,
            pushed = outcome.pushed,
            "release complete"
        );

        Ok(outcome)
    }
}

/// Run the checks command through the shell, treating non-zero exit as
/// fatal.
fn run_checks(root: &Utf8Path, command: &str) -> ReleaseResult<()> {
    debug!(%command, "running checks");

    let output = Command::new("sh")
        .args(["-c", command])
        .current_dir(root.as_std_path())
        .output()
        .map_err(|e| ReleaseError::ChecksFailed {
            command: command.to_string(),
            detail: format!("failed to execute: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if stderr.is_empty() {
            format!("exit status {}", output.status)
        } else {
            stderr
        };
        return Err(ReleaseError::ChecksFailed {
            command: command.to_string(),
            detail,
        });
    }

    Ok(())
}
