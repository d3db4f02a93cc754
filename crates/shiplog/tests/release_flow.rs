//! End-to-end release workflow tests
//!
//! Each test builds a throwaway project (the metadata trio plus a changelog)
//! in a temp directory, usually inside a real git repository, then drives the
//! compiled binary through a release and inspects files, tags, and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CHANGELOG: &str = "\
# Changelog

## [Unreleased]

- Added widget polish

## [1.2.3] - 2024-01-01

- Initial release
";

/// Returns a Command configured to run our binary inside `dir`.
///
/// Branch-policy and logging environment variables are cleared so tests
/// control them explicitly; log output is routed into the fixture.
#[allow(deprecated)]
fn cmd_in(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("SHIPLOG_BRANCH")
        .env_remove("SHIPLOG_DEFAULT_BRANCH")
        .env_remove("SHIPLOG_LOG_PATH")
        .env("SHIPLOG_LOG_DIR", dir.join(".logs"));
    cmd
}

fn write_project_version(dir: &Path, version: &str) {
    fs::write(
        dir.join("manifest.json"),
        format!(
            r#"{{"id": "sample-plugin", "name": "Sample", "version": "{version}", "minAppVersion": "0.15.0"}}"#
        ),
    )
    .unwrap();
    fs::write(
        dir.join("package.json"),
        format!(r#"{{"name": "sample-plugin", "version": "{version}"}}"#),
    )
    .unwrap();
    fs::write(
        dir.join("versions.json"),
        format!(r#"{{"{version}": "0.15.0"}}"#),
    )
    .unwrap();
}

fn write_project(dir: &Path) {
    write_project_version(dir, "1.2.3");
    fs::write(dir.join("CHANGELOG.md"), CHANGELOG).unwrap();
}

/// Initialize a git repository on `main` with one commit so the commit and
/// tag steps have a parent to build on.
fn init_git(dir: &Path) {
    git(dir, &["init", "-b", "main"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "tag.gpgSign", "false"]);
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-m", "init"]);
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git runs");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

// =============================================================================
// Happy Path
// =============================================================================

#[test]
fn patch_release_updates_files_and_tags() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);
    init_git(dir);

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Released"))
        .stdout(predicate::str::contains("(1.2.3 → 1.2.4)"))
        .stdout(predicate::str::contains("git push origin main"))
        .stdout(predicate::str::contains("git push origin --tags"))
        .stdout(predicate::str::contains("git tag -d 1.2.4"))
        .stdout(predicate::str::contains("git reset --hard HEAD~1"));

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.4\""));
    assert!(read(dir, "package.json").contains("\"version\": \"1.2.4\""));
    let versions = read(dir, "versions.json");
    assert!(versions.contains("\"1.2.4\": \"0.15.0\""));
    assert!(versions.contains("\"1.2.3\": \"0.15.0\""));

    let changelog = read(dir, "CHANGELOG.md");
    assert!(changelog.contains("## [Unreleased]"));
    assert!(changelog.contains("## [1.2.4] - "));
    assert!(changelog.contains("- Added widget polish"));
    assert!(changelog.contains("## [1.2.3] - 2024-01-01"));

    let tags = git(dir, &["tag", "--list"]);
    assert_eq!(tags.trim(), "1.2.4");
    let tag_line = git(dir, &["tag", "-n1", "--list", "1.2.4"]);
    assert!(tag_line.contains("Release 1.2.4"));
    let subject = git(dir, &["log", "-1", "--format=%s"]);
    assert_eq!(subject.trim(), "chore: release 1.2.4");
}

#[test]
fn v_prefixed_explicit_target_tags_without_prefix() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);
    init_git(dir);

    cmd_in(dir)
        .args(["v2.0.0", "--yes", "--no-push"])
        .assert()
        .success();

    assert!(read(dir, "manifest.json").contains("\"version\": \"2.0.0\""));
    let tags = git(dir, &["tag", "--list"]);
    assert_eq!(tags.trim(), "2.0.0");
}

#[test]
fn quiet_suppresses_stdout() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);
    init_git(dir);

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.4\""));
}

// =============================================================================
// Confirmation
// =============================================================================

#[test]
fn non_interactive_without_yes_aborts_before_mutation() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);

    cmd_in(dir)
        .args(["patch", "--no-push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--yes"));

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.3\""));
    assert_eq!(read(dir, "CHANGELOG.md"), CHANGELOG);
}

// =============================================================================
// Changelog Gates
// =============================================================================

#[test]
fn strict_mode_aborts_before_mutation() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project_version(dir, "1.2.3");
    let changelog = "# Changelog\n\n## [1.2.3] - 2024-01-01\n\n- Initial release\n";
    fs::write(dir.join("CHANGELOG.md"), changelog).unwrap();

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push", "--strict"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("strict mode aborted"))
        .stderr(predicate::str::contains("Missing [Unreleased] section"));

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.3\""));
    assert_eq!(read(dir, "CHANGELOG.md"), changelog);
}

#[test]
fn empty_unreleased_releases_placeholder() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project_version(dir, "1.2.3");
    fs::write(
        dir.join("CHANGELOG.md"),
        "# Changelog\n\n## [Unreleased]\n\n## [1.2.3] - 2024-01-01\n\n- Initial release\n",
    )
    .unwrap();
    init_git(dir);

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push"])
        .assert()
        .success()
        .stderr(predicate::str::contains("placeholder entry"));

    let changelog = read(dir, "CHANGELOG.md");
    assert!(changelog.contains("## [1.2.4] - "));
    assert!(changelog.contains("- No notable changes recorded."));
}

// =============================================================================
// Version History Gates
// =============================================================================

#[test]
fn recorded_newer_version_aborts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project_version(dir, "1.2.3");
    fs::write(
        dir.join("CHANGELOG.md"),
        "# Changelog\n\n## [Unreleased]\n\n- Pending\n\n## [9.9.9] - 2024-05-01\n\n- Future\n",
    )
    .unwrap();

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("refusing to release out of order"));

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.3\""));
}

#[test]
fn already_recorded_version_aborts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project_version(dir, "1.2.3");
    fs::write(
        dir.join("CHANGELOG.md"),
        "# Changelog\n\n## [Unreleased]\n\n- Pending\n\n## [1.2.4] - 2024-05-01\n\n- Oops\n",
    )
    .unwrap();

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("refusing to release it twice"));

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.3\""));
}

// =============================================================================
// Branch Policy
// =============================================================================

#[test]
fn prerelease_bump_on_default_branch_aborts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);
    init_git(dir);

    cmd_in(dir)
        .args(["prepatch", "--preid", "beta", "--yes", "--no-push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "not allowed on the default branch",
        ));

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.3\""));
    assert_eq!(git(dir, &["tag", "--list"]).trim(), "");
}

#[test]
fn branch_env_overrides_are_honored() {
    // No git repository at all: both names come from the environment.
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);

    cmd_in(dir)
        .env("SHIPLOG_BRANCH", "main")
        .env("SHIPLOG_DEFAULT_BRANCH", "main")
        .args(["prepatch", "--preid", "beta", "--yes", "--no-push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "not allowed on the default branch",
        ));

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.3\""));
}

#[test]
fn prerelease_bump_on_feature_branch_succeeds() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);
    init_git(dir);
    git(dir, &["checkout", "-b", "release/next"]);

    cmd_in(dir)
        .args(["prepatch", "--preid", "beta", "--yes", "--no-push"])
        .assert()
        .success();

    // The dotted pre-release collapses to the compatibility form everywhere.
    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.4-beta0\""));
    assert!(read(dir, "versions.json").contains("\"1.2.4-beta0\": \"0.15.0\""));
    assert!(read(dir, "CHANGELOG.md").contains("## [1.2.4-beta0] - "));
    assert_eq!(git(dir, &["tag", "--list"]).trim(), "1.2.4-beta0");
}

#[test]
fn bump_from_a_prerelease_line_is_policed_on_default_branch() {
    // `patch` on 1.2.3-beta0 resolves to the stable 1.2.3, but bumping away
    // from a pre-release line still falls under the branch policy.
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project_version(dir, "1.2.3-beta0");
    fs::write(
        dir.join("CHANGELOG.md"),
        "# Changelog\n\n## [Unreleased]\n\n- Stabilized\n\n## [1.2.3-beta0] - 2024-02-01\n\n- Beta\n",
    )
    .unwrap();

    cmd_in(dir)
        .env("SHIPLOG_BRANCH", "main")
        .env("SHIPLOG_DEFAULT_BRANCH", "main")
        .args(["patch", "--yes", "--no-push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "not allowed on the default branch",
        ));

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.3-beta0\""));
}

#[test]
fn explicit_version_bypasses_branch_policy() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project_version(dir, "1.2.3-beta0");
    fs::write(
        dir.join("CHANGELOG.md"),
        "# Changelog\n\n## [Unreleased]\n\n- Stabilized\n\n## [1.2.3-beta0] - 2024-02-01\n\n- Beta\n",
    )
    .unwrap();
    init_git(dir);

    // Finalizing on the default branch takes an explicit version; only
    // keyword bumps are policed.
    cmd_in(dir)
        .env("SHIPLOG_BRANCH", "main")
        .env("SHIPLOG_DEFAULT_BRANCH", "main")
        .args(["1.2.3", "--yes", "--no-push"])
        .assert()
        .success();

    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.3\""));
    assert!(read(dir, "versions.json").contains("\"1.2.3\": \"0.15.0\""));
    assert_eq!(git(dir, &["tag", "--list"]).trim(), "1.2.3");
}

// =============================================================================
// Checks
// =============================================================================

#[test]
fn checks_from_config_run_in_project_root() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);
    fs::write(
        dir.join(".shiplog.toml"),
        "[release]\nchecks = \"touch checks-ran.txt\"\n",
    )
    .unwrap();
    init_git(dir);

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push"])
        .assert()
        .success();

    assert!(dir.join("checks-ran.txt").exists());
}

#[test]
fn failing_checks_abort_without_rollback() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);
    fs::write(
        dir.join(".shiplog.toml"),
        "[release]\nchecks = \"echo build exploded >&2; exit 3\"\n",
    )
    .unwrap();
    init_git(dir);

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("checks failed"))
        .stderr(predicate::str::contains("build exploded"));

    // Metadata and changelog were already rewritten; nothing was committed.
    assert!(read(dir, "manifest.json").contains("\"version\": \"1.2.4\""));
    assert!(read(dir, "CHANGELOG.md").contains("## [1.2.4] - "));
    assert_eq!(git(dir, &["log", "--format=%s"]).trim(), "init");
    assert_eq!(git(dir, &["tag", "--list"]).trim(), "");
}

// =============================================================================
// Remote Configuration
// =============================================================================

#[test]
fn configured_remote_appears_in_followup() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_project(dir);
    fs::write(dir.join(".shiplog.toml"), "[release]\nremote = \"upstream\"\n").unwrap();
    init_git(dir);

    cmd_in(dir)
        .args(["patch", "--yes", "--no-push"])
        .assert()
        .success()
        .stdout(predicate::str::contains("git push upstream main"))
        .stdout(predicate::str::contains("git push upstream --tags"));
}
