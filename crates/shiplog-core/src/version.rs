//! Version resolution: bump keywords, increment math, and history checks.
//!
//! The resolver turns a target argument (an explicit version or a bump
//! keyword) into the next version, applying node-style increment semantics,
//! compatibility normalization of the pre-release tag, and a monotonicity
//! check against the versions the changelog already records. It is pure:
//! no I/O, no logging.

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// The argument is neither a bump keyword nor a valid version.
    #[error(
        "invalid version `{0}` (expected a semantic version or one of: major, minor, patch, premajor, preminor, prepatch, prerelease)"
    )]
    InvalidVersion(String),

    /// The pre-release identifier is not a valid semver identifier.
    #[error("invalid pre-release identifier `{0}`")]
    InvalidPreid(String),

    /// The changelog records a version newer than the one being released.
    #[error(
        "changelog already records {recorded}, which is newer than {next}; refusing to release out of order"
    )]
    Conflict {
        /// The recorded version that is ahead.
        recorded: Version,
        /// The version being released.
        next: Version,
    },

    /// The changelog already records this exact version.
    #[error("changelog already records {0}; refusing to release it twice")]
    Duplicate(Version),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    /// Major release (X.0.0).
    Major,
    /// Minor release (x.Y.0).
    Minor,
    /// Patch release (x.y.Z).
    Patch,
    /// Pre-release of the next major version.
    Premajor,
    /// Pre-release of the next minor version.
    Preminor,
    /// Pre-release of the next patch version.
    Prepatch,
    /// Next pre-release, or pre-release of the next patch from a stable.
    Prerelease,
}

impl BumpKind {
    /// Whether this keyword denotes a pre-release bump kind.
    #[must_use]
    pub const fn is_prerelease(self) -> bool {
        matches!(
            self,
            Self::Premajor | Self::Preminor | Self::Prepatch | Self::Prerelease
        )
    }
}

impl std::str::FromStr for BumpKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "major" => Self::Major,
            "minor" => Self::Minor,
            "patch" => Self::Patch,
            "premajor" => Self::Premajor,
            "preminor" => Self::Preminor,
            "prepatch" => Self::Prepatch,
            "prerelease" => Self::Prerelease,
            _ => return Err(()),
        })
    }
}

impl std::fmt::Display for BumpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Premajor => "premajor",
            Self::Preminor => "preminor",
            Self::Prepatch => "prepatch",
            Self::Prerelease => "prerelease",
        };
        write!(f, "{name}")
    }
}

/// A release target: a literal version or a bump keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionArg {
    /// Use this version verbatim.
    Explicit(Version),
    /// Increment the current version.
    Bump(BumpKind),
}

impl VersionArg {
    /// Parse a target argument. Keywords win; literals accept a leading `v`.
    pub fn parse(s: &str) -> VersionResult<Self> {
        if let Ok(kind) = s.parse::<BumpKind>() {
            return Ok(Self::Bump(kind));
        }
        parse_version(s)
            .map(Self::Explicit)
            .map_err(|_| VersionError::InvalidVersion(s.to_string()))
    }
}

/// Parse a version string, stripping an optional `v` prefix.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let s = s.strip_prefix('v').unwrap_or(s);
    Ok(Version::parse(s)?)
}

/// Compute the next version for a bump keyword, matching node-semver
/// increment behavior (a stable bump from a pre-release of that level
/// finalizes it instead of skipping ahead).
#[must_use]
pub fn increment(current: &Version, kind: BumpKind, preid: Option<&str>) -> Version {
    let mut next = current.clone();
    next.build = BuildMetadata::EMPTY;
    match kind {
        BumpKind::Major => {
            if next.minor != 0 || next.patch != 0 || next.pre.is_empty() {
                next.major += 1;
            }
            next.minor = 0;
            next.patch = 0;
            next.pre = Prerelease::EMPTY;
        }
        BumpKind::Minor => {
            if next.patch != 0 || next.pre.is_empty() {
                next.minor += 1;
            }
            next.patch = 0;
            next.pre = Prerelease::EMPTY;
        }
        BumpKind::Patch => {
            if next.pre.is_empty() {
                next.patch += 1;
            }
            next.pre = Prerelease::EMPTY;
        }
        BumpKind::Premajor => {
            next.major += 1;
            next.minor = 0;
            next.patch = 0;
            next.pre = initial_pre(preid);
        }
        BumpKind::Preminor => {
            next.minor += 1;
            next.patch = 0;
            next.pre = initial_pre(preid);
        }
        BumpKind::Prepatch => {
            next.patch += 1;
            next.pre = initial_pre(preid);
        }
        BumpKind::Prerelease => {
            if next.pre.is_empty() {
                next.patch += 1;
                next.pre = initial_pre(preid);
            } else {
                next.pre = bump_pre(&next.pre, preid);
            }
        }
    }
    next
}

/// First pre-release tag: `<preid>.0`, or bare `0` without an identifier.
fn initial_pre(preid: Option<&str>) -> Prerelease {
    let tag = preid.map_or_else(|| "0".to_string(), |id| format!("{id}.0"));
    Prerelease::new(&tag).unwrap_or(Prerelease::EMPTY)
}

/// Advance an existing pre-release tag: bump the rightmost numeric
/// identifier (appending `.0` when there is none), then reset to
/// `<preid>.0` when the identifier changes.
fn bump_pre(pre: &Prerelease, preid: Option<&str>) -> Prerelease {
    let mut parts: Vec<String> = pre.as_str().split('.').map(str::to_string).collect();

    let mut bumped = false;
    for part in parts.iter_mut().rev() {
        if let Ok(n) = part.parse::<u64>() {
            *part = (n + 1).to_string();
            bumped = true;
            break;
        }
    }
    if !bumped {
        parts.push("0".to_string());
    }

    if let Some(id) = preid {
        let keeps = parts.first().is_some_and(|p| p == id)
            && parts.get(1).is_some_and(|p| p.parse::<u64>().is_ok());
        if !keeps {
            parts = vec![id.to_string(), "0".to_string()];
        }
    }

    Prerelease::new(&parts.join(".")).unwrap_or(Prerelease::EMPTY)
}

/// Collapse a two-part `identifier.number` pre-release into
/// `identifier<number>` (`beta.0` → `beta0`), for consumers whose
/// compatible-range matching treats the dotted form as a distinct channel.
/// Anything else passes through untouched.
#[must_use]
pub fn normalize_compat(version: &Version) -> Version {
    let parts: Vec<&str> = version.pre.split('.').collect();
    let [ident, number] = parts.as_slice() else {
        return version.clone();
    };
    if ident.is_empty()
        || ident.ends_with(|c: char| c.is_ascii_digit())
        || !number.chars().all(|c| c.is_ascii_digit())
    {
        return version.clone();
    }
    let mut next = version.clone();
    if let Ok(pre) = Prerelease::new(&format!("{ident}{number}")) {
        next.pre = pre;
    }
    next
}

/// Outcome of version resolution.
#[derive(Debug, Clone)]
pub struct ResolvedVersion {
    /// The next version, compatibility-normalized.
    pub version: Version,
    /// Whether the bump falls under the pre-release branch policy: the
    /// keyword is a pre-release kind, or the current version already
    /// carries a pre-release component. Explicit targets are never
    /// classified.
    pub is_prerelease_bump: bool,
}

/// Resolve the next version from a target argument.
///
/// `recorded` is the changelog's released history: a recorded version
/// greater than the resolved one is a [`VersionError::Conflict`], an equal
/// one a [`VersionError::Duplicate`].
pub fn resolve_next<'a, I>(
    current: &Version,
    arg: &VersionArg,
    preid: Option<&str>,
    recorded: I,
) -> VersionResult<ResolvedVersion>
where
    I: IntoIterator<Item = &'a Version>,
{
    if let Some(id) = preid
        && Prerelease::new(id).is_err()
    {
        return Err(VersionError::InvalidPreid(id.to_string()));
    }

    let (next, is_prerelease_bump) = match arg {
        VersionArg::Explicit(v) => (v.clone(), false),
        VersionArg::Bump(kind) => {
            let next = increment(current, *kind, preid);
            let is_pre = kind.is_prerelease() || !current.pre.is_empty();
            (next, is_pre)
        }
    };
    let next = normalize_compat(&next);

    for v in recorded {
        if *v > next {
            return Err(VersionError::Conflict {
                recorded: v.clone(),
                next,
            });
        }
        if *v == next {
            return Err(VersionError::Duplicate(next));
        }
    }

    Ok(ResolvedVersion {
        version: next,
        is_prerelease_bump,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn bump(current: &str, kind: BumpKind, preid: Option<&str>) -> String {
        increment(&v(current), kind, preid).to_string()
    }

    #[test]
    fn keywords_parse() {
        for (s, kind) in [
            ("major", BumpKind::Major),
            ("minor", BumpKind::Minor),
            ("patch", BumpKind::Patch),
            ("premajor", BumpKind::Premajor),
            ("preminor", BumpKind::Preminor),
            ("prepatch", BumpKind::Prepatch),
            ("prerelease", BumpKind::Prerelease),
        ] {
            assert_eq!(VersionArg::parse(s).unwrap(), VersionArg::Bump(kind));
        }
    }

    #[test]
    fn explicit_versions_parse_with_optional_v() {
        assert_eq!(
            VersionArg::parse("v1.2.3").unwrap(),
            VersionArg::Explicit(v("1.2.3"))
        );
        assert_eq!(
            VersionArg::parse("2.0.0-rc.1").unwrap(),
            VersionArg::Explicit(v("2.0.0-rc.1"))
        );
    }

    #[test]
    fn garbage_argument_is_invalid() {
        let err = VersionArg::parse("not-a-version").unwrap_err();
        assert!(matches!(err, VersionError::InvalidVersion(_)));
        assert!(err.to_string().contains("not-a-version"));
    }

    #[test]
    fn stable_bumps() {
        assert_eq!(bump("1.2.3", BumpKind::Patch, None), "1.2.4");
        assert_eq!(bump("1.2.3", BumpKind::Minor, None), "1.3.0");
        assert_eq!(bump("1.2.3", BumpKind::Major, None), "2.0.0");
    }

    #[test]
    fn stable_bump_finalizes_a_prerelease() {
        assert_eq!(bump("1.2.3-rc.1", BumpKind::Patch, None), "1.2.3");
        assert_eq!(bump("1.2.0-rc.1", BumpKind::Minor, None), "1.2.0");
        assert_eq!(bump("2.0.0-rc.1", BumpKind::Major, None), "2.0.0");
        // Pre-release of a lower level does not hold back the bump.
        assert_eq!(bump("1.2.3-rc.1", BumpKind::Minor, None), "1.3.0");
        assert_eq!(bump("1.2.3-rc.1", BumpKind::Major, None), "2.0.0");
    }

    #[test]
    fn pre_bumps_open_a_new_level() {
        assert_eq!(bump("1.2.3", BumpKind::Premajor, Some("beta")), "2.0.0-beta.0");
        assert_eq!(bump("1.2.3", BumpKind::Preminor, Some("beta")), "1.3.0-beta.0");
        assert_eq!(bump("1.2.3", BumpKind::Prepatch, Some("beta")), "1.2.4-beta.0");
        assert_eq!(bump("1.2.3", BumpKind::Prepatch, None), "1.2.4-0");
    }

    #[test]
    fn prerelease_walks_the_numeric_suffix() {
        assert_eq!(bump("1.0.0", BumpKind::Prerelease, Some("beta")), "1.0.1-beta.0");
        assert_eq!(bump("1.0.1-beta.0", BumpKind::Prerelease, Some("beta")), "1.0.1-beta.1");
        assert_eq!(bump("1.0.1-beta", BumpKind::Prerelease, Some("beta")), "1.0.1-beta.0");
        assert_eq!(bump("1.0.1-5", BumpKind::Prerelease, None), "1.0.1-6");
        assert_eq!(bump("1.2.3", BumpKind::Prerelease, None), "1.2.4-0");
    }

    #[test]
    fn prerelease_identifier_change_resets_the_counter() {
        assert_eq!(
            bump("1.0.1-alpha.4", BumpKind::Prerelease, Some("beta")),
            "1.0.1-beta.0"
        );
    }

    #[test]
    fn build_metadata_never_survives_a_bump() {
        assert_eq!(bump("1.2.3+build.7", BumpKind::Patch, None), "1.2.4");
        assert_eq!(
            bump("1.0.0+beta", BumpKind::Prerelease, Some("beta")),
            "1.0.1-beta.0"
        );
    }

    #[test]
    fn normalization_collapses_dotted_numeric_suffix() {
        assert_eq!(normalize_compat(&v("1.0.1-beta.0")).to_string(), "1.0.1-beta0");
        assert_eq!(normalize_compat(&v("2.0.0-rc.12")).to_string(), "2.0.0-rc12");
    }

    #[test]
    fn normalization_leaves_other_shapes_alone() {
        for s in ["1.2.3", "1.2.3-beta", "1.2.3-0.1", "1.2.3-rc.1.2", "1.2.3-beta1.2"] {
            assert_eq!(normalize_compat(&v(s)), v(s), "{s}");
        }
    }

    #[test]
    fn resolves_prerelease_with_compat_tag() {
        let resolved = resolve_next(
            &v("1.0.0"),
            &VersionArg::Bump(BumpKind::Prerelease),
            Some("beta"),
            [],
        )
        .unwrap();
        assert_eq!(resolved.version.to_string(), "1.0.1-beta0");
        assert!(resolved.is_prerelease_bump);
    }

    #[test]
    fn every_bump_strictly_increases() {
        for current in ["1.2.3", "1.2.3-alpha.1", "0.1.0"] {
            let current = v(current);
            for kind in [
                BumpKind::Major,
                BumpKind::Minor,
                BumpKind::Patch,
                BumpKind::Premajor,
                BumpKind::Preminor,
                BumpKind::Prepatch,
                BumpKind::Prerelease,
            ] {
                let resolved =
                    resolve_next(&current, &VersionArg::Bump(kind), Some("beta"), []).unwrap();
                assert!(
                    resolved.version > current,
                    "{kind} on {current} gave {}",
                    resolved.version
                );
            }
        }
    }

    #[test]
    fn recorded_newer_version_is_a_conflict() {
        let recorded = [v("2.0.0"), v("1.2.0")];
        let err = resolve_next(
            &v("1.2.3"),
            &VersionArg::Bump(BumpKind::Patch),
            None,
            &recorded,
        )
        .unwrap_err();
        match err {
            VersionError::Conflict { recorded, next } => {
                assert_eq!(recorded.to_string(), "2.0.0");
                assert_eq!(next.to_string(), "1.2.4");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn recorded_equal_version_is_a_duplicate() {
        let recorded = [v("1.2.4")];
        let err = resolve_next(
            &v("1.2.3"),
            &VersionArg::Bump(BumpKind::Patch),
            None,
            &recorded,
        )
        .unwrap_err();
        assert!(matches!(err, VersionError::Duplicate(_)));
    }

    #[test]
    fn older_recorded_versions_are_fine() {
        let recorded = [v("1.2.0"), v("1.0.0"), v("0.9.0")];
        let resolved = resolve_next(
            &v("1.2.3"),
            &VersionArg::Bump(BumpKind::Patch),
            None,
            &recorded,
        )
        .unwrap();
        assert_eq!(resolved.version.to_string(), "1.2.4");
        assert!(!resolved.is_prerelease_bump);
    }

    #[test]
    fn explicit_target_is_used_verbatim_but_normalized() {
        let resolved = resolve_next(
            &v("1.0.0"),
            &VersionArg::Explicit(v("2.0.0-rc.1")),
            None,
            [],
        )
        .unwrap();
        assert_eq!(resolved.version.to_string(), "2.0.0-rc1");
        assert!(!resolved.is_prerelease_bump);
    }

    #[test]
    fn bumping_from_a_prerelease_line_is_classified() {
        // The result is stable, but the bump leaves a pre-release line and
        // stays subject to the branch policy.
        let resolved = resolve_next(
            &v("1.2.3-beta.1"),
            &VersionArg::Bump(BumpKind::Patch),
            None,
            [],
        )
        .unwrap();
        assert_eq!(resolved.version.to_string(), "1.2.3");
        assert!(resolved.is_prerelease_bump);
    }

    #[test]
    fn bad_preid_is_rejected() {
        let err = resolve_next(
            &v("1.0.0"),
            &VersionArg::Bump(BumpKind::Prerelease),
            Some("not ok"),
            [],
        )
        .unwrap_err();
        assert!(matches!(err, VersionError::InvalidPreid(_)));
    }
}
