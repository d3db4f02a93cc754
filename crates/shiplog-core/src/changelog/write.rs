//! Changelog rewriting: promote the pending section into a dated release.

use chrono::{NaiveDate, Utc};
use semver::Version;

use super::{
    Changelog, ChangelogError, ChangelogResult, DEFAULT_TITLE, EntryVersion, UNRELEASED_HEADING,
};

/// Result of promoting the pending section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    /// Complete replacement text for the document.
    pub text: String,
    /// Content of the newly created release entry.
    ///
    /// Seeds the commit and tag messages downstream.
    pub notes: String,
}

/// Promote the unreleased section into a release dated today (UTC).
pub fn promote(log: &Changelog, next: &Version) -> ChangelogResult<Promotion> {
    promote_on(log, next, Utc::now().date_naive())
}

/// Promote the unreleased section into a release entry dated `date`.
///
/// Fails with [`ChangelogError::MissingUnreleasedContent`] when there is no
/// unreleased entry or its content is empty; callers are expected to have
/// placed releasable content there first. Every other entry is reproduced
/// verbatim, in its original order.
pub fn promote_on(log: &Changelog, next: &Version, date: NaiveDate) -> ChangelogResult<Promotion> {
    let notes = log
        .unreleased()
        .map(|e| e.content.clone())
        .filter(|c| !c.is_empty())
        .ok_or(ChangelogError::MissingUnreleasedContent)?;

    let header = format!("## [{next}] - {}", date.format("%Y-%m-%d"));

    let mut lines: Vec<&str> = Vec::new();
    let title = if log.title.is_empty() {
        DEFAULT_TITLE
    } else {
        &log.title
    };
    lines.push(title);
    lines.push("");
    if !log.description.is_empty() {
        lines.push(&log.description);
        lines.push("");
    }
    lines.push(UNRELEASED_HEADING);
    lines.push("");
    push_entry(&mut lines, &header, &notes);
    for entry in &log.entries {
        if entry.version.is_unreleased() {
            continue;
        }
        push_entry(&mut lines, &entry.header, &entry.content);
    }

    let mut text = lines.join("\n");
    text.truncate(text.trim_end().len());
    text.push('\n');

    Ok(Promotion { text, notes })
}

fn push_entry<'a>(lines: &mut Vec<&'a str>, header: &'a str, content: &'a str) {
    lines.push(header);
    lines.push("");
    if !content.is_empty() {
        lines.push(content);
        lines.push("");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::parse;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn next(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn promotes_unreleased_into_dated_entry() {
        let log = parse(
            "# Changelog\n\n## [Unreleased]\n\n- New feature\n\n## [1.2.0] - 2024-01-01\n\n- Old\n",
            "CHANGELOG.md",
        );
        let out = promote_on(&log, &next("1.2.4"), date()).unwrap();
        assert_eq!(out.notes, "- New feature");
        assert_eq!(
            out.text,
            "# Changelog\n\n## [Unreleased]\n\n## [1.2.4] - 2024-06-01\n\n- New feature\n\n## [1.2.0] - 2024-01-01\n\n- Old\n"
        );
    }

    #[test]
    fn prior_entries_survive_verbatim_in_order() {
        let source = "# Log\n\nintro\n\n## [Unreleased]\n\n- pending\n\n## v0.3.0\n\n- c\n\n## Notes\n\nfree text\n\n## (0.1.0)\n\n- a\n";
        let log = parse(source, "CHANGELOG.md");
        let out = promote_on(&log, &next("0.4.0"), date()).unwrap();
        let reparsed = parse(&out.text, "CHANGELOG.md");

        // Same tail: headers and contents unchanged, order intact.
        let before: Vec<_> = log
            .entries
            .iter()
            .filter(|e| !e.version.is_unreleased())
            .map(|e| (e.header.clone(), e.content.clone()))
            .collect();
        let after: Vec<_> = reparsed
            .entries
            .iter()
            .skip(2) // fresh unreleased + the new 0.4.0 entry
            .map(|e| (e.header.clone(), e.content.clone()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(reparsed.description, "intro");
    }

    #[test]
    fn reparse_classifies_the_new_entry() {
        let log = parse("## [Unreleased]\n\n- x\n\n## [1.0.0]\n\n- old\n", "c");
        let out = promote_on(&log, &next("1.1.0"), date()).unwrap();
        let reparsed = parse(&out.text, "c");

        assert_eq!(reparsed.entries[0].version, EntryVersion::Unreleased);
        assert_eq!(reparsed.entries[0].content, "");
        assert_eq!(
            reparsed.entries[1].version,
            EntryVersion::Release(next("1.1.0"))
        );
        assert_eq!(reparsed.entries[1].content, "- x");
        assert_eq!(
            reparsed.entries[2].version,
            EntryVersion::Release(next("1.0.0"))
        );
        // The fresh pending section is empty, which re-parse reports.
        assert_eq!(
            reparsed.warnings,
            vec!["[Unreleased] section is empty.".to_string()]
        );
    }

    #[test]
    fn missing_unreleased_content_is_an_error() {
        let log = parse("# Log\n\n## [1.0.0]\n\n- old\n", "c");
        let err = promote_on(&log, &next("1.0.1"), date()).unwrap_err();
        assert!(matches!(err, ChangelogError::MissingUnreleasedContent));
    }

    #[test]
    fn empty_unreleased_content_is_an_error() {
        let log = parse("## [Unreleased]\n\n## [1.0.0]\n\n- old\n", "c");
        assert!(matches!(
            promote_on(&log, &next("1.0.1"), date()),
            Err(ChangelogError::MissingUnreleasedContent)
        ));
    }

    #[test]
    fn untitled_document_gains_the_default_title() {
        let log = parse("## [Unreleased]\n\n- x\n", "c");
        let out = promote_on(&log, &next("0.1.0"), date()).unwrap();
        assert!(out.text.starts_with("# Changelog\n\n## [Unreleased]\n"));
    }

    #[test]
    fn output_ends_with_exactly_one_newline() {
        let log = parse("## [Unreleased]\n\n- x\n\n\n\n", "c");
        let out = promote_on(&log, &next("0.1.0"), date()).unwrap();
        assert!(out.text.ends_with('\n'));
        assert!(!out.text.ends_with("\n\n"));
    }

    #[test]
    fn prerelease_version_renders_in_heading() {
        let log = parse("## [Unreleased]\n\n- x\n", "c");
        let out = promote_on(&log, &next("1.0.1-beta0"), date()).unwrap();
        assert!(out.text.contains("## [1.0.1-beta0] - 2024-06-01"));
    }
}
