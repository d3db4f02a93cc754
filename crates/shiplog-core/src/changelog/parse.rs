//! Tolerant line-scanning changelog parser.
//!
//! Malformed input never fails the parse. Anything the scanner cannot
//! classify is preserved as-is and, where it looks like a mistake, reported
//! through [`Changelog::warnings`].

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

use super::{Changelog, ChangelogEntry, EntryVersion, UNRELEASED_HEADING};

/// Version token inside a heading: optional `[`/`(` wrapper, optional
/// leading `v`, dotted MAJOR.MINOR.PATCH, optional delimited suffix.
///
/// The suffix deliberately admits `.` and `_` delimiters so that near-miss
/// tokens like `1.2.3.4` or `1.2.3_rc1` are captured whole and then rejected
/// by semver validation, instead of silently matching their `1.2.3` prefix.
static VERSION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[(]?v?(\d+\.\d+\.\d+(?:[-+._][0-9A-Za-z][0-9A-Za-z.+_-]*)?)[\])]?")
        .expect("Invalid regex")
});

/// Heading text of a second-level heading, or `None` for any other line.
fn heading_text(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("##")?;
    if rest.is_empty() || rest.starts_with('#') {
        return None;
    }
    Some(rest)
}

/// Classify a heading line, appending a warning when it carries a version
/// token that is not valid semver.
fn classify_heading(line: &str, text: &str, source: &str, warnings: &mut Vec<String>) -> EntryVersion {
    if let Some(caps) = VERSION_TOKEN.captures(text) {
        return match Version::parse(&caps[1]) {
            Ok(version) => EntryVersion::Release(version),
            Err(_) => {
                warnings.push(format!(
                    "{source}: Header \"{line}\" does not contain a valid SemVer identifier."
                ));
                EntryVersion::Unknown
            }
        };
    }
    if text.to_ascii_lowercase().contains("unreleased") {
        return EntryVersion::Unreleased;
    }
    EntryVersion::Unknown
}

/// Parse changelog text into a [`Changelog`].
///
/// `source` is the document's display name, used only to prefix warnings.
/// This function is pure and never fails; strictness about the warnings it
/// returns belongs to the caller.
#[must_use]
pub fn parse(text: &str, source: &str) -> Changelog {
    let mut title = String::new();
    let mut description: Vec<&str> = Vec::new();
    let mut entries: Vec<ChangelogEntry> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut current: Option<(EntryVersion, String, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(heading) = heading_text(line) {
            if let Some((version, header, body)) = current.take() {
                entries.push(flush(version, header, &body));
            }
            let version = classify_heading(line, heading, source, &mut warnings);
            current = Some((version, line.to_string(), Vec::new()));
        } else if let Some((_, _, body)) = current.as_mut() {
            body.push(line);
        } else if title.is_empty()
            && line.starts_with('#')
            && description.iter().all(|l| l.trim().is_empty())
        {
            title = line.to_string();
        } else {
            description.push(line);
        }
    }
    if let Some((version, header, body)) = current.take() {
        entries.push(flush(version, header, &body));
    }

    let description = description.join("\n").trim().to_string();
    let mut log = Changelog {
        title,
        description,
        entries,
        warnings,
    };

    merge_duplicate_unreleased(&mut log);
    promote_top_level_content(&mut log);
    recover_missing_unreleased(&mut log);
    if log.unreleased().is_some_and(|e| e.content.is_empty()) {
        log.warnings.push("[Unreleased] section is empty.".to_string());
    }

    log
}

fn flush(version: EntryVersion, header: String, body: &[&str]) -> ChangelogEntry {
    ChangelogEntry {
        version,
        header,
        content: body.join("\n").trim().to_string(),
    }
}

/// Keep the first unreleased entry; fold later ones into it.
fn merge_duplicate_unreleased(log: &mut Changelog) {
    let mut first: Option<usize> = None;
    let mut i = 0;
    while i < log.entries.len() {
        if !log.entries[i].version.is_unreleased() {
            i += 1;
            continue;
        }
        let Some(keep) = first else {
            first = Some(i);
            i += 1;
            continue;
        };
        let dup = log.entries.remove(i);
        log.warnings.push(format!(
            "Duplicate [Unreleased] section \"{}\"; merging into the first.",
            dup.header
        ));
        if !dup.content.is_empty() {
            let target = &mut log.entries[keep].content;
            if target.is_empty() {
                *target = dup.content;
            } else {
                target.push_str("\n\n");
                target.push_str(&dup.content);
            }
        }
    }
}

/// Text above the first heading becomes the pending section when the
/// document has none of its own.
fn promote_top_level_content(log: &mut Changelog) {
    if log.description.is_empty() || log.unreleased().is_some() {
        return;
    }
    let content = std::mem::take(&mut log.description);
    log.entries.insert(
        0,
        ChangelogEntry {
            version: EntryVersion::Unreleased,
            header: UNRELEASED_HEADING.to_string(),
            content,
        },
    );
}

fn recover_missing_unreleased(log: &mut Changelog) {
    if log.unreleased().is_some() {
        return;
    }
    log.warnings
        .push("Missing [Unreleased] section; creating an empty placeholder.".to_string());
    log.entries.insert(
        0,
        ChangelogEntry {
            version: EntryVersion::Unreleased,
            header: UNRELEASED_HEADING.to_string(),
            content: String::new(),
        },
    );
}
