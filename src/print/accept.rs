//! The interactive "accept changes" round trip.
//!
//! The full report is written to a text file with one checkbox per entry,
//! the operator's editor runs on it, and the edited file is parsed back
//! into a report containing only the entries still checked. Parsing is
//! strict: an unrecognized line aborts the update entirely.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::Write;
use std::process::Command;

use crate::error::{Error, Result};
use crate::report::model::Report;

use super::text::{escape_name, unescape_name};

const BANNER: &str = "\
# verity database update
# Every checked entry ([x]) will be folded into the baseline database.
# Replace the x with a space to withhold an entry. Do not edit names.
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Added,
    Removed,
    Changed,
}

impl Section {
    fn keyword(self) -> &'static str {
        match self {
            Section::Added => "added",
            Section::Removed => "removed",
            Section::Changed => "changed",
        }
    }
}

/// Renders the checkbox file for `report`, everything checked by default.
pub fn render_accept_file(report: &Report) -> String {
    let mut out = String::from(BANNER);
    for (genre, specs) in report.genres() {
        for (idx, spec) in specs.iter().enumerate() {
            let _ = writeln!(
                out,
                "\n# rule \"{}\" ({genre} spec {idx})",
                spec.rule().attrs().name
            );
            for fco in spec.added().iter() {
                let _ = writeln!(
                    out,
                    "[x] added   \"{}\"",
                    escape_name(&fco.name().as_string())
                );
            }
            for fco in spec.removed().iter() {
                let _ = writeln!(
                    out,
                    "[x] removed \"{}\"",
                    escape_name(&fco.name().as_string())
                );
            }
            for entry in spec.changed() {
                let _ = writeln!(
                    out,
                    "[x] changed \"{}\"",
                    escape_name(&entry.new.name().as_string())
                );
            }
        }
    }
    out
}

/// One parsed checkbox line.
fn parse_line(line: &str, lineno: usize) -> Result<Option<(bool, Section, String)>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let bad = || Error::AcceptParse { line: lineno };

    let checked = if let Some(rest) = trimmed.strip_prefix("[x]") {
        (true, rest)
    } else if let Some(rest) = trimmed.strip_prefix("[ ]") {
        (false, rest)
    } else {
        return Err(bad());
    };
    let (checked, rest) = checked;
    let rest = rest.trim_start();

    let (section, rest) = if let Some(r) = rest.strip_prefix("added") {
        (Section::Added, r)
    } else if let Some(r) = rest.strip_prefix("removed") {
        (Section::Removed, r)
    } else if let Some(r) = rest.strip_prefix("changed") {
        (Section::Changed, r)
    } else {
        return Err(bad());
    };

    let rest = rest.trim_start();
    let quoted = rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')).ok_or_else(bad)?;
    let name = unescape_name(quoted).map_err(|_| bad())?;
    Ok(Some((checked, section, name)))
}

/// Parses the edited file back against the report it was generated from,
/// returning a report holding only the still-checked entries.
pub fn parse_accept_file(text: &str, original: &Report) -> Result<Report> {
    let mut keep: BTreeSet<(&'static str, String)> = BTreeSet::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some((checked, section, name)) = parse_line(line, idx + 1)? {
            if checked {
                keep.insert((section.keyword(), name));
            }
        }
    }

    let mut filtered = Report::new(original.created_at());
    for (genre, specs) in original.genres() {
        for spec in specs {
            let out = filtered.add_spec(genre, spec.rule().clone());
            for fco in spec.added().iter() {
                if keep.contains(&("added", fco.name().as_string())) {
                    out.add_added(fco.clone());
                }
            }
            for fco in spec.removed().iter() {
                if keep.contains(&("removed", fco.name().as_string())) {
                    out.add_removed(fco.clone());
                }
            }
            for entry in spec.changed() {
                if keep.contains(&("changed", entry.new.name().as_string())) {
                    out.add_changed(entry.old.clone(), entry.new.clone(), entry.mask.clone());
                }
            }
            out.set_objects_scanned(spec.objects_scanned());
        }
    }
    Ok(filtered)
}

/// Runs the full round trip: temp file, editor, strict re-parse.
///
/// The temp file is created with owner-only permissions.
pub fn interactive_accept(report: &Report, editor: &str) -> Result<Report> {
    let mut file = tempfile::Builder::new()
        .prefix("verity-report-")
        .suffix(".txt")
        .tempfile()
        .map_err(Error::Io)?;
    file.write_all(render_accept_file(report).as_bytes()).map_err(Error::Io)?;
    file.flush().map_err(Error::Io)?;

    let status = Command::new(editor)
        .arg(file.path())
        .status()
        .map_err(|_| Error::EditorFailed)?;
    if !status.success() {
        return Err(Error::EditorFailed);
    }

    // re-read by path: editors commonly replace the file rather than
    // write through the original inode
    let edited = std::fs::read_to_string(file.path()).map_err(Error::Io)?;
    parse_accept_file(&edited, report)
}
