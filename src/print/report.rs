//! Text rendering of a report at the five reporting levels.

use std::fmt::Write as _;

use crate::fco::prop::{HashDisplay, Prop};
use crate::report::model::{Report, SpecReport};

use super::text::{escape_name, format_time};

/// Amount of detail in rendered report text, from level 0 to level 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportLevel {
    SingleLine = 0,
    Parseable = 1,
    SummaryOnly = 2,
    Concise = 3,
    Full = 4,
}

impl ReportLevel {
    pub fn from_number(n: u8) -> Option<ReportLevel> {
        Some(match n {
            0 => ReportLevel::SingleLine,
            1 => ReportLevel::Parseable,
            2 => ReportLevel::SummaryOnly,
            3 => ReportLevel::Concise,
            4 => ReportLevel::Full,
            _ => return None,
        })
    }
}

/// Renders `report` as text.
pub fn render_report(report: &Report, level: ReportLevel, hashes: HashDisplay) -> String {
    match level {
        ReportLevel::SingleLine => single_line(report),
        ReportLevel::Parseable => parseable(report),
        ReportLevel::SummaryOnly => summary(report, false),
        ReportLevel::Concise => summary(report, true),
        ReportLevel::Full => full(report, hashes),
    }
}

fn max_severity(report: &Report) -> u32 {
    report
        .genres()
        .flat_map(|(_, specs)| specs.iter())
        .filter(|s| s.violation_count() > 0)
        .map(|s| s.rule().attrs().severity)
        .max()
        .unwrap_or(0)
}

fn single_line(report: &Report) -> String {
    format!(
        "verity: {} V:{} S:{} A:{} R:{} C:{}\n",
        format_time(report.created_at()),
        report.violation_count(),
        max_severity(report),
        report.added_count(),
        report.removed_count(),
        report.changed_count(),
    )
}

fn parseable(report: &Report) -> String {
    let mut out = String::new();
    for (_, specs) in report.genres() {
        for spec in specs {
            for fco in spec.added().iter() {
                let _ = writeln!(out, "added\t\"{}\"", escape_name(&fco.name().as_string()));
            }
            for fco in spec.removed().iter() {
                let _ = writeln!(out, "removed\t\"{}\"", escape_name(&fco.name().as_string()));
            }
            for entry in spec.changed() {
                let _ = writeln!(
                    out,
                    "changed\t\"{}\"",
                    escape_name(&entry.new.name().as_string())
                );
            }
        }
    }
    out
}

fn header(report: &Report, out: &mut String) {
    let _ = writeln!(out, "Integrity check report");
    let _ = writeln!(out, "======================");
    let _ = writeln!(out, "Created:            {}", format_time(report.created_at()));
    let _ = writeln!(out, "Total violations:   {}", report.violation_count());
    let _ = writeln!(out, "Errors encountered: {}", report.error_count());
    let _ = writeln!(out);
}

fn rule_heading(spec: &SpecReport, genre: crate::fco::Genre, out: &mut String) {
    let attrs = spec.rule().attrs();
    let _ = writeln!(
        out,
        "Rule \"{}\" (genre {}, severity {}, start point \"{}\")",
        attrs.name,
        genre,
        attrs.severity,
        escape_name(&spec.rule().start_point().as_string()),
    );
    let _ = writeln!(
        out,
        "  scanned {}, added {}, removed {}, changed {}",
        spec.objects_scanned(),
        spec.added().len(),
        spec.removed().len(),
        spec.changed_len(),
    );
}

fn summary(report: &Report, with_objects: bool) -> String {
    let mut out = String::new();
    header(report, &mut out);

    for (genre, specs) in report.genres() {
        for spec in specs {
            rule_heading(spec, genre, &mut out);
            if with_objects {
                for fco in spec.added().iter() {
                    let _ =
                        writeln!(out, "  + \"{}\"", escape_name(&fco.name().as_string()));
                }
                for fco in spec.removed().iter() {
                    let _ =
                        writeln!(out, "  - \"{}\"", escape_name(&fco.name().as_string()));
                }
                for entry in spec.changed() {
                    let _ = writeln!(
                        out,
                        "  ~ \"{}\" [{}]",
                        escape_name(&entry.new.name().as_string()),
                        entry.mask
                    );
                }
            }
            for err in spec.errors().iter() {
                let _ = writeln!(out, "  ! {err}");
            }
            let _ = writeln!(out);
        }
    }
    for err in report.global_errors().iter() {
        let _ = writeln!(out, "! {err}");
    }
    out
}

fn full(report: &Report, hashes: HashDisplay) -> String {
    let mut out = summary(report, true);

    for (_, specs) in report.genres() {
        for spec in specs {
            for entry in spec.changed() {
                let _ = writeln!(
                    out,
                    "Object \"{}\"",
                    escape_name(&entry.new.name().as_string())
                );
                let _ = writeln!(out, "  {:<14} {:<28} {}", "Property", "Expected", "Observed");
                for prop in entry.mask.props() {
                    let old = render_prop(&entry.old, prop, hashes);
                    let new = render_prop(&entry.new, prop, hashes);
                    let _ =
                        writeln!(out, "  {:<14} {:<28} {}", prop.display_name(), old, new);
                }
                let _ = writeln!(out);
            }
        }
    }
    out
}

fn render_prop(fco: &crate::fco::object::Fco, prop: Prop, hashes: HashDisplay) -> String {
    match fco.get(prop) {
        Ok(value) => value.render(hashes),
        Err(_) => "---".to_owned(),
    }
}
