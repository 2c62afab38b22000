#![cfg(test)]

use std::sync::Arc;

use crate::fco::name::FcoName;
use crate::fco::object::Fco;
use crate::fco::prop::{FileType, HashDisplay, Prop, PropValue};
use crate::fco::prop_vector::PropVector;
use crate::fco::Genre;
use crate::policy::rule::{Rule, RuleAttr};
use crate::print::report::{render_report, ReportLevel};
use crate::print::text::{escape_name, format_time, unescape_name};
use crate::report::model::Report;

fn fco(path: &str, size: i64) -> Fco {
    let mut fco = Fco::new(FcoName::from_path(path));
    fco.set(Prop::FileType, PropValue::FileType(FileType::File));
    fco.set(Prop::Size, PropValue::Int64(size));
    fco
}

fn sample_report() -> Report {
    let rule = Arc::new(Rule::new(
        FcoName::from_path("/tmp"),
        PropVector::of(&[Prop::FileType, Prop::Size]),
        RuleAttr { name: "Temp".to_owned(), severity: 66, email: Vec::new() },
    ));
    let mut report = Report::new(1_700_000_000);
    let spec = report.add_spec(Genre::Fs, rule);
    spec.add_added(fco("/tmp/new", 3));
    spec.add_removed(fco("/tmp/old", 4));
    spec.add_changed(fco("/tmp/a", 10), fco("/tmp/a", 11), PropVector::of(&[Prop::Size]));
    spec.set_objects_scanned(5);
    report
}

#[test]
fn test_escape_roundtrip() {
    for name in ["/plain/path", "/with space", "/tab\there", "/q\"uote", "/back\\slash", "/unicode-é"] {
        let escaped = escape_name(name);
        assert!(!escaped.contains('\t'));
        assert_eq!(unescape_name(&escaped).unwrap(), name);
    }
}

#[test]
fn test_escape_flattens_control_bytes() {
    assert_eq!(escape_name("a\nb"), "a\\x0Ab");
    assert_eq!(escape_name("q\"x"), "q\\\"x");
}

#[test]
fn test_format_time() {
    assert_eq!(format_time(0), "1970-01-01 00:00:00 UTC");
    assert_eq!(format_time(1_700_000_000), "2023-11-14 22:13:20 UTC");
    // negative times are permitted
    assert_eq!(format_time(-86_400), "1969-12-31 00:00:00 UTC");
}

#[test]
fn test_single_line_counts() {
    let text = render_report(&sample_report(), ReportLevel::SingleLine, HashDisplay::Hex);
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("V:3"));
    assert!(text.contains("A:1"));
    assert!(text.contains("R:1"));
    assert!(text.contains("C:1"));
    assert!(text.contains("S:66"));
}

#[test]
fn test_parseable_lists_every_entry() {
    let text = render_report(&sample_report(), ReportLevel::Parseable, HashDisplay::Hex);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        [
            "added\t\"/tmp/new\"",
            "removed\t\"/tmp/old\"",
            "changed\t\"/tmp/a\"",
        ]
    );
}

#[test]
fn test_full_shows_old_and_new_values() {
    let text = render_report(&sample_report(), ReportLevel::Full, HashDisplay::Hex);
    assert!(text.contains("Size"));
    assert!(text.contains("10"));
    assert!(text.contains("11"));
    assert!(text.contains("\"/tmp/a\""));
}

#[test]
fn test_levels_grow_monotonically() {
    let report = sample_report();
    let lens: Vec<usize> = [
        ReportLevel::SingleLine,
        ReportLevel::SummaryOnly,
        ReportLevel::Concise,
        ReportLevel::Full,
    ]
    .iter()
    .map(|lvl| render_report(&report, *lvl, HashDisplay::Hex).len())
    .collect();
    assert!(lens.windows(2).all(|w| w[0] < w[1]), "levels must add detail: {lens:?}");
}

#[test]
fn test_rendering_is_deterministic() {
    let a = render_report(&sample_report(), ReportLevel::Full, HashDisplay::Hex);
    let b = render_report(&sample_report(), ReportLevel::Full, HashDisplay::Hex);
    assert_eq!(a, b);
}
