#![cfg(test)]

use crate::error::Error;
use crate::fco::name::FcoName;
use crate::fco::prop::Prop;
use crate::policy::parse::parse_policy;

#[test]
fn test_minimal_rule() {
    let list = parse_policy("/etc -> +tps ;\n").unwrap();
    assert_eq!(list.len(), 1);
    let rule = list.iter().next().unwrap();
    assert_eq!(rule.start_point().as_string(), "/etc");
    assert!(rule.prop_mask().contains(Prop::FileType));
    assert!(rule.prop_mask().contains(Prop::Mode));
    assert!(rule.prop_mask().contains(Prop::Size));
    assert!(!rule.prop_mask().contains(Prop::Md5));
    // rulename defaults to the start point
    assert_eq!(rule.attrs().name, "/etc");
}

#[test]
fn test_variables_and_subtraction() {
    let text = "@@define MYMASK +tpsM\n/bin -> $(MYMASK)-M+S ;\n";
    let list = parse_policy(text).unwrap();
    let rule = list.iter().next().unwrap();
    assert!(rule.prop_mask().contains(Prop::Sha1));
    assert!(!rule.prop_mask().contains(Prop::Md5));
    assert!(rule.prop_mask().contains(Prop::Size));
}

#[test]
fn test_predefined_readonly() {
    let list = parse_policy("/usr -> $(ReadOnly) ;\n").unwrap();
    let rule = list.iter().next().unwrap();
    assert!(rule.prop_mask().contains(Prop::Crc32));
    assert!(rule.prop_mask().contains(Prop::Md5));
    assert!(!rule.prop_mask().contains(Prop::AccessTime));
}

#[test]
fn test_attributes() {
    let text = "/etc -> +tps (rulename = System Config, severity = 80, \
                emailto = root@localhost, recurse = 3) ;\n";
    let list = parse_policy(text).unwrap();
    let rule = list.iter().next().unwrap();
    assert_eq!(rule.attrs().name, "System Config");
    assert_eq!(rule.attrs().severity, 80);
    assert_eq!(rule.attrs().email, ["root@localhost"]);
    assert_eq!(rule.recurse_depth(), Some(3));
}

#[test]
fn test_recurse_false_is_start_point_only() {
    let list = parse_policy("/etc/passwd -> +tpsC (recurse = false) ;\n").unwrap();
    let rule = list.iter().next().unwrap();
    assert!(rule.contains(&FcoName::from_path("/etc/passwd")));
    assert!(!rule.contains(&FcoName::from_path("/etc/passwd/x")));
}

#[test]
fn test_stop_point_attaches_to_enclosing_rule() {
    let text = "/usr -> +tps ;\n!/usr/tmp ;\n";
    let list = parse_policy(text).unwrap();
    let rule = list.iter().next().unwrap();
    assert!(!rule.contains(&FcoName::from_path("/usr/tmp/x")));
    assert!(rule.contains(&FcoName::from_path("/usr/bin")));
}

#[test]
fn test_stop_point_picks_deepest_rule() {
    let text = "/usr -> +tps ;\n/usr/local -> +tps ;\n!/usr/local/share ;\n";
    let list = parse_policy(text).unwrap();
    let rules: Vec<_> = list.iter().collect();
    assert_eq!(rules[0].stop_points().count(), 0);
    assert_eq!(rules[1].stop_points().count(), 1);
}

#[test]
fn test_comments_and_blank_lines() {
    let text = "# a comment\n\n/etc -> +tps ; # trailing comment\n";
    assert_eq!(parse_policy(text).unwrap().len(), 1);
}

#[test]
fn test_bad_mask_char() {
    assert!(matches!(parse_policy("/etc -> +tpsq ;\n"), Err(Error::BadMaskChar('q'))));
}

#[test]
fn test_undefined_variable() {
    assert!(matches!(
        parse_policy("/etc -> $(NoSuchVar) ;\n"),
        Err(Error::UndefinedVariable(_))
    ));
}

#[test]
fn test_relative_path_rejected() {
    assert!(matches!(
        parse_policy("etc -> +tps ;\n"),
        Err(Error::PathNotAbsolute(_))
    ));
}

#[test]
fn test_orphan_stop_point_rejected() {
    assert!(matches!(
        parse_policy("!/var/tmp ;\n"),
        Err(Error::PolicyParse { line: 1, .. })
    ));
}

#[test]
fn test_severity_out_of_range() {
    assert!(parse_policy("/etc -> +t (severity = 2000000) ;\n").is_err());
}
