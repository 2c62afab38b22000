#![cfg(test)]

use std::fs;

use tempfile::TempDir;

use crate::db::Database;
use crate::engine::check::integrity_check;
use crate::engine::policy::{policy_update, PolicyUpdateOptions};
use crate::fco::name::FcoName;
use crate::fco::prop::Prop;
use crate::fco::prop_vector::PropVector;
use crate::policy::rule::{Rule, RuleAttr};
use crate::policy::rule_list::RuleList;
use crate::scanner::walk::ScanOptions;

struct Fixture {
    tempdir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self { tempdir: TempDir::new().expect("create temp dir") }
    }

    fn root(&self) -> String {
        self.tempdir.path().to_string_lossy().into_owned()
    }

    fn write_file(&self, name: &str, data: &[u8]) {
        fs::write(self.tempdir.path().join(name), data).unwrap();
    }

    fn policy_for(&self, start: &str, props: &[Prop]) -> RuleList {
        let mut list = RuleList::new();
        list.insert(Rule::new(
            FcoName::from_path(start),
            PropVector::of(props),
            RuleAttr { name: "rule".to_owned(), severity: 0, email: Vec::new() },
        ))
        .unwrap();
        list
    }

    fn policy(&self, props: &[Prop]) -> RuleList {
        self.policy_for(&self.root(), props)
    }

    fn baseline(&self, policy: &RuleList) -> Database {
        let mut db = Database::new(policy.clone(), 0);
        let report = integrity_check(policy, &db, ScanOptions::default(), 0);
        for (_, specs) in report.genres() {
            for spec in specs {
                for fco in spec.added().iter() {
                    let mut cursor = db.tree.cursor();
                    cursor.seek_to(fco.name(), true);
                    cursor.write_fco(fco.clone());
                }
            }
        }
        db
    }
}

#[test]
fn test_untouched_objects_keep_stored_values() {
    let fx = Fixture::new();
    fx.write_file("a", b"data");
    let policy = fx.policy(&[Prop::FileType, Prop::Size, Prop::Sha1]);
    let mut db = fx.baseline(&policy);

    let name = FcoName::from_path(&format!("{}/a", fx.root()));
    let before = db.tree.lookup(&name).unwrap().clone();

    policy_update(&policy, &mut db, PolicyUpdateOptions::default(), 1).unwrap();
    assert_eq!(db.tree.lookup(&name).unwrap(), &before);
}

#[test]
fn test_mask_narrowed_invalidates_excess() {
    let fx = Fixture::new();
    fx.write_file("a", b"data");
    let wide = fx.policy(&[Prop::FileType, Prop::Size, Prop::Sha1]);
    let mut db = fx.baseline(&wide);

    let narrow = fx.policy(&[Prop::FileType, Prop::Size]);
    policy_update(&narrow, &mut db, PolicyUpdateOptions::default(), 1).unwrap();

    let name = FcoName::from_path(&format!("{}/a", fx.root()));
    let stored = db.tree.lookup(&name).unwrap();
    assert!(stored.get(Prop::Size).is_ok());
    assert!(stored.get(Prop::Sha1).is_err(), "narrowed property must be invalidated");
    assert_eq!(db.policy(), &narrow);
}

#[test]
fn test_mask_widened_computes_only_missing() {
    let fx = Fixture::new();
    fx.write_file("a", b"data");
    let narrow = fx.policy(&[Prop::FileType, Prop::Size]);
    let mut db = fx.baseline(&narrow);

    let wide = fx.policy(&[Prop::FileType, Prop::Size, Prop::Sha1]);
    policy_update(&wide, &mut db, PolicyUpdateOptions::default(), 1).unwrap();

    let name = FcoName::from_path(&format!("{}/a", fx.root()));
    let stored = db.tree.lookup(&name).unwrap();
    assert!(stored.get(Prop::Sha1).is_ok(), "widened property must be measured");
    // the check engine agrees the database is now consistent
    let report = integrity_check(&wide, &db, ScanOptions::default(), 2);
    assert_eq!(report.violation_count(), 0);
}

#[test]
fn test_newly_covered_and_uncovered() {
    let fx = Fixture::new();
    fs::create_dir(fx.tempdir.path().join("old")).unwrap();
    fs::create_dir(fx.tempdir.path().join("new")).unwrap();
    fx.write_file("old/a", b"1");
    fx.write_file("new/b", b"2");

    let old_policy =
        fx.policy_for(&format!("{}/old", fx.root()), &[Prop::FileType, Prop::Size]);
    let mut db = fx.baseline(&old_policy);

    let new_policy =
        fx.policy_for(&format!("{}/new", fx.root()), &[Prop::FileType, Prop::Size]);
    let report =
        policy_update(&new_policy, &mut db, PolicyUpdateOptions::default(), 1).unwrap();

    // old coverage dropped, new coverage added
    assert!(db.tree.lookup(&FcoName::from_path(&format!("{}/old/a", fx.root()))).is_none());
    assert!(db.tree.lookup(&FcoName::from_path(&format!("{}/new/b", fx.root()))).is_some());
    assert!(report.added_count() >= 1);
    assert!(report.removed_count() >= 1);
}

#[test]
fn test_conflict_in_secure_mode_leaves_database_identical() {
    let fx = Fixture::new();
    fx.write_file("a", b"original");
    let policy = fx.policy(&[Prop::FileType, Prop::Size]);
    let mut db = fx.baseline(&policy);

    // mutate underneath the database, then reconcile in secure mode
    fx.write_file("a", b"changed content longer");
    let before = db.tree.clone();
    let before_policy = db.policy().clone();

    let opts = PolicyUpdateOptions { secure_mode: true, ..Default::default() };
    let result = policy_update(&policy, &mut db, opts, 1);
    assert!(result.is_err());
    assert_eq!(db.tree, before, "secure mode must not touch the database");
    assert_eq!(db.policy(), &before_policy);
}

#[test]
fn test_conflict_outside_secure_mode_new_value_wins() {
    let fx = Fixture::new();
    fx.write_file("a", b"original!");
    let policy = fx.policy(&[Prop::FileType, Prop::Size]);
    let mut db = fx.baseline(&policy);

    fx.write_file("a", b"changed content longer");
    let report =
        policy_update(&policy, &mut db, PolicyUpdateOptions::default(), 1).unwrap();

    // the conflict is reported as a warning
    let spec = &report.specs(crate::fco::Genre::Fs)[0];
    assert!(spec
        .errors()
        .iter()
        .any(|e| e.id == "POLICY_UPDATE_CONFLICT"));

    // and the database now matches the live tree
    let after = integrity_check(&policy, &db, ScanOptions::default(), 2);
    assert_eq!(after.violation_count(), 0);
}
