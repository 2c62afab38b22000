//! The integrity-check engine: diffs the live filesystem against the
//! baseline, one rule at a time.

use std::collections::BTreeSet;

use tracing::debug;

use crate::db::Database;
use crate::fco::object::Fco;
use crate::fco::prop::{CmpOp, CmpResult};
use crate::fco::prop_vector::PropVector;
use crate::fco::Genre;
use crate::policy::rule_list::RuleList;
use crate::report::errors::ErrorQueue;
use crate::report::model::Report;
use crate::scanner::walk::{FsScan, ScanOptions};

/// Positions where `old` and `new` disagree, restricted to `mask` and to
/// the positions both sides hold.
///
/// A position where exactly one side is undefined counts as changed; a
/// position undefined on both sides does not.
pub fn diff_fcos(old: &Fco, new: &Fco, mask: &PropVector) -> PropVector {
    let mut candidates = old.valid_mask().intersect(new.valid_mask());
    candidates &= mask;

    let mut changed = PropVector::new();
    for prop in candidates.props() {
        let old_undef = old.undefined_mask().contains(prop);
        let new_undef = new.undefined_mask().contains(prop);
        if old_undef && new_undef {
            continue;
        }
        let a = old.get(prop).expect("position is in the valid mask");
        let b = new.get(prop).expect("position is in the valid mask");
        if a.compare(b, CmpOp::Eq) != CmpResult::True {
            changed.add(prop);
        }
    }
    changed
}

/// Runs an integrity check of `policy` against `db` and returns the
/// report.
///
/// Rules run in insertion order; inside a rule, the added, removed and
/// changed sections come out in name order, so two checks of the same
/// inputs serialize identically apart from the report timestamp.
pub fn integrity_check(
    policy: &RuleList,
    db: &Database,
    opts: ScanOptions,
    created_at: i64,
) -> Report {
    let mut report = Report::new(created_at);

    for rule in policy.iter() {
        debug!(rule = %rule.attrs().name, start = %rule.start_point(), "checking rule");
        let mut errors = ErrorQueue::new();
        let mut seen: BTreeSet<crate::fco::name::FcoName> = BTreeSet::new();
        let mut scan = FsScan::new(rule, None, opts, &mut errors);

        let mut added = Vec::new();
        let mut changed = Vec::new();
        for live in scan.by_ref() {
            let name = live.name().clone();
            match db.tree.lookup(&name) {
                None => added.push(live),
                Some(stored) => {
                    let mask = diff_fcos(stored, &live, rule.prop_mask());
                    if !mask.is_empty() {
                        changed.push((stored.clone(), live, mask));
                    }
                }
            }
            seen.insert(name);
        }
        let scanned = scan.scanned();

        let spec = report.add_spec(Genre::Fs, rule.clone());
        for fco in added {
            spec.add_added(fco);
        }
        for (old, new, mask) in changed {
            spec.add_changed(old, new, mask);
        }
        db.tree.for_each_record(rule.start_point(), &mut |name, stored| {
            if rule.contains(name) && !seen.contains(name) {
                spec.add_removed(stored.clone());
            }
        });
        spec.set_objects_scanned(scanned);
        spec.errors_mut().extend_from(&errors);
    }

    report
}

/// Restricted variant of [`diff_fcos`] that only reports positions the
/// stored side actually defines; used by the policy-update engine, where
/// a position newly measured on the live side is not a conflict.
pub fn conflict_mask(stored: &Fco, live: &Fco, mask: &PropVector) -> PropVector {
    let mut overlap = stored.valid_mask().difference(stored.undefined_mask());
    overlap &= mask;
    let mut out = diff_fcos(stored, live, &overlap);
    // a hash that became uncomputable live (e.g. unreadable file) is a
    // scan problem, not a policy conflict
    let masked_out: Vec<_> =
        out.props().filter(|p| live.undefined_mask().contains(*p)).collect();
    for prop in masked_out {
        out.remove(prop);
    }
    out
}
