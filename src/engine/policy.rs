//! The policy-update engine: reconciles a new rule list against an
//! existing database without recomputing what can be kept.
//!
//! Classification per object:
//! - *untouched*: same effective mask under old and new policy; stored
//!   values are kept.
//! - *mask-narrowed*: properties the new policy no longer asks for are
//!   invalidated in place.
//! - *mask-widened*: only the missing properties are computed and merged.
//! - *newly-covered*: scanned and inserted as an addition.
//! - *uncovered*: the node is removed.
//! - *conflict*: a currently-stored property disagrees with its freshly
//!   computed value. In secure mode the update fails and the database is
//!   left untouched; otherwise the new value wins and the conflict is
//!   reported as a warning.

use tracing::{debug, info};

use crate::db::Database;
use crate::engine::check::conflict_mask;
use crate::error::{Error, Result};
use crate::fco::name::FcoName;
use crate::fco::prop::{HashAlgo, PropValue};
use crate::fco::prop_vector::PropVector;
use crate::fco::Genre;
use crate::policy::rule_list::RuleList;
use crate::report::errors::{ErrorBucket, ErrorQueue};
use crate::report::model::Report;
use crate::scanner::hashing;
use crate::scanner::walk::{FsScan, ScanOptions};

/// Option flags for a policy update.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyUpdateOptions {
    /// Any conflict fails the update and leaves the database unchanged.
    pub secure_mode: bool,
    /// Undo access-time changes the partial rescan causes.
    pub erase_footprints: bool,
    /// Keep the rescan's pages out of the OS page cache.
    pub direct_io: bool,
}

impl PolicyUpdateOptions {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            reset_access_times: self.erase_footprints,
            drop_cache: self.direct_io,
        }
    }
}

/// The stat-only portion of a mask (everything but the hash positions).
fn stat_portion(mask: &PropVector) -> PropVector {
    let mut out = mask.clone();
    for algo in [HashAlgo::Crc32, HashAlgo::Md5, HashAlgo::Sha1, HashAlgo::Haval] {
        out.remove(algo.prop());
    }
    out
}

/// Hash positions of `mask` that `exclude` does not already provide.
fn missing_hashes(mask: &PropVector, exclude: &PropVector) -> Vec<HashAlgo> {
    [HashAlgo::Crc32, HashAlgo::Md5, HashAlgo::Sha1, HashAlgo::Haval]
        .into_iter()
        .filter(|algo| mask.contains(algo.prop()) && !exclude.contains(algo.prop()))
        .collect()
}

/// Applies `new_rules` to `db`, replacing its policy snapshot.
///
/// Returns the conflict report. All mutation is staged; the database only
/// takes the new tree (and policy) after every rule reconciled cleanly.
pub fn policy_update(
    new_rules: &RuleList,
    db: &mut Database,
    opts: PolicyUpdateOptions,
    created_at: i64,
) -> Result<Report> {
    let mut staged = db.tree.clone();
    let mut report = Report::new(created_at);
    let mut conflict: Option<Error> = None;

    for rule in new_rules.iter() {
        let mut errors = ErrorQueue::new();
        let new_mask = rule.prop_mask().clone();
        let walk_mask = stat_portion(&new_mask);

        // walk with stat-class properties only; digests are computed per
        // object below, and only where the stored record lacks them. The
        // file type always rides along so the hash step can tell regular
        // files apart.
        let mut scan_rule = (**rule).clone();
        scan_rule.set_prop_mask(walk_mask);
        let file_type_only = PropVector::of(&[crate::fco::prop::Prop::FileType]);
        let results: Vec<_> = FsScan::new(
            &scan_rule,
            Some(&file_type_only),
            opts.scan_options(),
            &mut errors,
        )
        .collect();

        let spec = report.add_spec(Genre::Fs, rule.clone());
        for mut live in results {
            let name = live.name().clone();
            let stored = staged.lookup(&name).cloned();

            match stored {
                None => {
                    // newly covered: measure everything the mask asks for
                    compute_hashes(&mut live, &new_mask, &PropVector::new(), opts, &mut errors);
                    live.invalidate_outside(&new_mask);
                    let mut cursor = staged.cursor();
                    cursor.seek_to(&name, true);
                    cursor.write_fco(live.clone());
                    spec.add_added(live);
                }
                Some(stored) => {
                    // widened positions come from the fresh measurement
                    compute_hashes(
                        &mut live,
                        &new_mask,
                        stored.valid_mask(),
                        opts,
                        &mut errors,
                    );

                    let conflicts = conflict_mask(&stored, &live, &new_mask);
                    if !conflicts.is_empty() {
                        let err = Error::UpdateConflict(name.as_string());
                        errors.add(&err);
                        spec.add_changed(stored.clone(), live.clone(), conflicts.clone());
                        if opts.secure_mode && conflict.is_none() {
                            conflict = Some(err);
                        }
                    }

                    let mut merged = stored.clone();
                    // narrowed: drop what the new mask no longer wants
                    merged.invalidate_outside(&new_mask);
                    // widened: merge positions the stored record lacks
                    let widened = new_mask.difference(stored.valid_mask());
                    merged.copy_props(&live, &widened);
                    // conflicts: the new value wins outside secure mode
                    merged.copy_props(&live, &conflicts);

                    let mut cursor = staged.cursor();
                    cursor.seek_to(&name, true);
                    cursor.write_fco(merged);
                }
            }
        }
        spec.errors_mut().extend_from(&errors);
        debug!(rule = %rule.attrs().name, "reconciled rule");
    }

    // uncovered: database records no new rule reaches
    let mut doomed = Vec::new();
    staged.for_each_record(&FcoName::new(), &mut |name, fco| {
        if new_rules.rule_covering(name).is_none() {
            doomed.push((name.clone(), fco.clone()));
        }
    });
    for (name, _) in &doomed {
        {
            let mut cursor = staged.cursor();
            if cursor.seek_to(name, false) {
                cursor.delete_fco();
            }
        }
        staged.collapse(name);
    }
    // surfaced under the first spec so the operator sees what fell out
    // of coverage
    if let Some(spec) = report.specs_mut(Genre::Fs).next() {
        for (_, fco) in doomed {
            spec.add_removed(fco);
        }
    }

    if let Some(err) = conflict {
        info!("policy update aborted by secure mode; database unchanged");
        return Err(err);
    }

    db.tree = staged;
    db.set_policy(new_rules.clone());
    Ok(report)
}

/// Computes the digests `mask` asks for that `have` does not already
/// provide, directly from the file.
fn compute_hashes(
    live: &mut crate::fco::object::Fco,
    mask: &PropVector,
    have: &PropVector,
    opts: PolicyUpdateOptions,
    errors: &mut dyn ErrorBucket,
) {
    let needed = missing_hashes(mask, have);
    if needed.is_empty() {
        return;
    }
    let is_file = matches!(
        live.get(crate::fco::prop::Prop::FileType),
        Ok(PropValue::FileType(crate::fco::prop::FileType::File))
    );
    for algo in &needed {
        if !hashing::computable(*algo) {
            live.mark_undefined(algo.prop());
            errors.add(&Error::HashUnsupported("HAVAL"));
        }
    }
    let computable: Vec<HashAlgo> =
        needed.into_iter().filter(|a| hashing::computable(*a)).collect();
    if computable.is_empty() {
        return;
    }
    if !is_file {
        for algo in computable {
            live.mark_undefined(algo.prop());
        }
        return;
    }
    let path = std::path::PathBuf::from(live.name().as_string());
    match hashing::hash_file(&path, &computable, opts.direct_io) {
        Ok(digests) => {
            for digest in digests {
                live.set(digest.algo.prop(), PropValue::Hash(digest));
            }
        }
        Err(source) => {
            errors.add(&Error::IoPath { path, source });
            for algo in computable {
                live.mark_undefined(algo.prop());
            }
        }
    }
}
