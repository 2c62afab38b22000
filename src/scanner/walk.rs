//! Rule-driven traversal of the live filesystem.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Error;
use crate::fco::name::{FcoName, Rel};
use crate::fco::object::Fco;
use crate::fco::prop::{FileType, HashAlgo, Prop, PropValue};
use crate::fco::prop_vector::PropVector;
use crate::policy::rule::{Containment, Rule};
use crate::report::errors::ErrorBucket;
use crate::scanner::{hashing, props};

/// Behavior switches for a scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Restore each file's access time after hashing it.
    pub reset_access_times: bool,
    /// Advise the kernel to drop page-cache pages the scan pulled in.
    pub drop_cache: bool,
}

/// A lazy, finite, non-restartable scan of one rule's coverage.
///
/// Objects arrive in depth-first pre-order with siblings in name order, so
/// two scans of an unchanged tree yield an identical sequence. Unreadable
/// objects still produce an FCO (file type plus all-undefined properties)
/// and an entry in the error sink; the scan continues past them.
pub struct FsScan<'a> {
    rule: &'a Rule,
    mask: PropVector,
    opts: ScanOptions,
    errors: &'a mut dyn ErrorBucket,
    iter: walkdir::IntoIter,
    scanned: u64,
    haval_warned: bool,
}

impl<'a> FsScan<'a> {
    /// Starts a scan over `rule`, measuring the rule's property mask plus
    /// `extra`.
    pub fn new(
        rule: &'a Rule,
        extra: Option<&PropVector>,
        opts: ScanOptions,
        errors: &'a mut dyn ErrorBucket,
    ) -> FsScan<'a> {
        let mut mask = rule.prop_mask().clone();
        if let Some(extra) = extra {
            mask |= extra;
        }
        let root = PathBuf::from(rule.start_point().as_string());
        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));
        match rule.containment() {
            Containment::StartPointOnly => walker = walker.max_depth(0),
            Containment::AllBelow { depth: Some(depth), .. } => {
                walker = walker.max_depth(*depth as usize)
            }
            Containment::AllBelow { depth: None, .. } => {}
        }
        FsScan {
            rule,
            mask,
            opts,
            errors,
            iter: walker.into_iter(),
            scanned: 0,
            haval_warned: false,
        }
    }

    /// Objects emitted so far.
    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// The effective property mask of this scan.
    pub fn mask(&self) -> &PropVector {
        &self.mask
    }

    fn beyond_stop_point(&self, name: &FcoName) -> bool {
        self.rule
            .stop_points()
            .any(|stop| matches!(stop.relationship(name), Rel::Equal | Rel::Above))
    }

    fn make_fco(&mut self, name: FcoName, entry: &walkdir::DirEntry) -> Fco {
        let mut fco = Fco::new(name);
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) => {
                self.errors.add(&Error::IoPath {
                    path: entry.path().to_path_buf(),
                    source: err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("stat failed")),
                });
                fco.set(Prop::FileType, PropValue::FileType(FileType::Invalid));
                for prop in self.mask.props() {
                    if prop != Prop::FileType {
                        fco.mark_undefined(prop);
                    }
                }
                return fco;
            }
        };

        props::stat_props(&mut fco, &meta, &self.mask);

        let requested: Vec<HashAlgo> =
            [HashAlgo::Crc32, HashAlgo::Md5, HashAlgo::Sha1, HashAlgo::Haval]
                .into_iter()
                .filter(|algo| self.mask.contains(algo.prop()))
                .collect();
        if requested.is_empty() {
            return fco;
        }

        if requested.contains(&HashAlgo::Haval) {
            fco.mark_undefined(Prop::Haval);
            if !self.haval_warned {
                self.errors.add(&Error::HashUnsupported("HAVAL"));
                self.haval_warned = true;
            }
        }
        let computable: Vec<HashAlgo> =
            requested.into_iter().filter(|a| hashing::computable(*a)).collect();
        if computable.is_empty() {
            return fco;
        }

        if !meta.is_file() {
            // only regular files have content to digest
            for algo in computable {
                fco.mark_undefined(algo.prop());
            }
            return fco;
        }

        let atime = self
            .opts
            .reset_access_times
            .then(|| filetime::FileTime::from_last_access_time(&meta));

        match hashing::hash_file(entry.path(), &computable, self.opts.drop_cache) {
            Ok(digests) => {
                for digest in digests {
                    let prop = digest.algo.prop();
                    fco.set(prop, PropValue::Hash(digest));
                }
            }
            Err(err) => {
                self.errors.add(&Error::IoPath { path: entry.path().to_path_buf(), source: err });
                for algo in computable {
                    fco.mark_undefined(algo.prop());
                }
            }
        }

        if let Some(atime) = atime {
            restore_atime(entry.path(), atime);
        }

        fco
    }
}

fn restore_atime(path: &Path, atime: filetime::FileTime) {
    // best effort: the scan result does not depend on it
    let _ = filetime::set_file_atime(path, atime);
}

impl Iterator for FsScan<'_> {
    type Item = Fco;

    fn next(&mut self) -> Option<Fco> {
        loop {
            let entry = match self.iter.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path =
                        err.path().map(Path::to_path_buf).unwrap_or_default();
                    self.errors.add(&Error::IoPath {
                        path,
                        source: err
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("walk failed")),
                    });
                    continue;
                }
            };

            let name = FcoName::from_path(&entry.path().to_string_lossy());
            if self.beyond_stop_point(&name) {
                if entry.file_type().is_dir() {
                    self.iter.skip_current_dir();
                }
                continue;
            }

            self.scanned += 1;
            return Some(self.make_fco(name, &entry));
        }
    }
}
