//! Report data model: per-rule added/removed/changed sets plus error
//! queues, grouped by genre.

use std::collections::btree_map::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fco::name::FcoName;
use crate::fco::object::Fco;
use crate::fco::prop_vector::PropVector;
use crate::fco::set::FcoSet;
use crate::fco::Genre;
use crate::policy::rule::Rule;
use crate::report::errors::ErrorQueue;
use crate::wire::{read, write};

/// One modified object: the stored FCO, the live FCO, and the positions
/// that differ.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedEntry {
    pub old: Fco,
    pub new: Fco,
    pub mask: PropVector,
}

/// The portion of a report produced by a single rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecReport {
    rule: Arc<Rule>,
    added: FcoSet,
    removed: FcoSet,
    changed: BTreeMap<FcoName, ChangedEntry>,
    errors: ErrorQueue,
    objects_scanned: u64,
}

impl SpecReport {
    pub fn new(rule: Arc<Rule>) -> Self {
        Self {
            rule,
            added: FcoSet::new(),
            removed: FcoSet::new(),
            changed: BTreeMap::new(),
            errors: ErrorQueue::new(),
            objects_scanned: 0,
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn added(&self) -> &FcoSet {
        &self.added
    }

    pub fn removed(&self) -> &FcoSet {
        &self.removed
    }

    /// Changed entries in name order.
    pub fn changed(&self) -> impl Iterator<Item = &ChangedEntry> {
        self.changed.values()
    }

    pub fn changed_len(&self) -> usize {
        self.changed.len()
    }

    pub fn errors(&self) -> &ErrorQueue {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorQueue {
        &mut self.errors
    }

    pub fn objects_scanned(&self) -> u64 {
        self.objects_scanned
    }

    pub fn set_objects_scanned(&mut self, n: u64) {
        self.objects_scanned = n;
    }

    pub fn add_added(&mut self, fco: Fco) {
        debug_assert!(!self.removed.contains(fco.name()));
        self.added.insert(fco);
    }

    pub fn add_removed(&mut self, fco: Fco) {
        debug_assert!(!self.added.contains(fco.name()));
        self.removed.insert(fco);
    }

    /// Records a change. A second change for the same name merges: the
    /// masks union and the newer FCO pair wins.
    pub fn add_changed(&mut self, old: Fco, new: Fco, mask: PropVector) {
        debug_assert_eq!(old.name(), new.name());
        debug_assert!(old.valid_mask().intersect(new.valid_mask()).is_superset_of(&mask));
        let name = new.name().clone();
        match self.changed.get_mut(&name) {
            Some(entry) => {
                entry.mask |= &mask;
                entry.old = old;
                entry.new = new;
            }
            None => {
                self.changed.insert(name, ChangedEntry { old, new, mask });
            }
        }
    }

    /// Total objects this spec flagged.
    pub fn violation_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        self.rule.write(dest)?;
        self.added.write(dest)?;
        self.removed.write(dest)?;
        write::usize_as_u32(dest, self.changed.len())?;
        for entry in self.changed.values() {
            entry.old.write(dest)?;
            entry.new.write(dest)?;
            entry.mask.write(dest)?;
        }
        self.errors.write(dest)?;
        write::u64(dest, self.objects_scanned)
    }

    fn read(src: &mut impl Read) -> Result<SpecReport> {
        let rule = Arc::new(Rule::read(src)?);
        let added = FcoSet::read(src)?;
        let removed = FcoSet::read(src)?;
        let count = read::u32_as_usize(src)?;
        let mut changed = BTreeMap::new();
        for _ in 0..count {
            let old = Fco::read(src)?;
            let new = Fco::read(src)?;
            let mask = PropVector::read(src)?;
            if old.name() != new.name() {
                return Err(Error::WireFormat("changed entry pairs different names"));
            }
            changed.insert(new.name().clone(), ChangedEntry { old, new, mask });
        }
        let errors = ErrorQueue::read(src)?;
        let objects_scanned = read::u64(src)?;
        Ok(SpecReport { rule, added, removed, changed, errors, objects_scanned })
    }
}

/// A complete integrity-check report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    genres: BTreeMap<Genre, Vec<SpecReport>>,
    global_errors: ErrorQueue,
    /// Seconds since epoch; the only part of two equal runs that differs.
    created_at: i64,
}

impl Report {
    pub fn new(created_at: i64) -> Self {
        Self { genres: BTreeMap::new(), global_errors: ErrorQueue::new(), created_at }
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn global_errors(&self) -> &ErrorQueue {
        &self.global_errors
    }

    pub fn global_errors_mut(&mut self) -> &mut ErrorQueue {
        &mut self.global_errors
    }

    /// Starts a new spec section for `rule` and returns it for filling.
    pub fn add_spec(&mut self, genre: Genre, rule: Arc<Rule>) -> &mut SpecReport {
        let specs = self.genres.entry(genre).or_default();
        specs.push(SpecReport::new(rule));
        specs.last_mut().expect("just pushed")
    }

    pub fn genres(&self) -> impl Iterator<Item = (Genre, &[SpecReport])> {
        self.genres.iter().map(|(genre, specs)| (*genre, specs.as_slice()))
    }

    pub fn specs(&self, genre: Genre) -> &[SpecReport] {
        self.genres.get(&genre).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn specs_mut(&mut self, genre: Genre) -> impl Iterator<Item = &mut SpecReport> {
        self.genres.get_mut(&genre).into_iter().flatten()
    }

    /// Sum of violations over every genre and spec.
    pub fn violation_count(&self) -> usize {
        self.genres.values().flatten().map(SpecReport::violation_count).sum()
    }

    pub fn added_count(&self) -> usize {
        self.genres.values().flatten().map(|s| s.added().len()).sum()
    }

    pub fn removed_count(&self) -> usize {
        self.genres.values().flatten().map(|s| s.removed().len()).sum()
    }

    pub fn changed_count(&self) -> usize {
        self.genres.values().flatten().map(SpecReport::changed_len).sum()
    }

    pub fn error_count(&self) -> usize {
        self.global_errors.len()
            + self.genres.values().flatten().map(|s| s.errors().len()).sum::<usize>()
    }

    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::i64(dest, self.created_at)?;
        self.global_errors.write(dest)?;
        write::usize_as_u32(dest, self.genres.len())?;
        for (genre, specs) in &self.genres {
            write::variant(dest, *genre)?;
            write::usize_as_u32(dest, specs.len())?;
            for spec in specs {
                spec.write(dest)?;
            }
        }
        Ok(())
    }

    pub fn read(src: &mut impl Read) -> Result<Report> {
        let created_at = read::i64(src)?;
        let global_errors = ErrorQueue::read(src)?;
        let genre_count = read::u32_as_usize(src)?;
        let mut genres = BTreeMap::new();
        for _ in 0..genre_count {
            let tag = read::u32(src)?;
            let genre: Genre = num_traits::FromPrimitive::from_u32(tag)
                .ok_or(Error::UnknownGenre(tag))?;
            let spec_count = read::u32_as_usize(src)?;
            let mut specs = Vec::with_capacity(spec_count.min(1024));
            for _ in 0..spec_count {
                specs.push(SpecReport::read(src)?);
            }
            genres.insert(genre, specs);
        }
        Ok(Report { genres, global_errors, created_at })
    }
}
