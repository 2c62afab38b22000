//! The ordered collection of rules a policy compiles to.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fco::name::FcoName;
use crate::policy::rule::Rule;
use crate::wire::{read, write};

/// Rule list with two iteration orders over the same rules.
///
/// *Insertion order* pairs rules across runs (reports and the database use
/// it); *canonical order* (the [`Rule`] ordering) serves lookups and
/// equality. Duplicates by canonical order are rejected.
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    insertion: Vec<Arc<Rule>>,
    canonical: Vec<Arc<Rule>>,
}

impl RuleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.insertion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion.is_empty()
    }

    /// Adds a rule. Fails on a canonical-order duplicate.
    pub fn insert(&mut self, rule: Rule) -> Result<Arc<Rule>> {
        let rule = Arc::new(rule);
        match self.canonical.binary_search_by(|probe| probe.as_ref().cmp(&rule)) {
            Ok(_) => Err(Error::PolicyParse {
                line: 0,
                msg: format!("duplicate rule for {}", rule.start_point()),
            }),
            Err(pos) => {
                self.canonical.insert(pos, Arc::clone(&rule));
                self.insertion.push(Arc::clone(&rule));
                Ok(rule)
            }
        }
    }

    /// Finds the stored rule equal to `rule`: pointer identity first, then
    /// canonical-order comparison.
    pub fn lookup(&self, rule: &Arc<Rule>) -> Option<&Arc<Rule>> {
        if let Some(found) = self.canonical.iter().find(|r| Arc::ptr_eq(r, rule)) {
            return Some(found);
        }
        self.canonical
            .binary_search_by(|probe| probe.as_ref().cmp(rule.as_ref()))
            .ok()
            .map(|pos| &self.canonical[pos])
    }

    /// Rules in the order the policy declared them.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.insertion.iter()
    }

    /// Rules in canonical order.
    pub fn iter_canonical(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.canonical.iter()
    }

    /// The rule covering `name`, preferring the deepest start point when
    /// several rules' coverage overlaps.
    pub fn rule_covering(&self, name: &FcoName) -> Option<&Arc<Rule>> {
        self.canonical
            .iter()
            .filter(|rule| rule.contains(name))
            .max_by(|a, b| a.start_point().len().cmp(&b.start_point().len()))
    }

    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::usize_as_u32(dest, self.insertion.len())?;
        for rule in &self.insertion {
            rule.write(dest)?;
        }
        Ok(())
    }

    pub fn read(src: &mut impl Read) -> Result<RuleList> {
        let count = read::u32_as_usize(src)?;
        let mut list = RuleList::new();
        for _ in 0..count {
            list.insert(Rule::read(src)?)?;
        }
        Ok(list)
    }
}

impl PartialEq for RuleList {
    fn eq(&self, other: &Self) -> bool {
        self.canonical.len() == other.canonical.len()
            && self
                .canonical
                .iter()
                .zip(other.canonical.iter())
                .all(|(a, b)| a.as_ref() == b.as_ref())
    }
}

impl Eq for RuleList {}
