//! A set of FCOs ordered by name.

use std::collections::btree_map::{self, BTreeMap};
use std::io::{Read, Write};

use crate::error::Result;
use crate::fco::name::FcoName;
use crate::fco::object::Fco;
use crate::wire::{read, write};

/// Name-keyed FCO set. Iteration follows [`FcoName`]'s total order, which
/// is what makes report sections byte-identical across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FcoSet {
    inner: BTreeMap<FcoName, Fco>,
}

impl FcoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an FCO, replacing any existing entry for the same name.
    pub fn insert(&mut self, fco: Fco) -> Option<Fco> {
        self.inner.insert(fco.name().clone(), fco)
    }

    pub fn remove(&mut self, name: &FcoName) -> Option<Fco> {
        self.inner.remove(name)
    }

    pub fn lookup(&self, name: &FcoName) -> Option<&Fco> {
        self.inner.get(name)
    }

    pub fn contains(&self, name: &FcoName) -> bool {
        self.inner.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fco> {
        self.inner.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &FcoName> {
        self.inner.keys()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::usize_as_u32(dest, self.inner.len())?;
        for fco in self.inner.values() {
            fco.write(dest)?;
        }
        Ok(())
    }

    pub fn read(src: &mut impl Read) -> Result<FcoSet> {
        let count = read::u32_as_usize(src)?;
        let mut set = FcoSet::new();
        for _ in 0..count {
            set.insert(Fco::read(src)?);
        }
        Ok(set)
    }
}

impl IntoIterator for FcoSet {
    type Item = Fco;
    type IntoIter = btree_map::IntoValues<FcoName, Fco>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_values()
    }
}
