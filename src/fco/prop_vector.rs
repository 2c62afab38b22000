//! Bit set over the property enumeration.

use std::io::{Read, Write};
use std::ops::{BitAndAssign, BitOrAssign, BitXorAssign};

use crate::error::{Error, Result};
use crate::fco::prop::{Prop, PROP_COUNT};
use crate::wire::{read, write};

const WORD_BITS: usize = 32;

fn words_for(width: usize) -> usize {
    width.div_ceil(WORD_BITS)
}

/// A bit set with a logical width.
///
/// Pairwise operators widen the left operand to the larger of the two
/// widths; resizing zero-extends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropVector {
    width: usize,
    words: Vec<u32>,
}

impl PropVector {
    /// An empty vector sized for the filesystem property enumeration.
    pub fn new() -> Self {
        Self::with_width(PROP_COUNT)
    }

    pub fn with_width(width: usize) -> Self {
        Self { width, words: vec![0; words_for(width)] }
    }

    /// A vector with every position of the filesystem enumeration set.
    pub fn all() -> Self {
        let mut v = Self::new();
        for i in 0..PROP_COUNT {
            v.add_index(i);
        }
        v
    }

    pub fn of(props: &[Prop]) -> Self {
        let mut v = Self::new();
        for p in props {
            v.add(*p);
        }
        v
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Grows the logical width, zero-extending. Shrinking is not supported.
    pub fn resize(&mut self, new_width: usize) {
        if new_width > self.width {
            self.width = new_width;
            self.words.resize(words_for(new_width), 0);
        }
    }

    pub fn add(&mut self, prop: Prop) {
        self.add_index(prop.index());
    }

    pub fn add_index(&mut self, idx: usize) {
        if idx >= self.width {
            self.resize(idx + 1);
        }
        self.words[idx / WORD_BITS] |= 1 << (idx % WORD_BITS);
    }

    pub fn remove(&mut self, prop: Prop) {
        self.remove_index(prop.index());
    }

    pub fn remove_index(&mut self, idx: usize) {
        if idx < self.width {
            self.words[idx / WORD_BITS] &= !(1 << (idx % WORD_BITS));
        }
    }

    pub fn contains(&self, prop: Prop) -> bool {
        self.contains_index(prop.index())
    }

    pub fn contains_index(&self, idx: usize) -> bool {
        idx < self.width && self.words[idx / WORD_BITS] & (1 << (idx % WORD_BITS)) != 0
    }

    /// True when every set position of `other` is set here too.
    pub fn is_superset_of(&self, other: &PropVector) -> bool {
        other.iter().all(|idx| self.contains_index(idx))
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates the set positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.width).filter(move |idx| self.contains_index(*idx))
    }

    /// Iterates the set positions that name known properties.
    pub fn props(&self) -> impl Iterator<Item = Prop> + '_ {
        self.iter().filter_map(Prop::from_index)
    }

    /// Intersection as a new vector.
    pub fn intersect(&self, other: &PropVector) -> PropVector {
        let mut out = self.clone();
        out &= other;
        out
    }

    /// Union as a new vector.
    pub fn union(&self, other: &PropVector) -> PropVector {
        let mut out = self.clone();
        out |= other;
        out
    }

    /// Set difference `self \ other` as a new vector.
    pub fn difference(&self, other: &PropVector) -> PropVector {
        let mut out = self.clone();
        for idx in other.iter() {
            out.remove_index(idx);
        }
        out
    }

    /// Wire form: width, then one `u32` word per 32 positions.
    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::usize_as_u32(dest, self.width)?;
        for word in &self.words {
            write::u32(dest, *word)?;
        }
        Ok(())
    }

    pub fn read(src: &mut impl Read) -> Result<PropVector> {
        let width = read::u32_as_usize(src)?;
        if width > 4096 {
            return Err(Error::WireFormat("property vector width out of range"));
        }
        let mut words = vec![0u32; words_for(width)];
        for word in words.iter_mut() {
            *word = read::u32(src)?;
        }
        Ok(PropVector { width, words })
    }
}

impl Default for PropVector {
    fn default() -> Self {
        Self::new()
    }
}

impl BitOrAssign<&PropVector> for PropVector {
    fn bitor_assign(&mut self, rhs: &PropVector) {
        self.resize(rhs.width);
        for (i, word) in rhs.words.iter().enumerate() {
            self.words[i] |= word;
        }
    }
}

impl BitAndAssign<&PropVector> for PropVector {
    fn bitand_assign(&mut self, rhs: &PropVector) {
        self.resize(rhs.width);
        for (i, word) in self.words.iter_mut().enumerate() {
            *word &= rhs.words.get(i).copied().unwrap_or(0);
        }
    }
}

impl BitXorAssign<&PropVector> for PropVector {
    fn bitxor_assign(&mut self, rhs: &PropVector) {
        self.resize(rhs.width);
        for (i, word) in rhs.words.iter().enumerate() {
            self.words[i] ^= word;
        }
    }
}

impl std::fmt::Display for PropVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.props().map(Prop::display_name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
