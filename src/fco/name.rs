//! Path identifiers over interned components.

use std::cmp::Ordering;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fco::name_table::{self, cmp_key, Comp};
use crate::wire::{read, write};

/// The delimiter used by the filesystem genre.
pub const DEFAULT_DELIM: char = '/';

/// Whether two leading delimiters name a distinct root (`//host/share`
/// style). POSIX permits this; none of the supported targets use it.
pub const DOUBLE_SLASH_ROOT: bool = false;

/// How two names relate in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rel {
    Equal,
    /// `self` is an ancestor of the other name.
    Above,
    /// `self` is a descendant of the other name.
    Below,
    Unrelated,
}

/// An interned, ordered path identifier.
///
/// The component list is shared on clone and copied on the first mutation
/// of a shared list.
#[derive(Clone)]
pub struct FcoName {
    comps: Arc<Vec<Comp>>,
    delim: char,
}

impl FcoName {
    /// An empty name with the default delimiter.
    pub fn new() -> Self {
        Self { comps: Arc::new(Vec::new()), delim: DEFAULT_DELIM }
    }

    /// Parses a path string with the default delimiter.
    pub fn from_path(path: &str) -> Self {
        Self::from_path_with_delim(path, DEFAULT_DELIM)
    }

    /// Parses a path string, splitting on `delim`.
    ///
    /// Runs of delimiters collapse, except that a leading empty component
    /// is retained to mark an absolute path and, where the platform gives
    /// `//` its own meaning, up to two leading empties survive.
    pub fn from_path_with_delim(path: &str, delim: char) -> Self {
        let mut comps: Vec<Comp> = Vec::new();
        let mut leading = true;
        let mut leading_empties = 0usize;
        for piece in path.split(delim) {
            if piece.is_empty() {
                if leading {
                    let keep = if DOUBLE_SLASH_ROOT { 2 } else { 1 };
                    if leading_empties < keep {
                        comps.push(name_table::intern(""));
                        leading_empties += 1;
                    }
                }
                continue;
            }
            leading = false;
            comps.push(name_table::intern(piece));
        }
        Self { comps: Arc::new(comps), delim }
    }

    pub fn delimiter(&self) -> char {
        self.delim
    }

    pub fn len(&self) -> usize {
        self.comps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comps.is_empty()
    }

    /// Appends a component.
    pub fn push(&mut self, component: &str) {
        Arc::make_mut(&mut self.comps).push(name_table::intern(component));
    }

    /// Removes and returns the last component.
    pub fn pop(&mut self) -> Option<String> {
        Arc::make_mut(&mut self.comps).pop().map(|node| node.text().to_owned())
    }

    /// Removes and returns the first component.
    pub fn pop_front(&mut self) -> Option<String> {
        let comps = Arc::make_mut(&mut self.comps);
        if comps.is_empty() {
            return None;
        }
        Some(comps.remove(0).text().to_owned())
    }

    /// The name one level up, or `None` at a root.
    pub fn parent(&self) -> Option<FcoName> {
        if self.comps.len() <= 1 {
            return None;
        }
        let mut parent = self.clone();
        parent.pop();
        Some(parent)
    }

    /// A child of this name.
    pub fn child(&self, component: &str) -> FcoName {
        let mut child = self.clone();
        child.push(component);
        child
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.comps.iter().map(|node| node.text())
    }

    /// Classifies this name against another.
    pub fn relationship(&self, other: &FcoName) -> Rel {
        let case = name_table::table().case_policy();
        let shared = self.comps.len().min(other.comps.len());
        for i in 0..shared {
            let a = &self.comps[i];
            let b = &other.comps[i];
            if !Arc::ptr_eq(a, b) && cmp_key(a, case) != cmp_key(b, case) {
                return Rel::Unrelated;
            }
        }
        match self.comps.len().cmp(&other.comps.len()) {
            Ordering::Equal => Rel::Equal,
            Ordering::Less => Rel::Above,
            Ordering::Greater => Rel::Below,
        }
    }

    /// String form. A one-component name carries a trailing delimiter so
    /// the root renders as `/`; longer names do not.
    pub fn as_string(&self) -> String {
        let mut out = String::new();
        for (i, node) in self.comps.iter().enumerate() {
            if i > 0 {
                out.push(self.delim);
            }
            out.push_str(node.text());
        }
        if self.comps.len() == 1 {
            out.push(self.delim);
        }
        out
    }

    /// Writes the name in its legacy wire form: the string rendering plus
    /// delimiter and case-sensitivity bytes. The delimiter is always `/`
    /// on the wire.
    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::string(dest, &self.as_string())?;
        write::u8(dest, b'/')?;
        let sensitive = name_table::table().case_policy() == name_table::CasePolicy::Sensitive;
        write::bool(dest, sensitive)
    }

    /// Reads a name written by [`FcoName::write`], validating the case flag
    /// against the table policy.
    pub fn read(src: &mut impl Read) -> Result<FcoName> {
        let path = read::string(src)?;
        let delim = read::u8(src)?;
        if delim != b'/' {
            return Err(Error::WireFormat("unsupported name delimiter"));
        }
        let sensitive = read::bool(src)?;
        let table_sensitive =
            name_table::table().case_policy() == name_table::CasePolicy::Sensitive;
        if sensitive != table_sensitive {
            return Err(Error::WireFormat("name case policy does not match this genre"));
        }
        Ok(FcoName::from_path(&path))
    }
}

impl Default for FcoName {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for FcoName {
    fn eq(&self, other: &Self) -> bool {
        if self.comps.len() != other.comps.len() {
            return false;
        }
        let case = name_table::table().case_policy();
        self.comps
            .iter()
            .zip(other.comps.iter())
            .all(|(a, b)| Arc::ptr_eq(a, b) || cmp_key(a, case) == cmp_key(b, case))
    }
}

impl Eq for FcoName {}

impl PartialOrd for FcoName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FcoName {
    /// Componentwise text order under the table's case policy; a strict
    /// prefix sorts first, so ancestors come before descendants.
    fn cmp(&self, other: &Self) -> Ordering {
        let case = name_table::table().case_policy();
        let shared = self.comps.len().min(other.comps.len());
        for i in 0..shared {
            let a = &self.comps[i];
            let b = &other.comps[i];
            if Arc::ptr_eq(a, b) {
                continue;
            }
            match cmp_key(a, case).cmp(cmp_key(b, case)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        self.comps.len().cmp(&other.comps.len())
    }
}

impl std::fmt::Display for FcoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl std::fmt::Debug for FcoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FcoName({})", self.as_string())
    }
}

impl From<&str> for FcoName {
    fn from(path: &str) -> Self {
        FcoName::from_path(path)
    }
}
