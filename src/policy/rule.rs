//! A single policy rule: start point, containment strategy, property mask
//! and attributes.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::fco::name::{FcoName, Rel};
use crate::fco::prop_vector::PropVector;
use crate::wire::{read, write};

/// Upper bound on rule severity.
pub const MAX_SEVERITY: u32 = 1_000_000;

/// Rule attributes carried into reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleAttr {
    pub name: String,
    pub severity: u32,
    pub email: Vec<String>,
}

impl RuleAttr {
    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::string(dest, &self.name)?;
        write::u32(dest, self.severity)?;
        write::usize_as_u32(dest, self.email.len())?;
        for addr in &self.email {
            write::string(dest, addr)?;
        }
        Ok(())
    }

    pub fn read(src: &mut impl Read) -> Result<RuleAttr> {
        let name = read::string(src)?;
        let severity = read::u32(src)?;
        if severity > MAX_SEVERITY {
            return Err(Error::WireFormat("severity out of range"));
        }
        let count = read::u32_as_usize(src)?;
        let mut email = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            email.push(read::string(src)?);
        }
        Ok(RuleAttr { name, severity, email })
    }
}

/// How far below the start point a rule reaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Containment {
    /// Everything under the start point, pruned at stop points and an
    /// optional recurse depth.
    AllBelow { stop_points: BTreeSet<FcoName>, depth: Option<u32> },
    /// Only the start point itself.
    StartPointOnly,
}

/// A policy rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    start_point: FcoName,
    containment: Containment,
    prop_mask: PropVector,
    attrs: RuleAttr,
}

impl Rule {
    pub fn new(start_point: FcoName, prop_mask: PropVector, attrs: RuleAttr) -> Self {
        Self {
            start_point,
            containment: Containment::AllBelow { stop_points: BTreeSet::new(), depth: None },
            prop_mask,
            attrs,
        }
    }

    pub fn start_point(&self) -> &FcoName {
        &self.start_point
    }

    pub fn prop_mask(&self) -> &PropVector {
        &self.prop_mask
    }

    pub fn set_prop_mask(&mut self, mask: PropVector) {
        self.prop_mask = mask;
    }

    pub fn attrs(&self) -> &RuleAttr {
        &self.attrs
    }

    pub fn set_attrs(&mut self, attrs: RuleAttr) {
        self.attrs = attrs;
    }

    pub fn containment(&self) -> &Containment {
        &self.containment
    }

    pub fn set_start_point_only(&mut self) {
        self.containment = Containment::StartPointOnly;
    }

    pub fn set_recurse_depth(&mut self, depth: Option<u32>) {
        match &mut self.containment {
            Containment::AllBelow { depth: d, .. } => *d = depth,
            Containment::StartPointOnly => {
                self.containment =
                    Containment::AllBelow { stop_points: BTreeSet::new(), depth };
            }
        }
    }

    pub fn recurse_depth(&self) -> Option<u32> {
        match &self.containment {
            Containment::AllBelow { depth, .. } => *depth,
            Containment::StartPointOnly => Some(0),
        }
    }

    pub fn stop_points(&self) -> impl Iterator<Item = &FcoName> {
        match &self.containment {
            Containment::AllBelow { stop_points, .. } => Some(stop_points.iter()),
            Containment::StartPointOnly => None,
        }
        .into_iter()
        .flatten()
    }

    /// Adds a stop point.
    ///
    /// The point must lie strictly below the start point. A stop point at
    /// or below an existing one is dropped; an existing one at or below
    /// the new point is replaced, so no two stop points are ever related.
    pub fn add_stop_point(&mut self, point: FcoName) -> Result<()> {
        if !matches!(self.start_point.relationship(&point), Rel::Above) {
            return Err(Error::PolicyParse {
                line: 0,
                msg: format!(
                    "stop point {} is not below start point {}",
                    point, self.start_point
                ),
            });
        }
        let stop_points = match &mut self.containment {
            Containment::AllBelow { stop_points, .. } => stop_points,
            Containment::StartPointOnly => {
                return Err(Error::PolicyParse {
                    line: 0,
                    msg: "rule does not recurse; stop point is meaningless".to_owned(),
                })
            }
        };
        // the higher of two related points wins
        if stop_points
            .iter()
            .any(|e| matches!(e.relationship(&point), Rel::Above | Rel::Equal))
        {
            return Ok(());
        }
        let doomed: Vec<FcoName> = stop_points
            .iter()
            .filter(|e| matches!(e.relationship(&point), Rel::Below))
            .cloned()
            .collect();
        for point in doomed {
            stop_points.remove(&point);
        }
        stop_points.insert(point);
        Ok(())
    }

    /// Whether this rule's coverage includes `name`.
    pub fn contains(&self, name: &FcoName) -> bool {
        let rel = self.start_point.relationship(name);
        if !matches!(rel, Rel::Equal | Rel::Above) {
            return false;
        }
        match &self.containment {
            Containment::StartPointOnly => rel == Rel::Equal,
            Containment::AllBelow { stop_points, depth } => {
                if let Some(depth) = depth {
                    let below = (name.len() - self.start_point.len()) as u32;
                    if below > *depth {
                        return false;
                    }
                }
                !stop_points.iter().any(|stop| {
                    matches!(stop.relationship(name), Rel::Equal | Rel::Above)
                })
            }
        }
    }

    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        self.start_point.write(dest)?;
        match &self.containment {
            Containment::StartPointOnly => {
                write::u8(dest, 0)?;
            }
            Containment::AllBelow { stop_points, depth } => {
                write::u8(dest, 1)?;
                write::usize_as_u32(dest, stop_points.len())?;
                for point in stop_points {
                    point.write(dest)?;
                }
                write::option(dest, *depth, |d, dest| write::u32(dest, d))?;
            }
        }
        self.prop_mask.write(dest)?;
        self.attrs.write(dest)
    }

    pub fn read(src: &mut impl Read) -> Result<Rule> {
        let start_point = FcoName::read(src)?;
        let containment = match read::u8(src)? {
            0 => Containment::StartPointOnly,
            1 => {
                let count = read::u32_as_usize(src)?;
                let mut stop_points = BTreeSet::new();
                for _ in 0..count {
                    stop_points.insert(FcoName::read(src)?);
                }
                let depth = read::option(src, read::u32)?;
                Containment::AllBelow { stop_points, depth }
            }
            _ => return Err(Error::WireFormat("unknown containment tag")),
        };
        let prop_mask = PropVector::read(src)?;
        let attrs = RuleAttr::read(src)?;
        Ok(Rule { start_point, containment, prop_mask, attrs })
    }
}

impl PartialOrd for Rule {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rule {
    /// Lexicographic over (start point, sorted stop points). This is the
    /// canonical rule order used for lookups and duplicate detection.
    fn cmp(&self, other: &Self) -> Ordering {
        self.start_point.cmp(&other.start_point).then_with(|| {
            let mine: Vec<&FcoName> = self.stop_points().collect();
            let theirs: Vec<&FcoName> = other.stop_points().collect();
            mine.cmp(&theirs)
        })
    }
}
