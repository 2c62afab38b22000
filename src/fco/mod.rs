//! File Configuration Objects: names, property values, property vectors
//! and the object records the database stores.

pub mod name;
pub mod name_table;
pub mod object;
pub mod prop;
pub mod prop_vector;
pub mod set;

#[cfg(test)]
mod tests;

pub use name::{FcoName, Rel};
pub use object::Fco;
pub use prop::{CmpOp, CmpResult, FileType, HashAlgo, HashValue, Prop, PropValue, PROP_COUNT};
pub use prop_vector::PropVector;
pub use set::FcoSet;

use num_derive::{FromPrimitive, ToPrimitive};

/// A namespace of FCO types. Only the filesystem genre is implemented, but
/// persisted artifacts carry the tag for forward extensibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, ToPrimitive)]
pub enum Genre {
    Fs = 1,
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Genre::Fs => write!(f, "FS"),
        }
    }
}
