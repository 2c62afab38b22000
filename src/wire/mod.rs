//! Portable on-disk encoding primitives.
//!
//! Every persisted integer is little-endian with an explicit width; strings
//! and byte vectors are a `u32` count followed by the bytes, with no
//! terminator. Enum tags travel as `u32` discriminants converted through
//! `num_traits`, so an out-of-range tag is a decode error rather than a
//! bogus value.

pub mod read;
pub mod write;
