//! The filesystem data source: walks a rule's coverage and produces FCOs
//! with the requested properties computed.

pub mod hashing;
pub mod props;
pub mod walk;


pub use walk::{FsScan, ScanOptions};
