//! # Formats
//!
//! Serialization formats for registry snapshots.

mod persistence;

pub use persistence::*;
