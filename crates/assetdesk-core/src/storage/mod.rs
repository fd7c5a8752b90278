//! # Storage
//!
//! Durable storage backends for the desk.

mod redb_registry;

pub use redb_registry::*;
