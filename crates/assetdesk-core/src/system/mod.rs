//! # System Module
//!
//! Read-only figures derived from the registry for dashboards and the
//! `status` command.

mod dashboard;

pub use dashboard::*;
