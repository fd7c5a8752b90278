//! # assetdesk
//!
//! The service around `assetdesk-core`: HTTP API, CLI, scheduled jobs and
//! outbound email. Every rule lives in the core; this crate only moves
//! requests in and notifications out.

pub mod api;
pub mod cli;
pub mod config;
pub mod mailer;
pub mod scheduler;
