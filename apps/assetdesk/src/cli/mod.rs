//! # assetdesk CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server and the scheduler
//! - `init` - Initialize a new database
//! - `status` - Show dashboard counts
//! - `export` - Export the registry to a file
//! - `import` - Import the registry from a snapshot
//! - `jobs` - Run the daily jobs once

mod commands;

use crate::config::{Backend, Config};
use assetdesk_core::DeskError;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// assetdesk - asset custody desk
///
/// Allocation workflows with approval, check-in/check-out checklists,
/// camp rooms, fleet scheduling and exit clearance.
#[derive(Parser, Debug)]
#[command(name = "assetdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database (default: assetdesk.db)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (default: redb)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server and scheduler
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show dashboard counts
    Status,

    /// Export the registry
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (snapshot, json)
        #[arg(short = 't', long, default_value = "snapshot")]
        format: String,
    },

    /// Replace the registry with a snapshot file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run expiry alerts and maintenance recurrence once
    Jobs {
        /// Run as of this date (YYYY-MM-DD) instead of now
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), DeskError> {
    let config = Config::load(cli.config.as_deref())?;
    let database = config.database(cli.database.as_deref());
    let backend = config.backend(cli.backend);
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(config, &database, backend, host, port).await
        }
        Some(Commands::Init { force }) => cmd_init(&database, backend, force),
        Some(Commands::Status) | None => cmd_status(&database, backend, json_mode),
        Some(Commands::Export { output, format }) => {
            cmd_export(&database, backend, &output, &format)
        }
        Some(Commands::Import { input }) => cmd_import(&database, backend, &input, json_mode),
        Some(Commands::Jobs { date }) => {
            cmd_jobs(&config, &database, backend, date, json_mode).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "assetdesk",
            "status",
            "--backend",
            "file",
            "-D",
            "desk.snapshot",
            "--json-mode",
        ])
        .expect("parse");
        assert_eq!(cli.backend, Some(Backend::File));
        assert_eq!(cli.database, Some(PathBuf::from("desk.snapshot")));
        assert!(cli.json_mode);
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn jobs_date_is_parsed() {
        let cli = Cli::try_parse_from(["assetdesk", "jobs", "--date", "2026-07-01"]).expect("parse");
        let expected = NaiveDate::from_ymd_opt(2026, 7, 1);
        assert!(matches!(
            cli.command,
            Some(Commands::Jobs { date }) if date == expected
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["assetdesk", "--backend", "sqlite", "status"]).is_err());
    }
}
