//! # assetdesk
//!
//! Service binary for the asset custody desk.
//!
//! ```text
//!   CLI (clap)      HTTP API + helpdesk (axum)      scheduler + mailer
//!       │                      │                          │
//!       └──────────────────────┼──────────────────────────┘
//!                              ▼
//!                       assetdesk-core
//! ```
//!
//! ## Usage
//!
//! ```bash
//! assetdesk init
//! assetdesk server --port 8080
//! assetdesk status --json-mode
//! assetdesk jobs --date 2026-07-01
//! ```

use assetdesk::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // ASSETDESK_LOG_FORMAT=json switches to one JSON object per line.
    let log_format = std::env::var("ASSETDESK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "assetdesk=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  assetdesk v{}
  allocations · checklists · camp rooms · fleet
"#,
        env!("CARGO_PKG_VERSION")
    );
}
