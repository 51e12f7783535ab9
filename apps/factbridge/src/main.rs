//! # Factbridge - Annotation / Rule Engine Bridge
//!
//! The main binary for the factbridge pipeline.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │               apps/factbridge (THE BINARY)              │
//! │                                                         │
//! │   ┌─────────────┐            ┌────────────────────┐    │
//! │   │   CLI       │            │  Document input    │    │
//! │   │  (clap)     │            │  (JSON, symbolic)  │    │
//! │   └──────┬──────┘            └─────────┬──────────┘    │
//! │          │                             │               │
//! │          └──────────────┬──────────────┘               │
//! │                         ▼                               │
//! │               ┌──────────────────┐                      │
//! │               │ factbridge-core  │                      │
//! │               │   (THE LOGIC)    │                      │
//! │               └──────────────────┘                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! factbridge run --document doc.json --rules annotate.frl
//! factbridge check --rules annotate.frl
//! ```

mod cli;
mod input;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // Initialize tracing — FACTBRIDGE_LOG_FORMAT=json enables
    // machine-parseable output.
    let default_filter = if cli.verbose {
        "factbridge=debug,factbridge_core=debug"
    } else if cli.quiet {
        "factbridge=warn,factbridge_core=warn"
    } else {
        "factbridge=info,factbridge_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let log_format = std::env::var("FACTBRIDGE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
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

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
