//! # Factbridge CLI Module
//!
//! ## Available Commands
//!
//! - `run` - Load a document and a rule file, run the bridge, report
//! - `check` - Compile a rule file and report every error

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::{AppError, cmd_check, cmd_run};

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Factbridge - annotation graph / rule engine bridge
///
/// Walks a typed document graph into a rule engine's working memory, fires
/// the rules and mirrors every fact lifecycle event back into the document
/// index.
#[derive(Parser, Debug)]
#[command(name = "factbridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug-level) output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline over a document
    Run {
        /// Path to the JSON document description
        #[arg(short, long)]
        document: PathBuf,

        /// Path to the rule file
        #[arg(short, long)]
        rules: PathBuf,

        /// Optional audit log destination (JSON lines)
        #[arg(short, long)]
        audit_log: Option<PathBuf>,
    },
    /// Compile a rule file and list every error
    Check {
        /// Path to the rule file
        #[arg(short, long)]
        rules: PathBuf,
    },
}

/// Execute the parsed CLI command.
pub fn execute(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Run {
            document,
            rules,
            audit_log,
        } => cmd_run(&document, &rules, audit_log, cli.json_mode),
        Commands::Check { rules } => cmd_check(&rules, cli.json_mode),
    }
}
