//! specreview: replay and inspect spec review sessions.
//!
//! ## Subcommands
//!
//! - `replay`: seed a session from JSON, apply a JSONL event script, print the state
//! - `check`: validate an event script without applying it
//! - `fingerprint`: print the diff hash of a raw diff value

mod logging;
mod script;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "specreview")]
#[command(about = "Spec review session tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply an event script to a seeded session and print the result
    Replay {
        /// Session seed (spec snapshot, diffs, undocumented URLs)
        #[arg(long, value_name = "SEED_JSON")]
        seed: PathBuf,

        /// JSONL event script; blank lines and `#` comments are skipped
        #[arg(long, value_name = "EVENTS_JSONL")]
        events: Option<PathBuf>,

        /// Config file (defaults to ~/.specreview/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Document an endpoint after replay, e.g. "GET /widgets/{id}" (repeatable)
        #[arg(long = "document", value_name = "METHOD PATTERN")]
        document: Vec<String>,

        /// Print only the summary counts
        #[arg(long)]
        summary: bool,
    },

    /// Validate an event script
    Check {
        #[arg(long, value_name = "EVENTS_JSONL")]
        events: PathBuf,
    },

    /// Print the fingerprint of a raw diff
    Fingerprint {
        #[arg(long, value_name = "DIFF_JSON")]
        diff: PathBuf,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            seed,
            events,
            config,
            document,
            summary,
        } => script::replay(script::ReplayArgs {
            seed: &seed,
            events: events.as_deref(),
            config: config.as_deref(),
            document: &document,
            summary_only: summary,
        }),
        Commands::Check { events } => script::check(&events),
        Commands::Fingerprint { diff } => script::fingerprint(&diff),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "specreview failed");
        std::process::exit(1);
    }
}
