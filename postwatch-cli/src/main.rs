//! Postwatch: keyword notifications for a chat event stream.
//!
//! # Usage
//!
//! ```text
//! postwatch run   [--config PATH] [overrides…] [--events PATH|-]
//! postwatch check [--config PATH] [--self-name NAME] <EVENT_JSON_FILE> [--json]
//! postwatch rules [--config PATH] [--json]
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, rules::RulesArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "postwatch",
    version,
    about = "Watch a chat event stream and notify on keyword matches",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Consume events until interrupted or the input ends.
    Run(RunArgs),

    /// Classify a single event offline and show what would be sent.
    Check(CheckArgs),

    /// Print the effective rule set.
    Rules(RulesArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Check(args) => args.run().map(|()| ExitCode::SUCCESS),
        Commands::Rules(args) => args.run().map(|()| ExitCode::SUCCESS),
    }
}
