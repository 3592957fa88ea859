//! CLI module for Bantz
//!
//! Provides commands:
//! - `chat`: interactive turn loop on stdin
//! - `latency-gate`: p95 budget check over a trace log
//! - `check-config`: validate and print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod chat;
pub mod check;
pub mod gate;

/// Bantz personal assistant CLI
#[derive(Parser, Debug)]
#[command(name = "bantz")]
#[command(about = "Turkish personal assistant turn pipeline")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat on stdin, one utterance per line
    Chat {
        /// Process a single utterance and exit
        #[arg(long)]
        once: Option<String>,
        /// Print the full turn output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check p95 phase latencies of a trace log against the budgets
    LatencyGate {
        /// Trace log (defaults to the configured path)
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Validate and print the effective configuration
    CheckConfig,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Chat { once, json }) => chat::run(once, json).await,
        Some(Commands::LatencyGate { trace }) => gate::run(trace).await,
        Some(Commands::CheckConfig) => check::run(),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
