//! Bantz - Turkish Personal Assistant
//!
//! CLI entry point for the Bantz turn pipeline.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod cli;
mod config;
mod providers;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    // stdout carries replies, logs go to stderr
    let (text_layer, json_layer) = if cli.json_logs {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bantz=info,bantz_core=info".into()),
        )
        .with(text_layer)
        .with(json_layer)
        .init();

    if cli.command.is_some() {
        info!("Starting Bantz v{}", env!("CARGO_PKG_VERSION"));
    }

    cli::run(cli).await
}
