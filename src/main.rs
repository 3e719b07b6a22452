// SPDX-License-Identifier: MIT OR Apache-2.0

//! docrag - Local document retrieval tool
//!
//! Splits a corpus into token windows, embeds them once into a persisted
//! vector store, and ranks windows by inner product against a query.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize tracing with DOCRAG_LOG env var (e.g., DOCRAG_LOG=info docrag search "query")
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DOCRAG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match cli.command {
        Commands::Search {
            query,
            limit,
            quiet,
        } => {
            commands::search(&query, limit, quiet, format)?;
        }
        Commands::Index { force, quiet } => {
            commands::index(force, quiet, format)?;
        }
        Commands::Status => {
            commands::status(format)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "docrag", &mut std::io::stdout());
        }
    }

    Ok(())
}
