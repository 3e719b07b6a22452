// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// docrag - Local document retrieval for AI agents
///
/// Embeds the documents of a corpus directory once and answers queries
/// with the most similar passages.
#[derive(Parser, Debug)]
#[command(name = "docrag")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the corpus, building the store first if it is empty
    #[command(alias = "s")]
    Search {
        /// Search query (natural language)
        query: String,

        /// Maximum number of results
        #[arg(short = 'm', long = "limit")]
        limit: Option<usize>,

        /// Hide the build progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Build the store if it is empty
    Index {
        /// Delete the persisted store and rebuild from the corpus
        #[arg(short, long)]
        force: bool,

        /// Hide the build progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the persisted store without building it
    Status,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
