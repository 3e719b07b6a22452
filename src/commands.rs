// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command handlers for the docrag binary

use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::OutputFormat;
use docrag::config::Config;
use docrag::embedding::{create_provider, EmbeddingStorage};
use docrag::errors::EmbedError;
use docrag::indexer::BuildOutcome;
use docrag::output::{
    colorize_count, colorize_dimmed, colorize_path, colorize_warning, success_mark, use_colors,
};
use docrag::query::{
    missing_credential_message, SearchOutcome, CANNOT_EMBED_MESSAGE, NO_DOCUMENTS_MESSAGE,
};
use docrag::{PipelineConfig, Retriever};

fn retriever(config: &Config, quiet: bool) -> Result<Retriever> {
    let pipeline = PipelineConfig::from_config(config)?;
    let provider = create_provider(config.embeddings())?;
    Ok(Retriever::new(pipeline, provider)?.with_progress(!quiet))
}

/// Run the search command
pub fn search(query: &str, limit: Option<usize>, quiet: bool, format: OutputFormat) -> Result<()> {
    let config = Config::load();
    let top_k = limit.unwrap_or_else(|| config.search().top_k());
    let mut retriever = retriever(&config, quiet)?;

    match format {
        OutputFormat::Text => {
            println!("{}", retriever.retrieve(query, top_k));
        }
        OutputFormat::Json => {
            let payload = match retriever.search(query, top_k)? {
                SearchOutcome::Hits(hits) => json!({ "query": query, "results": hits }),
                SearchOutcome::NoDocuments => {
                    json!({ "query": query, "results": [], "message": NO_DOCUMENTS_MESSAGE })
                }
                SearchOutcome::CannotEmbed(err) => {
                    let message = match &err {
                        EmbedError::MissingCredential { var } => missing_credential_message(var),
                        _ => CANNOT_EMBED_MESSAGE.to_string(),
                    };
                    json!({
                        "query": query,
                        "results": [],
                        "message": message,
                        "error": err.to_string(),
                    })
                }
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}

/// Run the index command
///
/// Exits with an error when the provider cannot embed, in either format.
pub fn index(force: bool, quiet: bool, format: OutputFormat) -> Result<()> {
    let config = Config::load();
    let mut retriever = retriever(&config, quiet)?;

    let outcome = if force {
        retriever.rebuild()?
    } else {
        retriever.ensure_store()?.1
    };

    if format == OutputFormat::Json {
        let summary = match &outcome {
            BuildOutcome::Reused { entries } => json!({ "status": "reused", "entries": entries }),
            BuildOutcome::Built(report) => json!({
                "status": "built",
                "documents": report.documents,
                "chunks": report.chunks,
                "embedded": report.embedded,
                "failed": report.failed,
            }),
            BuildOutcome::NoDocuments => json!({ "status": "empty", "entries": 0 }),
            BuildOutcome::Unavailable(err) => {
                json!({ "status": "unavailable", "error": err.to_string() })
            }
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let color = use_colors();
        match &outcome {
            BuildOutcome::Reused { entries } => println!(
                "{} Existing store reused ({} entries) {}",
                success_mark(color),
                colorize_count(*entries, color),
                colorize_dimmed("(use --force to rebuild)", color)
            ),
            BuildOutcome::Built(report) => {
                println!(
                    "{} Embedded {} chunks from {} documents",
                    success_mark(color),
                    colorize_count(report.embedded, color),
                    colorize_count(report.documents, color)
                );
                if report.failed > 0 {
                    eprintln!(
                        "{}",
                        colorize_warning(
                            &format!("Warning: {} chunks could not be embedded", report.failed),
                            color
                        )
                    );
                }
            }
            BuildOutcome::NoDocuments => println!(
                "{}",
                colorize_warning(
                    &format!(
                        "No documents found in {}",
                        retriever.config().corpus_dir.display()
                    ),
                    color
                )
            ),
            BuildOutcome::Unavailable(_) => {}
        }
    }

    if let BuildOutcome::Unavailable(err) = outcome {
        return Err(err).context("Cannot build the vector store");
    }
    Ok(())
}

/// Run the status command
pub fn status(format: OutputFormat) -> Result<()> {
    let config = Config::load();
    let pipeline = PipelineConfig::from_config(&config)?;
    let store = EmbeddingStorage::open(pipeline.dimension, &pipeline.store_path)?;
    let persisted = store.backing_files().any_exists();

    if format == OutputFormat::Json {
        let payload = json!({
            "store": pipeline.store_path.display().to_string(),
            "corpus": pipeline.corpus_dir.display().to_string(),
            "persisted": persisted,
            "dimension": store.dimension(),
            "entries": store.len(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let color = use_colors();
    println!(
        "Store:     {}{}",
        colorize_path(&pipeline.store_path.display().to_string(), color),
        if persisted { "" } else { " (not built)" }
    );
    println!(
        "Corpus:    {}",
        colorize_path(&pipeline.corpus_dir.display().to_string(), color)
    );
    println!("Dimension: {}", store.dimension());
    println!("Entries:   {}", colorize_count(store.len(), color));
    Ok(())
}
