// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval entry point: build-if-empty, embed the query, rank chunks

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt::Write;
use tracing::{error, warn};

use crate::config::PipelineConfig;
use crate::embedding::encoder::{Cl100kEncoder, TokenEncoder};
use crate::embedding::provider::EmbeddingProvider;
use crate::embedding::storage::{EmbeddingStorage, SimilarityResult};
use crate::errors::EmbedError;
use crate::indexer::build::{BuildOutcome, IndexBuilder};

/// Returned when the store is empty after the build pass.
pub const NO_DOCUMENTS_MESSAGE: &str =
    "No documents found in vector store. Place documents in the corpus directory.";

/// Returned when the query cannot be embedded.
pub const CANNOT_EMBED_MESSAGE: &str = "Embedding provider unavailable. Cannot embed queries.";

/// Returned when the query cannot be embedded for lack of a credential.
pub fn missing_credential_message(var: &str) -> String {
    format!("No {var} set. Cannot embed queries.")
}

/// Returned when the search produced no hits.
pub const NO_RESULTS_MESSAGE: &str = "No relevant documents found.";

/// One ranked hit, as exposed to JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// 1-based rank
    pub rank: usize,
    pub score: f32,
    pub source: String,
    pub text: String,
}

/// Result of a structured search.
#[derive(Debug)]
pub enum SearchOutcome {
    /// The store has no entries, even after a build attempt.
    NoDocuments,
    /// The provider could not embed what it was given.
    CannotEmbed(EmbedError),
    /// Ranked hits; may be empty.
    Hits(Vec<SearchHit>),
}

/// Document retrieval over a persisted vector store.
///
/// Owns the pipeline configuration, the embedding provider and the token
/// encoder; one instance serves any number of queries.
pub struct Retriever {
    config: PipelineConfig,
    provider: Box<dyn EmbeddingProvider>,
    encoder: Box<dyn TokenEncoder>,
    show_progress: bool,
}

impl Retriever {
    /// Create a retriever using the `cl100k_base` encoder.
    ///
    /// Fails if the provider's dimension differs from the configured one.
    pub fn new(config: PipelineConfig, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        Self::with_encoder(config, provider, Box::new(Cl100kEncoder::new()?))
    }

    pub fn with_encoder(
        config: PipelineConfig,
        provider: Box<dyn EmbeddingProvider>,
        encoder: Box<dyn TokenEncoder>,
    ) -> Result<Self> {
        if provider.dimension() != config.dimension {
            bail!(
                "embedding provider '{}' produces {} dimensions but the store is configured for {}",
                provider.model_id(),
                provider.dimension(),
                config.dimension
            );
        }
        Ok(Self {
            config,
            provider,
            encoder,
            show_progress: false,
        })
    }

    /// Show a progress bar when a build pass runs.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Open the store, building it first if it has no entries.
    pub fn ensure_store(&mut self) -> Result<(EmbeddingStorage, BuildOutcome)> {
        IndexBuilder::new(&self.config, self.encoder.as_ref())
            .with_progress(self.show_progress)
            .ensure_store(self.provider.as_mut())
    }

    /// Rebuild the store from the corpus, keeping the persisted one unless
    /// the new build embedded something.
    pub fn rebuild(&mut self) -> Result<BuildOutcome> {
        IndexBuilder::new(&self.config, self.encoder.as_ref())
            .with_progress(self.show_progress)
            .rebuild(self.provider.as_mut())
    }

    /// Ranked search returning structured hits.
    pub fn search(&mut self, query: &str, top_k: usize) -> Result<SearchOutcome> {
        let (store, outcome) = self.ensure_store()?;
        if let BuildOutcome::Unavailable(err) = outcome {
            return Ok(SearchOutcome::CannotEmbed(err));
        }
        if store.is_empty() {
            return Ok(SearchOutcome::NoDocuments);
        }

        let query_vector = match self
            .provider
            .check_ready()
            .and_then(|()| self.provider.embed(query))
        {
            Ok(vector) => vector,
            Err(err) => {
                warn!("failed to embed query: {}", err);
                return Ok(SearchOutcome::CannotEmbed(err));
            }
        };

        let hits = store
            .search_similar(&query_vector, top_k)?
            .into_iter()
            .enumerate()
            .map(|(i, result)| SearchHit::from_result(i + 1, result))
            .collect();
        Ok(SearchOutcome::Hits(hits))
    }

    /// Answer a query with a human-readable string.
    ///
    /// Never fails: every error is turned into a sentence.
    pub fn retrieve(&mut self, query: &str, top_k: usize) -> String {
        match self.search(query, top_k) {
            Ok(SearchOutcome::NoDocuments) => NO_DOCUMENTS_MESSAGE.to_string(),
            Ok(SearchOutcome::CannotEmbed(EmbedError::MissingCredential { var })) => {
                missing_credential_message(&var)
            }
            Ok(SearchOutcome::CannotEmbed(_)) => CANNOT_EMBED_MESSAGE.to_string(),
            Ok(SearchOutcome::Hits(hits)) if hits.is_empty() => NO_RESULTS_MESSAGE.to_string(),
            Ok(SearchOutcome::Hits(hits)) => render_hits(&hits),
            Err(err) => {
                error!("document search failed: {:#}", err);
                format!("Error in document search: {:#}", err)
            }
        }
    }
}

impl SearchHit {
    fn from_result(rank: usize, result: SimilarityResult) -> Self {
        Self {
            rank,
            score: result.score,
            source: result.source_id,
            text: result.text,
        }
    }
}

/// Render hits as `[Rank i | Score=s | Source=src]` blocks in rank order.
pub fn render_hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        let _ = write!(
            out,
            "\n---\n[Rank {} | Score={:.3} | Source={}]\n{}",
            hit.rank, hit.score, hit.source, hit.text
        );
    }
    out.trim().to_string()
}
