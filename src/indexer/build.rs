// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store builder: load, chunk, embed and persist the corpus

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::embedding::chunker::EmbeddingChunker;
use crate::embedding::encoder::TokenEncoder;
use crate::embedding::provider::EmbeddingProvider;
use crate::embedding::storage::{ChunkMetadata, EmbeddingStorage};
use crate::errors::{EmbedError, StoreError};
use crate::indexer::loader::DocumentLoader;

/// Counters from one build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub failed: usize,
}

/// What `ensure_store` did with the store.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The persisted store already had entries and was used as-is.
    Reused { entries: usize },
    /// A build pass ran and the result was persisted.
    Built(BuildReport),
    /// The corpus held no documents; the store stays empty.
    NoDocuments,
    /// Documents exist but the provider cannot embed anything.
    Unavailable(EmbedError),
}

/// Builds the vector store when it is empty.
pub struct IndexBuilder<'a> {
    config: &'a PipelineConfig,
    encoder: &'a dyn TokenEncoder,
    show_progress: bool,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &'a PipelineConfig, encoder: &'a dyn TokenEncoder) -> Self {
        Self {
            config,
            encoder,
            show_progress: false,
        }
    }

    /// Show a progress bar over chunks while embedding.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Open the store, building it from the corpus if it has no entries.
    ///
    /// A non-empty store is never compared against the corpus; use
    /// [`rebuild`](Self::rebuild) to pick up new documents.
    pub fn ensure_store(
        &self,
        provider: &mut dyn EmbeddingProvider,
    ) -> Result<(EmbeddingStorage, BuildOutcome)> {
        let mut store = EmbeddingStorage::open(self.config.dimension, &self.config.store_path)?;
        if !store.is_empty() {
            info!("existing vector store found with {} entries", store.len());
            let entries = store.len();
            return Ok((store, BuildOutcome::Reused { entries }));
        }

        let outcome = self.build(&mut store, provider)?;
        if matches!(outcome, BuildOutcome::Built(_)) {
            store.persist()?;
        }
        Ok((store, outcome))
    }

    /// Build a fresh store from the corpus and replace the persisted one.
    ///
    /// The existing files are not read, so a corrupt store can be rebuilt.
    /// They are only replaced once at least one chunk was embedded; an empty
    /// corpus, an unavailable provider or a pass where every chunk failed
    /// leaves them as they were.
    pub fn rebuild(&self, provider: &mut dyn EmbeddingProvider) -> Result<BuildOutcome> {
        let mut fresh = EmbeddingStorage::new(self.config.dimension, &self.config.store_path);
        let outcome = self.build(&mut fresh, provider)?;

        match &outcome {
            BuildOutcome::Built(report) if report.embedded > 0 => fresh.persist()?,
            BuildOutcome::Built(_) => {
                warn!("no chunk was embedded; keeping the existing store")
            }
            _ => info!("rebuild did not run; keeping the existing store"),
        }
        Ok(outcome)
    }

    fn build(
        &self,
        store: &mut EmbeddingStorage,
        provider: &mut dyn EmbeddingProvider,
    ) -> Result<BuildOutcome> {
        info!(
            "building vector store from {}",
            self.config.corpus_dir.display()
        );
        let docs = DocumentLoader::new(&self.config.corpus_dir).load();
        if docs.is_empty() {
            warn!(
                "no documents in {}; store will be empty",
                self.config.corpus_dir.display()
            );
            return Ok(BuildOutcome::NoDocuments);
        }

        if let Err(err) = provider.check_ready() {
            error!("{}", err);
            return Ok(BuildOutcome::Unavailable(err));
        }

        let chunker = EmbeddingChunker::new(self.config.chunk);
        let chunks: Vec<_> = docs
            .iter()
            .flat_map(|doc| chunker.chunk_document(doc, self.encoder))
            .collect();

        let mut report = BuildReport {
            documents: docs.len(),
            chunks: chunks.len(),
            ..Default::default()
        };

        let pb = self.progress_bar(chunks.len() as u64);
        let mut vectors = Vec::with_capacity(chunks.len());
        let mut metas = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            pb.set_message(chunk.source_id.clone());
            match provider.embed(&chunk.text) {
                Ok(vector) => {
                    if vector.len() != store.dimension() {
                        pb.finish_and_clear();
                        return Err(StoreError::DimensionMismatch {
                            expected: store.dimension(),
                            actual: vector.len(),
                        }
                        .into());
                    }
                    vectors.push(vector);
                    metas.push(ChunkMetadata::from(chunk));
                    report.embedded += 1;
                }
                Err(err) => {
                    error!("embedding error on chunk from {}: {}", chunk.source_id, err);
                    report.failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        store.append_batch(vectors, metas)?;

        info!(
            "store built with {} chunks ({} failed)",
            report.embedded, report.failed
        );
        Ok(BuildOutcome::Built(report))
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} chunks | Embedding {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##."),
        );
        pb
    }
}
