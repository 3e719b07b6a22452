// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token window chunker for embedding generation.
//!
//! This module splits document text into overlapping windows measured in
//! tokens. Windows are decoded back to text, so chunk boundaries do not
//! necessarily fall on word boundaries.

use anyhow::{bail, Result};
use std::ops::Range;

use crate::embedding::encoder::TokenEncoder;
use crate::indexer::loader::RawDocument;

/// Default number of tokens per chunk.
pub const DEFAULT_WINDOW_TOKENS: usize = 600;

/// Default overlap between consecutive chunks, in tokens.
pub const DEFAULT_OVERLAP_TOKENS: usize = 100;

/// Configuration for the token chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Number of tokens per chunk.
    pub window_tokens: usize,
    /// Number of overlapping tokens between consecutive chunks.
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_tokens: DEFAULT_WINDOW_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
        }
    }
}

impl ChunkConfig {
    /// Creates a new ChunkConfig with the specified parameters.
    pub fn new(window_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if window_tokens == 0 {
            bail!("window_tokens must be greater than 0");
        }
        if overlap_tokens >= window_tokens {
            bail!(
                "overlap_tokens ({}) must be less than window_tokens ({})",
                overlap_tokens,
                window_tokens
            );
        }
        Ok(Self {
            window_tokens,
            overlap_tokens,
        })
    }

    /// Distance between the starts of consecutive windows.
    pub fn stride(&self) -> usize {
        self.window_tokens - self.overlap_tokens
    }
}

/// A window of a document, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
}

/// Splits documents into overlapping token windows.
pub struct EmbeddingChunker {
    config: ChunkConfig,
}

impl EmbeddingChunker {
    /// Creates a new chunker with the given configuration.
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Creates a chunker with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Computes the token ranges covering a stream of `total` tokens.
    ///
    /// Algorithm:
    /// ```text
    /// start = 0
    /// step = window - overlap
    /// while start < total:
    ///   emit [start, min(start + window, total))
    ///   start += step
    /// ```
    ///
    /// This yields exactly `ceil(total / step)` windows.
    pub fn windows(&self, total: usize) -> Vec<Range<usize>> {
        let step = self.config.stride();
        let mut windows = Vec::with_capacity(total.div_ceil(step));
        let mut start = 0_usize;

        while start < total {
            let end = (start + self.config.window_tokens).min(total);
            windows.push(start..end);
            start += step;
        }

        windows
    }

    /// Splits a document into chunks tagged with its source identifier.
    ///
    /// Every window yields exactly one chunk.
    pub fn chunk_document(&self, doc: &RawDocument, encoder: &dyn TokenEncoder) -> Vec<Chunk> {
        let tokens = encoder.encode(&doc.text);

        self.windows(tokens.len())
            .into_iter()
            .map(|range| Chunk {
                text: encoder.decode(&tokens[range]),
                source_id: doc.source_id.clone(),
            })
            .collect()
    }
}
