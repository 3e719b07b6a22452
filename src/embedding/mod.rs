// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - handles vector embeddings for document retrieval
//!
//! This module provides token-window chunking, embedding providers and the
//! persisted vector store used for similarity search.

pub mod chunker;
pub mod encoder;
pub mod provider;
pub mod storage;

pub use chunker::{Chunk, ChunkConfig, EmbeddingChunker};
pub use encoder::{Cl100kEncoder, TokenEncoder};
pub use provider::{create_provider, CommandProvider, EmbeddingProvider, OpenAiProvider};
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub use provider::FastEmbedder;
pub use storage::{
    BackingFiles, ChunkMetadata, EmbeddingStorage, SimilarityResult, DEFAULT_EMBEDDING_DIM,
};
