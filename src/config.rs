// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for docrag
//!
//! Loads configuration from .docragrc.toml in current directory or ~/.config/docrag/config.toml

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::embedding::chunker::{ChunkConfig, DEFAULT_OVERLAP_TOKENS, DEFAULT_WINDOW_TOKENS};
use crate::embedding::provider::FASTEMBED_DIM;
use crate::embedding::storage::DEFAULT_EMBEDDING_DIM;

/// Name of the per-directory config file
pub const CONFIG_FILE: &str = ".docragrc.toml";

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    #[default]
    Openai,
    Builtin,
    Command,
}

/// Corpus configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory scanned for documents
    pub path: Option<PathBuf>,
}

impl CorpusConfig {
    /// Get corpus directory (defaults to ./my-docs)
    pub fn path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from("my-docs"))
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Number of tokens per chunk
    pub window_tokens: Option<usize>,
    /// Number of overlap tokens between chunks
    pub overlap_tokens: Option<usize>,
}

impl ChunkingConfig {
    /// Get window size (defaults to 600)
    pub fn window_tokens(&self) -> usize {
        self.window_tokens.unwrap_or(DEFAULT_WINDOW_TOKENS)
    }

    /// Get overlap (defaults to 100)
    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens.unwrap_or(DEFAULT_OVERLAP_TOKENS)
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base path of the persisted store
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Get store base path (defaults to local_docs.index)
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from("local_docs.index"))
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (openai, builtin, command)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier for the embedding provider
    pub model: Option<String>,
    /// Vector length produced by the provider
    pub dimension: Option<usize>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// HTTP request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Openai)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "text-embedding-3-small")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("text-embedding-3-small")
    }

    /// Get dimension (defaults to 1536, or 384 for the builtin model)
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or(match self.provider() {
            EmbeddingProviderType::Builtin => FASTEMBED_DIM,
            _ => DEFAULT_EMBEDDING_DIM,
        })
    }

    /// Get API base URL (defaults to https://api.openai.com/v1)
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get request timeout (defaults to 30 seconds)
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(30)
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results returned per query
    pub top_k: Option<usize>,
}

impl SearchConfig {
    /// Get result count (defaults to 3)
    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(3)
    }
}

/// Configuration loaded from .docragrc.toml or ~/.config/docrag/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    pub store: StoreConfig,
    pub embeddings: EmbeddingConfig,
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .docragrc.toml in current directory
    /// 2. ~/.config/docrag/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(CONFIG_FILE)) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("docrag").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Parse a config file; a missing or malformed file yields `None`.
    pub fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }
}

/// Everything the pipeline needs, resolved from a [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub corpus_dir: PathBuf,
    pub store_path: PathBuf,
    pub chunk: ChunkConfig,
    pub dimension: usize,
}

impl PipelineConfig {
    pub fn new(
        corpus_dir: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
        chunk: ChunkConfig,
        dimension: usize,
    ) -> Self {
        Self {
            corpus_dir: corpus_dir.into(),
            store_path: store_path.into(),
            chunk,
            dimension,
        }
    }

    /// Resolve file configuration, validating the chunk window.
    pub fn from_config(config: &Config) -> Result<Self> {
        let chunk = ChunkConfig::new(
            config.chunking.window_tokens(),
            config.chunking.overlap_tokens(),
        )?;
        Ok(Self::new(
            config.corpus.path(),
            config.store.path(),
            chunk,
            config.embeddings.dimension(),
        ))
    }
}
