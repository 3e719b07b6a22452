// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed errors for the conditions callers need to tell apart.
//!
//! Everything else flows through `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single embedding request.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The provider needs a credential that is not configured.
    #[error("no {var} set; cannot embed")]
    MissingCredential { var: String },

    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding command failed: {0}")]
    Command(String),

    #[error("embedding backend error: {0}")]
    Backend(String),
}

impl EmbedError {
    /// Returns true when retrying without reconfiguration cannot succeed.
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Self::MissingCredential { .. })
    }
}

/// Failure of the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing files exist but cannot be trusted.
    #[error("vector store at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("embedding dimension mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("append batch has {vectors} vectors but {metadatas} metadata entries")]
    LengthMismatch { vectors: usize, metadatas: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
