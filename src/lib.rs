// SPDX-License-Identifier: MIT OR Apache-2.0

//! docrag - Local document retrieval library
//!
//! Ingests a corpus directory into a persisted vector store and answers
//! free-text queries with the most similar token windows.

pub mod config;
pub mod embedding;
pub mod errors;
pub mod indexer;
pub mod output;
pub mod query;

pub use config::{Config, PipelineConfig};
pub use query::Retriever;
