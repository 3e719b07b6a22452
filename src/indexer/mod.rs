// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexer module - corpus loading and store building
//!
//! The build path runs Loader → Chunker → Embedding Provider → Vector Store.

pub mod build;
pub mod loader;

pub use build::{BuildOutcome, BuildReport, IndexBuilder};
pub use loader::{DocumentLoader, RawDocument};
