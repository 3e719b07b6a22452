// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query module - the retrieval entry point consumed by agents

pub mod retrieve;

pub use retrieve::{
    missing_credential_message, render_hits, Retriever, SearchHit, SearchOutcome, CANNOT_EMBED_MESSAGE,
    NO_DOCUMENTS_MESSAGE, NO_RESULTS_MESSAGE,
};
