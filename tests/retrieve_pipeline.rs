// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use docrag::embedding::{BackingFiles, ChunkConfig, EmbeddingProvider, EmbeddingStorage, TokenEncoder};
use docrag::errors::EmbedError;
use docrag::indexer::BuildOutcome;
use docrag::query::{SearchOutcome, CANNOT_EMBED_MESSAGE, NO_DOCUMENTS_MESSAGE};
use docrag::{PipelineConfig, Retriever};

const VOCAB: &[&str] = &["alpha", "beta", "gamma", "delta"];

/// One token per known word.
struct WordEncoder;

impl TokenEncoder for WordEncoder {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace()
            .map(|w| VOCAB.iter().position(|v| *v == w).unwrap() as u32)
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        tokens
            .iter()
            .map(|t| VOCAB[*t as usize])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Embeds text as normalized word counts over the first three vocabulary words.
struct CountingProvider {
    calls: Arc<AtomicUsize>,
    fail_prefix: Option<&'static str>,
    missing_credential: bool,
}

impl CountingProvider {
    fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            calls,
            fail_prefix: None,
            missing_credential: false,
        }
    }
}

impl EmbeddingProvider for CountingProvider {
    fn model_id(&self) -> &str {
        "word-counts"
    }

    fn dimension(&self) -> usize {
        3
    }

    fn check_ready(&self) -> Result<(), EmbedError> {
        if self.missing_credential {
            return Err(EmbedError::MissingCredential {
                var: "TEST_API_KEY".into(),
            });
        }
        Ok(())
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(prefix) = self.fail_prefix {
            if text.starts_with(prefix) {
                return Err(EmbedError::Backend("rejected".into()));
            }
        }
        let mut v = vec![0.0f32; 3];
        for word in text.split_whitespace() {
            if let Some(i) = VOCAB[..3].iter().position(|w| *w == word) {
                v[i] += 1.0;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

fn pipeline(dir: &Path) -> PipelineConfig {
    PipelineConfig::new(
        dir.join("my-docs"),
        dir.join("local_docs.index"),
        ChunkConfig::default(),
        3,
    )
}

/// 500 alpha, 500 beta, 500 gamma: windows 0..600, 500..1100, 1000..1500.
fn write_three_topic_doc(corpus: &Path) {
    let mut words = Vec::with_capacity(1500);
    for word in ["alpha", "beta", "gamma"] {
        words.extend(std::iter::repeat(word).take(500));
    }
    fs::create_dir_all(corpus).unwrap();
    fs::write(corpus.join("topics.txt"), words.join(" ")).unwrap();
}

fn retriever(config: PipelineConfig, provider: CountingProvider) -> Retriever {
    Retriever::with_encoder(config, Box::new(provider), Box::new(WordEncoder)).unwrap()
}

fn non_empty_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && e.metadata().map(|m| m.len() > 0).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect()
}

#[test]
fn absent_corpus_reports_no_documents() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut r = retriever(pipeline(dir.path()), CountingProvider::new(calls.clone()));

    assert_eq!(r.retrieve("anything", 3), NO_DOCUMENTS_MESSAGE);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(non_empty_files(dir.path()).is_empty());
}

#[test]
fn build_produces_one_entry_per_window() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let calls = Arc::new(AtomicUsize::new(0));
    let mut r = retriever(config.clone(), CountingProvider::new(calls.clone()));

    let (store, outcome) = r.ensure_store().unwrap();
    match outcome {
        BuildOutcome::Built(report) => {
            assert_eq!(report.documents, 1);
            assert_eq!(report.chunks, 3);
            assert_eq!(report.embedded, 3);
            assert_eq!(report.failed, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(store.len(), 3);
    assert!(store.metadata().iter().all(|m| m.source_id == "topics.txt"));

    let reopened = EmbeddingStorage::open(3, &config.store_path).unwrap();
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.metadata(), store.metadata());
}

#[test]
fn query_ranks_matching_window_first() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let mut r = retriever(config, CountingProvider::new(Arc::new(AtomicUsize::new(0))));

    let hits = match r.search("beta", 3).unwrap() {
        SearchOutcome::Hits(hits) => hits,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].rank, 1);
    assert!(hits[0].text.starts_with("beta"));
    assert!(hits[0].text.ends_with("gamma"));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    let rendered = r.retrieve("beta", 1);
    assert!(rendered.starts_with("---\n[Rank 1 | Score=0.981 | Source=topics.txt]\nbeta"));
    assert!(!rendered.contains("[Rank 2"));
}

#[test]
fn failed_chunks_are_dropped() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let provider = CountingProvider {
        fail_prefix: Some("gamma"),
        ..CountingProvider::new(Arc::new(AtomicUsize::new(0)))
    };
    let mut r = retriever(config.clone(), provider);

    let (store, outcome) = r.ensure_store().unwrap();
    match outcome {
        BuildOutcome::Built(report) => {
            assert_eq!(report.embedded, 2);
            assert_eq!(report.failed, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(store.len(), 2);
    assert_eq!(EmbeddingStorage::open(3, &config.store_path).unwrap().len(), 2);
}

#[test]
fn second_call_reuses_persisted_store() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);

    let first_calls = Arc::new(AtomicUsize::new(0));
    let mut first = retriever(config.clone(), CountingProvider::new(first_calls.clone()));
    first.retrieve("alpha", 3);
    // three chunks plus the query
    assert_eq!(first_calls.load(Ordering::SeqCst), 4);

    let second_calls = Arc::new(AtomicUsize::new(0));
    let mut second = retriever(config, CountingProvider::new(second_calls.clone()));
    let (_, outcome) = second.ensure_store().unwrap();
    assert!(matches!(outcome, BuildOutcome::Reused { entries: 3 }));
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    second.retrieve("alpha", 3);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn new_documents_need_store_removal() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let mut r = retriever(config.clone(), CountingProvider::new(Arc::new(AtomicUsize::new(0))));
    r.ensure_store().unwrap();

    fs::write(config.corpus_dir.join("extra.md"), "delta alpha").unwrap();
    let (store, _) = r.ensure_store().unwrap();
    assert_eq!(store.len(), 3);

    BackingFiles::for_base(&config.store_path).remove().unwrap();
    let (store, outcome) = r.ensure_store().unwrap();
    assert!(matches!(outcome, BuildOutcome::Built(_)));
    assert_eq!(store.len(), 4);
    assert!(store.metadata().iter().any(|m| m.source_id == "extra.md"));
}

#[test]
fn missing_credential_cannot_embed() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = CountingProvider {
        missing_credential: true,
        ..CountingProvider::new(calls.clone())
    };
    let mut r = retriever(config.clone(), provider);

    assert_eq!(r.retrieve("beta", 3), "No TEST_API_KEY set. Cannot embed queries.");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!BackingFiles::for_base(&config.store_path).any_exists());

    match r.search("beta", 3).unwrap() {
        SearchOutcome::CannotEmbed(err) => assert!(err.is_missing_credential()),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn provider_dimension_must_match_store() {
    let dir = TempDir::new().unwrap();
    let mut config = pipeline(dir.path());
    config.dimension = 1536;
    let provider = CountingProvider::new(Arc::new(AtomicUsize::new(0)));

    let result = Retriever::with_encoder(config, Box::new(provider), Box::new(WordEncoder));
    assert!(result.is_err());
}

#[test]
fn corrupt_store_is_reported_not_rebuilt() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let files = BackingFiles::for_base(&config.store_path);
    fs::write(&files.vectors, b"not a vector file").unwrap();
    fs::write(&files.metadata, b"[]").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut r = retriever(config, CountingProvider::new(calls.clone()));
    let answer = r.retrieve("beta", 3);

    assert!(answer.starts_with("Error in document search:"), "{answer}");
    assert!(answer.contains("corrupt"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn zero_results_requested() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let mut r = retriever(config, CountingProvider::new(Arc::new(AtomicUsize::new(0))));

    assert_eq!(r.retrieve("beta", 0), docrag::query::NO_RESULTS_MESSAGE);
}

#[test]
fn query_embed_failure_cannot_embed() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let provider = CountingProvider {
        fail_prefix: Some("delta"),
        ..CountingProvider::new(Arc::new(AtomicUsize::new(0)))
    };
    let mut r = retriever(config, provider);

    assert_eq!(r.retrieve("delta", 3), CANNOT_EMBED_MESSAGE);
    // the build itself succeeded
    let (store, _) = r.ensure_store().unwrap();
    assert_eq!(store.len(), 3);
}

#[test]
fn rebuild_picks_up_new_documents() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let mut r = retriever(config.clone(), CountingProvider::new(Arc::new(AtomicUsize::new(0))));
    r.ensure_store().unwrap();

    fs::write(config.corpus_dir.join("extra.md"), "delta alpha").unwrap();
    assert!(matches!(r.rebuild().unwrap(), BuildOutcome::Built(_)));
    assert_eq!(EmbeddingStorage::open(3, &config.store_path).unwrap().len(), 4);
}

#[test]
fn rebuild_that_cannot_embed_keeps_store() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    retriever(config.clone(), CountingProvider::new(Arc::new(AtomicUsize::new(0))))
        .ensure_store()
        .unwrap();

    let keyless = CountingProvider {
        missing_credential: true,
        ..CountingProvider::new(Arc::new(AtomicUsize::new(0)))
    };
    let outcome = retriever(config.clone(), keyless).rebuild().unwrap();
    assert!(matches!(outcome, BuildOutcome::Unavailable(_)));
    assert_eq!(EmbeddingStorage::open(3, &config.store_path).unwrap().len(), 3);

    let failing = CountingProvider {
        fail_prefix: Some(""),
        ..CountingProvider::new(Arc::new(AtomicUsize::new(0)))
    };
    match retriever(config.clone(), failing).rebuild().unwrap() {
        BuildOutcome::Built(report) => assert_eq!(report.embedded, 0),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(EmbeddingStorage::open(3, &config.store_path).unwrap().len(), 3);
}

#[test]
fn rebuild_replaces_corrupt_store() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(dir.path());
    write_three_topic_doc(&config.corpus_dir);
    let files = BackingFiles::for_base(&config.store_path);
    fs::write(&files.vectors, b"garbage").unwrap();

    let mut r = retriever(config.clone(), CountingProvider::new(Arc::new(AtomicUsize::new(0))));
    assert!(r.ensure_store().is_err());
    assert!(matches!(r.rebuild().unwrap(), BuildOutcome::Built(_)));
    assert_eq!(EmbeddingStorage::open(3, &config.store_path).unwrap().len(), 3);
}
