//! End-to-end tests for the ingest and query paths.
//!
//! These run the real orchestrator against the in-memory backend with
//! deterministic fake context generation and embedding ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use contextual_search_core::embedding::EmbeddingPort;
use contextual_search_core::error::{PipelineError, PipelineResult};
use contextual_search_core::generation::{ContextGenerationPort, LlmClient, SituatingContextGenerator};
use contextual_search_core::context::ContextMethod;
use contextual_search_core::index::{BatchFailureAction, IndexSettings};
use contextual_search_core::models::{EnrichedRecord, RawHit};
use contextual_search_core::pipeline::{Pipeline, PipelineSettings};
use contextual_search_core::query::HybridQuery;
use contextual_search_core::schema::{FusionPipeline, IndexSchema};
use contextual_search_core::store::memory::InMemoryBackend;
use contextual_search_core::store::SearchBackend;

const DIMS: usize = 32;

const DOCUMENT: &str = "Rust guarantees memory safety through ownership and borrowing. \
The borrow checker rejects dangling references at compile time. \
Async functions compile into state machines polled by an executor. \
Tokio is a popular runtime providing timers, sockets and task scheduling. \
Cargo builds crates, resolves dependencies and runs the test suite. \
Traits describe shared behaviour and enable static or dynamic dispatch.";

// ─── Fake Ports ─────────────────────────────────────────────────────

/// Bag-of-words hashing embedder: texts sharing words get similar vectors.
struct HashingEmbedder {
    calls: AtomicUsize,
}

impl HashingEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingPort for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_raw(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; DIMS];
                for word in t.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 3) {
                    let h = word
                        .to_lowercase()
                        .bytes()
                        .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
                    v[h % DIMS] += 1.0;
                }
                v
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingPort for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_raw(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("quota exceeded")
    }
}

/// Answers with the first sentence of whatever context slice it is given.
struct FirstSentenceLlm;

#[async_trait]
impl LlmClient for FirstSentenceLlm {
    fn model_name(&self) -> &str {
        "first-sentence"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let slice = prompt
            .split("Document Context:\n")
            .nth(1)
            .unwrap_or_default();
        let sentence = slice.split('.').next().unwrap_or_default();
        Ok(format!("From a Rust overview: {}.", sentence.trim()))
    }
}

/// Memory backend whose bulk writes fail for any batch holding `bad_record`.
struct FlakyBackend {
    inner: InMemoryBackend,
    bad_record: String,
    attempts: AtomicUsize,
}

#[async_trait]
impl SearchBackend for FlakyBackend {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.inner.index_exists(index).await
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        self.inner.create_index(schema).await
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.inner.delete_index(index).await
    }

    async fn put_pipeline(&self, pipeline: &FusionPipeline) -> Result<()> {
        self.inner.put_pipeline(pipeline).await
    }

    async fn pipeline_exists(&self, name: &str) -> Result<bool> {
        self.inner.pipeline_exists(name).await
    }

    async fn bulk_write(&self, index: &str, records: &[EnrichedRecord]) -> Result<()> {
        if records.iter().any(|r| r.record_id == self.bad_record) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection reset");
        }
        self.inner.bulk_write(index, records).await
    }

    async fn hybrid_query(&self, index: &str, query: &HybridQuery) -> Result<Vec<RawHit>> {
        self.inner.hybrid_query(index, query).await
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn settings(bulk_size: usize) -> PipelineSettings {
    let mut index = IndexSettings::new("docs", DIMS);
    index.bulk_size = bulk_size;
    index.enrich_concurrency = 3;
    PipelineSettings {
        chunk_size: 80,
        overlap: 10,
        ..PipelineSettings::new(index)
    }
}

fn generator() -> Arc<dyn ContextGenerationPort> {
    Arc::new(SituatingContextGenerator::new(
        FirstSentenceLlm,
        ContextMethod::Window,
        60,
    ))
}

fn pipeline_with(backend: Arc<dyn SearchBackend>, settings: PipelineSettings) -> Pipeline {
    Pipeline::new(backend, generator(), Arc::new(HashingEmbedder::new()), settings)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_process_then_search_round_trip() {
    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = pipeline_with(backend.clone(), settings(2));

    let report = pipeline.process_document(DOCUMENT).await.unwrap();
    assert!(report.chunks > 3);
    assert_eq!(report.index.records, report.chunks);
    assert_eq!(report.index.batches_failed, 0);
    assert_eq!(backend.records("docs").len(), report.chunks);

    let hits = pipeline
        .search("borrow checker dangling references", None)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.len() <= 5);
    assert!(hits.iter().any(|h| h.content.contains("borrow checker")));
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert!(hits.iter().all(|h| h.score >= 0.0));
    assert!(hits[0].context.starts_with("From a Rust overview"));
}

#[tokio::test]
async fn test_search_respects_explicit_k() {
    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = pipeline_with(backend, settings(10));
    pipeline.process_document(DOCUMENT).await.unwrap();
    let hits = pipeline.search("runtime", Some(2)).await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn test_blank_query_returns_nothing_without_embedding() {
    let backend = Arc::new(InMemoryBackend::new());
    let embedder = Arc::new(HashingEmbedder::new());
    let pipeline = Pipeline::new(backend, generator(), embedder.clone(), settings(10));
    assert!(pipeline.search("   ", None).await.unwrap().is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_search_without_index_is_backend_error() {
    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = pipeline_with(backend, settings(10));
    let err = pipeline.search("anything", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::Backend(_)));
}

#[tokio::test]
async fn test_empty_document_is_rejected() {
    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = pipeline_with(backend.clone(), settings(10));
    let err = pipeline.process_document("  \n ").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert!(!backend.index_exists("docs").await.unwrap());
}

#[tokio::test]
async fn test_reprocessing_resets_index() {
    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = pipeline_with(backend.clone(), settings(10));
    pipeline.process_document(DOCUMENT).await.unwrap();
    let report = pipeline
        .process_document("A short second document about Cargo workspaces.")
        .await
        .unwrap();
    assert_eq!(report.chunks, 1);
    assert_eq!(backend.records("docs").len(), 1);
}

#[tokio::test]
async fn test_partial_bulk_failure_keeps_other_batches() {
    let backend = Arc::new(FlakyBackend {
        inner: InMemoryBackend::new(),
        bad_record: "1".to_string(),
        attempts: AtomicUsize::new(0),
    });
    let pipeline = pipeline_with(backend.clone(), settings(2));

    let report = pipeline.process_document(DOCUMENT).await.unwrap();
    let batches = report.chunks.div_ceil(2);
    assert_eq!(report.index.batches_failed, 1);
    assert_eq!(report.index.batches_written, batches - 1);
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);

    let stored = backend.inner.records("docs");
    assert_eq!(stored.len(), report.chunks - 2);
    assert!(stored.iter().all(|r| r.record_id != "0" && r.record_id != "1"));
}

#[tokio::test]
async fn test_abort_policy_fails_the_document() {
    let backend = Arc::new(FlakyBackend {
        inner: InMemoryBackend::new(),
        bad_record: "2".to_string(),
        attempts: AtomicUsize::new(0),
    });
    let mut s = settings(2);
    s.index.policy.on_batch_failure = BatchFailureAction::Abort;
    let pipeline = pipeline_with(backend.clone(), s);

    let err = pipeline.process_document(DOCUMENT).await.unwrap_err();
    assert!(matches!(err, PipelineError::BulkAborted { batch: 1, .. }));
    // the first batch was written before the abort
    assert_eq!(backend.inner.records("docs").len(), 2);
}

#[tokio::test]
async fn test_embedding_failure_aborts_document() {
    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(backend.clone(), generator(), Arc::new(FailingEmbedder), settings(2));
    let err = pipeline.process_document(DOCUMENT).await.unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));
    assert!(err.to_string().starts_with("error encoding text:"));
    assert!(backend.records("docs").is_empty());
}

#[tokio::test]
async fn test_cancelled_pipeline_stops_processing() {
    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = pipeline_with(backend.clone(), settings(2));
    pipeline.cancellation().cancel();
    let err = pipeline.process_document(DOCUMENT).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert!(backend.records("docs").is_empty());

    pipeline.cancellation().reset();
    assert!(pipeline.process_document(DOCUMENT).await.is_ok());
}

#[tokio::test]
async fn test_generator_rejects_empty_chunk() {
    let gen = generator();
    let err = gen.generate(DOCUMENT, "").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    let res: PipelineResult<String> = gen.generate(DOCUMENT, "Cargo builds crates").await;
    assert!(res.unwrap().starts_with("From a Rust overview:"));
}
