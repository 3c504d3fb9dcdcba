//! Orchestration of the ingest and query paths.
//!
//! [`Pipeline`] wires the chunker, the context generator, the embedder,
//! the [`IndexManager`] and the [`QueryEngine`] around one
//! [`SearchBackend`]. Everything it needs is passed in at construction;
//! it reads no configuration of its own.
//!
//! # Ingest States
//!
//! ```text
//! Idle → Chunking → PerChunkEnrich → Done
//!            ↓            ↓
//!          Failed       Failed
//! ```
//!
//! Reading the source file happens before the pipeline is involved.
//! Enrichment and bulk writes are one stage: a batch is written as soon
//! as it fills, so write failures are reported from `PerChunkEnrich`.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cancel::CancellationFlag;
use crate::chunk::chunk_text;
use crate::embedding::EmbeddingPort;
use crate::error::{PipelineError, PipelineResult};
use crate::generation::ContextGenerationPort;
use crate::index::{IndexManager, IndexSettings, IndexSummary};
use crate::models::SearchHit;
use crate::query::{QueryEngine, QueryParams};
use crate::store::SearchBackend;

/// Chunking and run-level settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Reset the index before each processed document.
    pub recreate_on_process: bool,
    /// Default `k` for [`Pipeline::search`].
    pub result_count: usize,
    pub tie_breaker: f64,
    pub index: IndexSettings,
}

impl PipelineSettings {
    pub fn new(index: IndexSettings) -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
            recreate_on_process: true,
            result_count: 5,
            tie_breaker: 0.3,
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    Chunking,
    /// Enrichment with interleaved bulk writes.
    PerChunkEnrich,
    Done,
    Failed,
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestState::Idle => "idle",
            IngestState::Chunking => "chunking",
            IngestState::PerChunkEnrich => "enrich-write",
            IngestState::Done => "done",
            IngestState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Result of a successful [`Pipeline::process_document`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub chunks: usize,
    #[serde(flatten)]
    pub index: IndexSummary,
}

pub struct Pipeline {
    settings: PipelineSettings,
    index: IndexManager,
    query: QueryEngine,
    generator: Arc<dyn ContextGenerationPort>,
    embedder: Arc<dyn EmbeddingPort>,
    cancel: CancellationFlag,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        generator: Arc<dyn ContextGenerationPort>,
        embedder: Arc<dyn EmbeddingPort>,
        settings: PipelineSettings,
    ) -> Self {
        let params = QueryParams {
            index_name: settings.index.index_name.clone(),
            pipeline_name: settings.index.pipeline_name.clone(),
            tie_breaker: settings.tie_breaker,
        };
        Self {
            index: IndexManager::new(backend.clone(), settings.index.clone()),
            query: QueryEngine::new(backend, params),
            generator,
            embedder,
            settings,
            cancel: CancellationFlag::new(),
        }
    }

    /// A handle that cancels in-flight and future processing runs.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub async fn create_index(&self, recreate: bool) -> PipelineResult<()> {
        self.index.create_index(recreate).await
    }

    /// Chunk, enrich and index one document.
    pub async fn process_document(&self, text: &str) -> PipelineResult<IngestReport> {
        let mut state = IngestState::Idle;
        let result = self.run_ingest(text, &mut state).await;
        match &result {
            Ok(report) => {
                transition(&mut state, IngestState::Done);
                tracing::info!(
                    chunks = report.chunks,
                    batches_written = report.index.batches_written,
                    batches_failed = report.index.batches_failed,
                    "document processed"
                );
            }
            Err(e) => {
                let from = state;
                transition(&mut state, IngestState::Failed);
                tracing::error!(stage = %from, "document processing failed: {}", e);
            }
        }
        result
    }

    async fn run_ingest(&self, text: &str, state: &mut IngestState) -> PipelineResult<IngestReport> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput("document text is empty".to_string()));
        }

        transition(state, IngestState::Chunking);
        let chunks = chunk_text(text, self.settings.chunk_size, self.settings.overlap);
        tracing::info!(chunks = chunks.len(), "document chunked");

        self.index
            .create_index(self.settings.recreate_on_process)
            .await?;

        transition(state, IngestState::PerChunkEnrich);
        let summary = self
            .index
            .index_documents(
                &chunks,
                text,
                self.generator.as_ref(),
                self.embedder.as_ref(),
                &self.cancel,
            )
            .await?;

        Ok(IngestReport {
            chunks: chunks.len(),
            index: summary,
        })
    }

    /// Hybrid search; `k` defaults to the configured result count.
    pub async fn search(&self, query: &str, k: Option<usize>) -> PipelineResult<Vec<SearchHit>> {
        let k = k.unwrap_or(self.settings.result_count);
        self.query.search(query, self.embedder.as_ref(), k).await
    }
}

fn transition(state: &mut IngestState, next: IngestState) {
    tracing::debug!(from = %state, to = %next, "ingest state");
    *state = next;
}
