//! Index lifecycle and bulk ingestion.
//!
//! [`IndexManager`] owns two responsibilities:
//!
//! 1. **Lifecycle**: create (or recreate) the hybrid index from an
//!    [`IndexSchema`] and register the named [`FusionPipeline`].
//! 2. **Ingestion**: enrich chunks into [`EnrichedRecord`]s and write them
//!    in batches under a [`BulkPolicy`].
//!
//! # Enrichment
//!
//! Each chunk is enriched independently: generate a context summary,
//! embed `"content: {chunk}\ncontext: {context}"`, assemble the record.
//! Up to `enrich_concurrency` chunks are in flight at once; results are
//! yielded in `sequence_id` order, so batches always hold contiguous
//! records. A batch is written as soon as it is full.
//!
//! # Failure Policy
//!
//! | Failure | Effect |
//! |---------|--------|
//! | context generation / embedding / dimension | run aborts |
//! | bulk write, after `max_attempts` | batch skipped (`continue`) or run aborts (`abort`) |
//! | pipeline registration | logged, ignored |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationFlag;
use crate::embedding::{check_dims, EmbeddingPort};
use crate::error::{PipelineError, PipelineResult};
use crate::generation::ContextGenerationPort;
use crate::models::{Chunk, EnrichedRecord};
use crate::schema::{FusionPipeline, IndexSchema};
use crate::store::SearchBackend;

/// What to do with a batch whose bulk write failed every attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchFailureAction {
    /// Log the batch and move on to the next one.
    #[default]
    Continue,
    /// Stop the run with [`PipelineError::BulkAborted`].
    Abort,
}

impl FromStr for BatchFailureAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(BatchFailureAction::Continue),
            "abort" => Ok(BatchFailureAction::Abort),
            other => Err(format!(
                "unknown batch failure action '{}'; expected 'continue' or 'abort'",
                other
            )),
        }
    }
}

impl fmt::Display for BatchFailureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchFailureAction::Continue => write!(f, "continue"),
            BatchFailureAction::Abort => write!(f, "abort"),
        }
    }
}

/// Retry discipline for bulk writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkPolicy {
    /// Attempts per batch, including the first. Values below 1 count as 1.
    pub max_attempts: usize,
    pub on_batch_failure: BatchFailureAction,
}

impl Default for BulkPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            on_batch_failure: BatchFailureAction::Continue,
        }
    }
}

/// Index naming, layout, and write tuning.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub index_name: String,
    pub pipeline_name: String,
    pub analyzer: String,
    /// Embedding dimension; every stored vector must have this length.
    pub dimension: usize,
    pub lexical_weight: f64,
    pub vector_weight: f64,
    pub bulk_size: usize,
    pub enrich_concurrency: usize,
    pub policy: BulkPolicy,
}

impl IndexSettings {
    pub fn new(index_name: &str, dimension: usize) -> Self {
        Self {
            index_name: index_name.to_string(),
            pipeline_name: "contextual-search-pipeline".to_string(),
            analyzer: "standard".to_string(),
            dimension,
            lexical_weight: 0.3,
            vector_weight: 0.7,
            bulk_size: 100,
            enrich_concurrency: 4,
            policy: BulkPolicy::default(),
        }
    }
}

/// Outcome of [`IndexManager::index_documents`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    /// Records enriched (written or not).
    pub records: usize,
    pub batches_written: usize,
    pub batches_failed: usize,
}

/// The text embedded for a record.
pub fn combined_text(chunk: &str, context: &str) -> String {
    format!("content: {}\ncontext: {}", chunk, context)
}

pub struct IndexManager {
    backend: Arc<dyn SearchBackend>,
    settings: IndexSettings,
}

impl IndexManager {
    pub fn new(backend: Arc<dyn SearchBackend>, settings: IndexSettings) -> Self {
        Self { backend, settings }
    }

    pub fn schema(&self) -> IndexSchema {
        IndexSchema::contextual(
            &self.settings.index_name,
            &self.settings.analyzer,
            self.settings.dimension,
        )
    }

    pub fn fusion_pipeline(&self) -> FusionPipeline {
        FusionPipeline::weighted(
            &self.settings.pipeline_name,
            self.settings.lexical_weight,
            self.settings.vector_weight,
        )
    }

    /// Ensure the index exists, deleting it first when `recreate` is set.
    ///
    /// The fusion pipeline is registered only when the index is created.
    pub async fn create_index(&self, recreate: bool) -> PipelineResult<()> {
        let name = self.settings.index_name.as_str();

        if recreate && self.backend.index_exists(name).await.map_err(PipelineError::backend)? {
            self.backend
                .delete_index(name)
                .await
                .map_err(PipelineError::backend)?;
            tracing::info!(index = %name, "deleted existing index");
        }

        if self.backend.index_exists(name).await.map_err(PipelineError::backend)? {
            tracing::debug!(index = %name, "index already exists");
            return Ok(());
        }

        self.backend
            .create_index(&self.schema())
            .await
            .map_err(PipelineError::backend)?;
        tracing::info!(index = %name, dims = self.settings.dimension, "created index");

        let pipeline = self.fusion_pipeline();
        match self.backend.put_pipeline(&pipeline).await {
            Ok(()) => tracing::info!(pipeline = %pipeline.name, "registered fusion pipeline"),
            Err(e) => tracing::warn!(
                pipeline = %pipeline.name,
                "error creating search pipeline: {:#}",
                e
            ),
        }

        Ok(())
    }

    /// Enrich `chunks` and write them to the index in batches.
    ///
    /// Fails on the first enrichment error, on cancellation, or on an
    /// exhausted batch under [`BatchFailureAction::Abort`]. Batches written
    /// before a failure stay in the index.
    pub async fn index_documents(
        &self,
        chunks: &[Chunk],
        full_document: &str,
        generator: &dyn ContextGenerationPort,
        embedder: &dyn EmbeddingPort,
        cancel: &CancellationFlag,
    ) -> PipelineResult<IndexSummary> {
        let bulk_size = self.settings.bulk_size.max(1);
        let concurrency = self.settings.enrich_concurrency.max(1);

        let mut summary = IndexSummary::default();
        let mut buffer: Vec<EnrichedRecord> = Vec::with_capacity(bulk_size);
        let mut batch = 0usize;

        let mut enriched = std::pin::pin!(stream::iter(chunks.iter())
            .map(|chunk| self.enrich_chunk(chunk, full_document, generator, embedder, cancel))
            .buffered(concurrency));

        while let Some(record) = enriched.next().await {
            buffer.push(record?);
            summary.records += 1;
            if buffer.len() >= bulk_size {
                self.flush(batch, batch * bulk_size, &buffer, &mut summary, cancel)
                    .await?;
                buffer.clear();
                batch += 1;
            }
        }

        if !buffer.is_empty() {
            self.flush(batch, batch * bulk_size, &buffer, &mut summary, cancel)
                .await?;
        }

        tracing::debug!(
            records = summary.records,
            written = summary.batches_written,
            failed = summary.batches_failed,
            "indexing finished"
        );
        Ok(summary)
    }

    /// Enrich a single chunk into a record.
    pub async fn enrich_chunk(
        &self,
        chunk: &Chunk,
        full_document: &str,
        generator: &dyn ContextGenerationPort,
        embedder: &dyn EmbeddingPort,
        cancel: &CancellationFlag,
    ) -> PipelineResult<EnrichedRecord> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let context = generator.generate(full_document, &chunk.text).await?;
        let vector = embedder
            .encode_single(&combined_text(&chunk.text, &context))
            .await?;
        check_dims(self.settings.dimension, &vector)?;

        tracing::trace!(chunk = chunk.sequence_id, "enriched chunk");

        Ok(EnrichedRecord {
            record_id: chunk.sequence_id.to_string(),
            content: chunk.text.trim().to_string(),
            context: context.trim().to_string(),
            vector,
        })
    }

    async fn flush(
        &self,
        batch: usize,
        first: usize,
        records: &[EnrichedRecord],
        summary: &mut IndexSummary,
        cancel: &CancellationFlag,
    ) -> PipelineResult<()> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let last = first + records.len();
        match self.write_with_retry(records).await {
            Ok(()) => {
                summary.batches_written += 1;
                tracing::debug!(batch, first, last, "bulk write succeeded");
                Ok(())
            }
            Err(e) => {
                summary.batches_failed += 1;
                match self.settings.policy.on_batch_failure {
                    BatchFailureAction::Continue => {
                        tracing::warn!(batch, "error indexing records {}-{}: {:#}", first, last, e);
                        Ok(())
                    }
                    BatchFailureAction::Abort => Err(PipelineError::BulkAborted {
                        batch,
                        first,
                        last,
                        reason: format!("{:#}", e),
                    }),
                }
            }
        }
    }

    /// One batch, up to `max_attempts` sequential attempts.
    async fn write_with_retry(&self, records: &[EnrichedRecord]) -> anyhow::Result<()> {
        let attempts = self.settings.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self
                .backend
                .bulk_write(&self.settings.index_name, records)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, "bulk write attempt failed: {:#}", e);
                    attempt += 1;
                }
            }
        }
    }
}
