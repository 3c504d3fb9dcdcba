//! Search backend abstraction.
//!
//! The [`SearchBackend`] trait is the opaque hybrid lexical + vector store
//! the index manager and query engine talk to. Implementations:
//!
//! | Backend | Crate | Notes |
//! |---------|-------|-------|
//! | [`memory::InMemoryBackend`] | core | process-local, used by tests |
//! | `SqliteBackend` | app | FTS5 + BLOB vectors |
//! | `OpenSearchBackend` | app | REST client |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Errors are reported as `anyhow::Error`; the core maps them onto
//! [`PipelineError`](crate::error::PipelineError).

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EnrichedRecord, RawHit};
use crate::query::HybridQuery;
use crate::schema::{FusionPipeline, IndexSchema};

/// Abstract hybrid search store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`index_exists`](SearchBackend::index_exists) | Check whether a named index exists |
/// | [`create_index`](SearchBackend::create_index) | Create an index from a schema |
/// | [`delete_index`](SearchBackend::delete_index) | Drop an index and its records |
/// | [`put_pipeline`](SearchBackend::put_pipeline) | Register a fusion pipeline |
/// | [`pipeline_exists`](SearchBackend::pipeline_exists) | Check a fusion pipeline is registered |
/// | [`bulk_write`](SearchBackend::bulk_write) | Upsert a batch of records by id |
/// | [`hybrid_query`](SearchBackend::hybrid_query) | Run a lexical + vector query |
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool>;

    async fn create_index(&self, schema: &IndexSchema) -> Result<()>;

    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Register (or replace) a named fusion pipeline.
    async fn put_pipeline(&self, pipeline: &FusionPipeline) -> Result<()>;

    async fn pipeline_exists(&self, name: &str) -> Result<bool>;

    /// Write one batch in a single request, overwriting records with the
    /// same `record_id`. One attempt; retries are the caller's policy.
    async fn bulk_write(&self, index: &str, records: &[EnrichedRecord]) -> Result<()>;

    /// Execute a hybrid query. Hits are returned best first, at most
    /// `query.size` of them.
    async fn hybrid_query(&self, index: &str, query: &HybridQuery) -> Result<Vec<RawHit>>;
}
