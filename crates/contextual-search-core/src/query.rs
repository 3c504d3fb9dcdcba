//! Hybrid query construction and execution.
//!
//! A query string becomes two sub-queries against the same index:
//!
//! - a lexical best-fields match on `content` (a record's score is its best
//!   field score plus `tie_breaker` times the other fields' scores), and
//! - an approximate-nearest-neighbor query on `content_vector` for `k`
//!   candidates, using the embedding of the query framed as its own context.
//!
//! The backend merges them through the named fusion pipeline when one is
//! registered (see [`crate::fusion`]), or with its default combined score.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::embedding::EmbeddingPort;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{RawHit, SearchHit};
use crate::schema::{CONTENT_FIELD, VECTOR_FIELD};
use crate::store::SearchBackend;

/// Lexical sub-query: a best-fields multi-match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalQuery {
    pub text: String,
    pub fields: Vec<String>,
    /// Weight applied to the non-best fields' scores.
    pub tie_breaker: f64,
}

/// Vector sub-query: approximate nearest neighbours of `vector`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorQuery {
    pub field: String,
    pub vector: Vec<f32>,
    pub k: usize,
}

/// A complete hybrid request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridQuery {
    pub lexical: LexicalQuery,
    pub vector: VectorQuery,
    /// Maximum number of hits to return.
    pub size: usize,
    /// Fusion pipeline to run the request through, if registered.
    pub pipeline: Option<String>,
}

/// Query tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub index_name: String,
    pub pipeline_name: String,
    pub tie_breaker: f64,
}

/// Text embedded for a query: the query doubles as its own context.
pub fn query_text(query: &str) -> String {
    format!("question: {}\ncontext: {}", query, query)
}

/// Build the hybrid request for `query`, its embedding, and `k`.
pub fn build_hybrid_query(
    query: &str,
    query_vector: Vec<f32>,
    k: usize,
    tie_breaker: f64,
    pipeline: Option<String>,
) -> HybridQuery {
    HybridQuery {
        lexical: LexicalQuery {
            text: query.to_string(),
            fields: vec![CONTENT_FIELD.to_string()],
            tie_breaker,
        },
        vector: VectorQuery {
            field: VECTOR_FIELD.to_string(),
            vector: query_vector,
            k,
        },
        size: k,
        pipeline,
    }
}

/// Map backend hits to [`SearchHit`]s: scores clamped at zero, best
/// first, at most `k`.
pub fn map_hits(raw: Vec<RawHit>, k: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = raw
        .into_iter()
        .map(|h| SearchHit {
            content: h.content,
            context: h.context,
            score: if h.score.is_finite() { h.score.max(0.0) } else { 0.0 },
        })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(k);
    hits
}

/// Builds and executes hybrid queries against a [`SearchBackend`].
pub struct QueryEngine {
    backend: Arc<dyn SearchBackend>,
    params: QueryParams,
}

impl QueryEngine {
    pub fn new(backend: Arc<dyn SearchBackend>, params: QueryParams) -> Self {
        Self { backend, params }
    }

    /// Run a hybrid search and return at most `k` hits, best first.
    ///
    /// A blank query (or `k == 0`) returns an empty list without touching
    /// the embedder or the backend.
    pub async fn search(
        &self,
        query: &str,
        embedder: &dyn EmbeddingPort,
        k: usize,
    ) -> PipelineResult<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() || k == 0 {
            tracing::debug!("blank query or zero k; returning no hits");
            return Ok(Vec::new());
        }

        let query_vector = embedder.encode_single(&query_text(query)).await?;

        let pipeline = match self.backend.pipeline_exists(&self.params.pipeline_name).await {
            Ok(true) => Some(self.params.pipeline_name.clone()),
            Ok(false) => {
                tracing::debug!(
                    pipeline = %self.params.pipeline_name,
                    "fusion pipeline not registered; using default combined score"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    pipeline = %self.params.pipeline_name,
                    "could not check fusion pipeline: {:#}",
                    e
                );
                None
            }
        };

        let request =
            build_hybrid_query(query, query_vector, k, self.params.tie_breaker, pipeline);

        let raw = self
            .backend
            .hybrid_query(&self.params.index_name, &request)
            .await
            .map_err(PipelineError::backend)?;

        Ok(map_hits(raw, k))
    }
}
