//! Error taxonomy for the ingest and query paths.
//!
//! Adapter seams ([`SearchBackend`](crate::store::SearchBackend),
//! [`LlmClient`](crate::generation::LlmClient), raw embedding calls) return
//! `anyhow::Result`; the core maps those failures into [`PipelineError`]
//! so callers can tell input errors from fatal enrichment errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any external call was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("error generating context: {0}")]
    ContextGeneration(String),

    #[error("error encoding text: {0}")]
    Embedding(String),

    #[error("error encoding text: unexpected embedding dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("search backend error: {0}")]
    Backend(String),

    #[error("bulk write aborted at batch {batch} (records {first}..{last}): {reason}")]
    BulkAborted {
        batch: usize,
        first: usize,
        last: usize,
        reason: String,
    },

    #[error("processing cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Wrap a backend failure, keeping the full `anyhow` context chain.
    pub fn backend(err: anyhow::Error) -> Self {
        PipelineError::Backend(format!("{:#}", err))
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
