//! Data types that flow through the ingest and query paths.

use serde::{Deserialize, Serialize};

/// A contiguous, trimmed slice of a source document plus its position.
///
/// Offsets are byte offsets into the source text and always fall on
/// `char` boundaries. `start_offset < end_offset` for every emitted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Emission order, starting at 0.
    pub sequence_id: usize,
    pub start_offset: usize,
    /// End of the window the chunk was cut from (possibly snapped to whitespace).
    pub end_offset: usize,
}

/// A chunk combined with its generated context and embedding, as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Unique within one indexing run; the chunk's sequence number.
    pub record_id: String,
    pub content: String,
    pub context: String,
    pub vector: Vec<f32>,
}

/// A hit as returned by a [`SearchBackend`](crate::store::SearchBackend), before mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub record_id: String,
    pub content: String,
    pub context: String,
    pub score: f64,
}

/// A ranked search result.
///
/// `score >= 0`; result lists are ordered by descending score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub content: String,
    pub context: String,
    pub score: f64,
}
