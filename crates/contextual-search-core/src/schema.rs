//! Index schema and fusion-pipeline descriptors.
//!
//! These are backend-neutral declarations. Each [`SearchBackend`](crate::store::SearchBackend)
//! translates them into its own form (an OpenSearch mapping and
//! `_search/pipeline` body, SQLite tables, or in-memory maps).

use serde::{Deserialize, Serialize};

/// Stored field holding the chunk text.
pub const CONTENT_FIELD: &str = "content";
/// Stored field holding the generated context summary.
pub const CONTEXT_FIELD: &str = "context";
/// Vector field holding the embedding of the combined text.
pub const VECTOR_FIELD: &str = "content_vector";

/// Declares the layout of a hybrid index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub index_name: String,
    /// Analyzer applied to every entry of `text_fields`.
    pub analyzer: String,
    pub text_fields: Vec<String>,
    pub vector_field: VectorField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub name: String,
    pub dimension: usize,
    pub method: AnnMethod,
}

/// Approximate-nearest-neighbor method for the vector field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnMethod {
    pub name: String,
    pub space_type: String,
    pub engine: String,
}

impl Default for AnnMethod {
    fn default() -> Self {
        Self {
            name: "hnsw".to_string(),
            space_type: "cosinesimil".to_string(),
            engine: "nmslib".to_string(),
        }
    }
}

impl IndexSchema {
    /// The standard contextual-search layout: `content` and `context` text
    /// fields and a cosine HNSW vector field of `dimension` floats.
    pub fn contextual(index_name: &str, analyzer: &str, dimension: usize) -> Self {
        Self {
            index_name: index_name.to_string(),
            analyzer: analyzer.to_string(),
            text_fields: vec![CONTENT_FIELD.to_string(), CONTEXT_FIELD.to_string()],
            vector_field: VectorField {
                name: VECTOR_FIELD.to_string(),
                dimension,
                method: AnnMethod::default(),
            },
        }
    }
}

/// Per-sub-query score normalization applied before combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    MinMax,
}

/// How normalized sub-query scores are merged into one score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "technique")]
pub enum Combination {
    /// `Σ wᵢ·sᵢ / Σ wᵢ`, with weights in sub-query order (lexical, vector).
    ArithmeticMean { weights: Vec<f64> },
}

/// A named score-fusion stage for hybrid queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionPipeline {
    pub name: String,
    pub description: String,
    pub normalization: Normalization,
    pub combination: Combination,
}

impl FusionPipeline {
    /// Min-max normalization followed by a weighted arithmetic mean.
    pub fn weighted(name: &str, lexical_weight: f64, vector_weight: f64) -> Self {
        Self {
            name: name.to_string(),
            description: "Contextual search hybrid pipeline".to_string(),
            normalization: Normalization::MinMax,
            combination: Combination::ArithmeticMean {
                weights: vec![lexical_weight, vector_weight],
            },
        }
    }

    /// The `(lexical, vector)` weights; missing entries count as `0.0`.
    pub fn weights(&self) -> (f64, f64) {
        match &self.combination {
            Combination::ArithmeticMean { weights } => (
                weights.first().copied().unwrap_or(0.0),
                weights.get(1).copied().unwrap_or(0.0),
            ),
        }
    }
}
