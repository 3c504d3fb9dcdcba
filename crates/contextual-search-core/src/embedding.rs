//! Embedding port and vector utilities.
//!
//! Defines the [`EmbeddingPort`] trait that all embedding backends
//! implement, plus pure helpers for vector serialization and similarity.
//!
//! Concrete providers (OpenAI-compatible, Ollama, fastembed) live in the
//! `contextual-search` app crate. They only implement
//! [`embed_raw`](EmbeddingPort::embed_raw); batching and dimension checks
//! are provided here so every provider enforces them the same way.

use async_trait::async_trait;

use crate::error::{PipelineError, PipelineResult};

/// A text-to-vector capability with a fixed output dimensionality.
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the configured embedding dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Maximum number of texts sent to the provider in one call.
    fn batch_size(&self) -> usize {
        16
    }

    /// Embed one provider-sized batch. Called by [`encode_batch`](EmbeddingPort::encode_batch).
    async fn embed_raw(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embed a single text, failing if the vector has the wrong dimension.
    async fn encode_single(&self, text: &str) -> PipelineResult<Vec<f32>> {
        self.encode_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Embedding("empty embedding response".to_string()))
    }

    /// Embed many texts, in [`batch_size`](EmbeddingPort::batch_size) slices.
    ///
    /// Output order matches input order. Every vector is checked against
    /// [`dims`](EmbeddingPort::dims).
    async fn encode_batch(&self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size().max(1)) {
            let vectors = self
                .embed_raw(batch)
                .await
                .map_err(|e| PipelineError::Embedding(format!("{:#}", e)))?;
            if vectors.len() != batch.len() {
                return Err(PipelineError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            for v in &vectors {
                check_dims(self.dims(), v)?;
            }
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Fail with [`PipelineError::DimensionMismatch`] unless `vector.len() == expected`.
pub fn check_dims(expected: usize, vector: &[f32]) -> PipelineResult<()> {
    if vector.len() != expected {
        return Err(PipelineError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
///
/// # Example
///
/// ```rust
/// use contextual_search_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine similarity mapped into `[0.0, 1.0]` as `(1 + cos) / 2`.
///
/// This is the score an HNSW `cosinesimil` field reports, and what the
/// bundled backends use as the raw vector sub-score.
pub fn cosine_score(a: &[f32], b: &[f32]) -> f64 {
    ((1.0 + cosine_similarity(a, b) as f64) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        dims: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingPort for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        fn batch_size(&self) -> usize {
            2
        }
        async fn embed_raw(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_encode_batch_chunks_and_keeps_order() {
        let e = CountingEmbedder {
            dims: 3,
            calls: AtomicUsize::new(0),
        };
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vecs = e.encode_batch(&texts).await.unwrap();
        assert_eq!(vecs.len(), 5);
        assert_eq!(e.calls.load(Ordering::SeqCst), 3);
        let firsts: Vec<f32> = vecs.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_encode_single_dimension_mismatch() {
        let e = CountingEmbedder {
            dims: 4,
            calls: AtomicUsize::new(0),
        };
        let err = e.encode_single("hello").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert!(err.to_string().starts_with("error encoding text"));
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_cosine_score_range() {
        assert!((cosine_score(&[1.0, 0.0], &[-1.0, 0.0])).abs() < 1e-9);
        assert!((cosine_score(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_score(&[1.0, 0.0], &[0.0, 1.0]) - 0.5).abs() < 1e-6);
    }
}
