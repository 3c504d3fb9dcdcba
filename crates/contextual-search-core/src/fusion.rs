//! Score fusion for hybrid queries.
//!
//! # Fusion Algorithm
//!
//! With a [`FusionPipeline`] registered:
//!
//! 1. Min-max normalize the lexical sub-query scores to `[0, 1]`.
//! 2. Min-max normalize the vector sub-query scores to `[0, 1]`.
//! 3. Combine: `score = (w_lex × lex + w_vec × vec) / (w_lex + w_vec)`,
//!    counting a record absent from one sub-query as `0.0` there.
//! 4. Sort by score (desc), then record id (asc).
//!
//! Without a pipeline, the default combined relevance is the sum of the
//! raw sub-query scores, clamped at zero.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::schema::{Combination, FusionPipeline, Normalization};

/// One record's raw score from a single sub-query.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQueryHit {
    pub record_id: String,
    pub raw_score: f64,
}

impl SubQueryHit {
    pub fn new(record_id: impl Into<String>, raw_score: f64) -> Self {
        Self {
            record_id: record_id.into(),
            raw_score,
        }
    }
}

/// A record's fused score plus the sub-scores that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedScore {
    pub record_id: String,
    pub score: f64,
    /// Lexical sub-score after normalization (raw when no pipeline is used).
    pub lexical: f64,
    /// Vector sub-score after normalization (raw when no pipeline is used).
    pub vector: f64,
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(candidates: &[SubQueryHit]) -> Vec<(&SubQueryHit, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            (c, norm)
        })
        .collect()
}

/// Weighted arithmetic mean of the two sub-scores.
pub fn weighted_mean(lexical: f64, vector: f64, weights: (f64, f64)) -> f64 {
    let total = weights.0 + weights.1;
    if total <= 0.0 {
        return 0.0;
    }
    (weights.0 * lexical + weights.1 * vector) / total
}

/// Best-fields combination of per-field lexical scores: the best field
/// counts fully, every other field contributes `tie_breaker` times its score.
pub fn best_fields_score(field_scores: &[f64], tie_breaker: f64) -> f64 {
    let best = field_scores.iter().copied().fold(0.0f64, f64::max);
    let rest: f64 = field_scores.iter().sum::<f64>() - best;
    best + tie_breaker * rest
}

/// Merge lexical and vector sub-query results into one ranking.
///
/// Returns every record that appeared in either sub-query, best first.
pub fn fuse(
    lexical: &[SubQueryHit],
    vector: &[SubQueryHit],
    pipeline: Option<&FusionPipeline>,
) -> Vec<FusedScore> {
    let (lex_scores, vec_scores): (HashMap<&str, f64>, HashMap<&str, f64>) = match pipeline {
        Some(p) => match p.normalization {
            Normalization::MinMax => (
                to_map(normalize_scores(lexical)),
                to_map(normalize_scores(vector)),
            ),
        },
        None => (
            lexical.iter().map(|h| (h.record_id.as_str(), h.raw_score)).collect(),
            vector.iter().map(|h| (h.record_id.as_str(), h.raw_score)).collect(),
        ),
    };

    let mut ids: Vec<&str> = Vec::new();
    for h in lexical.iter().chain(vector.iter()) {
        if !ids.contains(&h.record_id.as_str()) {
            ids.push(h.record_id.as_str());
        }
    }

    let mut fused: Vec<FusedScore> = ids
        .into_iter()
        .map(|id| {
            let l = lex_scores.get(id).copied().unwrap_or(0.0);
            let v = vec_scores.get(id).copied().unwrap_or(0.0);
            let score = match pipeline {
                Some(p) => match &p.combination {
                    Combination::ArithmeticMean { .. } => weighted_mean(l, v, p.weights()),
                },
                None => l + v,
            };
            FusedScore {
                record_id: id.to_string(),
                score: score.max(0.0),
                lexical: l,
                vector: v,
            }
        })
        .collect();

    sort_by_score(&mut fused);
    fused
}

/// Sort best-first: score desc, then record id asc for determinism.
pub fn sort_by_score(scores: &mut [FusedScore]) {
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
}

fn to_map<'a>(normalized: Vec<(&'a SubQueryHit, f64)>) -> HashMap<&'a str, f64> {
    normalized
        .into_iter()
        .map(|(h, s)| (h.record_id.as_str(), s))
        .collect()
}
