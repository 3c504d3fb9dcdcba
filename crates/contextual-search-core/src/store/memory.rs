//! In-memory [`SearchBackend`] implementation for tests and one-shot runs.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Lexical search is Okapi BM25 per text field, combined best-fields style.
//! Vector search is brute-force cosine similarity over all stored vectors,
//! scored `(1 + cos) / 2`. Fusion pipelines run through [`crate::fusion`].

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_score;
use crate::fusion::{best_fields_score, fuse, SubQueryHit};
use crate::models::{EnrichedRecord, RawHit};
use crate::query::HybridQuery;
use crate::schema::{FusionPipeline, IndexSchema, CONTENT_FIELD, CONTEXT_FIELD};

use super::SearchBackend;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

struct MemoryIndex {
    schema: IndexSchema,
    records: Vec<EnrichedRecord>,
}

/// Process-local hybrid index.
pub struct InMemoryBackend {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
    pipelines: RwLock<HashMap<String, FusionPipeline>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            pipelines: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of an index's records in write order. Empty if the index
    /// does not exist.
    pub fn records(&self, index: &str) -> Vec<EnrichedRecord> {
        match self.indexes.read() {
            Ok(guard) => guard
                .get(index)
                .map(|i| i.records.clone())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn read_indexes(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemoryIndex>>> {
        self.indexes.read().map_err(|_| anyhow!("index lock poisoned"))
    }

    fn write_indexes(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemoryIndex>>> {
        self.indexes.write().map_err(|_| anyhow!("index lock poisoned"))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn field_text<'a>(record: &'a EnrichedRecord, field: &str) -> Option<&'a str> {
    match field {
        CONTENT_FIELD => Some(&record.content),
        CONTEXT_FIELD => Some(&record.context),
        _ => None,
    }
}

/// BM25 scores of every record for one field, indexed like `records`.
fn bm25_field(records: &[EnrichedRecord], field: &str, terms: &[String]) -> Vec<f64> {
    let docs: Vec<Vec<String>> = records
        .iter()
        .map(|r| field_text(r, field).map(tokenize).unwrap_or_default())
        .collect();
    let n = docs.len() as f64;
    let avgdl = if docs.is_empty() {
        0.0
    } else {
        docs.iter().map(|d| d.len()).sum::<usize>() as f64 / n
    };

    let idf: Vec<f64> = terms
        .iter()
        .map(|t| {
            let df = docs.iter().filter(|d| d.contains(t)).count() as f64;
            (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
        })
        .collect();

    docs.iter()
        .map(|doc| {
            let dl = doc.len() as f64;
            terms
                .iter()
                .zip(idf.iter())
                .map(|(t, idf)| {
                    let tf = doc.iter().filter(|w| *w == t).count() as f64;
                    if tf == 0.0 || avgdl == 0.0 {
                        return 0.0;
                    }
                    idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / avgdl))
                })
                .sum()
        })
        .collect()
}

fn lexical_hits(records: &[EnrichedRecord], query: &HybridQuery) -> Vec<SubQueryHit> {
    let terms = tokenize(&query.lexical.text);
    if terms.is_empty() || records.is_empty() {
        return Vec::new();
    }

    let per_field: Vec<Vec<f64>> = query
        .lexical
        .fields
        .iter()
        .map(|f| bm25_field(records, f, &terms))
        .collect();

    let mut hits: Vec<SubQueryHit> = records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let scores: Vec<f64> = per_field.iter().map(|f| f[i]).collect();
            let score = best_fields_score(&scores, query.lexical.tie_breaker);
            (score > 0.0).then(|| SubQueryHit::new(r.record_id.clone(), score))
        })
        .collect();
    sort_desc(&mut hits);
    hits.truncate(query.size);
    hits
}

fn vector_hits(records: &[EnrichedRecord], query: &HybridQuery) -> Vec<SubQueryHit> {
    let mut hits: Vec<SubQueryHit> = records
        .iter()
        .map(|r| SubQueryHit::new(r.record_id.clone(), cosine_score(&query.vector.vector, &r.vector)))
        .collect();
    sort_desc(&mut hits);
    hits.truncate(query.vector.k);
    hits
}

fn sort_desc(hits: &mut [SubQueryHit]) {
    hits.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.read_indexes()?.contains_key(index))
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        let mut indexes = self.write_indexes()?;
        if indexes.contains_key(&schema.index_name) {
            bail!("index '{}' already exists", schema.index_name);
        }
        indexes.insert(
            schema.index_name.clone(),
            MemoryIndex {
                schema: schema.clone(),
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.write_indexes()?.remove(index);
        Ok(())
    }

    async fn put_pipeline(&self, pipeline: &FusionPipeline) -> Result<()> {
        self.pipelines
            .write()
            .map_err(|_| anyhow!("pipeline lock poisoned"))?
            .insert(pipeline.name.clone(), pipeline.clone());
        Ok(())
    }

    async fn pipeline_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .pipelines
            .read()
            .map_err(|_| anyhow!("pipeline lock poisoned"))?
            .contains_key(name))
    }

    async fn bulk_write(&self, index: &str, records: &[EnrichedRecord]) -> Result<()> {
        let mut indexes = self.write_indexes()?;
        let target = indexes
            .get_mut(index)
            .ok_or_else(|| anyhow!("no such index: {}", index))?;

        let dims = target.schema.vector_field.dimension;
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dims) {
            bail!(
                "record {} has {} dimensions, index expects {}",
                bad.record_id,
                bad.vector.len(),
                dims
            );
        }

        for record in records {
            match target
                .records
                .iter_mut()
                .find(|r| r.record_id == record.record_id)
            {
                Some(existing) => *existing = record.clone(),
                None => target.records.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn hybrid_query(&self, index: &str, query: &HybridQuery) -> Result<Vec<RawHit>> {
        let pipeline = match &query.pipeline {
            Some(name) => Some(
                self.pipelines
                    .read()
                    .map_err(|_| anyhow!("pipeline lock poisoned"))?
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("search pipeline not found: {}", name))?,
            ),
            None => None,
        };

        let indexes = self.read_indexes()?;
        let target = indexes
            .get(index)
            .ok_or_else(|| anyhow!("no such index: {}", index))?;
        let records = &target.records;

        let lexical = lexical_hits(records, query);
        let vector = vector_hits(records, query);

        let by_id: HashMap<&str, &EnrichedRecord> =
            records.iter().map(|r| (r.record_id.as_str(), r)).collect();

        Ok(fuse(&lexical, &vector, pipeline.as_ref())
            .into_iter()
            .take(query.size)
            .filter_map(|f| {
                by_id.get(f.record_id.as_str()).map(|r| RawHit {
                    record_id: f.record_id.clone(),
                    content: r.content.clone(),
                    context: r.context.clone(),
                    score: f.score,
                })
            })
            .collect())
    }
}
