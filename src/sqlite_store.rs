//! SQLite-backed [`SearchBackend`] implementation.
//!
//! Lexical sub-queries run through FTS5 `bm25()` once per requested field
//! and are combined best-fields style. Vector sub-queries are brute-force
//! cosine similarity over the stored BLOBs, scored `(1 + cos) / 2`.
//! Fusion pipelines are stored as JSON and applied with the core fusion
//! module, so results match the other backends.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use contextual_search_core::embedding::{blob_to_vec, cosine_score, vec_to_blob};
use contextual_search_core::fusion::{best_fields_score, fuse, SubQueryHit};
use contextual_search_core::models::{EnrichedRecord, RawHit};
use contextual_search_core::query::HybridQuery;
use contextual_search_core::schema::{FusionPipeline, IndexSchema, CONTENT_FIELD, CONTEXT_FIELD};
use contextual_search_core::store::SearchBackend;

/// SQLite implementation of the [`SearchBackend`] trait.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn schema(&self, index: &str) -> Result<Option<IndexSchema>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT schema_json FROM indexes WHERE name = ?")
                .bind(index)
                .fetch_optional(&self.pool)
                .await?;
        match json {
            Some(j) => Ok(Some(
                serde_json::from_str(&j).with_context(|| format!("corrupt schema for index {}", index))?,
            )),
            None => Ok(None),
        }
    }

    async fn pipeline(&self, name: &str) -> Result<Option<FusionPipeline>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT definition_json FROM search_pipelines WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        match json {
            Some(j) => Ok(Some(
                serde_json::from_str(&j).with_context(|| format!("corrupt pipeline {}", name))?,
            )),
            None => Ok(None),
        }
    }

    /// BM25 scores for one text field, keyed by record id.
    async fn field_scores(
        &self,
        index: &str,
        field: &str,
        match_expr: &str,
    ) -> Result<HashMap<String, f64>> {
        let weights = match field {
            CONTENT_FIELD => "0.0, 0.0, 1.0, 0.0",
            CONTEXT_FIELD => "0.0, 0.0, 0.0, 1.0",
            other => bail!("unknown text field: {}", other),
        };
        let sql = format!(
            r#"
            SELECT record_id, bm25(records_fts, {}) AS bm25_score
            FROM records_fts
            WHERE records_fts MATCH ? AND index_name = ?
            "#,
            weights
        );
        let rows = sqlx::query(&sql)
            .bind(format!("{{{}}} : ({})", field, match_expr))
            .bind(index)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                // bm25() is lower-is-better
                let score: f64 = row.get("bm25_score");
                (row.get::<String, _>("record_id"), -score)
            })
            .collect())
    }

    async fn lexical_hits(&self, index: &str, query: &HybridQuery) -> Result<Vec<SubQueryHit>> {
        let Some(match_expr) = fts_match_expr(&query.lexical.text) else {
            return Ok(Vec::new());
        };

        let mut per_field = Vec::with_capacity(query.lexical.fields.len());
        for field in &query.lexical.fields {
            per_field.push(self.field_scores(index, field, &match_expr).await?);
        }

        let mut ids: Vec<&String> = per_field.iter().flat_map(|m| m.keys()).collect();
        ids.sort();
        ids.dedup();

        let mut hits: Vec<SubQueryHit> = ids
            .into_iter()
            .map(|id| {
                let scores: Vec<f64> = per_field
                    .iter()
                    .map(|m| m.get(id).copied().unwrap_or(0.0))
                    .collect();
                SubQueryHit::new(id.clone(), best_fields_score(&scores, query.lexical.tie_breaker))
            })
            .filter(|h| h.raw_score > 0.0)
            .collect();
        sort_desc(&mut hits);
        hits.truncate(query.size);
        Ok(hits)
    }
}

/// Quote every token so user text can't inject FTS5 syntax, OR-joined.
fn fts_match_expr(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
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
impl SearchBackend for SqliteBackend {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM indexes WHERE name = ?")
            .bind(index)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO indexes (name, schema_json, created_at) VALUES (?, ?, ?)")
            .bind(&schema.index_name)
            .bind(serde_json::to_string(schema)?)
            .bind(now)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to create index {}", schema.index_name))?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records_fts WHERE index_name = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM records WHERE index_name = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM indexes WHERE name = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn put_pipeline(&self, pipeline: &FusionPipeline) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO search_pipelines (name, definition_json) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET definition_json = excluded.definition_json
            "#,
        )
        .bind(&pipeline.name)
        .bind(serde_json::to_string(pipeline)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pipeline_exists(&self, name: &str) -> Result<bool> {
        Ok(self.pipeline(name).await?.is_some())
    }

    async fn bulk_write(&self, index: &str, records: &[EnrichedRecord]) -> Result<()> {
        let schema = self
            .schema(index)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no such index: {}", index))?;
        let dims = schema.vector_field.dimension;
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dims) {
            bail!(
                "record {} has {} dimensions, index expects {}",
                bad.record_id,
                bad.vector.len(),
                dims
            );
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO records (index_name, record_id, content, context, vector)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(index_name, record_id) DO UPDATE SET
                    content = excluded.content,
                    context = excluded.context,
                    vector = excluded.vector
                "#,
            )
            .bind(index)
            .bind(&record.record_id)
            .bind(&record.content)
            .bind(&record.context)
            .bind(vec_to_blob(&record.vector))
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM records_fts WHERE index_name = ? AND record_id = ?")
                .bind(index)
                .bind(&record.record_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO records_fts (index_name, record_id, content, context) VALUES (?, ?, ?, ?)",
            )
            .bind(index)
            .bind(&record.record_id)
            .bind(&record.content)
            .bind(&record.context)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn hybrid_query(&self, index: &str, query: &HybridQuery) -> Result<Vec<RawHit>> {
        if !self.index_exists(index).await? {
            bail!("no such index: {}", index);
        }

        let pipeline = match &query.pipeline {
            Some(name) => Some(
                self.pipeline(name)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("search pipeline not found: {}", name))?,
            ),
            None => None,
        };

        let rows = sqlx::query(
            "SELECT record_id, content, context, vector FROM records WHERE index_name = ?",
        )
        .bind(index)
        .fetch_all(&self.pool)
        .await?;

        let mut stored: HashMap<String, (String, String)> = HashMap::with_capacity(rows.len());
        let mut vector_hits: Vec<SubQueryHit> = Vec::with_capacity(rows.len());
        for row in &rows {
            let record_id: String = row.get("record_id");
            let blob: Vec<u8> = row.get("vector");
            let score = cosine_score(&query.vector.vector, &blob_to_vec(&blob));
            vector_hits.push(SubQueryHit::new(record_id.clone(), score));
            stored.insert(record_id, (row.get("content"), row.get("context")));
        }
        sort_desc(&mut vector_hits);
        vector_hits.truncate(query.vector.k);

        let lexical_hits = self.lexical_hits(index, query).await?;

        Ok(fuse(&lexical_hits, &vector_hits, pipeline.as_ref())
            .into_iter()
            .take(query.size)
            .filter_map(|f| {
                stored.get(&f.record_id).map(|(content, context)| RawHit {
                    record_id: f.record_id.clone(),
                    content: content.clone(),
                    context: context.clone(),
                    score: f.score,
                })
            })
            .collect())
    }
}
