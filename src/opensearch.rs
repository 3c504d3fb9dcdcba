//! OpenSearch-backed [`SearchBackend`] implementation over the REST API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | index exists | `HEAD /{index}` |
//! | create index | `PUT /{index}` with k-NN settings and mappings |
//! | delete index | `DELETE /{index}` |
//! | register pipeline | `PUT /_search/pipeline/{name}` |
//! | pipeline exists | `GET /_search/pipeline/{name}` |
//! | bulk write | `POST /_bulk` (NDJSON) |
//! | hybrid query | `POST /{index}/_search?search_pipeline={name}` |
//!
//! Request bodies are built by pure functions so they can be tested
//! without a cluster. Each call is a single attempt; retries belong to
//! the index manager's bulk policy.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use contextual_search_core::models::{EnrichedRecord, RawHit};
use contextual_search_core::query::HybridQuery;
use contextual_search_core::schema::{
    Combination, FusionPipeline, IndexSchema, Normalization, CONTENT_FIELD, CONTEXT_FIELD,
};
use contextual_search_core::store::SearchBackend;

use crate::config::OpenSearchConfig;
use crate::http;

/// Name of the custom analyzer defined when the schema asks for `nori`.
const NORI_ANALYZER: &str = "nori_analyzer";

pub struct OpenSearchBackend {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl OpenSearchBackend {
    pub fn new(config: &OpenSearchConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            client: http::client(config.timeout_secs)?,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, path.trim_start_matches('/')));
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    /// `true` for 2xx, `false` for 404, error otherwise.
    async fn exists(&self, path: &str) -> Result<bool> {
        let method = if path.starts_with("_search") {
            reqwest::Method::GET
        } else {
            reqwest::Method::HEAD
        };
        let response = self.request(method, path).send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => bail!("OpenSearch {} returned {}", path, s),
        }
    }
}

async fn ensure_success(response: reqwest::Response, what: &str) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        bail!("{} failed with {}: {}", what, status, body);
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).with_context(|| format!("{}: invalid JSON response", what))
}

/// Analyzer name used in field mappings for `schema.analyzer`.
fn analyzer_name(schema: &IndexSchema) -> &str {
    if schema.analyzer == "nori" {
        NORI_ANALYZER
    } else {
        &schema.analyzer
    }
}

/// `PUT /{index}` body: k-NN enabled, text fields, and the vector field.
pub fn index_body(schema: &IndexSchema) -> Value {
    let analyzer = analyzer_name(schema);

    let mut properties = serde_json::Map::new();
    for field in &schema.text_fields {
        properties.insert(field.clone(), json!({ "type": "text", "analyzer": analyzer }));
    }
    let vector = &schema.vector_field;
    properties.insert(
        vector.name.clone(),
        json!({
            "type": "knn_vector",
            "dimension": vector.dimension,
            "method": {
                "name": vector.method.name,
                "space_type": vector.method.space_type,
                "engine": vector.method.engine,
            }
        }),
    );

    let mut settings = json!({ "index": { "knn": true } });
    if analyzer == NORI_ANALYZER {
        settings["analysis"] = json!({
            "analyzer": {
                NORI_ANALYZER: {
                    "type": "custom",
                    "tokenizer": "nori_tokenizer",
                    "filter": ["nori_number", "nori_readingform", "lowercase"]
                }
            }
        });
    }

    json!({
        "settings": settings,
        "mappings": { "properties": properties },
    })
}

/// `PUT /_search/pipeline/{name}` body.
pub fn pipeline_body(pipeline: &FusionPipeline) -> Value {
    let normalization = match pipeline.normalization {
        Normalization::MinMax => "min_max",
    };
    let combination = match &pipeline.combination {
        Combination::ArithmeticMean { weights } => json!({
            "technique": "arithmetic_mean",
            "parameters": { "weights": weights }
        }),
    };
    json!({
        "description": pipeline.description,
        "phase_results_processors": [
            {
                "normalization-processor": {
                    "normalization": { "technique": normalization },
                    "combination": combination,
                }
            }
        ]
    })
}

/// `POST /_bulk` body: an index action and a source line per record.
pub fn bulk_body(index: &str, records: &[EnrichedRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        let action = json!({ "index": { "_index": index, "_id": record.record_id } });
        let source = json!({
            CONTENT_FIELD: record.content,
            CONTEXT_FIELD: record.context,
            "content_vector": record.vector,
        });
        out.push_str(&serde_json::to_string(&action)?);
        out.push('\n');
        out.push_str(&serde_json::to_string(&source)?);
        out.push('\n');
    }
    Ok(out)
}

/// `POST /{index}/_search` body.
///
/// With a fusion pipeline the two sub-queries go into a `hybrid` query so
/// the pipeline can normalize them separately; without one they are
/// `should` clauses and OpenSearch sums their scores.
pub fn search_body(query: &HybridQuery) -> Value {
    let lexical = json!({
        "multi_match": {
            "query": query.lexical.text,
            "fields": query.lexical.fields,
            "type": "best_fields",
            "tie_breaker": query.lexical.tie_breaker,
        }
    });
    let vector = json!({
        "knn": {
            query.vector.field.as_str(): {
                "vector": query.vector.vector,
                "k": query.vector.k,
            }
        }
    });

    let combined = if query.pipeline.is_some() {
        json!({ "hybrid": { "queries": [lexical, vector] } })
    } else {
        json!({ "bool": { "should": [lexical, vector] } })
    };

    json!({
        "size": query.size,
        "query": combined,
        "_source": [CONTENT_FIELD, CONTEXT_FIELD],
    })
}

/// Map `hits.hits[]` of a search response to [`RawHit`]s.
pub fn parse_hits(response: &Value) -> Result<Vec<RawHit>> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(|h| h.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid search response: missing hits.hits"))?;

    Ok(hits
        .iter()
        .map(|hit| {
            let text = |field: &str| {
                hit.pointer(&format!("/_source/{}", field))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            RawHit {
                record_id: hit
                    .get("_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                content: text(CONTENT_FIELD),
                context: text(CONTEXT_FIELD),
                score: hit.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
            }
        })
        .collect())
}

/// The first item-level error of a bulk response, if any.
fn first_bulk_error(response: &Value) -> Option<String> {
    if response.get("errors").and_then(|e| e.as_bool()) != Some(true) {
        return None;
    }
    response
        .get("items")
        .and_then(|i| i.as_array())
        .and_then(|items| {
            items.iter().find_map(|item| {
                let action = item.get("index")?;
                let error = action.get("error")?;
                Some(format!(
                    "record {}: {}",
                    action.get("_id").and_then(|v| v.as_str()).unwrap_or("?"),
                    error
                ))
            })
        })
        .or_else(|| Some("bulk request reported errors".to_string()))
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.exists(index).await
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT, &schema.index_name)
            .json(&index_body(schema))
            .send()
            .await?;
        ensure_success(response, "create index").await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self.request(reqwest::Method::DELETE, index).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response, "delete index").await?;
        Ok(())
    }

    async fn put_pipeline(&self, pipeline: &FusionPipeline) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("_search/pipeline/{}", pipeline.name),
            )
            .json(&pipeline_body(pipeline))
            .send()
            .await?;
        ensure_success(response, "create search pipeline").await?;
        Ok(())
    }

    async fn pipeline_exists(&self, name: &str) -> Result<bool> {
        self.exists(&format!("_search/pipeline/{}", name)).await
    }

    async fn bulk_write(&self, index: &str, records: &[EnrichedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let response = self
            .request(reqwest::Method::POST, "_bulk?refresh=wait_for")
            .header("Content-Type", "application/x-ndjson")
            .body(bulk_body(index, records)?)
            .send()
            .await?;
        let json = ensure_success(response, "bulk write").await?;
        if let Some(err) = first_bulk_error(&json) {
            bail!("bulk write failed: {}", err);
        }
        Ok(())
    }

    async fn hybrid_query(&self, index: &str, query: &HybridQuery) -> Result<Vec<RawHit>> {
        let path = match &query.pipeline {
            Some(p) => format!("{}/_search?search_pipeline={}", index, p),
            None => format!("{}/_search", index),
        };
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&search_body(query))
            .send()
            .await?;
        let json = ensure_success(response, "search").await?;
        parse_hits(&json)
    }
}
