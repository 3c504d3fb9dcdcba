use anyhow::{Context, Result};
use contextual_search_core::context::ContextMethod;
use contextual_search_core::index::{BatchFailureAction, BulkPolicy, IndexSettings};
use contextual_search_core::pipeline::PipelineSettings;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub opensearch: OpenSearchConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    #[serde(default = "default_context_method")]
    pub context_method: ContextMethod,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            context_method: default_context_method(),
            context_window: default_context_window(),
        }
    }
}

fn default_context_method() -> ContextMethod {
    ContextMethod::Window
}
fn default_context_window() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Override the provider's base URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
            url: None,
        }
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    16
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

/// Model used by the `local` provider when `embedding.model` is unset.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// The configured model, or the local default for `provider = "local"`.
    pub fn resolved_model(&self) -> Option<String> {
        match (&self.model, self.provider.as_str()) {
            (Some(model), _) => Some(model.clone()),
            (None, "local") => Some(DEFAULT_LOCAL_MODEL.to_string()),
            (None, _) => None,
        }
    }

    /// The configured dimension. For `provider = "local"` it falls back to
    /// the known output size of the resolved model.
    pub fn resolved_dims(&self) -> Option<usize> {
        if self.dims.is_some() || self.provider != "local" {
            return self.dims;
        }
        self.resolved_model().map(|model| match model.as_str() {
            "bge-base-en-v1.5" | "multilingual-e5-base" => 768,
            "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
            "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
            _ => 384,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            max_retries: default_llm_retries(),
            timeout_secs: default_llm_timeout(),
            url: None,
        }
    }
}

fn default_max_tokens() -> u32 {
    512
}
fn default_llm_retries() -> u32 {
    3
}
fn default_llm_timeout() -> u64 {
    60
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_pipeline_name")]
    pub pipeline_name: String,
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default)]
    pub on_batch_failure: BatchFailureAction,
    #[serde(default = "default_enrich_concurrency")]
    pub enrich_concurrency: usize,
    #[serde(default = "default_true")]
    pub recreate_on_process: bool,
    #[serde(default = "default_analyzer")]
    pub analyzer: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            index_name: default_index_name(),
            pipeline_name: default_pipeline_name(),
            bulk_size: default_bulk_size(),
            max_attempts: default_max_attempts(),
            on_batch_failure: BatchFailureAction::default(),
            enrich_concurrency: default_enrich_concurrency(),
            recreate_on_process: true,
            analyzer: default_analyzer(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_index_name() -> String {
    "contextual-search".to_string()
}
fn default_pipeline_name() -> String {
    "contextual-search-pipeline".to_string()
}
fn default_bulk_size() -> usize {
    100
}
fn default_max_attempts() -> usize {
    3
}
fn default_enrich_concurrency() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_analyzer() -> String {
    "standard".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/contextual-search.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenSearchConfig {
    #[serde(default = "default_opensearch_url")]
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_opensearch_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: default_opensearch_url(),
            username: None,
            password: None,
            timeout_secs: default_opensearch_timeout(),
        }
    }
}

fn default_opensearch_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_opensearch_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_tie_breaker")]
    pub tie_breaker: f64,
    #[serde(default = "default_result_count")]
    pub result_count: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_weight: default_lexical_weight(),
            vector_weight: default_vector_weight(),
            tie_breaker: default_tie_breaker(),
            result_count: default_result_count(),
        }
    }
}

fn default_lexical_weight() -> f64 {
    0.3
}
fn default_vector_weight() -> f64 {
    0.7
}
fn default_tie_breaker() -> f64 {
    0.3
}
fn default_result_count() -> usize {
    5
}

/// Log filter configuration; `RUST_LOG` takes precedence when set.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,
    /// Per-target overrides, e.g. `contextual_search_core = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Embedding dimension the index is built for. A disabled embedder
    /// still needs a dimension for the schema; it defaults to 1.
    pub fn dimension(&self) -> usize {
        self.embedding.resolved_dims().unwrap_or(1)
    }

    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            index_name: self.index.index_name.clone(),
            pipeline_name: self.index.pipeline_name.clone(),
            analyzer: self.index.analyzer.clone(),
            dimension: self.dimension(),
            lexical_weight: self.retrieval.lexical_weight,
            vector_weight: self.retrieval.vector_weight,
            bulk_size: self.index.bulk_size,
            enrich_concurrency: self.index.enrich_concurrency,
            policy: BulkPolicy {
                max_attempts: self.index.max_attempts,
                on_batch_failure: self.index.on_batch_failure,
            },
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            chunk_size: self.chunking.chunk_size,
            overlap: self.chunking.overlap,
            recreate_on_process: self.index.recreate_on_process,
            result_count: self.retrieval.result_count,
            tie_breaker: self.retrieval.tie_breaker,
            index: self.index_settings(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.result_count < 1 {
        anyhow::bail!("retrieval.result_count must be >= 1");
    }
    for (name, w) in [
        ("lexical_weight", config.retrieval.lexical_weight),
        ("vector_weight", config.retrieval.vector_weight),
        ("tie_breaker", config.retrieval.tie_breaker),
    ] {
        if !(0.0..=1.0).contains(&w) {
            anyhow::bail!("retrieval.{} must be in [0.0, 1.0]", name);
        }
    }
    if config.retrieval.lexical_weight + config.retrieval.vector_weight <= 0.0 {
        anyhow::bail!("retrieval.lexical_weight and retrieval.vector_weight must not both be 0");
    }

    // Validate index
    if config.index.bulk_size == 0 {
        anyhow::bail!("index.bulk_size must be > 0");
    }
    if config.index.max_attempts == 0 {
        anyhow::bail!("index.max_attempts must be >= 1");
    }
    if config.index.enrich_concurrency == 0 {
        anyhow::bail!("index.enrich_concurrency must be >= 1");
    }
    match config.index.backend.as_str() {
        "sqlite" | "opensearch" | "memory" => {}
        other => anyhow::bail!(
            "Unknown index backend: '{}'. Must be sqlite, opensearch, or memory.",
            other
        ),
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if matches!(config.embedding.resolved_dims(), None | Some(0)) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.resolved_model().is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    // Validate llm
    if config.llm.is_enabled() && config.llm.model.is_none() {
        anyhow::bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }
    match config.llm.provider.as_str() {
        "disabled" | "anthropic" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, anthropic, or ollama.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.document.context_method, ContextMethod::Window);
        assert_eq!(config.index.backend, "sqlite");
        assert_eq!(config.index.pipeline_name, "contextual-search-pipeline");
        assert_eq!(config.index.max_attempts, 3);
        assert!(config.index.recreate_on_process);
        assert_eq!(config.retrieval.result_count, 5);
        assert_eq!(config.embedding.batch_size, 16);
        assert_eq!(config.logging.default, "info");
    }

    #[test]
    fn test_full_config_parses() {
        let config = parse_config(
            r#"
            [chunking]
            chunk_size = 500
            overlap = 50

            [document]
            context_method = "full"

            [embedding]
            provider = "openai"
            model = "text-embedding-3-small"
            dims = 1536

            [llm]
            provider = "anthropic"
            model = "claude-3-5-haiku-latest"

            [index]
            backend = "opensearch"
            on_batch_failure = "abort"
            analyzer = "nori"

            [retrieval]
            lexical_weight = 0.5
            vector_weight = 0.5

            [logging]
            default = "warn"
            modules = { contextual_search_core = "debug" }
            "#,
        )
        .unwrap();

        assert_eq!(config.document.context_method, ContextMethod::Full);
        assert_eq!(config.index.on_batch_failure, BatchFailureAction::Abort);
        assert_eq!(config.logging.modules["contextual_search_core"], "debug");

        let settings = config.pipeline_settings();
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.index.dimension, 1536);
        assert_eq!(settings.index.analyzer, "nori");
        assert_eq!(settings.index.policy.on_batch_failure, BatchFailureAction::Abort);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let err = parse_config("[chunking]\nchunk_size = 10\noverlap = 10\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_zero_weights_rejected() {
        let err =
            parse_config("[retrieval]\nlexical_weight = 0.0\nvector_weight = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("both be 0"));
    }

    #[test]
    fn test_enabled_embedding_requires_dims() {
        let err = parse_config("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_local_embedding_defaults_model_and_dims() {
        let config = parse_config("[embedding]\nprovider = \"local\"\n").unwrap();
        assert_eq!(
            config.embedding.resolved_model().as_deref(),
            Some(DEFAULT_LOCAL_MODEL)
        );
        assert_eq!(config.dimension(), 384);

        let config = parse_config(
            "[embedding]\nprovider = \"local\"\nmodel = \"bge-large-en-v1.5\"\n",
        )
        .unwrap();
        assert_eq!(config.dimension(), 1024);

        let config =
            parse_config("[embedding]\nprovider = \"local\"\ndims = 512\n").unwrap();
        assert_eq!(config.dimension(), 512);
    }

    #[test]
    fn test_unknown_context_method_rejected() {
        assert!(parse_config("[document]\ncontext_method = \"paragraph\"\n").is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = parse_config("[index]\nbackend = \"redis\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown index backend"));
    }

    #[test]
    fn test_llm_requires_model() {
        let err = parse_config("[llm]\nprovider = \"ollama\"\n").unwrap_err();
        assert!(err.to_string().contains("llm.model"));
    }
}
