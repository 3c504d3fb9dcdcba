//! LLM completion clients used for context generation.
//!
//! Each client implements the core [`LlmClient`]; the core's
//! `SituatingContextGenerator` builds the prompt and interprets the answer.
//!
//! | Config Value | Client | Endpoint |
//! |-------------|--------|----------|
//! | `"disabled"` | [`DisabledLlm`] | none |
//! | `"anthropic"` | [`AnthropicClient`] | `POST /v1/messages` |
//! | `"ollama"` | [`OllamaLlm`] | `POST /api/generate` |

use anyhow::{bail, Result};
use async_trait::async_trait;
use contextual_search_core::generation::LlmClient;

use crate::config::LlmConfig;
use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Always fails; used when `llm.provider = "disabled"`.
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("LLM provider is disabled")
    }
}

/// Anthropic Messages API client. Requires `ANTHROPIC_API_KEY`.
pub struct AnthropicClient {
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_retries: u32,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Anthropic provider"))?;
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            api_key,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });
        let endpoint = format!("{}/v1/messages", self.url.trim_end_matches('/'));

        let json = http::send_json_with_retry("Anthropic", self.max_retries, || {
            self.client
                .post(&endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        parse_anthropic_response(&json)
    }
}

/// Concatenate the `text` blocks of a Messages API response.
fn parse_anthropic_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Anthropic response: missing content array"))?;

    let text: String = content
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        bail!("Invalid Anthropic response: no text content");
    }
    Ok(text)
}

/// Ollama `/api/generate` client (non-streaming).
pub struct OllamaLlm {
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    url: String,
    client: reqwest::Client,
}

impl OllamaLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Ollama provider"))?;
        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        let endpoint = format!("{}/api/generate", self.url.trim_end_matches('/'));

        let json = http::send_json_with_retry("Ollama", self.max_retries, || {
            self.client
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}

/// Create the [`LlmClient`] selected by `llm.provider`.
pub fn create_llm(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledLlm)),
        "anthropic" => Ok(Box::new(AnthropicClient::new(config)?)),
        "ollama" => Ok(Box::new(OllamaLlm::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
