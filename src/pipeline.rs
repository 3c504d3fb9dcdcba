//! Wiring of config-selected adapters into a core [`Pipeline`].

use std::sync::Arc;

use anyhow::Result;
use contextual_search_core::generation::SituatingContextGenerator;
use contextual_search_core::pipeline::Pipeline;

use crate::backend::create_backend;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::llm::create_llm;

/// Build a pipeline from the configured backend, LLM and embedder.
pub async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let backend = create_backend(config).await?;
    let llm = create_llm(&config.llm)?;
    let llm_model = llm.model_name().to_string();
    let generator = SituatingContextGenerator::new(
        llm,
        config.document.context_method,
        config.document.context_window,
    );
    let embedder = create_embedder(&config.embedding)?;

    tracing::debug!(
        backend = %config.index.backend,
        llm = %config.llm.provider,
        llm_model = %llm_model,
        embedding = %config.embedding.provider,
        embedding_model = %embedder.model_name(),
        context_method = %config.document.context_method,
        "pipeline configured"
    );

    Ok(Pipeline::new(
        backend,
        Arc::new(generator),
        Arc::from(embedder),
        config.pipeline_settings(),
    ))
}
