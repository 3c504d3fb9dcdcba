//! Context generation: turning a chunk into a short situating summary.
//!
//! [`ContextGenerationPort`] is what the index manager calls for each
//! chunk. The bundled implementation, [`SituatingContextGenerator`],
//! validates its inputs, resolves the context slice (see
//! [`resolve_context`]), builds the prompt and hands it to an
//! [`LlmClient`]. Transport to a concrete model lives in the app crate.

use async_trait::async_trait;

use crate::context::{resolve_context, ContextMethod};
use crate::error::{PipelineError, PipelineResult};

/// A single-prompt text completion capability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the model identifier used for completions.
    fn model_name(&self) -> &str;

    /// Complete `prompt` and return the model's text answer.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        (**self).complete(prompt).await
    }
}

/// Produces a context summary for one chunk of a document.
#[async_trait]
pub trait ContextGenerationPort: Send + Sync {
    /// Fails with [`PipelineError::InvalidInput`] if either argument is
    /// empty, and with [`PipelineError::ContextGeneration`] if the
    /// underlying call fails.
    async fn generate(&self, full_document: &str, chunk: &str) -> PipelineResult<String>;
}

/// [`ContextGenerationPort`] backed by an [`LlmClient`].
pub struct SituatingContextGenerator<L> {
    llm: L,
    method: ContextMethod,
    window_size: usize,
}

impl<L: LlmClient> SituatingContextGenerator<L> {
    pub fn new(llm: L, method: ContextMethod, window_size: usize) -> Self {
        Self {
            llm,
            method,
            window_size,
        }
    }
}

#[async_trait]
impl<L: LlmClient> ContextGenerationPort for SituatingContextGenerator<L> {
    async fn generate(&self, full_document: &str, chunk: &str) -> PipelineResult<String> {
        if full_document.is_empty() || chunk.is_empty() {
            return Err(PipelineError::InvalidInput(
                "full document and chunk must not be empty".to_string(),
            ));
        }

        let slice = resolve_context(full_document, chunk, self.method, self.window_size);
        let prompt = build_prompt(slice, chunk);

        let answer = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| PipelineError::ContextGeneration(format!("{:#}", e)))?;

        Ok(answer.trim().to_string())
    }
}

/// Build the situating-context prompt for one chunk.
pub fn build_prompt(context_slice: &str, chunk: &str) -> String {
    format!(
        "Here is a section from a document, with its context:\n\n\
         Document Context:\n{}\n\n\
         Specific Section to Focus on:\n{}\n\n\
         Please provide a brief context that situates this specific section within the \
         broader document. Focus on key relationships and relevance.\n\
         Answer only with the succinct context, nothing else.",
        context_slice, chunk
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingLlm {
        fn new(fail: bool) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                anyhow::bail!("model overloaded");
            }
            Ok("  Situates the chunk.\n".to_string())
        }
    }

    #[tokio::test]
    async fn test_generate_trims_answer() {
        let gen = SituatingContextGenerator::new(RecordingLlm::new(false), ContextMethod::Full, 0);
        let ctx = gen.generate("doc text here", "text").await.unwrap();
        assert_eq!(ctx, "Situates the chunk.");
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected_without_call() {
        let gen = SituatingContextGenerator::new(RecordingLlm::new(false), ContextMethod::Full, 0);
        let err = gen.generate("", "").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        let err = gen.generate("document", "").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(gen.llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_is_wrapped() {
        let gen = SituatingContextGenerator::new(RecordingLlm::new(true), ContextMethod::Full, 0);
        let err = gen.generate("document", "doc").await.unwrap_err();
        assert!(matches!(err, PipelineError::ContextGeneration(_)));
        assert_eq!(
            err.to_string(),
            "error generating context: model overloaded"
        );
    }

    #[tokio::test]
    async fn test_window_method_narrows_prompt() {
        let doc = format!("{}needle{}", "a".repeat(100), "b".repeat(100));
        let gen =
            SituatingContextGenerator::new(RecordingLlm::new(false), ContextMethod::Window, 3);
        gen.generate(&doc, "needle").await.unwrap();
        let prompts = gen.llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("aaaneedlebbb"));
        assert!(!prompts[0].contains("aaaaneedle"));
    }

    #[test]
    fn test_prompt_contains_both_parts() {
        let p = build_prompt("SLICE", "CHUNK");
        assert!(p.contains("Document Context:\nSLICE"));
        assert!(p.contains("Specific Section to Focus on:\nCHUNK"));
    }
}
