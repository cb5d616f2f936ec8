//! LLM client abstraction and provider selection.
//!
//! The orchestrator only ever needs one-shot, system-prompted completions —
//! no streaming, no tool calling, no conversation history. [`LLMClient`]
//! is trimmed to exactly that surface.

use crate::types::{OrchestratorError, Result};
use async_trait::async_trait;

/// Appended to every JSON-mode prompt so providers without a native
/// structured-output mode still produce parseable output.
pub const JSON_MODE_SUFFIX: &str =
    "\n\nRespond with a single JSON value and nothing else — no prose, no markdown fences.";

/// Generic LLM client trait for provider abstraction.
///
/// All LLM providers implement this trait, allowing the planner and
/// synthesizer stages to be written against one interface.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a system prompt plus a user prompt.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate a completion that the caller will parse as JSON.
    ///
    /// The default implementation appends [`JSON_MODE_SUFFIX`] to the
    /// system prompt and otherwise behaves like `generate_with_system`;
    /// providers with a native structured-output mode may override this.
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        let system = format!("{system}{JSON_MODE_SUFFIX}");
        self.generate_with_system(&system, prompt).await
    }

    /// Get the model name/identifier in use.
    fn model_name(&self) -> &str;
}

/// Token accounting for one completion, when the provider reports it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }
}

/// Per-request model inference parameters.
#[derive(Debug, Clone, Default)]
pub struct ModelParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Provider enum for runtime selection.
///
/// | Provider | Status |
/// |----------|--------|
/// | OpenAI | full |
/// | Ollama | full |
/// | Anthropic | stub — not yet implemented |
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },
    Ollama {
        base_url: String,
        model: String,
    },
    /// Not yet implemented — kept as a documented placeholder so the
    /// config schema can name it without the crate depending on an
    /// Anthropic SDK.
    Anthropic { api_key: String, model: String },
}

impl Provider {
    /// Create a client instance for this provider.
    pub async fn create_client(&self, params: ModelParams) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Box::new(super::openai::OpenAIClient::with_params(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                params,
            ))),

            #[cfg(not(feature = "openai"))]
            Provider::OpenAI { .. } => Err(OrchestratorError::Configuration(
                "binary built without the 'openai' feature".into(),
            )),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::with_params(base_url.clone(), model.clone(), params)
                    .await?,
            )),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { .. } => Err(OrchestratorError::Configuration(
                "binary built without the 'ollama' feature".into(),
            )),

            Provider::Anthropic { model, api_key } => Err(OrchestratorError::Llm(format!(
                "Anthropic provider not yet implemented (requested model '{model}', api key provided: {}). \
                 Use the OpenAI provider with an OpenRouter base_url, or use Ollama.",
                if api_key.is_empty() { "no" } else { "yes" }
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
            Provider::Anthropic { .. } => "Anthropic",
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, Provider::OpenAI { .. } | Provider::Ollama { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name() {
        let p = Provider::Ollama {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
        };
        assert_eq!(p.name(), "Ollama");
        assert!(p.is_implemented());
    }

    #[tokio::test]
    async fn anthropic_returns_helpful_error() {
        let p = Provider::Anthropic {
            api_key: "key".into(),
            model: "claude-3-sonnet".into(),
        };
        let err = p.create_client(ModelParams::default()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("not yet implemented"));
        assert!(msg.contains("claude-3-sonnet"));
    }
}
