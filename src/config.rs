//! TOML configuration (`orchestrator.toml`) with environment-variable
//! secret indirection, modeled on the pattern of reading infrastructure
//! config from TOML while keeping credentials out of the file itself.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{OrchestratorError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub tool_server: ToolServerConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolServerConfig {
    pub base_url: String,
    #[serde(default = "default_tool_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_pool_limit")]
    pub connection_pool_limit: usize,
}

impl ToolServerConfig {
    /// Read the API key out of the environment variable this config names,
    /// never out of the TOML file itself.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            OrchestratorError::Configuration(format!(
                "environment variable '{}' is not set (see tool_server.api_key_env)",
                self.api_key_env
            ))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama".
    pub provider: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    pub decomposer_model: String,
    pub subquery_model: String,
    pub synthesizer_model: String,
    #[serde(default = "default_decomposer_temperature")]
    pub decomposer_temperature: f32,
    #[serde(default = "default_subquery_temperature")]
    pub subquery_temperature: f32,
    #[serde(default = "default_synthesizer_temperature")]
    pub synthesizer_temperature: f32,
}

impl LlmConfig {
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            OrchestratorError::Configuration(format!(
                "environment variable '{}' is not set (see llm.api_key_env)",
                self.api_key_env
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_desired_count")]
    pub default_desired_count: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { max_concurrency: default_max_concurrency(), default_desired_count: default_desired_count() }
    }
}

fn default_tool_api_key_env() -> String { "TOOL_SERVER_API_KEY".to_string() }
fn default_llm_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout_secs() -> u64 { 10 }
fn default_max_retries() -> u32 { 2 }
fn default_retry_base_delay_ms() -> u64 { 250 }
fn default_pool_limit() -> usize { 16 }
fn default_ollama_base_url() -> String { "http://localhost:11434".to_string() }
fn default_decomposer_temperature() -> f32 { 0.3 }
fn default_subquery_temperature() -> f32 { 0.4 }
fn default_synthesizer_temperature() -> f32 { 0.7 }
fn default_max_concurrency() -> usize { 8 }
fn default_desired_count() -> usize { 5 }

impl OrchestratorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::Configuration(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| OrchestratorError::Configuration(format!("invalid configuration: {e}")))
    }
}
