//! # graph-query-orchestrator
//!
//! Orchestrates natural-language recruiting queries over a professional-
//! network knowledge graph: a two-stage LLM planner decomposes the query
//! into typed filters and a tool-backed execution plan, an Executor fans
//! the plan out to a remote JSON-RPC tool server and combines the results
//! by set algebra, and a Synthesizer fetches the winning profiles and
//! renders a human-readable answer.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use orchestrator::config::OrchestratorConfig;
//! use orchestrator::llm::{Provider, ModelParams};
//! use orchestrator::toolclient::{ToolClient, ToolClientConfig};
//! use orchestrator::tools::ToolRegistry;
//! use orchestrator::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OrchestratorConfig::load("orchestrator.toml")?;
//!     let tool_client = ToolClient::new(ToolClientConfig {
//!         base_url: config.tool_server.base_url.clone(),
//!         api_key: config.tool_server.api_key()?,
//!         max_retries: config.tool_server.max_retries,
//!         retry_base_delay: config.tool_server.retry_base_delay(),
//!         pool_max_idle_per_host: config.tool_server.connection_pool_limit,
//!     })?;
//!
//!     let provider = Provider::Ollama {
//!         base_url: config.llm.base_url.clone(),
//!         model: config.llm.decomposer_model.clone(),
//!     };
//!     let llm = provider.create_client(ModelParams::default()).await?;
//!     let _ = llm; // wire up Decomposer/SubQueryGenerator/Synthesizer clients similarly
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API support (default) |
//!
//! ## Modules
//!
//! - [`types`] - Core data types and the crate-wide error type
//! - [`config`] - TOML configuration with environment-variable secrets
//! - [`llm`] - LLM provider clients and abstractions
//! - [`tools`] - Static registry of remote graph-query tool descriptors
//! - [`toolclient`] - JSON-RPC client for the remote tool server
//! - [`planner`] - Decomposer and SubQueryGenerator
//! - [`executor`] - Plan execution, set-algebra combination, and ranking
//! - [`synthesizer`] - Profile fetch and final-answer composition
//! - [`pipeline`] - Ties the stages together behind one entry point
//! - [`cli`] - Command-line argument parsing

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

/// Command-line argument parsing.
pub mod cli;
/// TOML configuration with environment-variable secret indirection.
pub mod config;
/// Plan execution: fan-out, set-algebra combination, and ranking.
pub mod executor;
/// LLM provider clients and abstractions.
pub mod llm;
/// Decomposer and SubQueryGenerator: query -> Filters -> Plan.
pub mod planner;
/// The end-to-end pipeline tying every stage together.
pub mod pipeline;
/// Profile fetch and final-answer composition.
pub mod synthesizer;
/// Static registry of the remote graph-query tool descriptors.
pub mod tools;
/// JSON-RPC client for the remote tool server.
pub mod toolclient;
/// Core data types and the crate-wide error type.
pub mod types;

pub use llm::{LLMClient, ModelParams, Provider};
pub use pipeline::Pipeline;
pub use tools::ToolRegistry;
pub use toolclient::{ToolClient, ToolClientConfig};
pub use types::{OrchestratorError, PipelineResult, Result};
