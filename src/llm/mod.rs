//! LLM provider clients and abstractions.
//!
//! The orchestrator treats the LLM as a black-box collaborator called
//! exactly three times per query (Decomposer, SubQueryGenerator,
//! Synthesizer), so this module is intentionally thin compared to a
//! general-purpose chat server's LLM layer: one trait, two providers.
//!
//! Enable providers via Cargo features:
//! - `openai` — OpenAI API (GPT-4o, GPT-4o-mini, etc.)
//! - `ollama` — local Ollama server

pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, ModelParams, Provider, TokenUsage};
