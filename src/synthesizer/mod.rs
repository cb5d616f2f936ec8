//! Fetches complete profiles for the ranked candidates and renders the final
//! human-readable answer with one LLM call.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::llm::LLMClient;
use crate::toolclient::ToolClient;
use crate::types::{ErrorKind, Filters, OrchestratorError, PipelineError, Profile, Result, StageMetrics};

const NO_RESULTS_RESPONSE: &str =
    "I couldn't find any matching candidates for this query. Try broadening the search criteria or rephrasing the request.";

const NO_PROFILES_RESPONSE: &str =
    "I found matching candidates, but couldn't retrieve any of their profile records. Please try again shortly.";

/// Tuning knobs for the Synthesizer's profile-fetch fan-out.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub per_fetch_timeout: Duration,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self { per_fetch_timeout: Duration::from_secs(10) }
    }
}

pub struct Synthesizer<'a> {
    tool_client: &'a ToolClient,
    llm: &'a dyn LLMClient,
    config: SynthesizerConfig,
}

/// Everything the Synthesizer produces for one query.
#[derive(Debug, Clone)]
pub struct SynthesizerOutput {
    pub final_response: String,
    pub profiles: Vec<Profile>,
    pub errors: Vec<PipelineError>,
    pub metrics: StageMetrics,
}

impl<'a> Synthesizer<'a> {
    pub fn new(tool_client: &'a ToolClient, llm: &'a dyn LLMClient, config: SynthesizerConfig) -> Self {
        Self { tool_client, llm, config }
    }

    pub async fn synthesize(
        &self,
        query: &str,
        filters: &Filters,
        ranked_ids: &[i64],
        total_matches: usize,
        desired_count: usize,
        cancel: &CancellationToken,
    ) -> SynthesizerOutput {
        let started = std::time::Instant::now();

        if ranked_ids.is_empty() {
            return SynthesizerOutput {
                final_response: NO_RESULTS_RESPONSE.to_string(),
                profiles: Vec::new(),
                errors: Vec::new(),
                metrics: StageMetrics { duration: started.elapsed(), ..Default::default() },
            };
        }

        let top_ids: Vec<i64> = ranked_ids.iter().take(desired_count).copied().collect();
        let (profiles, mut errors) = self.fetch_profiles(&top_ids, cancel).await;

        if profiles.is_empty() {
            errors.push(PipelineError::new(ErrorKind::Fetch, "no profiles could be retrieved for any ranked candidate"));
            return SynthesizerOutput {
                final_response: NO_PROFILES_RESPONSE.to_string(),
                profiles,
                errors,
                metrics: StageMetrics { duration: started.elapsed(), ..Default::default() },
            };
        }

        match self.compose(query, filters, total_matches, &profiles).await {
            Ok(final_response) => SynthesizerOutput {
                final_response,
                profiles,
                errors,
                metrics: StageMetrics { duration: started.elapsed(), ..Default::default() },
            },
            Err(e) => {
                errors.push(PipelineError::new(ErrorKind::Composition, e.to_string()));
                SynthesizerOutput {
                    final_response: format!(
                        "I found {} matching profile(s) but ran into an error composing the final answer: {e}",
                        profiles.len()
                    ),
                    profiles,
                    errors,
                    metrics: StageMetrics { duration: started.elapsed(), ..Default::default() },
                }
            }
        }
    }

    async fn fetch_profiles(
        &self,
        ids: &[i64],
        cancel: &CancellationToken,
    ) -> (Vec<Profile>, Vec<PipelineError>) {
        use serde_json::json;

        let mut set = tokio::task::JoinSet::new();
        for &id in ids {
            let client = self.tool_client.clone();
            let cancel = cancel.clone();
            let timeout = self.config.per_fetch_timeout;
            set.spawn(async move {
                let result = client.call("get_person_complete_profile", json!({ "person_id": id }), timeout, &cancel).await;
                (id, result)
            });
        }

        let mut profiles = Vec::with_capacity(ids.len());
        let mut errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            let Ok((id, result)) = joined else { continue };
            if result.success {
                if let Some(payload) = result.raw_payload {
                    profiles.push(payload);
                    continue;
                }
            }
            let message = result
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "profile fetch returned no payload".to_string());
            warn!(person_id = id, error = %message, "profile fetch failed");
            errors.push(PipelineError::new(ErrorKind::Fetch, message).with_context("person_id", id.to_string()));
        }

        // Preserve ranked order rather than completion order for readability.
        profiles.sort_by_key(profile_person_id);
        (profiles, errors)
    }

    async fn compose(
        &self,
        query: &str,
        filters: &Filters,
        total_matches: usize,
        profiles: &[Profile],
    ) -> Result<String> {
        let system = "You are a technical recruiting assistant. Given a user's search query, the \
            filters extracted from it, the total number of matching candidates before truncation, \
            and a list of candidate profile summaries, write a structured, recruiter-facing answer \
            of roughly 500-800 words. Reference each candidate by name, cover their current role, \
            key skills, and 1-2 recent jobs, and explain briefly why each one matches the query. \
            Do not invent any fact not present in the supplied profiles.";

        let filters_json = serde_json::to_string_pretty(filters).unwrap_or_default();
        let profiles_json = serde_json::to_string_pretty(profiles).unwrap_or_default();
        let prompt = format!(
            "User query: {query}\n\nExtracted filters:\n{filters_json}\n\nTotal matches before truncation: {total_matches}\n\nCandidate profiles:\n{profiles_json}"
        );

        self.llm
            .generate_with_system(system, &prompt)
            .await
            .map_err(|_| OrchestratorError::Synthesis("LLM composition call failed".to_string()))
    }
}

fn profile_person_id(profile: &Profile) -> i64 {
    profile.get("person_id").and_then(serde_json::Value::as_i64).unwrap_or(i64::MAX)
}
