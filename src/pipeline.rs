//! Ties the Decomposer, SubQueryGenerator, Executor, and Synthesizer into
//! one pipeline run, enforcing the `WorkflowStatus` state machine and
//! recording diagnostics along the way.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::executor::{Executor, ExecutorConfig};
use crate::llm::LLMClient;
use crate::planner::{Decomposer, SubQueryGenerator};
use crate::synthesizer::{Synthesizer, SynthesizerConfig};
use crate::tools::ToolRegistry;
use crate::toolclient::ToolClient;
use crate::types::{ErrorKind, PipelineError, PipelineResult, PipelineState, WorkflowStatus};

const NO_RESULTS_RESPONSE: &str =
    "I couldn't find any matching candidates for this query. Try broadening the search criteria or rephrasing the request.";

/// Owns the components a pipeline run needs; constructed once and reused
/// across queries.
pub struct Pipeline {
    tool_client: ToolClient,
    tool_registry: ToolRegistry,
    decomposer_llm: Box<dyn LLMClient>,
    subquery_llm: Box<dyn LLMClient>,
    synthesizer_llm: Box<dyn LLMClient>,
    decomposer_max_retries: u32,
    executor_config: ExecutorConfig,
    synthesizer_config: SynthesizerConfig,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tool_client: ToolClient,
        tool_registry: ToolRegistry,
        decomposer_llm: Box<dyn LLMClient>,
        subquery_llm: Box<dyn LLMClient>,
        synthesizer_llm: Box<dyn LLMClient>,
        decomposer_max_retries: u32,
        executor_config: ExecutorConfig,
        synthesizer_config: SynthesizerConfig,
    ) -> Self {
        Self {
            tool_client,
            tool_registry,
            decomposer_llm,
            subquery_llm,
            synthesizer_llm,
            decomposer_max_retries,
            executor_config,
            synthesizer_config,
        }
    }

    /// Run one query end-to-end, returning a `PipelineResult` regardless of
    /// whether the run succeeded, produced no candidates, or errored.
    pub async fn run(&self, user_query: &str, desired_count: Option<usize>, cancel: CancellationToken) -> PipelineResult {
        let request_id = Uuid::new_v4().to_string();
        let mut state = PipelineState::new(user_query, desired_count);
        info!(request_id, query = user_query, "pipeline run starting");

        state.transition(WorkflowStatus::Planning);

        let decomposer = Decomposer::new(self.decomposer_llm.as_ref(), self.decomposer_max_retries);
        let (filters, planning_metrics, decomposition_error) = decomposer.decompose(user_query).await;
        if let Some(message) = decomposition_error {
            warn!(request_id, "decomposition degraded: {message}");
            state.push_error(PipelineError::new(ErrorKind::Decomposition, message));
        }
        state.filters = Some(filters.clone());

        let subquery_generator = SubQueryGenerator::new(self.subquery_llm.as_ref(), &self.tool_registry);
        let (plan, subquery_metrics, planning_error) = subquery_generator.generate(user_query, &filters).await;
        if let Some(message) = planning_error {
            warn!(request_id, "planning degraded: {message}");
            state.push_error(PipelineError::new(ErrorKind::Planning, message));
        }
        state.plan = Some(plan.clone());
        state.planning_metadata = combine_stage_metrics(planning_metrics, subquery_metrics);
        state.transition(WorkflowStatus::PlanningComplete);

        if plan.sub_queries.is_empty() {
            state.transition(WorkflowStatus::Executing);
            state.transition(WorkflowStatus::ToolsComplete);
            state.transition(WorkflowStatus::Synthesizing);
            state.final_response = Some(NO_RESULTS_RESPONSE.to_string());
            state.transition(WorkflowStatus::Complete);
            info!(request_id, "pipeline completed with no actionable plan");
            return finish(state, request_id);
        }

        state.transition(WorkflowStatus::Executing);
        let executor = Executor::new(self.tool_client.clone(), self.executor_config.clone());
        let executor_output = executor.execute(&plan, state.desired_count, &cancel).await;

        state.tool_results = executor_output.tool_results;
        state.ranked_ids = executor_output.ranked_ids.clone();
        state.execution_metadata = executor_output.metrics;
        for error in executor_output.errors {
            let is_fatal = error.kind == ErrorKind::Cancelled
                || (error.kind == ErrorKind::SubQuery && error.message.contains("every required sub-query failed"));
            state.push_error(error);
            if is_fatal {
                state.transition(WorkflowStatus::Error);
                state.final_response = Some(diagnostic_response(&state));
                return finish(state, request_id);
            }
        }
        state.transition(WorkflowStatus::ToolsComplete);

        if cancel.is_cancelled() {
            state.push_error(PipelineError::new(ErrorKind::Cancelled, "cancelled after execution, before synthesis"));
            state.transition(WorkflowStatus::Error);
            state.final_response = Some(diagnostic_response(&state));
            return finish(state, request_id);
        }

        state.transition(WorkflowStatus::Synthesizing);
        let synthesizer = Synthesizer::new(&self.tool_client, self.synthesizer_llm.as_ref(), self.synthesizer_config.clone());
        let total_matches = state.ranked_ids.len();
        let output = synthesizer
            .synthesize(user_query, &filters, &state.ranked_ids, total_matches, state.desired_count, &cancel)
            .await;

        state.profiles = output.profiles;
        state.synthesis_metadata = output.metrics;
        let composition_failed = output.errors.iter().any(|e| e.kind == ErrorKind::Composition);
        for error in output.errors {
            state.push_error(error);
        }
        state.final_response = Some(output.final_response);

        if composition_failed {
            state.transition(WorkflowStatus::Error);
        } else {
            state.transition(WorkflowStatus::Complete);
        }

        info!(request_id, status = ?state.workflow_status, "pipeline run finished");
        finish(state, request_id)
    }
}

fn diagnostic_response(state: &PipelineState) -> String {
    let reasons: Vec<&str> = state.errors.iter().map(|e| e.message.as_str()).collect();
    format!("The search could not be completed: {}", reasons.join("; "))
}

fn finish(state: PipelineState, _request_id: String) -> PipelineResult {
    PipelineResult {
        final_response: state.final_response.unwrap_or_else(|| NO_RESULTS_RESPONSE.to_string()),
        workflow_status: state.workflow_status,
        ranked_ids: state.ranked_ids,
        profiles_used: state.profiles.len(),
        errors: state.errors,
        requested_at: Utc::now(),
    }
}

/// Folds the Decomposer's and SubQueryGenerator's `StageMetrics` into the
/// single `planning_metadata` entry `PipelineState` tracks.
fn combine_stage_metrics(a: crate::types::StageMetrics, b: crate::types::StageMetrics) -> crate::types::StageMetrics {
    crate::types::StageMetrics {
        duration: a.duration + b.duration,
        prompt_tokens: sum_opt(a.prompt_tokens, b.prompt_tokens),
        completion_tokens: sum_opt(a.completion_tokens, b.completion_tokens),
    }
}

fn sum_opt(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_response_lists_all_errors() {
        let mut state = PipelineState::new("q", None);
        state.push_error(PipelineError::new(ErrorKind::SubQuery, "tool failed"));
        state.push_error(PipelineError::new(ErrorKind::Cancelled, "cancelled"));
        let response = diagnostic_response(&state);
        assert!(response.contains("tool failed"));
        assert!(response.contains("cancelled"));
    }
}
