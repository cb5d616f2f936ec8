//! End-to-end pipeline tests against a mocked tool server and stub LLM
//! clients — no real network or LLM provider involved.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::executor::ExecutorConfig;
use orchestrator::synthesizer::SynthesizerConfig;
use orchestrator::tools::ToolRegistry;
use orchestrator::types::{OrchestratorError, Result, WorkflowStatus};
use orchestrator::{LLMClient, Pipeline, ToolClient, ToolClientConfig};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns a fixed response regardless of what it's prompted with, and
/// records every prompt it was given for later assertions.
struct StubLlm {
    response: String,
    prompts_seen: Mutex<Vec<String>>,
}

impl StubLlm {
    fn new(response: impl Into<String>) -> Self {
        Self { response: response.into(), prompts_seen: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl LLMClient for StubLlm {
    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts_seen.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

struct FailingLlm;

#[async_trait]
impl LLMClient for FailingLlm {
    async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
        Err(OrchestratorError::Llm("stub provider unavailable".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing-stub"
    }
}

fn tool_client_for(server: &MockServer) -> ToolClient {
    ToolClient::new(ToolClientConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        max_retries: 1,
        retry_base_delay: Duration::from_millis(1),
        pool_max_idle_per_host: 4,
    })
    .unwrap()
}

fn pipeline_with(
    tool_client: ToolClient,
    decomposer_response: &str,
    subquery_response: &str,
    synthesizer_response: &str,
) -> Pipeline {
    Pipeline::new(
        tool_client,
        ToolRegistry::new(),
        Box::new(StubLlm::new(decomposer_response)),
        Box::new(StubLlm::new(subquery_response)),
        Box::new(StubLlm::new(synthesizer_response)),
        1,
        ExecutorConfig { max_concurrency: 4, per_call_timeout: Duration::from_secs(5) },
        SynthesizerConfig { per_fetch_timeout: Duration::from_secs(5) },
    )
}

#[tokio::test]
async fn empty_filters_short_circuits_before_any_tool_call() {
    let server = MockServer::start().await;
    // No Mock registered on /mcp: if the pipeline called a tool it would 404.
    let pipeline = pipeline_with(tool_client_for(&server), "{}", "irrelevant", "irrelevant");

    let result = pipeline.run("asdf qwerty", None, CancellationToken::new()).await;

    assert_eq!(result.workflow_status, WorkflowStatus::Complete);
    assert!(result.ranked_ids.is_empty());
    assert!(result.final_response.contains("couldn't find"));
}

#[tokio::test]
async fn full_run_ranks_and_synthesizes_from_mocked_tools() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "x",
            "result": {"matches": [{"person_id": 1}, {"person_id": 2}]}
        })))
        .mount(&server)
        .await;

    let decomposer_output = json!({"skill_filters": ["rust"]}).to_string();
    let subquery_output = json!({
        "strategy": "PARALLEL_UNION",
        "sub_queries": [
            {"sub_query": "rust engineers", "tool": "find_people_by_skill", "params": {"skill": "rust"}, "priority": 1, "rationale": "direct match"}
        ]
    })
    .to_string();
    let synthesis_output = "Here are two strong Rust candidates.";

    let pipeline = pipeline_with(tool_client_for(&server), &decomposer_output, &subquery_output, synthesis_output);

    let result = pipeline.run("Find Rust engineers", Some(2), CancellationToken::new()).await;

    assert_eq!(result.workflow_status, WorkflowStatus::Complete);
    assert_eq!(result.ranked_ids, vec![1, 2]);
    assert_eq!(result.final_response, synthesis_output);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn cancellation_before_dispatch_produces_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": "x", "result": {"matches": [{"person_id": 1}]}
        })))
        .mount(&server)
        .await;

    let decomposer_output = json!({"skill_filters": ["rust"]}).to_string();
    let subquery_output = json!({
        "strategy": "PARALLEL_UNION",
        "sub_queries": [
            {"sub_query": "rust engineers", "tool": "find_people_by_skill", "params": {"skill": "rust"}, "priority": 1, "rationale": "r"}
        ]
    })
    .to_string();

    let pipeline = pipeline_with(tool_client_for(&server), &decomposer_output, &subquery_output, "unused");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = pipeline.run("Find Rust engineers", Some(2), cancel).await;

    assert_eq!(result.workflow_status, WorkflowStatus::Error);
    assert!(result.errors.iter().any(|e| format!("{:?}", e.kind) == "Cancelled"));
}

#[tokio::test]
async fn decomposer_failure_degrades_to_no_results_without_planning() {
    let server = MockServer::start().await;
    let pipeline = Pipeline::new(
        tool_client_for(&server),
        ToolRegistry::new(),
        Box::new(FailingLlm),
        Box::new(StubLlm::new("irrelevant")),
        Box::new(StubLlm::new("irrelevant")),
        1,
        ExecutorConfig { max_concurrency: 4, per_call_timeout: Duration::from_secs(5) },
        SynthesizerConfig { per_fetch_timeout: Duration::from_secs(5) },
    );

    let result = pipeline.run("Find Rust engineers", None, CancellationToken::new()).await;

    assert_eq!(result.workflow_status, WorkflowStatus::Complete);
    assert!(result.ranked_ids.is_empty());
    assert!(result.errors.iter().any(|e| format!("{:?}", e.kind) == "Decomposition"));
}
