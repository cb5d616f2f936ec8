//! Core data types threaded through the query orchestration pipeline.
//!
//! This module contains the typed decomposition of a user query (`Filters`),
//! the planner's output (`SubQuery`, `Plan`, `Strategy`), the executor's
//! view of a remote tool call (`ToolResult`), the per-request state machine
//! (`PipelineState`, `WorkflowStatus`), and the crate-wide error type.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============= Filters =============

/// Typed decomposition of a user query, produced by the Decomposer.
///
/// Every field is optional and independently composable; an empty set and
/// an absent field are equivalent, so callers should not distinguish them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Filters {
    /// Skill terms mentioned or implied by the query (case-insensitive).
    #[serde(default)]
    pub skill_filters: HashSet<String>,
    /// Company names mentioned or implied by the query.
    #[serde(default)]
    pub company_filters: HashSet<String>,
    /// Location strings mentioned or implied by the query.
    #[serde(default)]
    pub location_filters: HashSet<String>,
    /// Educational institutions mentioned or implied by the query.
    #[serde(default)]
    pub institution_filters: HashSet<String>,
    /// Person names mentioned or implied by the query.
    #[serde(default)]
    pub name_filters: HashSet<String>,
    /// Seniority tokens (e.g. "senior", "staff", "principal").
    #[serde(default)]
    pub seniority_filters: HashSet<String>,
    /// Years-of-experience bounds, if the query implies any.
    #[serde(default)]
    pub experience_filters: Option<ExperienceRange>,
    /// Free-form key/value hints that don't fit a typed category.
    #[serde(default)]
    pub other_criteria: HashMap<String, String>,
}

impl Filters {
    /// True when every field is empty — the Decomposer extracted nothing.
    pub fn is_empty(&self) -> bool {
        self.skill_filters.is_empty()
            && self.company_filters.is_empty()
            && self.location_filters.is_empty()
            && self.institution_filters.is_empty()
            && self.name_filters.is_empty()
            && self.seniority_filters.is_empty()
            && self.experience_filters.is_none()
            && self.other_criteria.is_empty()
    }
}

/// Years-of-experience bounds extracted from a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExperienceRange {
    pub min_years: Option<u32>,
    pub max_years: Option<u32>,
}

// ============= Plan =============

/// Priority of a planned sub-query: lower numbers are more load-bearing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Priority {
    /// Required — covers a filter the plan cannot drop.
    Required = 1,
    /// Secondary — broadens recall but isn't load-bearing.
    Secondary = 2,
    /// Optional — contributes to ranking only.
    Optional = 3,
}

/// One unit of planned work for the Executor: a single tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuery {
    /// Human-readable description, for logs.
    pub sub_query: String,
    /// Name of a registered remote tool.
    pub tool: String,
    /// Parameters matching the tool's declared signature. A string value of
    /// `"$prev_id"` is replaced by the Executor with the first ID produced
    /// by the previous step when `Strategy::Sequential` is in effect.
    pub params: Value,
    /// 1 = required, 2 = secondary, 3 = optional.
    pub priority: Priority,
    /// Free-form explanation of why this sub-query was planned.
    pub rationale: String,
    /// Tags this sub-query as belonging to the intersect or union half of a
    /// `Strategy::Hybrid` plan. Ignored for every other strategy.
    #[serde(default)]
    pub combine_group: Option<CombineGroup>,
}

/// Which half of a `Strategy::Hybrid` plan a sub-query belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CombineGroup {
    Intersect,
    Union,
}

/// Set-algebra strategy for combining sub-query results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Every required sub-query's IDs must agree; combine by intersection.
    ParallelIntersect,
    /// Broaden recall across synonymous formulations; combine by union.
    ParallelUnion,
    /// Later sub-queries consume IDs produced by earlier ones.
    Sequential,
    /// At least one intersect group and one union group.
    Hybrid,
}

/// The output of the SubQueryGenerator: an executable plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Ordered sub-queries; order is preserved for deterministic combination.
    pub sub_queries: Vec<SubQuery>,
    /// The set-algebra strategy governing combination.
    pub strategy: Strategy,
    /// The original user query, carried for traceability.
    pub original_query: String,
    /// The filters this plan was generated from, carried for traceability.
    pub filters_used: Filters,
}

impl Plan {
    /// An empty plan for queries with no actionable filters.
    pub fn empty(original_query: impl Into<String>, filters_used: Filters) -> Self {
        Self {
            sub_queries: Vec::new(),
            strategy: Strategy::ParallelUnion,
            original_query: original_query.into(),
            filters_used,
        }
    }
}

// ============= ToolResult =============

/// Structured error surfaced by a failed remote tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    pub code: Option<i64>,
}

/// Coarse classification of why a remote tool call failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolErrorKind {
    Transport,
    Auth,
    Rpc,
    Parse,
}

/// The outcome of one remote tool call, as seen by the Executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub params: Value,
    pub success: bool,
    /// Integer person IDs extracted from the decoded payload.
    pub person_ids: HashSet<i64>,
    /// The decoded payload, retained for debugging.
    pub raw_payload: Option<Value>,
    pub error: Option<ToolError>,
    pub duration: std::time::Duration,
    /// Per-call request id, for correlating with ToolClient logs.
    pub request_id: String,
}

impl ToolResult {
    pub fn failure(
        tool: impl Into<String>,
        params: Value,
        error: ToolError,
        duration: std::time::Duration,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            params,
            success: false,
            person_ids: HashSet::new(),
            raw_payload: None,
            error: Some(error),
            duration,
            request_id: request_id.into(),
        }
    }
}

// ============= PipelineState =============

/// Lifecycle of a single pipeline invocation.
///
/// Transitions only flow along the edges below; `Error` is reachable from
/// any non-terminal state and is itself terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Initialized,
    Planning,
    PlanningComplete,
    Executing,
    ToolsComplete,
    Synthesizing,
    Complete,
    Error,
}

impl WorkflowStatus {
    /// Whether `self -> next` is a legal transition per the state machine.
    pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        if next == Error {
            return self != Error && self != Complete;
        }
        matches!(
            (self, next),
            (Initialized, Planning)
                | (Planning, PlanningComplete)
                | (PlanningComplete, Executing)
                | (Executing, ToolsComplete)
                | (ToolsComplete, Synthesizing)
                | (Synthesizing, Complete)
        )
    }
}

/// Kind tag for a recoverable or fatal failure recorded in `PipelineState::errors`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    Decomposition,
    Planning,
    SubQuery,
    Fetch,
    Composition,
    Cancelled,
}

/// One recoverable or fatal error recorded during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub message: String,
    /// Structural context: tool name, sub-query index, person id, etc.
    pub context: HashMap<String, String>,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: HashMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Token and wall-clock accounting for one LLM-backed or tool-backed stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageMetrics {
    pub duration: std::time::Duration,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// Opaque profile record fetched via `get_person_complete_profile`.
///
/// Forwarded verbatim into the Synthesizer's LLM prompt; the core never
/// models its structure beyond the top-level JSON object.
pub type Profile = Value;

/// The thread of all per-request data, owned exclusively by the orchestrator
/// for the duration of one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    // Input
    pub user_query: String,
    pub desired_count: usize,

    // Planner output
    pub filters: Option<Filters>,
    pub plan: Option<Plan>,
    pub planning_metadata: StageMetrics,

    // Executor output
    pub tool_results: Vec<ToolResult>,
    pub ranked_ids: Vec<i64>,
    pub execution_metadata: StageMetrics,

    // Synthesizer output
    pub profiles: Vec<Profile>,
    pub final_response: Option<String>,
    pub synthesis_metadata: StageMetrics,

    // Diagnostic
    pub errors: Vec<PipelineError>,

    // Lifecycle
    pub workflow_status: WorkflowStatus,
}

impl PipelineState {
    /// Bound used throughout: `desired_count` is clamped to `[1, 10]`.
    pub const MAX_DESIRED_COUNT: usize = 10;
    pub const DEFAULT_DESIRED_COUNT: usize = 5;

    pub fn new(user_query: impl Into<String>, desired_count: Option<usize>) -> Self {
        let desired_count = desired_count
            .unwrap_or(Self::DEFAULT_DESIRED_COUNT)
            .clamp(1, Self::MAX_DESIRED_COUNT);
        Self {
            user_query: user_query.into(),
            desired_count,
            filters: None,
            plan: None,
            planning_metadata: StageMetrics::default(),
            tool_results: Vec::new(),
            ranked_ids: Vec::new(),
            execution_metadata: StageMetrics::default(),
            profiles: Vec::new(),
            final_response: None,
            synthesis_metadata: StageMetrics::default(),
            errors: Vec::new(),
            workflow_status: WorkflowStatus::Initialized,
        }
    }

    /// Move to `next`, panicking on an illegal transition — a programming
    /// error inside the orchestrator, never a runtime condition.
    pub fn transition(&mut self, next: WorkflowStatus) {
        assert!(
            self.workflow_status.can_transition_to(next),
            "illegal workflow transition: {:?} -> {:?}",
            self.workflow_status,
            next
        );
        self.workflow_status = next;
    }

    pub fn push_error(&mut self, error: PipelineError) {
        self.errors.push(error);
    }
}

/// Result returned to the caller of the pipeline's single entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub final_response: String,
    pub workflow_status: WorkflowStatus,
    pub ranked_ids: Vec<i64>,
    pub profiles_used: usize,
    pub errors: Vec<PipelineError>,
    pub requested_at: DateTime<Utc>,
}

// ============= Errors =============

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("tool server error: {0}")]
    ToolServer(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("decomposition failed: {0}")]
    Decomposition(String),

    #[error("planning failed: {0}")]
    Planning(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cancelled")]
    Cancelled,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
