//! Executes a `Plan` against the tool server and combines the results.
//!
//! The only component with internal concurrency: it fans out a plan's
//! sub-queries (bounded by a semaphore), extracts person IDs from each
//! successful payload, combines the per-sub-query ID sets according to the
//! plan's `Strategy`, and ranks the survivors. Combination and ranking are
//! pure functions of `(Plan, Vec<ToolResult>)` so they're tested without any
//! network access.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::toolclient::ToolClient;
use crate::types::{
    CombineGroup, ErrorKind, PipelineError, Plan, Priority, StageMetrics, Strategy, SubQuery,
    ToolError, ToolErrorKind, ToolResult,
};

/// Tuning knobs for one Executor run.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_concurrency: usize,
    pub per_call_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_concurrency: 8, per_call_timeout: Duration::from_secs(10) }
    }
}

/// Everything the Executor produces for one plan.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOutput {
    pub tool_results: Vec<ToolResult>,
    pub ranked_ids: Vec<i64>,
    pub errors: Vec<PipelineError>,
    pub metrics: StageMetrics,
}

pub struct Executor {
    tool_client: ToolClient,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(tool_client: ToolClient, config: ExecutorConfig) -> Self {
        Self { tool_client, config }
    }

    pub async fn execute(
        &self,
        plan: &Plan,
        desired_count: usize,
        cancel: &CancellationToken,
    ) -> ExecutorOutput {
        if plan.sub_queries.is_empty() {
            return ExecutorOutput::default();
        }

        let started = std::time::Instant::now();
        let mut results = if plan.strategy == Strategy::Sequential {
            self.dispatch_sequential(plan, cancel).await
        } else {
            self.dispatch_parallel(plan, cancel).await
        };

        let mut errors = Vec::new();
        for (idx, result) in results.iter_mut().enumerate() {
            if result.success {
                result.person_ids = extract_person_ids(result.raw_payload.as_ref().unwrap_or(&Value::Null));
            } else if let Some(err) = &result.error {
                warn!(tool = result.tool, sub_query_index = idx, error = %err.message, "sub-query failed");
                errors.push(
                    PipelineError::new(ErrorKind::SubQuery, err.message.clone())
                        .with_context("tool", result.tool.clone())
                        .with_context("sub_query_index", idx.to_string()),
                );
            }
        }

        if cancel.is_cancelled() {
            errors.push(PipelineError::new(ErrorKind::Cancelled, "execution cancelled before completion"));
            return ExecutorOutput {
                tool_results: results,
                ranked_ids: Vec::new(),
                errors,
                metrics: StageMetrics { duration: started.elapsed(), ..Default::default() },
            };
        }

        let required: Vec<usize> = required_indices(plan);
        let all_required_failed = !required.is_empty() && required.iter().all(|&i| !results[i].success);
        if all_required_failed {
            errors.push(PipelineError::new(
                ErrorKind::SubQuery,
                "every required sub-query failed; no candidates can be produced",
            ));
            return ExecutorOutput {
                tool_results: results,
                ranked_ids: Vec::new(),
                errors,
                metrics: StageMetrics { duration: started.elapsed(), ..Default::default() },
            };
        }

        let combined = combine(plan, &results, &mut errors);
        let ranked_ids = rank(&combined, &results, desired_count);

        ExecutorOutput {
            tool_results: results,
            ranked_ids,
            errors,
            metrics: StageMetrics { duration: started.elapsed(), ..Default::default() },
        }
    }

    async fn dispatch_parallel(&self, plan: &Plan, cancel: &CancellationToken) -> Vec<ToolResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut set = JoinSet::new();

        for (idx, sub_query) in plan.sub_queries.iter().cloned().enumerate() {
            let client = self.tool_client.clone();
            let cancel = cancel.clone();
            let sem = Arc::clone(&semaphore);
            let timeout = self.config.per_call_timeout;
            set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let result = client.call(&sub_query.tool, sub_query.params, timeout, &cancel).await;
                (idx, result)
            });
        }

        let mut slots: Vec<Option<ToolResult>> = (0..plan.sub_queries.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            if let Ok((idx, result)) = joined {
                slots[idx] = Some(result);
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    let sub_query = &plan.sub_queries[idx];
                    ToolResult::failure(
                        sub_query.tool.clone(),
                        sub_query.params.clone(),
                        ToolError {
                            kind: ToolErrorKind::Transport,
                            message: "task did not complete".into(),
                            code: None,
                        },
                        Duration::ZERO,
                        Uuid::new_v4().to_string(),
                    )
                })
            })
            .collect()
    }

    async fn dispatch_sequential(&self, plan: &Plan, cancel: &CancellationToken) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(plan.sub_queries.len());
        let mut prev_id: Option<i64> = None;

        // Sequential steps pass an ID from the previous step to the next, so
        // execution must follow priority order rather than whatever order
        // the planner happened to emit sub-queries in.
        let mut ordered: Vec<&SubQuery> = plan.sub_queries.iter().collect();
        ordered.sort_by_key(|sq| sq.priority);

        for sub_query in ordered {
            if cancel.is_cancelled() {
                results.push(ToolResult::failure(
                    sub_query.tool.clone(),
                    sub_query.params.clone(),
                    ToolError { kind: ToolErrorKind::Transport, message: "cancelled".into(), code: None },
                    Duration::ZERO,
                    Uuid::new_v4().to_string(),
                ));
                prev_id = None;
                continue;
            }

            let params = substitute_prev_id(&sub_query.params, prev_id);
            let result = self
                .tool_client
                .call(&sub_query.tool, params, self.config.per_call_timeout, cancel)
                .await;

            prev_id = if result.success {
                extract_person_ids(result.raw_payload.as_ref().unwrap_or(&Value::Null))
                    .into_iter()
                    .min()
            } else {
                None
            };
            results.push(result);
        }

        results
    }
}

/// Replace a `"$prev_id"` sentinel string anywhere in a sub-query's params
/// with the numeric ID carried over from the previous sequential step.
fn substitute_prev_id(params: &Value, prev_id: Option<i64>) -> Value {
    match params {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let replaced = if value.as_str() == Some("$prev_id") {
                    prev_id.map(Value::from).unwrap_or(Value::Null)
                } else {
                    value.clone()
                };
                out.insert(key.clone(), replaced);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Walk a decoded tool payload and collect every integer under a `person_id`
/// key, at any depth.
pub fn extract_person_ids(value: &Value) -> HashSet<i64> {
    let mut ids = HashSet::new();
    walk_for_person_ids(value, &mut ids);
    ids
}

fn walk_for_person_ids(value: &Value, ids: &mut HashSet<i64>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                if key == "person_id" {
                    if let Some(id) = val.as_i64() {
                        ids.insert(id);
                    }
                }
                walk_for_person_ids(val, ids);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_for_person_ids(item, ids);
            }
        }
        _ => {}
    }
}

fn required_indices(plan: &Plan) -> Vec<usize> {
    plan.sub_queries
        .iter()
        .enumerate()
        .filter(|(_, sq)| sq.priority == Priority::Required)
        .map(|(i, _)| i)
        .collect()
}

/// Combine per-sub-query ID sets into one candidate set, per the plan's
/// `Strategy`.
pub fn combine(plan: &Plan, results: &[ToolResult], errors: &mut Vec<PipelineError>) -> HashSet<i64> {
    match plan.strategy {
        Strategy::ParallelIntersect => combine_intersect(&required_indices(plan), results, errors),
        Strategy::ParallelUnion => combine_union_of(0..results.len(), results),
        Strategy::Sequential => results.last().map(|r| r.person_ids.clone()).unwrap_or_default(),
        Strategy::Hybrid => combine_hybrid(plan, results, errors),
    }
}

fn combine_intersect(indices: &[usize], results: &[ToolResult], errors: &mut Vec<PipelineError>) -> HashSet<i64> {
    if indices.is_empty() {
        return HashSet::new();
    }

    let successful: Vec<&ToolResult> = indices.iter().map(|&i| &results[i]).filter(|r| r.success).collect();

    if successful.len() < indices.len() {
        errors.push(PipelineError::new(
            ErrorKind::SubQuery,
            "one or more required sub-queries failed; intersecting over the successful ones only",
        ));
    }

    if successful.is_empty() {
        return HashSet::new();
    }
    if successful.iter().any(|r| r.person_ids.is_empty()) {
        return HashSet::new();
    }

    let mut iter = successful.into_iter();
    let first = iter.next().unwrap().person_ids.clone();
    iter.fold(first, |acc, r| acc.intersection(&r.person_ids).copied().collect())
}

fn combine_union_of(indices: impl Iterator<Item = usize>, results: &[ToolResult]) -> HashSet<i64> {
    indices
        .filter_map(|i| results.get(i))
        .filter(|r| r.success)
        .flat_map(|r| r.person_ids.iter().copied())
        .collect()
}

fn combine_hybrid(plan: &Plan, results: &[ToolResult], errors: &mut Vec<PipelineError>) -> HashSet<i64> {
    let intersect_idx: Vec<usize> = plan
        .sub_queries
        .iter()
        .enumerate()
        .filter(|(_, sq)| sq.combine_group == Some(CombineGroup::Intersect))
        .map(|(i, _)| i)
        .collect();
    let union_idx: Vec<usize> = plan
        .sub_queries
        .iter()
        .enumerate()
        .filter(|(_, sq)| sq.combine_group == Some(CombineGroup::Union))
        .map(|(i, _)| i)
        .collect();

    let intersect_set = combine_intersect(&intersect_idx, results, errors);
    let union_set = combine_union_of(union_idx.iter().copied(), results);

    match (intersect_idx.is_empty(), union_idx.is_empty()) {
        (true, true) => HashSet::new(),
        (true, false) => union_set,
        (false, true) => intersect_set,
        (false, false) => intersect_set.intersection(&union_set).copied().collect(),
    }
}

/// Rank surviving IDs by provenance count (how many successful sub-queries
/// of any priority produced them), breaking ties by lowest numeric ID, and
/// truncate to `min(desired_count * 2, 20)`.
pub fn rank(combined: &HashSet<i64>, results: &[ToolResult], desired_count: usize) -> Vec<i64> {
    let mut scored: Vec<(i64, usize)> = combined
        .iter()
        .map(|&id| {
            let score = results.iter().filter(|r| r.success && r.person_ids.contains(&id)).count();
            (id, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let cap = (desired_count.saturating_mul(2)).min(20);
    scored.into_iter().take(cap).map(|(id, _)| id).collect()
}
