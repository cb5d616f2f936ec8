//! SubQueryGenerator: one LLM call turning `Filters` into an executable
//! `Plan`.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::strip_code_fences;
use crate::llm::LLMClient;
use crate::tools::ToolRegistry;
use crate::types::{CombineGroup, Filters, Plan, Priority, StageMetrics, Strategy, SubQuery};

const STRATEGY_RULES: &str = r#"Pick exactly one strategy for the whole plan:

- PARALLEL_INTERSECT: two or more required (priority 1) filters of different kinds must all hold
  simultaneously (e.g. a skill AND a company). Combine their sub-queries by intersection.
- PARALLEL_UNION: you are broadening recall across synonymous formulations of the same underlying
  criterion (e.g. several phrasings of "founder"). Combine by union.
- SEQUENTIAL: a later sub-query needs an identifier produced by an earlier one (e.g. look up a person
  by name, then fetch their complete profile by the ID that returns). Use the literal string "$prev_id"
  in a later sub-query's params wherever the previous step's ID belongs.
- HYBRID: you need both an intersect group and a union group (e.g. a required skill intersected with a
  broadened union of job-description keyword searches). Tag each sub-query's "combine_group" as either
  "INTERSECT" or "UNION" so the two groups can be told apart.

Expansion techniques to use when building sub-queries:
1. Synonym expansion: widen a single keyword into several related keywords (e.g. "Python" -> "Python
   developer", "Python engineer", "Python programming") passed to a keyword-search tool.
2. Multi-strategy search: cover the same intent with more than one tool (e.g. a skill lookup tool AND a
   job-description keyword search) to improve recall.
3. Role interpretation: map an informal role description (e.g. "founder") onto both a structural
   indicator tool and a keyword search over job descriptions."#;

pub struct SubQueryGenerator<'a> {
    llm: &'a dyn LLMClient,
    registry: &'a ToolRegistry,
}

impl<'a> SubQueryGenerator<'a> {
    pub fn new(llm: &'a dyn LLMClient, registry: &'a ToolRegistry) -> Self {
        Self { llm, registry }
    }

    /// Returns the generated `Plan`, stage metrics, and a non-fatal error
    /// message when planning produced nothing usable.
    pub async fn generate(&self, query: &str, filters: &Filters) -> (Plan, StageMetrics, Option<String>) {
        if filters.is_empty() {
            return (Plan::empty(query, filters.clone()), StageMetrics::default(), None);
        }

        let started = std::time::Instant::now();
        let system = self.system_prompt();
        let filters_json = serde_json::to_string(filters).unwrap_or_default();
        let prompt = format!("User query: {query}\nExtracted filters: {filters_json}");

        let (plan, error) = match self.llm.generate_json(&system, &prompt).await {
            Ok(raw) => match parse_plan(&raw, self.registry, query, filters) {
                Ok(plan) if !plan.sub_queries.is_empty() => (plan, None),
                Ok(empty_plan) => (
                    empty_plan,
                    Some("planner produced zero sub-queries naming a registered tool".to_string()),
                ),
                Err(e) => {
                    warn!(error = %e, "subquery generator output failed validation");
                    (Plan::empty(query, filters.clone()), Some(format!("planner output unparseable: {e}")))
                }
            },
            Err(e) => {
                warn!(error = %e, "subquery generator LLM call failed");
                (Plan::empty(query, filters.clone()), Some(format!("planner LLM call failed: {e}")))
            }
        };

        (plan, StageMetrics { duration: started.elapsed(), ..Default::default() }, error)
    }

    fn system_prompt(&self) -> String {
        let tool_list = self
            .registry
            .descriptors()
            .iter()
            .map(|d| format!("- {} {}: {}", d.name, d.parameters_schema, d.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You plan how to answer a recruiting search query against a graph of people, using only \
             these registered tools:\n\n{tool_list}\n\n{STRATEGY_RULES}\n\nRespond with a single JSON \
             object: {{\"strategy\": \"PARALLEL_INTERSECT\"|\"PARALLEL_UNION\"|\"SEQUENTIAL\"|\"HYBRID\", \
             \"sub_queries\": [{{\"sub_query\": \"human-readable description\", \"tool\": \"<registered tool \
             name>\", \"params\": {{...}}, \"priority\": 1|2|3, \"rationale\": \"why\", \"combine_group\": \
             \"INTERSECT\"|\"UNION\"|null}}]}}. Priority 1 means required, 2 secondary, 3 optional. Only name \
             tools from the list above."
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawSubQuery {
    sub_query: String,
    tool: String,
    #[serde(default)]
    params: Value,
    priority: u8,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    combine_group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    sub_queries: Vec<RawSubQuery>,
    strategy: String,
}

fn parse_plan(raw: &str, registry: &ToolRegistry, query: &str, filters: &Filters) -> std::result::Result<Plan, String> {
    let trimmed = strip_code_fences(raw);
    let parsed: RawPlan = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    let strategy = parse_strategy(&parsed.strategy)?;

    let sub_queries: Vec<SubQuery> = parsed
        .sub_queries
        .into_iter()
        .filter_map(|raw_sq| {
            if !registry.has_tool(&raw_sq.tool) {
                warn!(tool = raw_sq.tool, "planner named an unregistered tool; dropping sub-query");
                return None;
            }
            Some(SubQuery {
                sub_query: raw_sq.sub_query,
                tool: raw_sq.tool,
                params: raw_sq.params,
                priority: match raw_sq.priority {
                    1 => Priority::Required,
                    2 => Priority::Secondary,
                    _ => Priority::Optional,
                },
                rationale: raw_sq.rationale,
                combine_group: raw_sq.combine_group.as_deref().and_then(parse_combine_group),
            })
        })
        .collect();

    Ok(Plan { sub_queries, strategy, original_query: query.to_string(), filters_used: filters.clone() })
}

fn parse_strategy(raw: &str) -> std::result::Result<Strategy, String> {
    match raw.trim().to_uppercase().as_str() {
        "PARALLEL_INTERSECT" => Ok(Strategy::ParallelIntersect),
        "PARALLEL_UNION" => Ok(Strategy::ParallelUnion),
        "SEQUENTIAL" => Ok(Strategy::Sequential),
        "HYBRID" => Ok(Strategy::Hybrid),
        other => Err(format!("unrecognized strategy '{other}'")),
    }
}

fn parse_combine_group(raw: &str) -> Option<CombineGroup> {
    match raw.trim().to_uppercase().as_str() {
        "INTERSECT" => Some(CombineGroup::Intersect),
        "UNION" => Some(CombineGroup::Union),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
    }

    #[test]
    fn parses_well_formed_plan() {
        let raw = r#"{
            "strategy": "PARALLEL_INTERSECT",
            "sub_queries": [
                {"sub_query": "skill", "tool": "find_people_by_skill", "params": {"skill": "Python"}, "priority": 1, "rationale": "r"},
                {"sub_query": "company", "tool": "find_people_by_company", "params": {"company_name": "Google"}, "priority": 1, "rationale": "r"}
            ]
        }"#;
        let plan = parse_plan(raw, &registry(), "q", &Filters::default()).unwrap();
        assert_eq!(plan.strategy, Strategy::ParallelIntersect);
        assert_eq!(plan.sub_queries.len(), 2);
    }

    #[test]
    fn drops_sub_queries_naming_unregistered_tools() {
        let raw = r#"{
            "strategy": "PARALLEL_UNION",
            "sub_queries": [
                {"sub_query": "bogus", "tool": "delete_everything", "params": {}, "priority": 1, "rationale": "r"},
                {"sub_query": "ok", "tool": "find_people_by_skill", "params": {"skill": "Rust"}, "priority": 2, "rationale": "r"}
            ]
        }"#;
        let plan = parse_plan(raw, &registry(), "q", &Filters::default()).unwrap();
        assert_eq!(plan.sub_queries.len(), 1);
        assert_eq!(plan.sub_queries[0].tool, "find_people_by_skill");
    }

    #[test]
    fn all_unregistered_tools_yields_empty_plan() {
        let raw = r#"{"strategy": "PARALLEL_UNION", "sub_queries": [
            {"sub_query": "bogus", "tool": "nope", "params": {}, "priority": 1, "rationale": "r"}
        ]}"#;
        let plan = parse_plan(raw, &registry(), "q", &Filters::default()).unwrap();
        assert!(plan.sub_queries.is_empty());
    }

    #[test]
    fn rejects_unrecognized_strategy() {
        let raw = r#"{"strategy": "BOGUS", "sub_queries": []}"#;
        assert!(parse_plan(raw, &registry(), "q", &Filters::default()).is_err());
    }

    #[test]
    fn empty_filters_short_circuit_without_llm_call() {
        // A Plan::empty built directly matches what generate() returns for empty filters.
        let plan = Plan::empty("q", Filters::default());
        assert!(plan.sub_queries.is_empty());
        assert_eq!(plan.strategy, Strategy::ParallelUnion);
    }
}
