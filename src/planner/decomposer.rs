//! Decomposer: one LLM call turning a user query into typed `Filters`.

use serde_json::{json, Value};
use tracing::warn;

use super::strip_code_fences;
use crate::llm::LLMClient;
use crate::types::{Filters, StageMetrics};

const SYSTEM_PROMPT: &str = r#"You extract structured search filters from a recruiter's natural-language
query about a professional-network knowledge graph. Respond with a single JSON object matching exactly
this schema (omit a field entirely if the query gives no signal for it):

{
  "skill_filters": ["string", ...],       // technical or soft skills mentioned or clearly implied
  "company_filters": ["string", ...],     // company names, current or past employer
  "location_filters": ["string", ...],    // city, region, or country
  "institution_filters": ["string", ...], // universities or schools
  "name_filters": ["string", ...],        // person names, when the query is about a specific individual
  "seniority_filters": ["string", ...],   // seniority tokens such as "senior", "staff", "principal", "lead"
  "experience_filters": {"min_years": int|null, "max_years": int|null} | null,
  "other_criteria": {"key": "value", ...} // anything that doesn't fit the categories above, e.g. {"role": "founder"}
}

These are the nine filter categories: skill, company, location, institution, name, seniority, experience
range, and the catch-all other_criteria (which itself covers arbitrary free-form key/value hints).

Worked examples:

Query: "Find Python developers at Google"
{"skill_filters": ["Python"], "company_filters": ["Google"]}

Query: "Senior engineers with 8+ years of experience in machine learning"
{"skill_filters": ["machine learning"], "seniority_filters": ["senior"], "experience_filters": {"min_years": 8, "max_years": null}}

Query: "Find startup founders"
{"other_criteria": {"role": "founder"}}

Query: "Tell me about John Smith"
{"name_filters": ["John Smith"]}

Query: "Stanford grads who worked at Meta in New York"
{"institution_filters": ["Stanford"], "company_filters": ["Meta"], "location_filters": ["New York"]}

You do not validate whether any of these values actually exist in the graph; that is the server's job."#;

pub struct Decomposer<'a> {
    llm: &'a dyn LLMClient,
    max_retries: u32,
}

impl<'a> Decomposer<'a> {
    pub fn new(llm: &'a dyn LLMClient, max_retries: u32) -> Self {
        Self { llm, max_retries }
    }

    /// Returns the extracted `Filters`, stage metrics, and a non-fatal error
    /// message when every attempt failed (in which case `Filters` is empty).
    pub async fn decompose(&self, query: &str) -> (Filters, StageMetrics, Option<String>) {
        let started = std::time::Instant::now();
        let prompt = format!("User query: {query}");

        for attempt in 0..=self.max_retries {
            match self.llm.generate_json(SYSTEM_PROMPT, &prompt).await {
                Ok(raw) => match parse_filters(&raw) {
                    Ok(filters) => {
                        return (
                            filters,
                            StageMetrics { duration: started.elapsed(), ..Default::default() },
                            None,
                        );
                    }
                    Err(e) => warn!(attempt, error = %e, "decomposer output failed schema validation"),
                },
                Err(e) => warn!(attempt, error = %e, "decomposer LLM call failed"),
            }
        }

        (
            Filters::default(),
            StageMetrics { duration: started.elapsed(), ..Default::default() },
            Some(format!("decomposition failed after {} attempts; returning empty filters", self.max_retries + 1)),
        )
    }
}

/// Parse and normalize the LLM's raw output into `Filters`, filling in
/// missing list/map fields and wrapping stray non-list values in a
/// singleton list, per the schema-validation rules.
fn parse_filters(raw: &str) -> std::result::Result<Filters, String> {
    let trimmed = strip_code_fences(raw);
    let value: Value = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    let normalized = normalize_filters_json(value)?;
    serde_json::from_value(normalized).map_err(|e| e.to_string())
}

fn normalize_filters_json(value: Value) -> std::result::Result<Value, String> {
    let Value::Object(mut map) = value else {
        return Err("top-level decomposer output was not a JSON object".to_string());
    };

    for key in [
        "skill_filters",
        "company_filters",
        "location_filters",
        "institution_filters",
        "name_filters",
        "seniority_filters",
    ] {
        let normalized = match map.remove(key) {
            None | Some(Value::Null) => Value::Array(Vec::new()),
            Some(Value::Array(items)) => Value::Array(items),
            Some(other) => Value::Array(vec![other]),
        };
        map.insert(key.to_string(), normalized);
    }

    if !matches!(map.get("other_criteria"), Some(Value::Object(_))) {
        map.insert("other_criteria".to_string(), json!({}));
    }

    if !matches!(map.get("experience_filters"), Some(Value::Object(_))) {
        map.insert("experience_filters".to_string(), Value::Null);
    }

    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_filters() {
        let filters = parse_filters(r#"{"skill_filters": ["Python"], "company_filters": ["Google"]}"#).unwrap();
        assert!(filters.skill_filters.contains("Python"));
        assert!(filters.company_filters.contains("Google"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let filters = parse_filters(r#"{"name_filters": ["Ada Lovelace"]}"#).unwrap();
        assert!(filters.skill_filters.is_empty());
        assert!(filters.other_criteria.is_empty());
        assert!(filters.name_filters.contains("Ada Lovelace"));
    }

    #[test]
    fn scalar_is_wrapped_into_singleton_list() {
        let filters = parse_filters(r#"{"skill_filters": "Python"}"#).unwrap();
        assert_eq!(filters.skill_filters.len(), 1);
        assert!(filters.skill_filters.contains("Python"));
    }

    #[test]
    fn strips_markdown_fence_before_parsing() {
        let filters = parse_filters("```json\n{\"company_filters\": [\"Meta\"]}\n```").unwrap();
        assert!(filters.company_filters.contains("Meta"));
    }

    #[test]
    fn rejects_non_object_top_level() {
        assert!(parse_filters("[1,2,3]").is_err());
    }

    #[test]
    fn rejects_unparseable_json() {
        assert!(parse_filters("not json").is_err());
    }
}
