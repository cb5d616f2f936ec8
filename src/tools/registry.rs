//! Static registry of the remote graph-query tools the tool server exposes.
//!
//! Holds only *descriptors* — name, description, and a JSON Schema for
//! parameters — used by the SubQueryGenerator's prompt and to validate a
//! planned `SubQuery` before dispatch. The tools themselves run on the
//! remote server and are invoked through `ToolClient`.

use serde_json::{json, Value};
use std::collections::HashMap;

/// Description of one tool the remote server is expected to expose.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters_schema: Value,
}

/// Static catalog of the 19 registered graph-query tools.
pub struct ToolRegistry {
    tools: HashMap<&'static str, ToolDescriptor>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut tools = HashMap::new();
        for descriptor in Self::catalog() {
            tools.insert(descriptor.name, descriptor);
        }
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        self.tools.values().collect()
    }

    /// Compare this compiled-in catalog against a live `list_tools()`
    /// response from the tool server, returning names present in one but
    /// not the other. Intended to be called once at startup in debug
    /// builds so catalog drift is caught early rather than at dispatch time.
    pub fn diff_against_server(&self, server_tool_names: &[String]) -> ToolCatalogDiff {
        let server: std::collections::HashSet<&str> =
            server_tool_names.iter().map(String::as_str).collect();
        let local: std::collections::HashSet<&str> = self.tools.keys().copied().collect();

        ToolCatalogDiff {
            missing_locally: server.difference(&local).map(|s| s.to_string()).collect(),
            missing_on_server: local.difference(&server).map(|s| s.to_string()).collect(),
        }
    }

    fn catalog() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "get_person_complete_profile",
                description: "Get complete profile for a person including ALL 35 properties, work history with job descriptions, and education history.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "person_id": { "type": "integer", "description": "The unique person ID (preferred)" },
                        "person_name": { "type": "string", "description": "The person's name (alternative identifier)" }
                    },
                    "required": []
                }),
            },
            ToolDescriptor {
                name: "find_person_by_name",
                description: "Find a person by their name (case-insensitive partial matching) - returns lightweight profile with person_id.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": { "name": { "type": "string", "description": "The name of the person to search for (partial names are supported)" } },
                    "required": ["name"]
                }),
            },
            ToolDescriptor {
                name: "find_people_by_skill",
                description: "Find all people who have a specific skill - searches across technical_skills, secondary_skills, and domain_knowledge arrays.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": { "skill": { "type": "string", "description": "The skill to search for (case-insensitive)" } },
                    "required": ["skill"]
                }),
            },
            ToolDescriptor {
                name: "find_people_by_company",
                description: "Find all people who have worked at a specific company (current or past).",
                parameters_schema: json!({
                    "type": "object",
                    "properties": { "company_name": { "type": "string", "description": "The name of the company to search for (partial names are supported)" } },
                    "required": ["company_name"]
                }),
            },
            ToolDescriptor {
                name: "find_colleagues_at_company",
                description: "Find colleagues of a specific person at a given company.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "person_id": { "type": "integer", "description": "The ID of the person to find colleagues for" },
                        "company_name": { "type": "string", "description": "The name of the company where they worked together" }
                    },
                    "required": ["person_id", "company_name"]
                }),
            },
            ToolDescriptor {
                name: "find_people_by_institution",
                description: "Find all people who studied at a specific institution or university.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": { "institution_name": { "type": "string", "description": "The name of the institution/university to search for" } },
                    "required": ["institution_name"]
                }),
            },
            ToolDescriptor {
                name: "find_people_by_location",
                description: "Find all people in a specific location or city.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": { "location": { "type": "string", "description": "The location/city to search for" } },
                    "required": ["location"]
                }),
            },
            ToolDescriptor {
                name: "get_person_skills",
                description: "Get all skills for a specific person from their skill arrays (technical_skills, secondary_skills, domain_knowledge).",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "person_id": { "type": "integer", "description": "The person ID (preferred)" },
                        "person_name": { "type": "string", "description": "The person name (alternative)" }
                    },
                    "required": []
                }),
            },
            ToolDescriptor {
                name: "find_people_with_multiple_skills",
                description: "Find people who have multiple specific skills with AND/OR logic.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "skills_list": { "type": "array", "items": { "type": "string" }, "description": "List of skills to search for" },
                        "match_type": { "type": "string", "enum": ["any", "all"], "default": "any", "description": "Match 'any' skill (OR) or 'all' skills (AND)" }
                    },
                    "required": ["skills_list"]
                }),
            },
            ToolDescriptor {
                name: "get_person_colleagues",
                description: "Get all colleagues of a person across all companies they worked at.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "person_id": { "type": "integer", "description": "The person ID (preferred)" },
                        "person_name": { "type": "string", "description": "The person name (alternative)" }
                    },
                    "required": []
                }),
            },
            ToolDescriptor {
                name: "find_people_by_experience_level",
                description: "Find people based on their total work experience in months.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "min_months": { "type": "integer", "description": "Minimum experience in months" },
                        "max_months": { "type": "integer", "description": "Maximum experience in months" }
                    },
                    "required": []
                }),
            },
            ToolDescriptor {
                name: "get_company_employees",
                description: "Get all employees (past and present) of a specific company.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": { "company_name": { "type": "string", "description": "The name of the company to get employees for" } },
                    "required": ["company_name"]
                }),
            },
            ToolDescriptor {
                name: "get_person_details",
                description: "Get comprehensive details about a person including skills, companies, and education - summary view.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "person_id": { "type": "integer", "description": "The person ID (preferred)" },
                        "person_name": { "type": "string", "description": "The person name (alternative)" }
                    },
                    "required": []
                }),
            },
            ToolDescriptor {
                name: "get_person_job_descriptions",
                description: "Get all job descriptions for a person with company and role details - foundation for technical skill discovery, behavioral analysis, and career progression.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "person_id": { "type": "integer", "description": "The person ID (preferred)" },
                        "person_name": { "type": "string", "description": "The person name (alternative)" }
                    },
                    "required": []
                }),
            },
            ToolDescriptor {
                name: "search_job_descriptions_by_keywords",
                description: "Search for people based on keywords in their job descriptions - useful for finding technical skills, behavioral patterns, or specific experience.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "keywords": { "type": "array", "items": { "type": "string" }, "description": "List of keywords to search for in job descriptions" },
                        "match_type": { "type": "string", "enum": ["any", "all"], "default": "any", "description": "Match 'any' keyword (OR) or 'all' keywords (AND)" }
                    },
                    "required": ["keywords"]
                }),
            },
            ToolDescriptor {
                name: "find_technical_skills_in_descriptions",
                description: "Find people who mention specific technical skills in their job descriptions - goes beyond structured skills to find contextual technical mentions.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "tech_keywords": { "type": "array", "items": { "type": "string" }, "description": "List of technical terms to search for (e.g., python, kubernetes, machine learning)" }
                    },
                    "required": ["tech_keywords"]
                }),
            },
            ToolDescriptor {
                name: "find_leadership_indicators",
                description: "Find people with leadership indicators in their job descriptions - looks for management, team lead, and leadership-related keywords.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            ToolDescriptor {
                name: "find_domain_experts",
                description: "Find people with deep domain expertise based on job description analysis - requires at least 2 jobs in the domain.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "domain_keywords": { "type": "array", "items": { "type": "string" }, "description": "List of domain-specific terms (e.g., fintech, healthcare, e-commerce)" }
                    },
                    "required": ["domain_keywords"]
                }),
            },
            ToolDescriptor {
                name: "health_check",
                description: "Check the health status of the knowledge graph database and services.",
                parameters_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
        ]
    }
}

/// Result of comparing the compiled-in catalog against a live tool list.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalogDiff {
    /// Tools the server reports that aren't in the compiled-in catalog.
    pub missing_locally: Vec<String>,
    /// Tools in the compiled-in catalog the server didn't report.
    pub missing_on_server: Vec<String>,
}

impl ToolCatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_locally.is_empty() && self.missing_on_server.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_nineteen_tools() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.tool_names().len(), 19);
    }

    #[test]
    fn known_tool_is_registered() {
        let registry = ToolRegistry::new();
        assert!(registry.has_tool("get_person_complete_profile"));
        assert!(registry.has_tool("find_people_by_skill"));
        assert!(!registry.has_tool("delete_everything"));
    }

    #[test]
    fn diff_detects_drift() {
        let registry = ToolRegistry::new();
        let mut server_names: Vec<String> =
            registry.tool_names().iter().map(|s| s.to_string()).collect();
        server_names.retain(|n| n != "find_person_by_name");
        server_names.push("a_tool_we_havent_heard_of".to_string());

        let diff = registry.diff_against_server(&server_names);
        assert!(!diff.is_empty());
        assert!(diff.missing_on_server.contains(&"find_person_by_name".to_string()));
        assert!(diff
            .missing_locally
            .contains(&"a_tool_we_havent_heard_of".to_string()));
    }

    /// (name, expected property names, expected required names) for every
    /// tool the real MCP server exposes. Mirrors `mcp/schemas/tool_schemas.py`
    /// exactly, so a renamed or dropped parameter fails this test instead of
    /// silently reaching the SubQueryGenerator's prompt.
    fn expected_catalog() -> Vec<(&'static str, Vec<&'static str>, Vec<&'static str>)> {
        vec![
            ("get_person_complete_profile", vec!["person_id", "person_name"], vec![]),
            ("find_person_by_name", vec!["name"], vec!["name"]),
            ("find_people_by_skill", vec!["skill"], vec!["skill"]),
            ("find_people_by_company", vec!["company_name"], vec!["company_name"]),
            ("find_colleagues_at_company", vec!["person_id", "company_name"], vec!["person_id", "company_name"]),
            ("find_people_by_institution", vec!["institution_name"], vec!["institution_name"]),
            ("find_people_by_location", vec!["location"], vec!["location"]),
            ("get_person_skills", vec!["person_id", "person_name"], vec![]),
            ("find_people_with_multiple_skills", vec!["skills_list", "match_type"], vec!["skills_list"]),
            ("get_person_colleagues", vec!["person_id", "person_name"], vec![]),
            ("find_people_by_experience_level", vec!["min_months", "max_months"], vec![]),
            ("get_company_employees", vec!["company_name"], vec!["company_name"]),
            ("get_person_details", vec!["person_id", "person_name"], vec![]),
            ("get_person_job_descriptions", vec!["person_id", "person_name"], vec![]),
            ("search_job_descriptions_by_keywords", vec!["keywords", "match_type"], vec!["keywords"]),
            ("find_technical_skills_in_descriptions", vec!["tech_keywords"], vec!["tech_keywords"]),
            ("find_leadership_indicators", vec![], vec![]),
            ("find_domain_experts", vec!["domain_keywords"], vec!["domain_keywords"]),
            ("health_check", vec![], vec![]),
        ]
    }

    fn required_names(schema: &Value) -> std::collections::HashSet<String> {
        schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    fn property_names(schema: &Value) -> std::collections::HashSet<String> {
        schema
            .get("properties")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
            .map(|(k, _)| k.clone())
            .collect()
    }

    #[test]
    fn catalog_matches_real_tool_schemas_exactly() {
        let registry = ToolRegistry::new();
        let expected = expected_catalog();

        assert_eq!(registry.tool_names().len(), expected.len(), "tool count drifted from the real catalog");

        for (name, properties, required) in expected {
            let descriptor = registry.get(name).unwrap_or_else(|| panic!("missing registered tool '{name}'"));

            let expected_properties: std::collections::HashSet<String> =
                properties.into_iter().map(str::to_string).collect();
            assert_eq!(
                property_names(&descriptor.parameters_schema),
                expected_properties,
                "'{name}' has the wrong parameter names"
            );

            let expected_required: std::collections::HashSet<String> =
                required.into_iter().map(str::to_string).collect();
            assert_eq!(
                required_names(&descriptor.parameters_schema),
                expected_required,
                "'{name}' has the wrong required parameters"
            );
        }
    }
}
