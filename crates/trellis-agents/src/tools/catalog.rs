use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use trellis_common::Result;
use trellis_redmine::MetadataCache;

use super::{Tool, ToolContext, ToolOutput, required_str};

/// Look up one project in the cached metadata by name.
pub struct ProjectInfoTool {
    metadata: Arc<MetadataCache>,
}

impl ProjectInfoTool {
    pub fn new(metadata: Arc<MetadataCache>) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl Tool for ProjectInfoTool {
    fn name(&self) -> &str {
        "project_info"
    }

    fn description(&self) -> &str {
        "Get details of a project by name from the cached metadata, \
         including its numeric id. Matching is case-insensitive and partial."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_name": {"type": "string", "description": "Project name or part of it"}
            },
            "required": ["project_name"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let name = match required_str(&input, "project_name") {
            Ok(n) => n,
            Err(output) => return Ok(output),
        };

        match self.metadata.project_by_name(name) {
            Some(project) => Ok(ToolOutput::ok(format!(
                "Project: {} (ID: {})\nIdentifier: {}\nDescription: {}",
                project.name,
                project.id,
                project.identifier.as_deref().unwrap_or("N/A"),
                project.description.as_deref().unwrap_or("No description"),
            ))),
            None => Ok(ToolOutput::error(format!(
                "no project matching '{name}'; use list_cached_resources to see what exists"
            ))),
        }
    }
}

/// Keyword search over cached project names, descriptions and identifiers.
pub struct SearchProjectsTool {
    metadata: Arc<MetadataCache>,
}

impl SearchProjectsTool {
    pub fn new(metadata: Arc<MetadataCache>) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl Tool for SearchProjectsTool {
    fn name(&self) -> &str {
        "search_projects_by_keyword"
    }

    fn description(&self) -> &str {
        "Search cached projects by keyword across name, description and \
         identifier."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "keyword": {"type": "string"}
            },
            "required": ["keyword"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let keyword = match required_str(&input, "keyword") {
            Ok(k) => k,
            Err(output) => return Ok(output),
        };

        let matches = self.metadata.search_projects(keyword);
        if matches.is_empty() {
            return Ok(ToolOutput::ok(format!(
                "No projects matching '{keyword}'."
            )));
        }
        let lines: Vec<String> = matches
            .iter()
            .map(|p| format!("- {} (ID: {})", p.name, p.id))
            .collect();
        Ok(ToolOutput::ok(format!(
            "Found {} projects:\n{}",
            matches.len(),
            lines.join("\n")
        )))
    }
}

/// Dump everything the metadata cache knows, for orientation questions.
pub struct ListCachedResourcesTool {
    metadata: Arc<MetadataCache>,
}

impl ListCachedResourcesTool {
    pub fn new(metadata: Arc<MetadataCache>) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl Tool for ListCachedResourcesTool {
    fn name(&self) -> &str {
        "list_cached_resources"
    }

    fn description(&self) -> &str {
        "List everything known from the cached metadata: projects, statuses, \
         priorities and trackers. Use to orient before other lookups."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _ctx: &ToolContext, _input: Value) -> Result<ToolOutput> {
        if self.metadata.is_empty() {
            return Ok(ToolOutput::error(
                "no cached metadata loaded; use the live tools instead",
            ));
        }
        Ok(ToolOutput::ok(
            [
                self.metadata.projects_summary(),
                self.metadata.statuses_formatted(),
                self.metadata.priorities_formatted(),
                self.metadata.trackers_formatted(),
            ]
            .join("\n\n"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Arc<MetadataCache> {
        Arc::new(
            MetadataCache::from_json(
                r#"{
                    "endpoints": {
                        "getProjects": {"data": [
                            {"id": 37, "name": "Ni-kshay Setu Revamp", "identifier": "nikshay-setu", "description": "Health platform revamp"}
                        ]},
                        "getIssueStatuses": {"data": [{"id": 1, "name": "New"}]},
                        "getPriorities": {"data": [{"id": 2, "name": "Normal"}]},
                        "getTrackers": {"data": [{"id": 1, "name": "Bug"}]}
                    }
                }"#,
            )
            .expect("parse"),
        )
    }

    #[tokio::test]
    async fn project_info_resolves_partial_name() {
        let tool = ProjectInfoTool::new(sample_metadata());
        let output = tool
            .execute(&ToolContext::default(), json!({"project_name": "ni-kshay"}))
            .await
            .expect("execute");
        assert!(!output.is_error);
        assert!(output.content.contains("ID: 37"));
    }

    #[tokio::test]
    async fn project_info_errors_on_unknown_name() {
        let tool = ProjectInfoTool::new(sample_metadata());
        let output = tool
            .execute(&ToolContext::default(), json!({"project_name": "nothing"}))
            .await
            .expect("execute");
        assert!(output.is_error);
    }

    #[tokio::test]
    async fn search_projects_matches_description() {
        let tool = SearchProjectsTool::new(sample_metadata());
        let output = tool
            .execute(&ToolContext::default(), json!({"keyword": "health"}))
            .await
            .expect("execute");
        assert!(!output.is_error);
        assert!(output.content.contains("Ni-kshay Setu Revamp"));
    }

    #[tokio::test]
    async fn list_cached_resources_with_empty_cache_is_error() {
        let tool = ListCachedResourcesTool::new(Arc::new(MetadataCache::default()));
        let output = tool
            .execute(&ToolContext::default(), json!({}))
            .await
            .expect("execute");
        assert!(output.is_error);
    }
}
