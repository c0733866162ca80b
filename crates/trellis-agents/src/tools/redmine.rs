use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use trellis_common::Result;
use trellis_redmine::{
    Issue, IssueDraft, IssueFilter, IssueUpdate, MetadataCache, RedmineClient, TimeEntry,
};

use super::{Tool, ToolContext, ToolOutput, optional_str, optional_u64, required_str};

/// Standard Redmine priority ids by name.
fn priority_id_by_name(name: &str) -> Option<i64> {
    match name.to_lowercase().as_str() {
        "low" => Some(1),
        "normal" => Some(2),
        "high" => Some(3),
        "urgent" => Some(4),
        "immediate" => Some(5),
        _ => None,
    }
}

fn format_issue_line(issue: &Issue) -> String {
    let status = issue
        .status
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or("unknown");
    let assignee = issue
        .assigned_to
        .as_ref()
        .map(|a| a.name.as_str())
        .unwrap_or("unassigned");
    format!(
        "- #{} [{}] {} (assigned to {})",
        issue.id, status, issue.subject, assignee
    )
}

fn format_issue_detail(issue: &Issue) -> String {
    let mut lines = vec![
        format!("Issue #{}: {}", issue.id, issue.subject),
        format!(
            "Project: {}",
            issue.project.as_ref().map(|p| p.name.as_str()).unwrap_or("N/A")
        ),
        format!(
            "Tracker: {} | Status: {} | Priority: {}",
            issue.tracker.as_ref().map(|t| t.name.as_str()).unwrap_or("N/A"),
            issue.status.as_ref().map(|s| s.name.as_str()).unwrap_or("N/A"),
            issue.priority.as_ref().map(|p| p.name.as_str()).unwrap_or("N/A"),
        ),
        format!(
            "Author: {} | Assigned to: {}",
            issue.author.as_ref().map(|a| a.name.as_str()).unwrap_or("N/A"),
            issue
                .assigned_to
                .as_ref()
                .map(|a| a.name.as_str())
                .unwrap_or("unassigned"),
        ),
    ];
    if let Some(created) = &issue.created_on {
        lines.push(format!("Created: {created}"));
    }
    if let Some(updated) = &issue.updated_on {
        lines.push(format!("Updated: {updated}"));
    }
    if let Some(desc) = &issue.description {
        if !desc.trim().is_empty() {
            lines.push(format!("\nDescription:\n{desc}"));
        }
    }
    lines.join("\n")
}

fn format_time_entry(entry: &TimeEntry) -> String {
    format!(
        "- {} | {:.1}h | {} | {}",
        entry.spent_on.as_deref().unwrap_or("N/A"),
        entry.hours.unwrap_or(0.0),
        entry.user.as_ref().map(|u| u.name.as_str()).unwrap_or("unknown"),
        entry.comments.as_deref().unwrap_or(""),
    )
}

/// Resolve a project argument that may be a numeric id or a name.
fn resolve_project_id(
    metadata: &MetadataCache,
    input: &Value,
) -> std::result::Result<Option<i64>, ToolOutput> {
    if let Some(id) = optional_u64(input, "project_id") {
        return Ok(Some(id as i64));
    }
    if let Some(name) = optional_str(input, "project_name") {
        return match metadata.project_by_name(name) {
            Some(project) => Ok(Some(project.id)),
            None => Err(ToolOutput::error(format!(
                "no project matching '{name}' found; use list_projects to see what exists"
            ))),
        };
    }
    Ok(None)
}

pub struct ListProjectsTool {
    client: RedmineClient,
}

impl ListProjectsTool {
    pub fn new(client: RedmineClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListProjectsTool {
    fn name(&self) -> &str {
        "list_projects"
    }

    fn description(&self) -> &str {
        "List all projects in the tracker with their ids and identifiers."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "description": "Maximum number of projects to return (default 100)"}
            }
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let limit = optional_u64(&input, "limit").unwrap_or(100) as usize;
        match self.client.list_projects(limit).await {
            Ok(projects) if projects.is_empty() => Ok(ToolOutput::ok("No projects found.")),
            Ok(projects) => {
                let lines: Vec<String> = projects
                    .iter()
                    .map(|p| {
                        format!(
                            "- {} (ID: {}, identifier: {})",
                            p.name,
                            p.id,
                            p.identifier.as_deref().unwrap_or("N/A")
                        )
                    })
                    .collect();
                Ok(ToolOutput::ok(format!(
                    "Found {} projects:\n{}",
                    projects.len(),
                    lines.join("\n")
                )))
            }
            Err(e) => Ok(ToolOutput::error(format!("failed to list projects: {e}"))),
        }
    }
}

pub struct ListIssuesTool {
    client: RedmineClient,
    metadata: Arc<MetadataCache>,
}

impl ListIssuesTool {
    pub fn new(client: RedmineClient, metadata: Arc<MetadataCache>) -> Self {
        Self { client, metadata }
    }
}

#[async_trait]
impl Tool for ListIssuesTool {
    fn name(&self) -> &str {
        "list_issues"
    }

    fn description(&self) -> &str {
        "List issues, optionally filtered by project (id or name), status \
         (open, closed or *) and assignee id."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_id": {"type": "integer", "description": "Numeric project id"},
                "project_name": {"type": "string", "description": "Project name (partial match)"},
                "status": {"type": "string", "enum": ["open", "closed", "*"], "description": "Status filter, defaults to open"},
                "assigned_to_id": {"type": "integer", "description": "Filter by assignee user id"},
                "limit": {"type": "integer", "description": "Maximum number of issues (default 25)"}
            }
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let project_id = match resolve_project_id(&self.metadata, &input) {
            Ok(id) => id,
            Err(output) => return Ok(output),
        };

        let filter = IssueFilter {
            project_id,
            status_id: optional_str(&input, "status").map(str::to_string),
            assigned_to_id: optional_u64(&input, "assigned_to_id").map(|id| id as i64),
            limit: Some(optional_u64(&input, "limit").unwrap_or(25) as usize),
        };

        match self.client.list_issues(&filter).await {
            Ok(issues) if issues.is_empty() => {
                Ok(ToolOutput::ok("No issues matched the given filters."))
            }
            Ok(issues) => {
                let lines: Vec<String> = issues.iter().map(format_issue_line).collect();
                Ok(ToolOutput::ok(format!(
                    "Found {} issues:\n{}",
                    issues.len(),
                    lines.join("\n")
                )))
            }
            Err(e) => Ok(ToolOutput::error(format!("failed to list issues: {e}"))),
        }
    }
}

pub struct GetIssueTool {
    client: RedmineClient,
}

impl GetIssueTool {
    pub fn new(client: RedmineClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetIssueTool {
    fn name(&self) -> &str {
        "get_issue"
    }

    fn description(&self) -> &str {
        "Fetch full details of a single issue by its numeric id."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_id": {"type": "integer", "description": "Numeric issue id"}
            },
            "required": ["issue_id"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let Some(issue_id) = optional_u64(&input, "issue_id") else {
            return Ok(ToolOutput::error(
                "issue_id must be a positive number, e.g. {\"issue_id\": 1354}",
            ));
        };

        match self.client.get_issue(issue_id as i64).await {
            Ok(issue) => Ok(ToolOutput::ok(format_issue_detail(&issue))),
            Err(e) => Ok(ToolOutput::error(format!(
                "failed to fetch issue #{issue_id}: {e}"
            ))),
        }
    }
}

pub struct CreateIssueTool {
    client: RedmineClient,
    metadata: Arc<MetadataCache>,
}

impl CreateIssueTool {
    pub fn new(client: RedmineClient, metadata: Arc<MetadataCache>) -> Self {
        Self { client, metadata }
    }
}

#[async_trait]
impl Tool for CreateIssueTool {
    fn name(&self) -> &str {
        "create_issue"
    }

    fn description(&self) -> &str {
        "Create a new issue in a project. Accepts a project id or name, a \
         subject, and optionally a description and priority name."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_id": {"type": "integer", "description": "Numeric project id"},
                "project_name": {"type": "string", "description": "Project name (partial match)"},
                "subject": {"type": "string", "description": "Issue title"},
                "description": {"type": "string", "description": "Issue body"},
                "priority": {"type": "string", "enum": ["low", "normal", "high", "urgent", "immediate"]}
            },
            "required": ["subject"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let subject = match required_str(&input, "subject") {
            Ok(s) => s,
            Err(output) => return Ok(output),
        };
        let project_id = match resolve_project_id(&self.metadata, &input) {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Ok(ToolOutput::error(
                    "a project_id or project_name is required to create an issue",
                ));
            }
            Err(output) => return Ok(output),
        };

        let mut draft = IssueDraft::new(project_id, subject);
        if let Some(description) = optional_str(&input, "description") {
            draft.description = description.to_string();
        }
        if let Some(priority) = optional_str(&input, "priority") {
            match priority_id_by_name(priority) {
                Some(id) => draft.priority_id = id,
                None => {
                    return Ok(ToolOutput::error(format!(
                        "unknown priority '{priority}'; use low, normal, high, urgent or immediate"
                    )));
                }
            }
        }

        match self.client.create_issue(&draft).await {
            Ok(issue) => Ok(ToolOutput::ok(format!(
                "Created issue #{}: {}",
                issue.id, issue.subject
            ))),
            Err(e) => Ok(ToolOutput::error(format!("failed to create issue: {e}"))),
        }
    }
}

pub struct UpdateIssueTool {
    client: RedmineClient,
    metadata: Arc<MetadataCache>,
}

impl UpdateIssueTool {
    pub fn new(client: RedmineClient, metadata: Arc<MetadataCache>) -> Self {
        Self { client, metadata }
    }
}

#[async_trait]
impl Tool for UpdateIssueTool {
    fn name(&self) -> &str {
        "update_issue"
    }

    fn description(&self) -> &str {
        "Update an existing issue's subject, description, status (by name) \
         or priority (by name)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_id": {"type": "integer", "description": "Numeric issue id"},
                "subject": {"type": "string"},
                "description": {"type": "string"},
                "status": {"type": "string", "description": "Status name, e.g. 'In Progress'"},
                "priority": {"type": "string", "enum": ["low", "normal", "high", "urgent", "immediate"]}
            },
            "required": ["issue_id"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let Some(issue_id) = optional_u64(&input, "issue_id") else {
            return Ok(ToolOutput::error("issue_id must be a positive number"));
        };

        let mut update = IssueUpdate::default();
        update.subject = optional_str(&input, "subject").map(str::to_string);
        update.description = optional_str(&input, "description").map(str::to_string);

        if let Some(status) = optional_str(&input, "status") {
            match self.metadata.status_by_name(status) {
                Some(s) => update.status_id = Some(s.id),
                None => {
                    return Ok(ToolOutput::error(format!(
                        "unknown status '{status}'; available:\n{}",
                        self.metadata.statuses_formatted()
                    )));
                }
            }
        }
        if let Some(priority) = optional_str(&input, "priority") {
            match priority_id_by_name(priority) {
                Some(id) => update.priority_id = Some(id),
                None => {
                    return Ok(ToolOutput::error(format!(
                        "unknown priority '{priority}'; use low, normal, high, urgent or immediate"
                    )));
                }
            }
        }

        if update.is_empty() {
            return Ok(ToolOutput::error(
                "nothing to update; provide subject, description, status or priority",
            ));
        }

        match self.client.update_issue(issue_id as i64, &update).await {
            Ok(()) => Ok(ToolOutput::ok(format!("Updated issue #{issue_id}."))),
            Err(e) => Ok(ToolOutput::error(format!(
                "failed to update issue #{issue_id}: {e}"
            ))),
        }
    }
}

pub struct ListTimeEntriesTool {
    client: RedmineClient,
    metadata: Arc<MetadataCache>,
}

impl ListTimeEntriesTool {
    pub fn new(client: RedmineClient, metadata: Arc<MetadataCache>) -> Self {
        Self { client, metadata }
    }
}

#[async_trait]
impl Tool for ListTimeEntriesTool {
    fn name(&self) -> &str {
        "list_time_entries"
    }

    fn description(&self) -> &str {
        "List logged time entries, optionally filtered by project."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_id": {"type": "integer"},
                "project_name": {"type": "string"},
                "limit": {"type": "integer", "description": "Maximum number of entries (default 25)"}
            }
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let project_id = match resolve_project_id(&self.metadata, &input) {
            Ok(id) => id,
            Err(output) => return Ok(output),
        };
        let limit = optional_u64(&input, "limit").unwrap_or(25) as usize;

        match self.client.list_time_entries(project_id, limit).await {
            Ok(entries) if entries.is_empty() => Ok(ToolOutput::ok("No time entries found.")),
            Ok(entries) => {
                let total: f64 = entries.iter().filter_map(|e| e.hours).sum();
                let lines: Vec<String> = entries.iter().map(format_time_entry).collect();
                Ok(ToolOutput::ok(format!(
                    "Found {} time entries ({total:.1}h total):\n{}",
                    entries.len(),
                    lines.join("\n")
                )))
            }
            Err(e) => Ok(ToolOutput::error(format!(
                "failed to list time entries: {e}"
            ))),
        }
    }
}

pub struct GetTrackerMetadataTool {
    client: RedmineClient,
}

impl GetTrackerMetadataTool {
    pub fn new(client: RedmineClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetTrackerMetadataTool {
    fn name(&self) -> &str {
        "get_tracker_metadata"
    }

    fn description(&self) -> &str {
        "Fetch live issue statuses, priorities and trackers from the API. \
         Use when the cached metadata may be stale."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _ctx: &ToolContext, _input: Value) -> Result<ToolOutput> {
        let statuses = self.client.list_issue_statuses().await;
        let priorities = self.client.list_priorities().await;
        let trackers = self.client.list_trackers().await;

        let mut sections = Vec::new();
        match statuses {
            Ok(statuses) => {
                let lines: Vec<String> = statuses
                    .iter()
                    .map(|s| format!("- {} (ID: {})", s.name, s.id))
                    .collect();
                sections.push(format!("Statuses:\n{}", lines.join("\n")));
            }
            Err(e) => sections.push(format!("Statuses unavailable: {e}")),
        }
        match priorities {
            Ok(priorities) => {
                let lines: Vec<String> = priorities
                    .iter()
                    .map(|p| format!("- {} (ID: {})", p.name, p.id))
                    .collect();
                sections.push(format!("Priorities:\n{}", lines.join("\n")));
            }
            Err(e) => sections.push(format!("Priorities unavailable: {e}")),
        }
        match trackers {
            Ok(trackers) => {
                let lines: Vec<String> = trackers
                    .iter()
                    .map(|t| format!("- {} (ID: {})", t.name, t.id))
                    .collect();
                sections.push(format!("Trackers:\n{}", lines.join("\n")));
            }
            Err(e) => sections.push(format!("Trackers unavailable: {e}")),
        }

        Ok(ToolOutput::ok(sections.join("\n\n")))
    }
}

pub struct SearchIssuesTool {
    client: RedmineClient,
    metadata: Arc<MetadataCache>,
}

impl SearchIssuesTool {
    pub fn new(client: RedmineClient, metadata: Arc<MetadataCache>) -> Self {
        Self { client, metadata }
    }
}

#[async_trait]
impl Tool for SearchIssuesTool {
    fn name(&self) -> &str {
        "search_issues"
    }

    fn description(&self) -> &str {
        "Keyword search over issue subjects, optionally scoped to a project. \
         For meaning-based search use semantic_search_issues instead."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Keywords to match in issue subjects"},
                "project_id": {"type": "integer"},
                "project_name": {"type": "string"},
                "limit": {"type": "integer", "description": "Maximum number of matches (default 10)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let query = match required_str(&input, "query") {
            Ok(q) => q.to_lowercase(),
            Err(output) => return Ok(output),
        };
        let project_id = match resolve_project_id(&self.metadata, &input) {
            Ok(id) => id,
            Err(output) => return Ok(output),
        };
        let limit = optional_u64(&input, "limit").unwrap_or(10) as usize;

        let filter = IssueFilter {
            project_id,
            status_id: Some("*".to_string()),
            assigned_to_id: None,
            limit: Some(100),
        };
        match self.client.list_issues(&filter).await {
            Ok(issues) => {
                let matches: Vec<&Issue> = issues
                    .iter()
                    .filter(|i| {
                        i.subject.to_lowercase().contains(&query)
                            || i.description
                                .as_deref()
                                .is_some_and(|d| d.to_lowercase().contains(&query))
                    })
                    .take(limit)
                    .collect();
                if matches.is_empty() {
                    return Ok(ToolOutput::ok(format!("No issues matching '{query}'.")));
                }
                let lines: Vec<String> =
                    matches.iter().map(|i| format_issue_line(i)).collect();
                Ok(ToolOutput::ok(format!(
                    "Found {} matching issues:\n{}",
                    matches.len(),
                    lines.join("\n")
                )))
            }
            Err(e) => Ok(ToolOutput::error(format!("failed to search issues: {e}"))),
        }
    }
}

pub struct ListUsersTool {
    client: RedmineClient,
}

impl ListUsersTool {
    pub fn new(client: RedmineClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListUsersTool {
    fn name(&self) -> &str {
        "list_users"
    }

    fn description(&self) -> &str {
        "List tracker users with their ids, for assignee lookups."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "description": "Maximum number of users (default 100)"}
            }
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let limit = optional_u64(&input, "limit").unwrap_or(100) as usize;
        match self.client.list_users(limit).await {
            Ok(users) if users.is_empty() => Ok(ToolOutput::ok("No users visible.")),
            Ok(users) => {
                let lines: Vec<String> = users
                    .iter()
                    .map(|u| {
                        format!(
                            "- {} {} (ID: {}, login: {})",
                            u.firstname.as_deref().unwrap_or(""),
                            u.lastname.as_deref().unwrap_or(""),
                            u.id,
                            u.login.as_deref().unwrap_or("N/A")
                        )
                    })
                    .collect();
                Ok(ToolOutput::ok(format!(
                    "Found {} users:\n{}",
                    users.len(),
                    lines.join("\n")
                )))
            }
            Err(e) => Ok(ToolOutput::error(format!("failed to list users: {e}"))),
        }
    }
}
