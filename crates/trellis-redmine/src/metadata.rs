use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};
use trellis_common::Result;

use crate::models::{Issue, Priority, Project, Status, Tracker};

/// In-memory snapshot of Redmine reference data, loaded from a previously
/// fetched JSON dump. Used to resolve human-readable names to ids and to
/// seed the vector index without hitting the live API.
#[derive(Debug, Default)]
pub struct MetadataCache {
    pub base_url: Option<String>,
    pub fetched_at: Option<String>,
    pub projects: Vec<Project>,
    pub statuses: Vec<Status>,
    pub priorities: Vec<Priority>,
    pub trackers: Vec<Tracker>,
    pub issues: Vec<Issue>,
}

impl MetadataCache {
    /// Load the snapshot file. A missing file yields an empty cache with a
    /// warning; the assistant degrades to live API calls only.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!("metadata snapshot not found: {}", path.display());
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(raw) => match Self::from_json(&raw) {
                Ok(cache) => {
                    info!(
                        "loaded metadata snapshot: {} projects, {} statuses, {} priorities, {} issues",
                        cache.projects.len(),
                        cache.statuses.len(),
                        cache.priorities.len(),
                        cache.issues.len()
                    );
                    cache
                }
                Err(e) => {
                    warn!("failed to parse metadata snapshot: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("failed to read metadata snapshot: {e}");
                Self::default()
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(raw)?;
        let endpoints = &root["endpoints"];

        Ok(Self {
            base_url: root["base_url"].as_str().map(str::to_string),
            fetched_at: root["fetched_at"].as_str().map(str::to_string),
            projects: section(endpoints, "getProjects"),
            statuses: section(endpoints, "getIssueStatuses"),
            priorities: section(endpoints, "getPriorities"),
            trackers: section(endpoints, "getTrackers"),
            issues: section(endpoints, "getIssues"),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
            && self.statuses.is_empty()
            && self.priorities.is_empty()
            && self.trackers.is_empty()
    }

    /// Case-insensitive partial match on project name.
    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        let needle = name.to_lowercase();
        self.projects
            .iter()
            .find(|p| p.name.to_lowercase().contains(&needle))
    }

    pub fn project_by_id(&self, id: i64) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn status_by_name(&self, name: &str) -> Option<&Status> {
        let needle = name.to_lowercase();
        self.statuses
            .iter()
            .find(|s| s.name.to_lowercase().contains(&needle))
    }

    pub fn priority_by_name(&self, name: &str) -> Option<&Priority> {
        let needle = name.to_lowercase();
        self.priorities
            .iter()
            .find(|p| p.name.to_lowercase().contains(&needle))
    }

    pub fn tracker_by_name(&self, name: &str) -> Option<&Tracker> {
        let needle = name.to_lowercase();
        self.trackers
            .iter()
            .find(|t| t.name.to_lowercase().contains(&needle))
    }

    /// Keyword search over project name, description and identifier.
    pub fn search_projects(&self, query: &str) -> Vec<&Project> {
        let needle = query.to_lowercase();
        self.projects
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
                    || p.identifier
                        .as_deref()
                        .is_some_and(|i| i.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn projects_summary(&self) -> String {
        if self.projects.is_empty() {
            return "No projects available.".to_string();
        }
        let mut lines = vec![format!("Available Projects ({}):\n", self.projects.len())];
        for p in &self.projects {
            lines.push(format!("- **{}** (ID: {})", p.name, p.id));
            lines.push(format!(
                "  Identifier: {}",
                p.identifier.as_deref().unwrap_or("N/A")
            ));
            let desc = p.description.as_deref().unwrap_or("No description");
            lines.push(format!("  Description: {}", truncate(desc, 100)));
        }
        lines.join("\n")
    }

    pub fn statuses_formatted(&self) -> String {
        formatted_list(
            "Available Issue Statuses:",
            "No statuses available.",
            self.statuses.iter().map(|s| (s.name.as_str(), s.id)),
        )
    }

    pub fn priorities_formatted(&self) -> String {
        formatted_list(
            "Available Priorities:",
            "No priorities available.",
            self.priorities.iter().map(|p| (p.name.as_str(), p.id)),
        )
    }

    pub fn trackers_formatted(&self) -> String {
        formatted_list(
            "Available Trackers:",
            "No trackers available.",
            self.trackers.iter().map(|t| (t.name.as_str(), t.id)),
        )
    }

    /// Combined instance summary embedded in the Redmine assistant's system
    /// prompt.
    pub fn instance_summary(&self) -> String {
        [
            format!(
                "Redmine Instance: {}",
                self.base_url.as_deref().unwrap_or("N/A")
            ),
            format!(
                "Last Updated: {}",
                self.fetched_at.as_deref().unwrap_or("N/A")
            ),
            String::new(),
            "Available Resources:".to_string(),
            format!("- Projects: {}", self.projects.len()),
            format!("- Statuses: {}", self.statuses.len()),
            format!("- Priorities: {}", self.priorities.len()),
            format!("- Trackers: {}", self.trackers.len()),
            String::new(),
            self.statuses_formatted(),
            String::new(),
            self.priorities_formatted(),
            String::new(),
            self.trackers_formatted(),
        ]
        .join("\n")
    }

    /// Pull out the metadata sections relevant to a query, for prompt
    /// augmentation.
    pub fn context_for_query(&self, query: &str) -> String {
        let q = query.to_lowercase();
        let mut parts = Vec::new();

        if q.contains("project") {
            parts.push(self.projects_summary());
        }
        if q.contains("status") {
            parts.push(self.statuses_formatted());
        }
        if q.contains("priorit") {
            parts.push(self.priorities_formatted());
        }
        if q.contains("tracker") {
            parts.push(self.trackers_formatted());
        }
        if let Some(p) = self
            .projects
            .iter()
            .find(|p| q.contains(&p.name.to_lowercase()))
        {
            parts.push(format!("Project Context: {} (ID: {})", p.name, p.id));
        }

        parts.join("\n\n")
    }
}

fn section<T: serde::de::DeserializeOwned>(endpoints: &Value, name: &str) -> Vec<T> {
    endpoints[name]["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn formatted_list<'a>(
    header: &str,
    empty: &str,
    items: impl Iterator<Item = (&'a str, i64)>,
) -> String {
    let mut lines: Vec<String> = items
        .map(|(name, id)| format!("- {name} (ID: {id})"))
        .collect();
    if lines.is_empty() {
        return empty.to_string();
    }
    lines.insert(0, header.to_string());
    lines.join("\n")
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
