use serde::{Deserialize, Serialize};

/// A `{ "id": .., "name": .. }` reference as Redmine embeds them in issues
/// and time entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub created_on: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project: Option<NamedRef>,
    #[serde(default)]
    pub tracker: Option<NamedRef>,
    #[serde(default)]
    pub status: Option<NamedRef>,
    #[serde(default)]
    pub priority: Option<NamedRef>,
    #[serde(default)]
    pub author: Option<NamedRef>,
    #[serde(default)]
    pub assigned_to: Option<NamedRef>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_closed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Priority {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    #[serde(default)]
    pub hours: Option<f64>,
    #[serde(default)]
    pub spent_on: Option<String>,
    #[serde(default)]
    pub user: Option<NamedRef>,
    #[serde(default)]
    pub activity: Option<NamedRef>,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
}

/// Fields for creating a new issue.
#[derive(Debug, Clone, Serialize)]
pub struct IssueDraft {
    pub project_id: i64,
    pub subject: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub tracker_id: i64,
    pub priority_id: i64,
}

impl IssueDraft {
    pub fn new(project_id: i64, subject: impl Into<String>) -> Self {
        Self {
            project_id,
            subject: subject.into(),
            description: String::new(),
            // Redmine defaults: tracker 1 (Bug), priority 2 (Normal)
            tracker_id: 1,
            priority_id: 2,
        }
    }
}

/// Partial update for an existing issue; only set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<i64>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.description.is_none()
            && self.status_id.is_none()
            && self.priority_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_deserializes_with_missing_optionals() {
        let issue: Issue =
            serde_json::from_str(r#"{"id": 42, "subject": "Login broken"}"#).expect("parse");
        assert_eq!(issue.id, 42);
        assert!(issue.project.is_none());
        assert!(issue.assigned_to.is_none());
    }

    #[test]
    fn issue_update_skips_unset_fields() {
        let update = IssueUpdate {
            status_id: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).expect("serialize");
        assert_eq!(json, serde_json::json!({"status_id": 3}));
    }

    #[test]
    fn issue_draft_defaults() {
        let draft = IssueDraft::new(7, "Crash on save");
        assert_eq!(draft.tracker_id, 1);
        assert_eq!(draft.priority_id, 2);
        let json = serde_json::to_value(&draft).expect("serialize");
        // Empty description is omitted entirely.
        assert!(json.get("description").is_none());
    }
}
