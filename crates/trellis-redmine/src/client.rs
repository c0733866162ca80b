use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use trellis_common::{Error, Result};

use crate::models::{
    Issue, IssueDraft, IssueUpdate, Priority, Project, Status, TimeEntry, Tracker, User,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Optional filters for issue listing.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub project_id: Option<i64>,
    /// Redmine status filter: "open", "closed" or "*" for all.
    pub status_id: Option<String>,
    pub assigned_to_id: Option<i64>,
    pub limit: Option<usize>,
}

/// Async client for the Redmine REST API, authenticated via the
/// `X-Redmine-API-Key` header.
#[derive(Clone)]
pub struct RedmineClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RedmineClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, ?method, "redmine request");

        let mut req = self
            .client
            .request(method, &url)
            .header("X-Redmine-API-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .query(params);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Http(format!("redmine request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::redmine(status.as_u16(), body));
        }

        // Redmine returns an empty body for successful PUT requests.
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("failed to read redmine response: {e}")))?;
        if text.trim().is_empty() {
            return serde_json::from_value(Value::Null).map_err(Into::into);
        }
        serde_json::from_str(&text).map_err(Into::into)
    }

    /// Validate credentials by fetching the current user.
    pub async fn validate_connection(&self) -> Result<User> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            user: User,
        }
        let wrapper: Wrapper = self
            .request(Method::GET, "/users/current.json", &[], None)
            .await?;
        Ok(wrapper.user)
    }

    pub async fn list_projects(&self, limit: usize) -> Result<Vec<Project>> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(default)]
            projects: Vec<Project>,
        }
        let wrapper: Wrapper = self
            .request(
                Method::GET,
                "/projects.json",
                &[("limit", limit.to_string())],
                None,
            )
            .await?;
        Ok(wrapper.projects)
    }

    pub async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(default)]
            issues: Vec<Issue>,
        }

        let mut params = vec![("limit", filter.limit.unwrap_or(100).to_string())];
        if let Some(project_id) = filter.project_id {
            params.push(("project_id", project_id.to_string()));
        }
        if let Some(status) = &filter.status_id {
            params.push(("status_id", status.clone()));
        }
        if let Some(assignee) = filter.assigned_to_id {
            params.push(("assigned_to_id", assignee.to_string()));
        }

        let wrapper: Wrapper = self
            .request(Method::GET, "/issues.json", &params, None)
            .await?;
        Ok(wrapper.issues)
    }

    pub async fn get_issue(&self, issue_id: i64) -> Result<Issue> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            issue: Issue,
        }
        let wrapper: Wrapper = self
            .request(
                Method::GET,
                &format!("/issues/{issue_id}.json"),
                &[],
                None,
            )
            .await?;
        Ok(wrapper.issue)
    }

    pub async fn create_issue(&self, draft: &IssueDraft) -> Result<Issue> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            issue: Issue,
        }
        let wrapper: Wrapper = self
            .request(
                Method::POST,
                "/issues.json",
                &[],
                Some(json!({ "issue": draft })),
            )
            .await?;
        Ok(wrapper.issue)
    }

    pub async fn update_issue(&self, issue_id: i64, update: &IssueUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let _: Option<Value> = self
            .request(
                Method::PUT,
                &format!("/issues/{issue_id}.json"),
                &[],
                Some(json!({ "issue": update })),
            )
            .await?;
        Ok(())
    }

    pub async fn list_time_entries(
        &self,
        project_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<TimeEntry>> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(default)]
            time_entries: Vec<TimeEntry>,
        }
        let mut params = vec![("limit", limit.to_string())];
        if let Some(project_id) = project_id {
            params.push(("project_id", project_id.to_string()));
        }
        let wrapper: Wrapper = self
            .request(Method::GET, "/time_entries.json", &params, None)
            .await?;
        Ok(wrapper.time_entries)
    }

    pub async fn list_issue_statuses(&self) -> Result<Vec<Status>> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(default)]
            issue_statuses: Vec<Status>,
        }
        let wrapper: Wrapper = self
            .request(Method::GET, "/issue_statuses.json", &[], None)
            .await?;
        Ok(wrapper.issue_statuses)
    }

    pub async fn list_priorities(&self) -> Result<Vec<Priority>> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(default)]
            issue_priorities: Vec<Priority>,
        }
        let wrapper: Wrapper = self
            .request(
                Method::GET,
                "/enumerations/issue_priorities.json",
                &[],
                None,
            )
            .await?;
        Ok(wrapper.issue_priorities)
    }

    pub async fn list_trackers(&self) -> Result<Vec<Tracker>> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(default)]
            trackers: Vec<Tracker>,
        }
        let wrapper: Wrapper = self
            .request(Method::GET, "/trackers.json", &[], None)
            .await?;
        Ok(wrapper.trackers)
    }

    pub async fn list_users(&self, limit: usize) -> Result<Vec<User>> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(default)]
            users: Vec<User>,
        }
        let wrapper: Wrapper = self
            .request(
                Method::GET,
                "/users.json",
                &[("limit", limit.to_string())],
                None,
            )
            .await?;
        Ok(wrapper.users)
    }
}
