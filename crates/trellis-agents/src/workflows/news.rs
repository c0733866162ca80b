use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use trellis_common::{Error, Result};

use crate::providers::{ChatMessage, LlmProvider, LlmRequest};
use crate::tools::web::{WebSearchClient, format_hits};

#[derive(Debug, Clone, Serialize)]
pub struct NewsOutcome {
    pub topic: String,
    pub summary: String,
    pub sources: Vec<String>,
    /// started | fetched | summarized | completed | error
    pub status: String,
    pub error: Option<String>,
    pub artifact_path: Option<String>,
}

/// News pipeline: fetch headlines, summarize, persist a JSON artifact under
/// `{data_dir}/news_summaries/`.
pub struct NewsWorkflow {
    provider: Arc<dyn LlmProvider>,
    model: String,
    search: Arc<WebSearchClient>,
    output_dir: PathBuf,
}

impl NewsWorkflow {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        search: Arc<WebSearchClient>,
        data_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            search,
            output_dir: data_dir.as_ref().join("news_summaries"),
        }
    }

    #[instrument(skip(self))]
    pub async fn summarize(&self, topic: &str, max_results: usize) -> Result<NewsOutcome> {
        let mut outcome = NewsOutcome {
            topic: topic.to_string(),
            summary: String::new(),
            sources: Vec::new(),
            status: "started".to_string(),
            error: None,
            artifact_path: None,
        };

        let hits = match self.search.search(&format!("{topic} news"), max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                outcome.status = "error".to_string();
                outcome.error = Some(e.to_string());
                return Ok(outcome);
            }
        };
        outcome.status = "fetched".to_string();
        outcome.sources = hits.iter().map(|h| h.url.clone()).collect();

        if hits.is_empty() {
            outcome.summary = format!("No news found for '{topic}'.");
            outcome.status = "completed".to_string();
            return Ok(outcome);
        }

        let mut request = LlmRequest::new(
            &self.model,
            vec![ChatMessage::user(format!(
                "Topic: {topic}\n\nHeadlines and excerpts:\n{}",
                format_hits(&hits)
            ))],
        );
        request.system = Some(
            "You are a news editor. Write a brief digest of these items: \
             what happened, why it matters, grouped by theme."
                .to_string(),
        );
        match self.provider.complete(&request).await {
            Ok(response) => {
                outcome.summary = response.text();
                outcome.status = "summarized".to_string();
            }
            Err(e) => {
                outcome.status = "error".to_string();
                outcome.error = Some(e.to_string());
                return Ok(outcome);
            }
        }

        // Artifact write failures are reported but do not void the summary.
        match self.save_artifact(&outcome).await {
            Ok(path) => {
                outcome.artifact_path = Some(path.display().to_string());
                outcome.status = "completed".to_string();
            }
            Err(e) => {
                warn!("failed to save news artifact: {e}");
                outcome.error = Some(e.to_string());
            }
        }

        Ok(outcome)
    }

    async fn save_artifact(&self, outcome: &NewsOutcome) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| Error::Agent(format!("failed to create news directory: {e}")))?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self
            .output_dir
            .join(format!("{timestamp}_{}.json", slugify(&outcome.topic)));

        let body = serde_json::to_vec_pretty(outcome)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| Error::Agent(format!("failed to write news artifact: {e}")))?;

        info!("saved news summary to {}", path.display());
        Ok(path)
    }
}

fn slugify(topic: &str) -> String {
    let slug: String = topic
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    slug.trim_matches('_')
        .chars()
        .take(50)
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::workflows::testing::ScriptedProvider;

    #[test]
    fn slugify_flattens_punctuation() {
        assert_eq!(slugify("Rust 1.85: what's new?"), "rust_1_85_what_s_new");
        assert_eq!(slugify("  AI  "), "ai");
    }

    #[tokio::test]
    async fn completed_run_writes_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"title": "Headline", "url": "https://news.example", "content": "Something happened"}
                ]
            })))
            .mount(&server)
            .await;

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::text_response("A digest of the news."),
        ]));
        let search = Arc::new(WebSearchClient::new(
            "key".to_string(),
            Some(server.uri()),
            5,
        ));
        let dir = tempfile::tempdir().expect("tempdir");
        let workflow = NewsWorkflow::new(provider, "test-model", search, dir.path());

        let outcome = workflow.summarize("rust releases", 5).await.expect("run");
        assert_eq!(outcome.status, "completed");
        assert_eq!(outcome.sources.len(), 1);

        let artifact = outcome.artifact_path.expect("artifact path");
        let raw = std::fs::read_to_string(&artifact).expect("read artifact");
        let parsed: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(parsed["topic"], "rust releases");
        assert_eq!(parsed["summary"], "A digest of the news.");
    }

    #[tokio::test]
    async fn search_failure_yields_error_status_not_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![]));
        let search = Arc::new(WebSearchClient::new(
            "key".to_string(),
            Some(server.uri()),
            5,
        ));
        let dir = tempfile::tempdir().expect("tempdir");
        let workflow = NewsWorkflow::new(provider, "test-model", search, dir.path());

        let outcome = workflow.summarize("anything", 5).await.expect("run");
        assert_eq!(outcome.status, "error");
        assert!(outcome.error.is_some());
    }
}
