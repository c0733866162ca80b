use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;
use trellis_common::Result;

use crate::providers::{ChatMessage, LlmProvider, LlmRequest};
use crate::tools::web::{SearchHit, WebSearchClient, format_hits};

const SUMMARY_SOURCES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    pub topic: String,
    pub summary: String,
    pub sources: Vec<String>,
    pub result_count: usize,
}

/// Two-step research pipeline: web search, then one summarization pass over
/// the top results.
pub struct ResearchWorkflow {
    provider: Arc<dyn LlmProvider>,
    model: String,
    search: Arc<WebSearchClient>,
}

impl ResearchWorkflow {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        search: Arc<WebSearchClient>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            search,
        }
    }

    #[instrument(skip(self))]
    pub async fn research(&self, topic: &str, max_results: usize) -> Result<ResearchOutcome> {
        let hits = self.search.search(topic, max_results).await?;
        if hits.is_empty() {
            return Ok(ResearchOutcome {
                topic: topic.to_string(),
                summary: format!("No web results found for '{topic}'."),
                sources: Vec::new(),
                result_count: 0,
            });
        }

        let top: Vec<SearchHit> = hits.iter().take(SUMMARY_SOURCES).cloned().collect();
        let summary = self.summarize(topic, &top).await?;

        Ok(ResearchOutcome {
            topic: topic.to_string(),
            summary,
            sources: hits.iter().map(|h| h.url.clone()).collect(),
            result_count: hits.len(),
        })
    }

    async fn summarize(&self, topic: &str, hits: &[SearchHit]) -> Result<String> {
        let mut request = LlmRequest::new(
            &self.model,
            vec![ChatMessage::user(format!(
                "Research topic: {topic}\n\nSearch results:\n{}",
                format_hits(hits)
            ))],
        );
        request.system = Some(
            "You are a research assistant. Write a concise, well-organized \
             summary of the search results, citing sources by number."
                .to_string(),
        );
        let response = self.provider.complete(&request).await?;
        Ok(response.text())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::workflows::testing::ScriptedProvider;

    async fn search_server(results: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"results": results})),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn research_summarizes_and_collects_sources() {
        let server = search_server(json!([
            {"title": "A", "url": "https://a.example", "content": "alpha"},
            {"title": "B", "url": "https://b.example", "content": "beta"}
        ]))
        .await;

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::text_response("A summary of alpha and beta."),
        ]));
        let search = Arc::new(WebSearchClient::new(
            "key".to_string(),
            Some(server.uri()),
            5,
        ));
        let workflow = ResearchWorkflow::new(provider, "test-model", search);

        let outcome = workflow.research("greek letters", 5).await.expect("research");
        assert_eq!(outcome.result_count, 2);
        assert_eq!(outcome.sources, vec!["https://a.example", "https://b.example"]);
        assert!(outcome.summary.contains("summary"));
    }

    #[tokio::test]
    async fn no_results_short_circuits_without_llm_call() {
        let server = search_server(json!([])).await;

        // No scripted responses: a completion call would error.
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![]));
        let search = Arc::new(WebSearchClient::new(
            "key".to_string(),
            Some(server.uri()),
            5,
        ));
        let workflow = ResearchWorkflow::new(provider, "test-model", search);

        let outcome = workflow.research("obscure topic", 5).await.expect("research");
        assert_eq!(outcome.result_count, 0);
        assert!(outcome.summary.contains("No web results"));
    }
}
