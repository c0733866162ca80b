use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use trellis_common::{Error, Result};

use super::{Tool, ToolContext, ToolOutput, optional_u64, required_str};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Tavily-style web search API client.
#[derive(Clone)]
pub struct WebSearchClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_results: usize,
}

impl WebSearchClient {
    pub fn new(api_key: String, base_url: Option<String>, max_results: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.tavily.com".to_string()),
            max_results: max_results.max(1),
        }
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            results: Vec<SearchHit>,
        }

        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": max_results.min(self.max_results),
            }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("web search request failed: {e}")))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("web search API error: {body}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Http(format!("failed to parse search response: {e}")))?;
        Ok(body.results)
    }
}

pub struct WebSearchTool {
    search: Arc<WebSearchClient>,
}

impl WebSearchTool {
    pub fn new(search: Arc<WebSearchClient>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information: news, recent events, and \
         anything outside the tracker."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"},
                "max_results": {"type": "integer", "description": "Maximum number of results (default 5)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let query = match required_str(&input, "query") {
            Ok(q) => q,
            Err(output) => return Ok(output),
        };
        let max_results = optional_u64(&input, "max_results").unwrap_or(5) as usize;

        match self.search.search(query, max_results).await {
            Ok(hits) if hits.is_empty() => {
                Ok(ToolOutput::ok(format!("No web results for '{query}'.")))
            }
            Ok(hits) => Ok(ToolOutput::ok(format_hits(&hits))),
            Err(e) => Ok(ToolOutput::error(format!("web search failed: {e}"))),
        }
    }
}

pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!("{}. {} ({})\n   {}", i + 1, hit.title, hit.url, hit.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
