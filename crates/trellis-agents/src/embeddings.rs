use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use trellis_common::{Error, Result};

/// Text-to-vector conversion for semantic search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Output dimensionality of the model.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Agent("embedding API returned no vectors".to_string()))
    }
}

/// OpenAI-compatible `/embeddings` endpoint client.
#[derive(Clone)]
pub struct OpenAiEmbeddings {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddings {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|e| Error::Agent(format!("embeddings request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Agent(format!("embeddings API error: {error_text}")));
        }

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::Agent(format!("failed to parse embeddings response: {e}")))?;

        // The API may return items out of order; `index` is authoritative.
        let mut data = body.data;
        data.sort_by_key(|item| item.index);

        if data.len() != texts.len() {
            return Err(Error::Agent(format!(
                "embeddings API returned {} vectors for {} inputs",
                data.len(),
                texts.len()
            )));
        }

        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}
