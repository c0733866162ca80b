use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::info;
use trellis_common::Result;
use trellis_db::{Document, VectorIndex};
use trellis_redmine::MetadataCache;

use super::{Tool, ToolContext, ToolOutput, optional_u64, required_str};
use crate::embeddings::EmbeddingProvider;

/// Meaning-based search over indexed issues.
pub struct SemanticSearchTool {
    index: Arc<Mutex<VectorIndex>>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl SemanticSearchTool {
    pub fn new(index: Arc<Mutex<VectorIndex>>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embeddings }
    }
}

#[async_trait]
impl Tool for SemanticSearchTool {
    fn name(&self) -> &str {
        "semantic_search_issues"
    }

    fn description(&self) -> &str {
        "Find issues by meaning rather than exact keywords. Best for vague \
         descriptions like 'the login thing users complained about'."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Natural-language description of what to find"},
                "limit": {"type": "integer", "description": "Maximum number of results (default 5)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput> {
        let query = match required_str(&input, "query") {
            Ok(q) => q,
            Err(output) => return Ok(output),
        };
        let limit = optional_u64(&input, "limit").unwrap_or(5) as usize;

        let embedding = match self.embeddings.embed_one(query).await {
            Ok(v) => v,
            Err(e) => {
                return Ok(ToolOutput::error(format!(
                    "failed to embed query: {e}"
                )));
            }
        };

        let index = self.index.lock().await;
        if index.count()? == 0 {
            return Ok(ToolOutput::error(
                "the semantic index is empty; no issues have been indexed yet",
            ));
        }

        let hits = index.search(&embedding, limit)?;
        if hits.is_empty() {
            return Ok(ToolOutput::ok("No semantically similar issues found."));
        }

        let lines: Vec<String> = hits
            .iter()
            .map(|hit| {
                format!(
                    "- {} (distance {:.3})\n  {}",
                    hit.doc_key, hit.distance, hit.content
                )
            })
            .collect();
        Ok(ToolOutput::ok(format!(
            "Top {} semantic matches:\n{}",
            hits.len(),
            lines.join("\n")
        )))
    }
}

/// Embed and index every issue in the metadata snapshot. Called once at
/// startup; re-indexing replaces existing entries by key.
pub async fn index_cached_issues(
    index: &Mutex<VectorIndex>,
    embeddings: &dyn EmbeddingProvider,
    metadata: &MetadataCache,
) -> Result<usize> {
    if metadata.issues.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = metadata
        .issues
        .iter()
        .map(|issue| {
            let project = issue
                .project
                .as_ref()
                .map(|p| p.name.as_str())
                .unwrap_or("unknown project");
            match &issue.description {
                Some(desc) if !desc.trim().is_empty() => {
                    format!("[{project}] {}: {desc}", issue.subject)
                }
                _ => format!("[{project}] {}", issue.subject),
            }
        })
        .collect();

    let vectors = embeddings.embed(&texts).await?;

    let mut index = index.lock().await;
    for (issue, (text, vector)) in metadata.issues.iter().zip(texts.iter().zip(vectors.iter())) {
        index.upsert(
            &Document {
                doc_key: format!("issue-{}", issue.id),
                content: text.clone(),
                metadata: json!({
                    "issue_id": issue.id,
                    "project": issue.project.as_ref().map(|p| p.name.clone()),
                }),
            },
            vector,
        )?;
    }

    info!("indexed {} issues for semantic search", metadata.issues.len());
    Ok(metadata.issues.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_common::Error;

    struct FakeEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbeddings {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            // Deterministic toy embedding: bucket by first byte.
            Ok(texts
                .iter()
                .map(|t| {
                    let b = t.bytes().next().unwrap_or(0) as f32;
                    vec![b, t.len() as f32, 0.0, 0.0]
                })
                .collect())
        }
    }

    struct FailingEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbeddings {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Agent("embeddings offline".to_string()))
        }
    }

    #[tokio::test]
    async fn search_on_empty_index_is_error_output() {
        let index = Arc::new(Mutex::new(VectorIndex::in_memory(4).expect("open")));
        let tool = SemanticSearchTool::new(index, Arc::new(FakeEmbeddings));
        let output = tool
            .execute(&ToolContext::default(), json!({"query": "login bug"}))
            .await
            .expect("execute");
        assert!(output.is_error);
        assert!(output.content.contains("empty"));
    }

    #[tokio::test]
    async fn embedding_failure_is_reported_as_tool_error() {
        let index = Arc::new(Mutex::new(VectorIndex::in_memory(4).expect("open")));
        let tool = SemanticSearchTool::new(index, Arc::new(FailingEmbeddings));
        let output = tool
            .execute(&ToolContext::default(), json!({"query": "anything"}))
            .await
            .expect("execute");
        assert!(output.is_error);
        assert!(output.content.contains("embeddings offline"));
    }

    #[tokio::test]
    async fn index_and_search_round_trip() {
        let index = Arc::new(Mutex::new(VectorIndex::in_memory(4).expect("open")));
        let embeddings = FakeEmbeddings;
        let metadata = MetadataCache::from_json(
            r#"{
                "endpoints": {
                    "getIssues": {"data": [
                        {"id": 1, "subject": "Login fails on mobile"},
                        {"id": 2, "subject": "Payment gateway timeout"}
                    ]}
                }
            }"#,
        )
        .expect("parse");

        let indexed = index_cached_issues(&index, &embeddings, &metadata)
            .await
            .expect("index");
        assert_eq!(indexed, 2);

        let tool = SemanticSearchTool::new(index, Arc::new(FakeEmbeddings));
        let output = tool
            .execute(&ToolContext::default(), json!({"query": "login", "limit": 1}))
            .await
            .expect("execute");
        assert!(!output.is_error);
        assert!(output.content.contains("issue-"));
    }
}
