use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use trellis_common::Result;
use trellis_redmine::MetadataCache;

use super::{ToolLoopOutcome, run_tool_loop};
use crate::memory::ConversationMemory;
use crate::providers::{ChatMessage, LlmProvider, LlmRequest};
use crate::routing::{Datasource, GradeVerdict, Grader, QueryRouter};
use crate::tools::web::{WebSearchClient, format_hits};
use crate::tools::{ToolContext, ToolRegistry};

#[derive(Debug, Clone, Serialize)]
pub struct RedmineOutcome {
    pub answer: String,
    pub datasource: Datasource,
    pub routing_reasoning: String,
    pub tools_used: Vec<String>,
    pub grade: Option<GradeVerdict>,
}

/// The adaptive tracker assistant: route the query, then answer directly,
/// from web search context, or through the full tool loop.
pub struct RedmineWorkflow {
    provider: Arc<dyn LlmProvider>,
    model: String,
    metadata: Arc<MetadataCache>,
    memory: Arc<ConversationMemory>,
    tools: ToolRegistry,
    router: QueryRouter,
    grader: Option<Grader>,
    search: Arc<WebSearchClient>,
}

impl RedmineWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        metadata: Arc<MetadataCache>,
        memory: Arc<ConversationMemory>,
        tools: ToolRegistry,
        router: QueryRouter,
        grader: Option<Grader>,
        search: Arc<WebSearchClient>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            metadata,
            memory,
            tools,
            router,
            grader,
            search,
        }
    }

    fn system_prompt(&self, query: &str) -> String {
        let mut prompt = String::from(
            "You are a project tracker assistant with access to live Redmine \
             tools. Resolve names to ids using the cached metadata below \
             before calling tools. Be precise with issue and project ids.\n\n",
        );
        prompt.push_str(&self.metadata.instance_summary());

        let query_context = self.metadata.context_for_query(query);
        if !query_context.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&query_context);
        }
        prompt
    }

    #[instrument(skip(self, message))]
    pub async fn chat(&self, conversation_id: &str, message: &str) -> Result<RedmineOutcome> {
        let decision = self.router.route(message).await?;
        info!(
            datasource = decision.datasource.as_str(),
            "adaptive route selected"
        );

        let mut messages = self.memory.chat_history(conversation_id);
        let mut tools_used = Vec::new();

        let answer = match decision.datasource {
            Datasource::DirectAnswer => {
                messages.push(ChatMessage::user(message));
                let mut request = LlmRequest::new(&self.model, messages);
                request.system = Some(self.system_prompt(message));
                self.provider.complete(&request).await?.text()
            }
            Datasource::WebSearch => {
                // Pre-fetch context instead of waiting for a tool call.
                let context = match self.search.search(message, 5).await {
                    Ok(hits) if !hits.is_empty() => format_hits(&hits),
                    Ok(_) => "No web results found.".to_string(),
                    Err(e) => {
                        warn!("web search prefetch failed: {e}");
                        format!("Web search unavailable: {e}")
                    }
                };
                messages.push(ChatMessage::user(format!(
                    "{message}\n\nWeb search results:\n{context}"
                )));
                let mut request = LlmRequest::new(&self.model, messages);
                request.system = Some(self.system_prompt(message));
                self.provider.complete(&request).await?.text()
            }
            Datasource::RedmineTools => {
                messages.push(ChatMessage::user(message));
                let ctx = ToolContext {
                    conversation_id: Some(conversation_id.to_string()),
                };
                let ToolLoopOutcome {
                    answer,
                    tools_used: used,
                } = run_tool_loop(
                    &self.provider,
                    &self.model,
                    Some(self.system_prompt(message)),
                    messages,
                    &self.tools,
                    &ctx,
                )
                .await?;
                tools_used = used;
                answer
            }
        };

        let grade = match &self.grader {
            Some(grader) => match grader.grade_usefulness(message, &answer).await {
                Ok(verdict) => {
                    if !verdict.is_yes() {
                        warn!(reasoning = %verdict.reasoning, "answer graded not useful");
                    }
                    Some(verdict)
                }
                Err(e) => {
                    warn!("grading failed: {e}");
                    None
                }
            },
            None => None,
        };

        self.memory.add_user_message(conversation_id, message);
        self.memory.add_assistant_message(conversation_id, &answer);

        Ok(RedmineOutcome {
            answer,
            datasource: decision.datasource,
            routing_reasoning: decision.reasoning,
            tools_used,
            grade,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::workflows::testing::ScriptedProvider;

    fn route_response(datasource: &str) -> crate::providers::LlmResponse {
        ScriptedProvider::text_response(&format!(
            r#"{{"datasource": "{datasource}", "reasoning": "test route"}}"#
        ))
    }

    fn workflow(provider: Arc<dyn LlmProvider>) -> RedmineWorkflow {
        workflow_with_grader(provider, None)
    }

    fn workflow_with_grader(
        provider: Arc<dyn LlmProvider>,
        grader: Option<Grader>,
    ) -> RedmineWorkflow {
        let router = QueryRouter::new(Arc::clone(&provider), "test-model");
        RedmineWorkflow::new(
            Arc::clone(&provider),
            "test-model",
            Arc::new(MetadataCache::default()),
            Arc::new(ConversationMemory::new(20)),
            ToolRegistry::new(),
            router,
            grader,
            Arc::new(WebSearchClient::new(
                "key".to_string(),
                Some("http://127.0.0.1:1".to_string()),
                5,
            )),
        )
    }

    #[tokio::test]
    async fn direct_answer_skips_tools() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            route_response("direct_answer"),
            ScriptedProvider::text_response("Hello! How can I help?"),
        ]));
        let workflow = workflow(provider);

        let outcome = workflow.chat("c1", "hi there").await.expect("chat");
        assert_eq!(outcome.datasource, Datasource::DirectAnswer);
        assert_eq!(outcome.answer, "Hello! How can I help?");
        assert!(outcome.tools_used.is_empty());
        assert!(outcome.grade.is_none());
    }

    #[tokio::test]
    async fn unparseable_route_falls_back_to_tools() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::text_response("definitely use the tracker"),
            ScriptedProvider::text_response("answered via tool loop"),
        ]));
        let workflow = workflow(provider);

        let outcome = workflow.chat("c1", "list my issues").await.expect("chat");
        assert_eq!(outcome.datasource, Datasource::RedmineTools);
        assert_eq!(outcome.answer, "answered via tool loop");
    }

    #[tokio::test]
    async fn web_search_failure_still_answers() {
        // Search client points at a closed port; the prefetch degrades to a
        // note in the prompt and the completion still runs.
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            route_response("web_search"),
            ScriptedProvider::text_response("best effort answer"),
        ]));
        let workflow = workflow(provider);

        let outcome = workflow
            .chat("c1", "latest rust release?")
            .await
            .expect("chat");
        assert_eq!(outcome.datasource, Datasource::WebSearch);
        assert_eq!(outcome.answer, "best effort answer");
    }

    #[tokio::test]
    async fn grader_verdict_is_attached_to_outcome() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            route_response("direct_answer"),
            ScriptedProvider::text_response("42"),
            ScriptedProvider::text_response(
                r#"{"binary_score": "no", "reasoning": "answer lacks context"}"#,
            ),
        ]));
        let grader = Grader::new(Arc::clone(&provider), "test-model");
        let workflow = workflow_with_grader(provider, Some(grader));

        let outcome = workflow
            .chat("c1", "what is the answer?")
            .await
            .expect("chat");
        assert_eq!(outcome.answer, "42");
        let verdict = outcome.grade.expect("grade attached");
        assert!(!verdict.is_yes());
        assert_eq!(verdict.reasoning, "answer lacks context");
    }

    #[tokio::test]
    async fn grading_failure_does_not_block_the_answer() {
        // Only route + answer are scripted, so the usefulness check errors.
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            route_response("direct_answer"),
            ScriptedProvider::text_response("still answered"),
        ]));
        let grader = Grader::new(Arc::clone(&provider), "test-model");
        let workflow = workflow_with_grader(provider, Some(grader));

        let outcome = workflow.chat("c1", "hello").await.expect("chat");
        assert_eq!(outcome.answer, "still answered");
        assert!(outcome.grade.is_none());
    }

    #[tokio::test]
    async fn conversation_round_trips_through_memory() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            route_response("direct_answer"),
            ScriptedProvider::text_response("first answer"),
            route_response("direct_answer"),
            ScriptedProvider::text_response("second answer"),
        ]));
        let memory = Arc::new(ConversationMemory::new(20));
        let router = QueryRouter::new(Arc::clone(&provider), "test-model");
        let workflow = RedmineWorkflow::new(
            Arc::clone(&provider),
            "test-model",
            Arc::new(MetadataCache::default()),
            Arc::clone(&memory),
            ToolRegistry::new(),
            router,
            None,
            Arc::new(WebSearchClient::new(
                "key".to_string(),
                Some("http://127.0.0.1:1".to_string()),
                5,
            )),
        );

        workflow.chat("c1", "first").await.expect("chat");
        workflow.chat("c1", "second").await.expect("chat");

        let history = memory.history("c1");
        assert_eq!(history.len(), 4);
        assert_eq!(history[2].content, "second");
        assert_eq!(history[3].content, "second answer");
    }
}
