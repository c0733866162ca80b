use std::sync::Arc;

use tracing::{debug, warn};
use trellis_common::{Error, Result};

use crate::providers::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, MessagePart,
};
use crate::tools::{ToolContext, ToolOutput, ToolRegistry};

pub mod chatbot;
pub mod news;
pub mod redmine;
pub mod research;
pub mod writer;

pub use chatbot::ChatbotWorkflow;
pub use news::{NewsOutcome, NewsWorkflow};
pub use redmine::{RedmineOutcome, RedmineWorkflow};
pub use research::{ResearchOutcome, ResearchWorkflow};
pub use writer::{ContentType, Tone, WriterOutcome, WriterWorkflow};

/// Hard cap on model→tool round trips within a single turn.
pub const MAX_TOOL_ITERATIONS: usize = 10;

/// Result of a completed tool loop: the final text plus which tools ran.
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    pub answer: String,
    pub tools_used: Vec<String>,
}

/// Drive the model until it stops asking for tools or the iteration cap is
/// hit. Tool failures are fed back as error text so the model can adjust.
pub(crate) async fn run_tool_loop(
    provider: &Arc<dyn LlmProvider>,
    model: &str,
    system: Option<String>,
    mut messages: Vec<ChatMessage>,
    tools: &ToolRegistry,
    ctx: &ToolContext,
) -> Result<ToolLoopOutcome> {
    let definitions = tools.definitions();
    let mut tools_used = Vec::new();

    for iteration in 0..MAX_TOOL_ITERATIONS {
        let mut request = LlmRequest::new(model, messages.clone());
        request.system = system.clone();
        request.tools = definitions.clone();

        let response = provider.complete(&request).await?;

        if !response.has_tool_use() {
            debug!(iteration, "tool loop finished");
            return Ok(ToolLoopOutcome {
                answer: response.text(),
                tools_used,
            });
        }

        messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: MessagePart::Parts(response.content.clone()),
        });

        let mut results = Vec::new();
        for block in &response.content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };

            debug!(tool = %name, iteration, "executing tool");
            tools_used.push(name.clone());

            let output = match tools.get(name) {
                Some(tool) => match tool.execute(ctx, input.clone()).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(tool = %name, "tool execution failed: {e}");
                        ToolOutput::error(format!("tool '{name}' failed: {e}"))
                    }
                },
                None => ToolOutput::error(format!("unknown tool: {name}")),
            };

            results.push(ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content: output.content,
            });
        }

        messages.push(ChatMessage {
            role: ChatRole::User,
            content: MessagePart::Parts(results),
        });
    }

    Err(Error::Agent(format!(
        "tool loop exceeded {MAX_TOOL_ITERATIONS} iterations without a final answer"
    )))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use trellis_common::Result;

    use crate::providers::{LlmProvider, LlmRequest, LlmResponse};

    /// Scripted provider: returns canned responses in order.
    pub struct ScriptedProvider {
        responses: Mutex<Vec<LlmResponse>>,
    }

    impl ScriptedProvider {
        pub fn new(mut responses: Vec<LlmResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }

        pub fn text_response(text: &str) -> LlmResponse {
            LlmResponse {
                content: vec![crate::providers::ContentBlock::Text {
                    text: text.to_string(),
                }],
                model: "scripted".to_string(),
                usage: None,
                stop_reason: Some("stop".to_string()),
            }
        }

        pub fn tool_use_response(id: &str, name: &str, input: serde_json::Value) -> LlmResponse {
            LlmResponse {
                content: vec![crate::providers::ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input,
                }],
                model: "scripted".to_string(),
                usage: None,
                stop_reason: Some("tool_use".to_string()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_id(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse> {
            let mut responses = self.responses.lock().unwrap();
            responses.pop().ok_or_else(|| {
                trellis_common::Error::Agent("scripted provider exhausted".to_string())
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::testing::ScriptedProvider;
    use super::*;
    use crate::tools::Tool;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back."
        }

        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(
            &self,
            _ctx: &ToolContext,
            input: serde_json::Value,
        ) -> Result<ToolOutput> {
            Ok(ToolOutput::ok(format!(
                "echo: {}",
                input["text"].as_str().unwrap_or("")
            )))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry
    }

    #[tokio::test]
    async fn loop_runs_tools_until_final_answer() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_use_response("t1", "echo", json!({"text": "hello"})),
            ScriptedProvider::text_response("done"),
        ]));

        let outcome = run_tool_loop(
            &provider,
            "test-model",
            None,
            vec![ChatMessage::user("hi")],
            &registry(),
            &ToolContext::default(),
        )
        .await
        .expect("loop");

        assert_eq!(outcome.answer, "done");
        assert_eq!(outcome.tools_used, vec!["echo"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_not_fatal() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_use_response("t1", "no_such_tool", json!({})),
            ScriptedProvider::text_response("recovered"),
        ]));

        let outcome = run_tool_loop(
            &provider,
            "test-model",
            None,
            vec![ChatMessage::user("hi")],
            &registry(),
            &ToolContext::default(),
        )
        .await
        .expect("loop");

        assert_eq!(outcome.answer, "recovered");
        assert_eq!(outcome.tools_used, vec!["no_such_tool"]);
    }

    #[tokio::test]
    async fn loop_errors_after_iteration_cap() {
        let responses: Vec<_> = (0..MAX_TOOL_ITERATIONS + 1)
            .map(|i| {
                ScriptedProvider::tool_use_response(&format!("t{i}"), "echo", json!({"text": "x"}))
            })
            .collect();
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(responses));

        let result = run_tool_loop(
            &provider,
            "test-model",
            None,
            vec![ChatMessage::user("hi")],
            &registry(),
            &ToolContext::default(),
        )
        .await;

        assert!(result.is_err());
    }
}
