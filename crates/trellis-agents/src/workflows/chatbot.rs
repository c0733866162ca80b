use std::sync::Arc;

use tracing::instrument;
use trellis_common::Result;

use super::{ToolLoopOutcome, run_tool_loop};
use crate::memory::ConversationMemory;
use crate::providers::{ChatMessage, LlmProvider, LlmRequest};
use crate::tools::{ToolContext, ToolRegistry};

const CHATBOT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant. Use the available tools when a question needs \
current or external information; otherwise answer directly.";

/// General-purpose chatbot: conversation memory plus an optional tool loop.
pub struct ChatbotWorkflow {
    provider: Arc<dyn LlmProvider>,
    model: String,
    memory: Arc<ConversationMemory>,
    tools: ToolRegistry,
}

impl ChatbotWorkflow {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        memory: Arc<ConversationMemory>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            memory,
            tools,
        }
    }

    /// One conversational turn with tools and memory.
    #[instrument(skip(self, message))]
    pub async fn chat(&self, conversation_id: &str, message: &str) -> Result<ToolLoopOutcome> {
        let mut messages = self.memory.chat_history(conversation_id);
        messages.push(ChatMessage::user(message));

        let ctx = ToolContext {
            conversation_id: Some(conversation_id.to_string()),
        };
        let outcome = run_tool_loop(
            &self.provider,
            &self.model,
            Some(CHATBOT_SYSTEM_PROMPT.to_string()),
            messages,
            &self.tools,
            &ctx,
        )
        .await?;

        self.memory.add_user_message(conversation_id, message);
        self.memory
            .add_assistant_message(conversation_id, &outcome.answer);

        Ok(outcome)
    }

    /// Single completion without tools or memory.
    #[instrument(skip(self, message))]
    pub async fn chat_simple(&self, message: &str) -> Result<String> {
        let mut request = LlmRequest::new(&self.model, vec![ChatMessage::user(message)]);
        request.system = Some(CHATBOT_SYSTEM_PROMPT.to_string());
        let response = self.provider.complete(&request).await?;
        Ok(response.text())
    }
}
