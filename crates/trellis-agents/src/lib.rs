pub mod embeddings;
pub mod memory;
pub mod providers;
pub mod routing;
pub mod tools;
pub mod workflows;

pub use embeddings::{EmbeddingProvider, OpenAiEmbeddings};
pub use memory::{ConversationMemory, ConversationMeta, MessageRole, StoredMessage};
pub use providers::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmResponse, MessagePart,
    OpenAiProvider, ToolDefinition, Usage,
};
pub use routing::{Datasource, GradeVerdict, Grader, QueryRouter, RouteDecision};
pub use tools::{Tool, ToolContext, ToolOutput, ToolRegistry};
pub use workflows::{
    ChatbotWorkflow, ContentType, MAX_TOOL_ITERATIONS, NewsOutcome, NewsWorkflow, RedmineOutcome,
    RedmineWorkflow, ResearchOutcome, ResearchWorkflow, Tone, ToolLoopOutcome, WriterOutcome,
    WriterWorkflow,
};
