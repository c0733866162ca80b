use std::sync::Arc;
use std::time::Instant;

use trellis_agents::memory::ConversationMemory;
use trellis_agents::workflows::{
    ChatbotWorkflow, NewsWorkflow, RedmineWorkflow, ResearchWorkflow, WriterWorkflow,
};
use trellis_config::AppConfig;
use trellis_redmine::RedmineClient;

/// Everything the handlers need, assembled once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub memory: Arc<ConversationMemory>,
    pub chatbot: ChatbotWorkflow,
    pub research: ResearchWorkflow,
    pub writer: WriterWorkflow,
    pub news: NewsWorkflow,
    pub redmine: Option<RedmineWorkflow>,
    pub redmine_client: Option<RedmineClient>,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
