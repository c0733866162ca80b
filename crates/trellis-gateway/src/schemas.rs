use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_agents::memory::ConversationMeta;
use trellis_agents::{ContentType, Tone};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SimpleChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationMeta>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ConversationHistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<trellis_agents::memory::StoredMessage>,
    pub meta: ConversationMeta,
}

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ResearchResponse {
    pub topic: String,
    pub summary: String,
    pub sources: Vec<String>,
    pub result_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct WriterRequest {
    pub topic: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub tone: Tone,
}

#[derive(Debug, Serialize)]
pub struct WriterResponse {
    pub topic: String,
    pub outline: String,
    pub content: String,
    pub polished: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewsRequest {
    pub topic: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub topic: String,
    pub summary: String,
    pub sources: Vec<String>,
    pub status: String,
    pub error: Option<String>,
    pub artifact_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RedmineChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RedmineChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub datasource: String,
    pub routing_reasoning: String,
    pub tool_calls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub user: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub workflows: Vec<&'static str>,
    pub providers: Vec<String>,
    pub default_provider: Option<String>,
}
