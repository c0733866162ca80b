use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use trellis_agents::memory::ConversationMemory;
use trellis_agents::tools::web::WebSearchClient;
use trellis_agents::workflows::{
    ChatbotWorkflow, NewsWorkflow, ResearchWorkflow, WriterWorkflow,
};
use trellis_agents::{
    ContentBlock, LlmProvider, LlmRequest, LlmResponse, ToolRegistry,
};
use trellis_common::Result;
use trellis_config::AppConfig;
use trellis_gateway::{AppState, build_router};

/// Provider that always answers with the same text.
struct FixedProvider(String);

#[async_trait]
impl LlmProvider for FixedProvider {
    fn provider_id(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse> {
        Ok(LlmResponse {
            content: vec![ContentBlock::Text {
                text: self.0.clone(),
            }],
            model: "fixed".to_string(),
            usage: None,
            stop_reason: Some("stop".to_string()),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

async fn spawn_server(answer: &str) -> (SocketAddr, tempfile::TempDir) {
    let provider: Arc<dyn LlmProvider> = Arc::new(FixedProvider(answer.to_string()));
    let memory = Arc::new(ConversationMemory::new(20));
    let search = Arc::new(WebSearchClient::new(
        "test".to_string(),
        Some("http://127.0.0.1:1".to_string()),
        5,
    ));
    let data_dir = tempfile::tempdir().expect("tempdir");

    let state = Arc::new(AppState {
        config: AppConfig::default(),
        memory: Arc::clone(&memory),
        chatbot: ChatbotWorkflow::new(
            Arc::clone(&provider),
            "test-model",
            Arc::clone(&memory),
            ToolRegistry::new(),
        ),
        research: ResearchWorkflow::new(
            Arc::clone(&provider),
            "test-model",
            Arc::clone(&search),
        ),
        writer: WriterWorkflow::new(Arc::clone(&provider), "test-model"),
        news: NewsWorkflow::new(
            Arc::clone(&provider),
            "test-model",
            Arc::clone(&search),
            data_dir.path(),
        ),
        redmine: None,
        redmine_client: None,
        started_at: Instant::now(),
    });

    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("serve");
    });

    (addr, data_dir)
}

#[tokio::test]
async fn health_reports_ok_with_request_id() {
    let (addr, _dir) = spawn_server("hi").await;
    let resp = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("request");

    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));

    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn incoming_request_id_is_echoed() {
    let (addr, _dir) = spawn_server("hi").await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/info"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .expect("request");

    assert_eq!(
        resp.headers().get("x-request-id").unwrap().to_str().unwrap(),
        "req-123"
    );
}

#[tokio::test]
async fn chat_round_trips_and_records_conversation() {
    let (addr, _dir) = spawn_server("the answer").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/chat"))
        .json(&json!({"message": "a question"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["response"], "the answer");
    let conversation_id = body["conversation_id"].as_str().expect("id").to_string();

    let resp = client
        .get(format!(
            "http://{addr}/api/v1/chat/conversations/{conversation_id}"
        ))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let history: Value = resp.json().await.expect("json");
    assert_eq!(history["messages"].as_array().unwrap().len(), 2);
    assert_eq!(history["meta"]["message_count"], 2);
}

#[tokio::test]
async fn empty_message_is_rejected_with_422() {
    let (addr, _dir) = spawn_server("unused").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/chat"))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.expect("json");
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn unknown_conversation_is_404() {
    let (addr, _dir) = spawn_server("unused").await;
    let client = reqwest::Client::new();

    let resp = client
        .delete(format!("http://{addr}/api/v1/chat/conversations/nope"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn redmine_routes_unavailable_when_not_configured() {
    let (addr, _dir) = spawn_server("unused").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/redmine/chat"))
        .json(&json!({"message": "list issues"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 503);

    let resp = client
        .post(format!("http://{addr}/api/v1/redmine/validate"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn writer_returns_three_stage_output() {
    let (addr, _dir) = spawn_server("generated text").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/writer"))
        .json(&json!({"topic": "rust", "content_type": "blog_post", "tone": "casual"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["content"], "generated text");
    assert_eq!(body["polished"], true);
}
