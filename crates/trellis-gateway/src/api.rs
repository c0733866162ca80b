use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::schemas::*;
use crate::state::SharedState;

fn validate_message(message: &str) -> Result<(), ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::unprocessable("message must not be empty"));
    }
    Ok(())
}

fn conversation_id_or_new(id: Option<String>) -> String {
    id.filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// POST /api/v1/chat
pub async fn chat(
    State(state): State<SharedState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    validate_message(&body.message)?;
    let conversation_id = conversation_id_or_new(body.conversation_id);

    let outcome = state.chatbot.chat(&conversation_id, &body.message).await?;

    let mut metadata = BTreeMap::new();
    metadata.insert("tools_used".to_string(), json!(outcome.tools_used));

    Ok(Json(ChatResponse {
        response: outcome.answer,
        conversation_id,
        metadata,
    }))
}

/// POST /api/v1/chat/simple
pub async fn chat_simple(
    State(state): State<SharedState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<SimpleChatResponse>, ApiError> {
    validate_message(&body.message)?;
    let response = state.chatbot.chat_simple(&body.message).await?;
    Ok(Json(SimpleChatResponse { response }))
}

/// GET /api/v1/chat/conversations
pub async fn list_conversations(
    State(state): State<SharedState>,
) -> Json<ConversationListResponse> {
    let conversations = state.memory.list();
    let count = conversations.len();
    Json(ConversationListResponse {
        conversations,
        count,
    })
}

/// GET /api/v1/chat/conversations/{id}
pub async fn conversation_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationHistoryResponse>, ApiError> {
    let meta = state
        .memory
        .meta(&id)
        .ok_or_else(|| ApiError::not_found(format!("no conversation with id {id}")))?;
    Ok(Json(ConversationHistoryResponse {
        conversation_id: id.clone(),
        messages: state.memory.history(&id),
        meta,
    }))
}

/// DELETE /api/v1/chat/conversations/{id}
pub async fn delete_conversation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.memory.delete(&id) {
        return Err(ApiError::not_found(format!("no conversation with id {id}")));
    }
    info!(conversation_id = %id, "conversation deleted");
    Ok(Json(json!({"deleted": id})))
}

/// POST /api/v1/chat/conversations/{id}/clear
pub async fn clear_conversation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.memory.clear(&id) {
        return Err(ApiError::not_found(format!("no conversation with id {id}")));
    }
    Ok(Json(json!({"cleared": id})))
}

/// POST /api/v1/research
pub async fn research(
    State(state): State<SharedState>,
    Json(body): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>, ApiError> {
    validate_message(&body.topic)?;
    let outcome = state
        .research
        .research(&body.topic, body.max_results.unwrap_or(5))
        .await?;
    Ok(Json(ResearchResponse {
        topic: outcome.topic,
        summary: outcome.summary,
        sources: outcome.sources,
        result_count: outcome.result_count,
    }))
}

/// POST /api/v1/writer
pub async fn writer(
    State(state): State<SharedState>,
    Json(body): Json<WriterRequest>,
) -> Result<Json<WriterResponse>, ApiError> {
    validate_message(&body.topic)?;
    let outcome = state
        .writer
        .write(&body.topic, body.content_type, body.tone)
        .await?;
    Ok(Json(WriterResponse {
        topic: outcome.topic,
        outline: outcome.outline,
        content: outcome.content,
        polished: outcome.polished,
    }))
}

/// POST /api/v1/news/summarize
pub async fn news_summarize(
    State(state): State<SharedState>,
    Json(body): Json<NewsRequest>,
) -> Result<Json<NewsResponse>, ApiError> {
    validate_message(&body.topic)?;
    let outcome = state
        .news
        .summarize(&body.topic, body.max_results.unwrap_or(5))
        .await?;
    Ok(Json(NewsResponse {
        topic: outcome.topic,
        summary: outcome.summary,
        sources: outcome.sources,
        status: outcome.status,
        error: outcome.error,
        artifact_path: outcome.artifact_path,
    }))
}

/// POST /api/v1/redmine/chat
pub async fn redmine_chat(
    State(state): State<SharedState>,
    Json(body): Json<RedmineChatRequest>,
) -> Result<Json<RedmineChatResponse>, ApiError> {
    validate_message(&body.message)?;
    let workflow = state
        .redmine
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("redmine is not configured"))?;
    let conversation_id = conversation_id_or_new(body.conversation_id);

    let outcome = workflow.chat(&conversation_id, &body.message).await?;

    Ok(Json(RedmineChatResponse {
        response: outcome.answer,
        conversation_id,
        datasource: outcome.datasource.as_str().to_string(),
        routing_reasoning: outcome.routing_reasoning,
        tool_calls: outcome.tools_used,
        grade: outcome.grade.map(|g| json!(g)),
    }))
}

/// POST /api/v1/redmine/validate
pub async fn redmine_validate(
    State(state): State<SharedState>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let client = state
        .redmine_client
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("redmine is not configured"))?;

    match client.validate_connection().await {
        Ok(user) => {
            let name = match (&user.firstname, &user.lastname) {
                (Some(first), Some(last)) => Some(format!("{first} {last}")),
                _ => user.login.clone(),
            };
            Ok(Json(ValidateResponse {
                valid: true,
                user: name,
                message: "connection ok".to_string(),
            }))
        }
        Err(e) => Ok(Json(ValidateResponse {
            valid: false,
            user: None,
            message: e.to_string(),
        })),
    }
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET /info and GET /
pub async fn info_handler(State(state): State<SharedState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "trellis",
        version: env!("CARGO_PKG_VERSION"),
        workflows: vec!["chat", "research", "writer", "news", "redmine"],
        providers: state.config.llm.keys().cloned().collect(),
        default_provider: state.config.default_provider.clone(),
    })
}
