use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::api;
use crate::state::SharedState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application router with all routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    // Per-IP rate limit from config (default: 1 req/sec, burst 60).
    let rl = &state.config.gateway.rate_limit;
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(rl.per_second)
        .burst_size(rl.burst_size)
        .finish()
        .expect("governor config should be valid");
    let governor_limiter = governor_conf.limiter().clone();
    let governor_layer = GovernorLayer::new(governor_conf);

    // Clean up rate-limiter state for inactive IPs.
    tokio::spawn(async move {
        let interval = std::time::Duration::from_secs(60);
        loop {
            tokio::time::sleep(interval).await;
            governor_limiter.retain_recent();
        }
    });

    let cors = cors_layer(&state.config.gateway.allowed_origins);

    Router::new()
        .route("/", get(api::info_handler))
        .route("/health", get(api::health))
        .route("/info", get(api::info_handler))
        .route("/api/v1/chat", post(api::chat))
        .route("/api/v1/chat/simple", post(api::chat_simple))
        .route("/api/v1/chat/conversations", get(api::list_conversations))
        .route(
            "/api/v1/chat/conversations/{id}",
            get(api::conversation_history).delete(api::delete_conversation),
        )
        .route(
            "/api/v1/chat/conversations/{id}/clear",
            post(api::clear_conversation),
        )
        .route("/api/v1/research", post(api::research))
        .route("/api/v1/writer", post(api::writer))
        .route("/api/v1/news/summarize", post(api::news_summarize))
        .route("/api/v1/redmine/chat", post(api::redmine_chat))
        .route("/api/v1/redmine/validate", post(api::redmine_validate))
        .with_state(state)
        .layer(middleware::from_fn(attach_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(governor_layer)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers([header::CONTENT_TYPE])
}

/// Echo an incoming request id or mint one; every response carries it.
async fn attach_request_id(req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
