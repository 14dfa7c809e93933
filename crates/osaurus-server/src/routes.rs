//! Gateway-level routes that belong to no feature crate

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};
use bytes::Bytes;
use http::StatusCode;
use osaurus_core::{HttpError, json_error, json_response};
use osaurus_llm::MemoryStore;
use osaurus_llm::memory::IngestRequest;
use serde_json::json;

const BANNER: &str = "Osaurus gateway is running";

/// Root banner, health and the memory routes
pub fn gateway_router(memory: Arc<dyn MemoryStore>) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/health", routing::get(health))
        .route("/memory/ingest", routing::post(ingest_memory))
        .route("/agents", routing::get(list_agents))
        .with_state(memory)
}

/// Plain-text 404 for unknown paths and methods
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

async fn root() -> &'static str {
    BANNER
}

async fn health() -> Response {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "timestamp": jiff::Timestamp::now().to_string(),
        }),
    )
}

async fn ingest_memory(State(memory): State<Arc<dyn MemoryStore>>, body: Bytes) -> Response {
    let request: IngestRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                &format!("invalid ingest body: {e}"),
            );
        }
    };

    let agent_id = request.agent_id.trim().to_owned();
    let conversation_id = request.conversation_id.clone();

    match memory.ingest(request).await {
        Ok(turns_ingested) => json_response(
            StatusCode::OK,
            &json!({
                "status": "ok",
                "agent_id": agent_id,
                "conversation_id": conversation_id,
                "turns_ingested": turns_ingested,
            }),
        ),
        Err(e) => {
            tracing::debug!(error = %e, "memory ingest rejected");
            json_error(e.status_code(), e.error_type(), &e.client_message())
        }
    }
}

async fn list_agents(State(memory): State<Arc<dyn MemoryStore>>) -> Response {
    json_response(StatusCode::OK, &json!({ "agents": memory.agents().await }))
}
