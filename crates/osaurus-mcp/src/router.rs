use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use http::StatusCode;
use osaurus_core::{HttpError, json_error, json_response};
use serde::{Deserialize, Serialize};

use crate::error::McpError;
use crate::registry::{ToolRegistry, ToolSpec};

/// Build the MCP router
pub fn mcp_router(registry: Arc<dyn ToolRegistry>) -> Router {
    Router::new()
        .route("/mcp/health", get(health))
        .route("/mcp/tools", get(list_tools))
        .route("/mcp/call", post(call_tool))
        .with_state(registry)
}

async fn health() -> Response {
    json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
struct ListToolsResponse {
    tools: Vec<ToolSpec>,
}

async fn list_tools(State(registry): State<Arc<dyn ToolRegistry>>) -> Response {
    let tools = registry.list_enabled().await;
    json_response(StatusCode::OK, &ListToolsResponse { tools })
}

#[derive(Debug, Deserialize)]
struct CallToolRequest {
    name: String,
    #[serde(default)]
    arguments: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResponse {
    content: Vec<ContentBlock>,
    is_error: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
}

/// Run a tool; tool failures are reported in-band with `isError`, never as a 5xx
async fn call_tool(State(registry): State<Arc<dyn ToolRegistry>>, body: Bytes) -> Result<Response, McpErrorResponse> {
    let request: CallToolRequest =
        serde_json::from_slice(&body).map_err(|e| McpError::InvalidRequest(e.to_string()))?;

    let arguments = request
        .arguments
        .filter(|value| !value.is_null())
        .unwrap_or_else(|| serde_json::json!({}));

    let (text, is_error) = match registry.call(&request.name, arguments).await {
        Ok(output) => (output, false),
        Err(e) => {
            tracing::debug!(tool = %request.name, error = %e, "tool call failed");
            (e.client_message(), true)
        }
    };

    Ok(json_response(
        StatusCode::OK,
        &CallToolResponse {
            content: vec![ContentBlock::Text { text }],
            is_error,
        },
    ))
}

/// Error response wrapper that implements `IntoResponse`
struct McpErrorResponse(McpError);

impl From<McpError> for McpErrorResponse {
    fn from(e: McpError) -> Self {
        Self(e)
    }
}

impl IntoResponse for McpErrorResponse {
    fn into_response(self) -> Response {
        json_error(self.0.status_code(), self.0.error_type(), &self.0.client_message())
    }
}
