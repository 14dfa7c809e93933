//! Mock OpenAI-compatible and Whisper-compatible backends
//!
//! Used to exercise the default upstream engine and transcriber over real
//! HTTP instead of the scripted engine.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use bytes::Bytes;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Mock backend returning predictable completions and transcriptions
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    completion_count: AtomicU32,
    transcription_count: AtomicU32,
}

impl MockUpstream {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            completion_count: AtomicU32::new(0),
            transcription_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/audio/transcriptions", routing::post(handle_transcription))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL including `/v1`, as the engine and transcriber expect
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    pub fn transcription_count(&self) -> u32 {
        self.state.transcription_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_chat_completions(State(state): State<Arc<MockState>>, Json(request): Json<Value>) -> impl IntoResponse {
    state.completion_count.fetch_add(1, Ordering::Relaxed);

    let model = request["model"].as_str().unwrap_or("unknown").to_owned();
    let wants_tool = request["tools"].as_array().is_some_and(|tools| !tools.is_empty());

    if request["stream"].as_bool().unwrap_or(false) {
        return streaming_response(&model, wants_tool).into_response();
    }

    let message = if wants_tool {
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_upstream_1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
            }]
        })
    } else {
        json!({"role": "assistant", "content": "Hello from upstream"})
    };

    Json(json!({
        "id": "chatcmpl-upstream",
        "object": "chat.completion",
        "created": 1_700_000_000u64,
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": if wants_tool { "tool_calls" } else { "stop" }
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

/// SSE body in upstream chunk format
fn streaming_response(model: &str, wants_tool: bool) -> impl IntoResponse {
    let chunk = |delta: Value, finish: Option<&str>| {
        json!({
            "id": "chatcmpl-upstream-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000u64,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish}]
        })
    };

    let mut chunks = vec![chunk(json!({"role": "assistant"}), None)];
    if wants_tool {
        chunks.push(chunk(
            json!({"tool_calls": [{"index": 0, "id": "call_upstream_2", "type": "function",
                "function": {"name": "get_weather", "arguments": ""}}]}),
            None,
        ));
        chunks.push(chunk(
            json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"city\":"}}]}),
            None,
        ));
        chunks.push(chunk(
            json!({"tool_calls": [{"index": 0, "function": {"arguments": "\"Paris\"}"}}]}),
            None,
        ));
        chunks.push(chunk(json!({}), Some("tool_calls")));
    } else {
        for piece in ["Hello", " from", " upstream"] {
            chunks.push(chunk(json!({"content": piece}), None));
        }
        chunks.push(chunk(json!({}), Some("stop")));
    }

    let mut body: String = chunks.iter().map(|c| format!("data: {c}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");

    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn handle_transcription(State(state): State<Arc<MockState>>, body: Bytes) -> impl IntoResponse {
    state.transcription_count.fetch_add(1, Ordering::Relaxed);

    let text = String::from_utf8_lossy(&body);
    if !text.contains("name=\"file\"") || !text.contains("verbose_json") {
        return (StatusCode::BAD_REQUEST, "expected a file part and verbose_json").into_response();
    }

    Json(json!({
        "task": "transcribe",
        "language": "en",
        "duration": 1.5,
        "text": "hello from whisper",
        "segments": [{"id": 0, "start": 0.0, "end": 1.5, "text": "hello from whisper"}]
    }))
    .into_response()
}
