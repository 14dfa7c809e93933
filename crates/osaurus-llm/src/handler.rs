//! Axum route handlers for the chat and model listing endpoints
//!
//! Every chat route decodes its own wire shape into a [`ChatRequest`] and
//! then shares one path: model resolution, memory injection, and either a
//! streamed answer through the route's [`StreamWriter`] or a single JSON body.

use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Router, routing};
use bytes::Bytes;
use http::StatusCode;
use osaurus_core::{ChatLogDetails, HttpError, PendingChatLog, RequestContext, ToolCallLogEntry, json_response};
use serde::de::DeserializeOwned;

use crate::convert;
use crate::engine::EngineOutcome;
use crate::error::LlmError;
use crate::protocol::anthropic::AnthropicRequest;
use crate::protocol::ollama::{OllamaChatRequest, OllamaError, OllamaShowRequest, OllamaTag, OllamaTagList};
use crate::protocol::openai::{OpenAiModel, OpenAiModelList, OpenAiRequest};
use crate::protocol::responses::ResponsesRequest;
use crate::state::LlmState;
use crate::types::{ChatRequest, Completion, ToolInvocation, Usage, estimate_tokens};
use crate::writer::{
    self, AnthropicWriter, NdjsonWriter, OpenAiWriter, ResponsesWriter, StreamSummary, StreamWriter, Terminal,
    WriterError,
};

/// Build the LLM router with all endpoints
///
/// Paths are the normalized ones; prefixes were stripped before routing.
pub fn llm_router(state: LlmState) -> Router {
    Router::new()
        .route("/models", routing::get(list_models))
        .route("/tags", routing::get(list_tags))
        .route("/show", routing::post(show_model))
        .route("/chat/completions", routing::post(openai_chat_completions))
        .route("/chat", routing::post(ollama_chat))
        .route("/messages", routing::post(anthropic_messages))
        .route("/responses", routing::post(open_responses))
        .with_state(state)
}

/// Wire protocol of the route being served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    OpenAi,
    Anthropic,
    Responses,
    Ollama,
}

impl Protocol {
    /// Error body in this protocol's shape
    fn error_response(self, error: &LlmError) -> Response {
        let status = error.status_code();
        let message = error.client_message();

        match self {
            Self::OpenAi | Self::Responses => json_response(
                status,
                &serde_json::json!({
                    "error": {
                        "message": message,
                        "type": error.error_type(),
                        "code": serde_json::Value::Null,
                    }
                }),
            ),
            Self::Anthropic => json_response(status, &convert::anthropic::error_response(error.error_type(), message)),
            Self::Ollama => json_response(status, &OllamaError { error: message }),
        }
    }

    fn completion_body(self, model: &str, completion: &Completion) -> Response {
        match self {
            Self::OpenAi => json_response(StatusCode::OK, &convert::openai::completion_response(model, completion)),
            Self::Anthropic => json_response(
                StatusCode::OK,
                &convert::anthropic::completion_response(model, completion),
            ),
            Self::Responses => json_response(
                StatusCode::OK,
                &convert::responses::completion_response(model, completion),
            ),
            Self::Ollama => json_response(StatusCode::OK, &convert::ollama::completion_response(model, completion)),
        }
    }

    fn tool_call_body(self, model: &str, invocation: &ToolInvocation, usage: Usage) -> Response {
        match self {
            Self::OpenAi => json_response(
                StatusCode::OK,
                &convert::openai::tool_call_response(model, invocation, usage),
            ),
            Self::Anthropic => json_response(
                StatusCode::OK,
                &convert::anthropic::tool_use_response(model, invocation, usage),
            ),
            Self::Responses => json_response(
                StatusCode::OK,
                &convert::responses::function_call_response(model, invocation, usage),
            ),
            Self::Ollama => json_response(
                StatusCode::OK,
                &convert::ollama::tool_call_response(model, invocation, usage),
            ),
        }
    }
}

/// Per-request streaming knobs that do not survive conversion to [`ChatRequest`]
#[derive(Debug, Clone, Copy, Default)]
struct StreamOptions {
    stream: bool,
    include_usage: bool,
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, LlmError> {
    serde_json::from_slice(body).map_err(|e| LlmError::InvalidRequest(e.to_string()))
}

// -- Chat handlers --

/// Handle `POST /chat/completions`
async fn openai_chat_completions(
    State(state): State<LlmState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    let wire: OpenAiRequest = match decode(&body) {
        Ok(wire) => wire,
        Err(e) => return Protocol::OpenAi.error_response(&e),
    };

    let options = StreamOptions {
        stream: wire.stream.unwrap_or(false) || context.accepts_event_stream,
        include_usage: wire.stream_options.as_ref().is_some_and(|o| o.include_usage),
    };

    chat(state, context, Protocol::OpenAi, wire.into(), options).await
}

/// Handle `POST /messages`
async fn anthropic_messages(
    State(state): State<LlmState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    let wire: AnthropicRequest = match decode(&body) {
        Ok(wire) => wire,
        Err(e) => return Protocol::Anthropic.error_response(&e),
    };

    let options = StreamOptions {
        stream: wire.stream.unwrap_or(false) || context.accepts_event_stream,
        ..StreamOptions::default()
    };

    chat(state, context, Protocol::Anthropic, wire.into(), options).await
}

/// Handle `POST /responses`
async fn open_responses(
    State(state): State<LlmState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    let wire: ResponsesRequest = match decode(&body) {
        Ok(wire) => wire,
        Err(e) => return Protocol::Responses.error_response(&e),
    };

    let options = StreamOptions {
        stream: wire.stream.unwrap_or(false) || context.accepts_event_stream,
        ..StreamOptions::default()
    };

    chat(state, context, Protocol::Responses, wire.into(), options).await
}

/// Handle `POST /chat`, which streams NDJSON unless `"stream": false`
async fn ollama_chat(
    State(state): State<LlmState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    let wire: OllamaChatRequest = match decode(&body) {
        Ok(wire) => wire,
        Err(e) => return Protocol::Ollama.error_response(&e),
    };

    let request = ChatRequest::from(wire);
    let options = StreamOptions {
        stream: request.stream,
        ..StreamOptions::default()
    };

    chat(state, context, Protocol::Ollama, request, options).await
}

async fn chat(
    state: LlmState,
    context: RequestContext,
    protocol: Protocol,
    mut request: ChatRequest,
    options: StreamOptions,
) -> Response {
    if request.messages.is_empty() {
        return protocol.error_response(&LlmError::InvalidRequest("messages must not be empty".to_owned()));
    }

    request.model = state.resolve_model(&request.model).await;
    request.stream = options.stream;

    let user_text = request.last_user_text().map(str::to_owned);
    let request = state
        .adapter()
        .prepare(request, context.agent_id.as_deref())
        .await;

    tracing::debug!(
        model = %request.model,
        protocol = ?protocol,
        stream = options.stream,
        messages = request.messages.len(),
        "chat request"
    );

    let exchange = Exchange {
        state,
        model: request.model.clone(),
        prompt_tokens: request.estimated_input_tokens(),
        agent_id: context.agent_id.clone(),
        user_text,
    };

    if options.stream {
        exchange.stream(context, protocol, request, options).await
    } else {
        exchange.complete(protocol, request).await
    }
}

/// What one chat call needs to remember after the engine answers
struct Exchange {
    state: LlmState,
    model: String,
    prompt_tokens: u32,
    agent_id: Option<String>,
    user_text: Option<String>,
}

impl Exchange {
    async fn complete(self, protocol: Protocol, request: ChatRequest) -> Response {
        let outcome = self.state.adapter().complete(request).await;

        let (mut response, details) = match outcome {
            EngineOutcome::Completed(mut completion) => {
                if completion.usage.prompt_tokens == 0 {
                    completion.usage.prompt_tokens = self.prompt_tokens;
                }
                if completion.usage.completion_tokens == 0 {
                    completion.usage.completion_tokens = estimate_tokens(&completion.text);
                }

                self.remember(&completion.text);

                let details = ChatLogDetails {
                    model: self.model.clone(),
                    prompt_tokens: Some(completion.usage.prompt_tokens),
                    completion_tokens: Some(completion.usage.completion_tokens),
                    tool_calls: Vec::new(),
                    finish_reason: Some(completion.finish_reason.as_str().to_owned()),
                };
                (protocol.completion_body(&self.model, &completion), details)
            }
            EngineOutcome::ToolInvocation(invocation) => {
                let usage = Usage {
                    prompt_tokens: self.prompt_tokens,
                    completion_tokens: estimate_tokens(&invocation.arguments),
                };

                let details = ChatLogDetails {
                    model: self.model.clone(),
                    prompt_tokens: Some(usage.prompt_tokens),
                    completion_tokens: Some(usage.completion_tokens),
                    tool_calls: vec![ToolCallLogEntry::requested(&invocation.name, &invocation.arguments)],
                    finish_reason: Some("tool_calls".to_owned()),
                };
                (protocol.tool_call_body(&self.model, &invocation, usage), details)
            }
            EngineOutcome::Failed(message) => {
                let details = ChatLogDetails {
                    model: self.model.clone(),
                    prompt_tokens: Some(self.prompt_tokens),
                    finish_reason: Some("error".to_owned()),
                    ..ChatLogDetails::default()
                };
                (protocol.error_response(&LlmError::Engine(message)), details)
            }
        };

        response.extensions_mut().insert(details);
        response
    }

    async fn stream(
        self,
        context: RequestContext,
        protocol: Protocol,
        request: ChatRequest,
        options: StreamOptions,
    ) -> Response {
        let events = self.state.adapter().stream(request).await;
        let (sink, body) = writer::channel();
        let sink = Box::new(sink);

        let streaming = &self.state.inner.streaming;
        let mut stream_writer: Box<dyn StreamWriter> = match protocol {
            Protocol::OpenAi => {
                let writer = OpenAiWriter::new(sink, &self.model, streaming.openai_argument_window);
                if options.include_usage {
                    Box::new(writer.with_usage(self.prompt_tokens))
                } else {
                    Box::new(writer)
                }
            }
            Protocol::Anthropic => Box::new(AnthropicWriter::new(
                sink,
                &self.model,
                self.prompt_tokens,
                streaming.anthropic_argument_window,
            )),
            Protocol::Responses => Box::new(ResponsesWriter::new(
                sink,
                &self.model,
                self.prompt_tokens,
                streaming.responses_argument_window,
            )),
            Protocol::Ollama => Box::new(NdjsonWriter::new(sink, &self.model, self.prompt_tokens)),
        };

        let (publish, pending) = PendingChatLog::channel();

        tokio::spawn(async move {
            match writer::drive(stream_writer.as_mut(), events, &context.cors_headers).await {
                Ok(summary) => {
                    if matches!(summary.terminal, Terminal::Finished(_)) && summary.tool_call.is_none() {
                        self.remember(&summary.text);
                    }
                    let _ = publish.send(Some(self.stream_details(&summary)));
                }
                Err(WriterError::Disconnected) => {
                    tracing::debug!(model = %self.model, "client disconnected mid-stream");
                }
                Err(e) => {
                    tracing::warn!(model = %self.model, error = %e, "stream writer failed");
                }
            }
        });

        let mut response = body.into_response().await;
        response.extensions_mut().insert(pending);
        response
    }

    fn stream_details(&self, summary: &StreamSummary) -> ChatLogDetails {
        let arguments = summary
            .tool_call
            .as_ref()
            .map_or("", |call| call.arguments.as_str());

        ChatLogDetails {
            model: self.model.clone(),
            prompt_tokens: Some(self.prompt_tokens),
            completion_tokens: Some(estimate_tokens(&summary.text) + estimate_tokens(arguments)),
            tool_calls: summary
                .tool_call
                .iter()
                .map(|call| ToolCallLogEntry::requested(&call.name, &call.arguments))
                .collect(),
            finish_reason: Some(summary.terminal.finish_reason().as_str().to_owned()),
        }
    }

    /// Store the finished turn for the requesting agent
    fn remember(&self, assistant: &str) {
        if let (Some(agent_id), Some(user)) = (&self.agent_id, &self.user_text)
            && !assistant.is_empty()
        {
            self.state
                .adapter()
                .remember(agent_id.clone(), user.clone(), assistant.to_owned());
        }
    }
}

// -- Model listing --

/// Handle `GET /models`
async fn list_models(State(state): State<LlmState>) -> Response {
    let created = convert::unix_now();

    let data = state
        .models()
        .await
        .into_iter()
        .map(|model| OpenAiModel {
            id: model.id,
            object: "model".to_owned(),
            created,
            owned_by: "osaurus".to_owned(),
        })
        .collect();

    json_response(
        StatusCode::OK,
        &OpenAiModelList {
            object: "list".to_owned(),
            data,
        },
    )
}

/// Handle `GET /tags`
async fn list_tags(State(state): State<LlmState>) -> Response {
    let models = state.models().await.iter().map(OllamaTag::from).collect();
    json_response(StatusCode::OK, &OllamaTagList { models })
}

/// Handle `POST /show`
async fn show_model(State(state): State<LlmState>, body: Bytes) -> Response {
    let request: OllamaShowRequest = match decode(&body) {
        Ok(request) => request,
        Err(e) => return Protocol::Ollama.error_response(&e),
    };

    let Some(name) = request.target() else {
        return Protocol::Ollama.error_response(&LlmError::InvalidRequest("missing model name".to_owned()));
    };

    match state.find_model(name).await {
        Some(model) => json_response(StatusCode::OK, &convert::ollama::show_response(&model)),
        None => Protocol::Ollama.error_response(&LlmError::ModelNotFound(name.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use futures_util::StreamExt;
    use futures_util::stream;
    use http::Request;
    use osaurus_config::EngineConfig;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::{ChatEngine, DeltaStream, EngineAdapter, EngineError, ModelInfo};
    use crate::memory::{InMemoryMemoryStore, MemoryStore};
    use crate::types::FinishReason;

    /// Engine that answers every request with a fixed script
    struct Scripted {
        script: Result<Vec<&'static str>, EngineError>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn text(deltas: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                script: Ok(deltas),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn error(error: EngineError) -> Arc<Self> {
            Arc::new(Self {
                script: Err(error),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatEngine for Scripted {
        async fn complete(&self, request: ChatRequest) -> Result<Completion, EngineError> {
            self.seen.lock().unwrap().push(request);
            let deltas = self.script.clone()?;
            Ok(Completion {
                text: deltas.concat(),
                usage: Usage::default(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn stream(&self, request: ChatRequest) -> Result<DeltaStream, EngineError> {
            self.seen.lock().unwrap().push(request);
            let deltas = self.script.clone()?;
            Ok(stream::iter(deltas.into_iter().map(|d| Ok(d.to_owned()))).boxed())
        }

        async fn models(&self) -> Vec<ModelInfo> {
            vec![ModelInfo::new("llama-3.2-3b-instruct")]
        }
    }

    fn router(engine: Arc<Scripted>, memory: Arc<InMemoryMemoryStore>) -> Router {
        let adapter = EngineAdapter::new(engine, memory);
        llm_router(LlmState::new(adapter, &EngineConfig::default()))
    }

    fn post(path: &str, body: &str, agent: Option<&str>) -> Request<Body> {
        let mut context = RequestContext::empty();
        context.agent_id = agent.map(str::to_owned);

        let mut request = Request::post(path)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap();
        request.extensions_mut().insert(context);
        request
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn malformed_body_gets_protocol_shaped_400() {
        let app = router(Scripted::text(vec![]), Arc::new(InMemoryMemoryStore::new(4)));

        let response = app
            .clone()
            .oneshot(post("/chat/completions", "{not json", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["type"], "invalid_request_error");

        let response = app
            .clone()
            .oneshot(post("/messages", "[]", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["type"], "error");

        let response = app.oneshot(post("/chat", "{}", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn non_streaming_openai_completion() {
        let app = router(Scripted::text(vec!["Hello", " world"]), Arc::new(InMemoryMemoryStore::new(4)));

        let response = app
            .oneshot(post(
                "/chat/completions",
                r#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#,
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let details = response.extensions().get::<ChatLogDetails>().cloned().unwrap();
        assert_eq!(details.model, "m");
        assert_eq!(details.finish_reason.as_deref(), Some("stop"));

        let body = body_json(response).await;
        assert_eq!(body["object"], "chat.completion");
        assert_eq!(body["choices"][0]["message"]["content"], "Hello world");
    }

    #[tokio::test]
    async fn engine_failure_is_500_in_anthropic_shape() {
        let app = router(
            Scripted::error(EngineError::Failed("out of memory".to_owned())),
            Arc::new(InMemoryMemoryStore::new(4)),
        );

        let response = app
            .oneshot(post(
                "/messages",
                r#"{"model":"m","max_tokens":16,"messages":[{"role":"user","content":"hi"}]}"#,
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "api_error");
    }

    #[tokio::test]
    async fn non_streaming_tool_call_is_a_single_block() {
        let invocation = ToolInvocation::new("get_weather", r#"{"city":"Paris"}"#);
        let app = router(
            Scripted::error(EngineError::ToolInvocation(invocation)),
            Arc::new(InMemoryMemoryStore::new(4)),
        );

        let response = app
            .oneshot(post(
                "/responses",
                r#"{"model":"m","input":"weather in Paris?"}"#,
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["output"][0]["type"], "function_call");
        assert_eq!(body["output"][0]["name"], "get_weather");
    }

    #[tokio::test]
    async fn ollama_chat_streams_by_default() {
        let app = router(Scripted::text(vec!["a", "b"]), Arc::new(InMemoryMemoryStore::new(4)));

        let response = app
            .oneshot(post(
                "/chat",
                r#"{"model":"llama3","messages":[{"role":"user","content":"hi"}]}"#,
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.headers()[http::header::CONTENT_TYPE], "application/x-ndjson");
        let pending = response.extensions().get::<PendingChatLog>().cloned().unwrap();

        let text = body_text(response).await;
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().last().unwrap().contains(r#""done":true"#));

        let details = pending.wait().await.unwrap();
        assert_eq!(details.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn agent_turns_are_remembered_and_injected() {
        let memory = Arc::new(InMemoryMemoryStore::new(4));
        let engine = Scripted::text(vec!["Paris"]);
        let app = router(Arc::clone(&engine), Arc::clone(&memory));

        let body = r#"{"model":"m","messages":[{"role":"user","content":"capital of France?"}]}"#;
        let response = app
            .clone()
            .oneshot(post("/chat/completions", body, Some("agent-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Memory is written off the response path
        for _ in 0..50 {
            if !memory.agents().await.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        app.oneshot(post("/chat/completions", body, Some("agent-1")))
            .await
            .unwrap();

        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].messages[0].content.contains("capital of France?"));
    }

    #[tokio::test]
    async fn show_unknown_model_is_404() {
        let app = router(Scripted::text(vec![]), Arc::new(InMemoryMemoryStore::new(4)));

        let response = app
            .clone()
            .oneshot(post("/show", r#"{"name":"missing"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "model 'missing' not found");

        let response = app
            .oneshot(post("/show", r#"{"model":"llama-3.2-3b-instruct"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["details"]["family"], "llama");
    }
}
