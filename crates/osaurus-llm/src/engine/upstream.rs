//! `OpenAI`-compatible HTTP backend

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use osaurus_config::EngineConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{ChatEngine, DeltaStream, EngineError, ModelInfo};
use crate::convert::openai::interpret_upstream;
use crate::protocol::openai::{OpenAiModelList, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};
use crate::types::{ChatRequest, Completion, ToolInvocation};

/// Engine that forwards to an `OpenAI`-compatible server (llama.cpp, MLX, vLLM, ...)
pub struct UpstreamEngine {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    models: Vec<String>,
}

impl UpstreamEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.expose_secret().is_empty()),
            models: config.models.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn send(&self, wire: &OpenAiRequest) -> Result<reqwest::Response, EngineError> {
        let mut builder = self.client.post(self.endpoint("chat/completions")).json(wire);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, "engine request failed");
            EngineError::Failed(format!("engine unreachable: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "engine returned error");
            return Err(EngineError::Failed(format!("engine returned {status}: {body}")));
        }

        Ok(response)
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, reqwest::Error> {
        let mut builder = self.client.get(self.endpoint("models"));

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let list: OpenAiModelList = builder.send().await?.error_for_status()?.json().await?;
        Ok(list.data.into_iter().map(|m| ModelInfo::new(m.id)).collect())
    }
}

#[async_trait]
impl ChatEngine for UpstreamEngine {
    async fn complete(&self, request: ChatRequest) -> Result<Completion, EngineError> {
        let mut wire = OpenAiRequest::from(&request);
        wire.stream = None;

        let response: OpenAiResponse = self
            .send(&wire)
            .await?
            .json()
            .await
            .map_err(|e| EngineError::Failed(format!("failed to parse engine response: {e}")))?;

        interpret_upstream(response).map_err(EngineError::ToolInvocation)
    }

    async fn stream(&self, request: ChatRequest) -> Result<DeltaStream, EngineError> {
        let mut wire = OpenAiRequest::from(&request);
        wire.stream = Some(true);

        let events = self
            .send(&wire)
            .await?
            .bytes_stream()
            .eventsource()
            .map(|event| event.map(|e| e.data).map_err(|e| e.to_string()))
            .boxed();

        Ok(upstream_deltas(events))
    }

    async fn models(&self) -> Vec<ModelInfo> {
        if !self.models.is_empty() {
            return self.models.iter().cloned().map(ModelInfo::new).collect();
        }

        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list engine models");
                Vec::new()
            }
        }
    }
}

/// Tool call assembled from streamed fragments
#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn finish(self) -> EngineError {
        EngineError::ToolInvocation(ToolInvocation {
            id: self.id.filter(|id| !id.is_empty()),
            name: self.name,
            arguments: self.arguments,
        })
    }
}

struct UpstreamState {
    events: BoxStream<'static, Result<String, String>>,
    tool: Option<PartialToolCall>,
}

/// Map upstream SSE `data` payloads to text deltas
///
/// Tool-call fragments are buffered and surfaced as one
/// [`EngineError::ToolInvocation`] once the upstream finishes. Only the first
/// tool call is kept; later parallel calls are ignored.
fn upstream_deltas(events: BoxStream<'static, Result<String, String>>) -> DeltaStream {
    stream::unfold(Some(UpstreamState { events, tool: None }), |state| async move {
        let mut state = state?;

        loop {
            let data = match state.events.next().await {
                Some(Ok(data)) => data,
                Some(Err(e)) => return Some((Err(EngineError::Failed(format!("engine stream error: {e}"))), None)),
                None => return state.tool.take().map(|tool| (Err(tool.finish()), None)),
            };

            let data = data.trim();
            if data == "[DONE]" {
                return state.tool.take().map(|tool| (Err(tool.finish()), None));
            }

            let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let Some(message) = upstream_error_message(data) {
                        return Some((Err(EngineError::Failed(message)), None));
                    }
                    tracing::debug!(error = %e, data, "skipping unparseable engine chunk");
                    continue;
                }
            };

            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };

            for call in choice.delta.tool_calls.unwrap_or_default() {
                if call.index != 0 {
                    tracing::debug!(index = call.index, "ignoring parallel tool call");
                    continue;
                }

                let tool = state.tool.get_or_insert_with(PartialToolCall::default);
                if let Some(id) = call.id {
                    tool.id = Some(id);
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        tool.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        tool.arguments.push_str(&arguments);
                    }
                }
            }

            if state.tool.is_some() {
                if choice.finish_reason.is_some() {
                    return state.tool.take().map(|tool| (Err(tool.finish()), None));
                }
                continue;
            }

            if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
                return Some((Ok(text), Some(state)));
            }
        }
    })
    .boxed()
}

/// `{"error": {"message": ...}}` or `{"error": "..."}` payloads some servers send mid-stream
fn upstream_error_message(data: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let error = value.get("error")?;

    error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_owned)
}
