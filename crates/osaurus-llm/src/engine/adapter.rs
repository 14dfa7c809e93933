use std::sync::Arc;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use super::{ChatEngine, DeltaStream, EngineError};
use crate::memory::MemoryStore;
use crate::types::{ChatRequest, Completion, FinishReason, ToolInvocation};

/// One step of a streamed answer, as seen by the protocol writers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Delta(String),
    /// Terminal: the model asked for a tool instead of more text
    ToolCall(ToolInvocation),
    /// Terminal: normal completion
    Finished(FinishReason),
    /// Terminal: generation failed
    Failed(String),
}

impl EngineEvent {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta(_))
    }
}

/// Result of a non-streaming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Completed(Completion),
    ToolInvocation(ToolInvocation),
    Failed(String),
}

/// Event sequence guaranteed to end with exactly one terminal event
pub type EventStream = BoxStream<'static, EngineEvent>;

/// Gateway-side wrapper around the engine
#[derive(Clone)]
pub struct EngineAdapter {
    engine: Arc<dyn ChatEngine>,
    memory: Arc<dyn MemoryStore>,
}

impl EngineAdapter {
    pub fn new(engine: Arc<dyn ChatEngine>, memory: Arc<dyn MemoryStore>) -> Self {
        Self { engine, memory }
    }

    pub fn engine(&self) -> &dyn ChatEngine {
        self.engine.as_ref()
    }

    /// Apply the memory-context rewrite for `agent_id`, if any
    ///
    /// Runs once per request, before the engine sees it.
    pub async fn prepare(&self, mut request: ChatRequest, agent_id: Option<&str>) -> ChatRequest {
        let Some(agent_id) = agent_id else {
            return request;
        };

        let query = request.last_user_text().unwrap_or_default().to_owned();

        if let Some(context) = self.memory.assemble_context(agent_id, &query).await
            && !context.trim().is_empty()
        {
            tracing::debug!(agent_id, context_len = context.len(), "injecting memory context");
            request.prepend_system(&context);
        }

        request
    }

    pub async fn complete(&self, request: ChatRequest) -> EngineOutcome {
        match self.engine.complete(request).await {
            Ok(completion) => EngineOutcome::Completed(completion),
            Err(EngineError::ToolInvocation(invocation)) => EngineOutcome::ToolInvocation(invocation),
            Err(EngineError::Failed(message)) => {
                tracing::warn!(error = %message, "engine completion failed");
                EngineOutcome::Failed(message)
            }
        }
    }

    /// Start a streamed answer; failures to start become a one-event stream
    pub async fn stream(&self, request: ChatRequest) -> EventStream {
        match self.engine.stream(request).await {
            Ok(deltas) => normalize(deltas),
            Err(e) => {
                let event = terminal_event(e);
                if let EngineEvent::Failed(message) = &event {
                    tracing::warn!(error = %message, "engine stream failed to start");
                }
                stream::iter([event]).boxed()
            }
        }
    }

    /// Record a finished exchange into the agent's memory without blocking the caller
    pub fn remember(&self, agent_id: String, user: String, assistant: String) {
        let memory = Arc::clone(&self.memory);

        tokio::spawn(async move {
            memory.record_turn(&agent_id, &user, &assistant).await;
        });
    }
}

fn terminal_event(error: EngineError) -> EngineEvent {
    match error {
        EngineError::ToolInvocation(invocation) => EngineEvent::ToolCall(invocation),
        EngineError::Failed(message) => EngineEvent::Failed(message),
    }
}

/// Fuse raw engine output into an [`EventStream`]
///
/// Empty deltas are dropped. The first tool invocation or error ends the
/// stream, and the engine stream is dropped right there so nothing after it is
/// ever polled. A stream that simply runs out finishes with `stop`.
pub fn normalize(deltas: DeltaStream) -> EventStream {
    stream::unfold(Some(deltas), |state| async move {
        let mut deltas = state?;

        loop {
            let event = match deltas.next().await {
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => return Some((EngineEvent::Delta(text), Some(deltas))),
                Some(Err(e)) => terminal_event(e),
                None => EngineEvent::Finished(FinishReason::Stop),
            };

            return Some((event, None));
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::engine::ModelInfo;
    use crate::memory::InMemoryMemoryStore;
    use crate::types::Message;

    fn deltas(items: Vec<Result<&'static str, EngineError>>) -> DeltaStream {
        stream::iter(items.into_iter().map(|item| item.map(str::to_owned))).boxed()
    }

    #[tokio::test]
    async fn nothing_follows_a_tool_invocation() {
        let invocation = ToolInvocation::new("get_weather", r#"{"city":"Paris"}"#);
        let events: Vec<_> = normalize(deltas(vec![
            Ok("Let me check"),
            Err(EngineError::ToolInvocation(invocation.clone())),
            Ok("never seen"),
        ]))
        .collect()
        .await;

        assert_eq!(
            events,
            vec![
                EngineEvent::Delta("Let me check".to_owned()),
                EngineEvent::ToolCall(invocation),
            ]
        );
    }

    #[tokio::test]
    async fn exhausted_stream_finishes_with_stop() {
        let events: Vec<_> = normalize(deltas(vec![Ok("a"), Ok(""), Ok("b")])).collect().await;

        assert_eq!(
            events,
            vec![
                EngineEvent::Delta("a".to_owned()),
                EngineEvent::Delta("b".to_owned()),
                EngineEvent::Finished(FinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn failure_is_terminal() {
        let events: Vec<_> = normalize(deltas(vec![Err(EngineError::Failed("boom".to_owned())), Ok("x")]))
            .collect()
            .await;

        assert_eq!(events, vec![EngineEvent::Failed("boom".to_owned())]);
        assert!(events[0].is_terminal());
    }

    struct RecordingEngine {
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ChatEngine for RecordingEngine {
        async fn complete(&self, request: ChatRequest) -> Result<Completion, EngineError> {
            self.seen.lock().unwrap().push(request);
            Err(EngineError::Failed("unused".to_owned()))
        }

        async fn stream(&self, _request: ChatRequest) -> Result<DeltaStream, EngineError> {
            Err(EngineError::ToolInvocation(ToolInvocation::new("f", "{}")))
        }

        async fn models(&self) -> Vec<ModelInfo> {
            Vec::new()
        }
    }

    fn adapter(memory: InMemoryMemoryStore) -> EngineAdapter {
        let engine = RecordingEngine {
            seen: Mutex::new(Vec::new()),
        };
        EngineAdapter::new(Arc::new(engine), Arc::new(memory))
    }

    #[tokio::test]
    async fn memory_context_is_injected_only_with_agent_id() {
        let memory = InMemoryMemoryStore::new(8);
        memory.record_turn("agent-1", "I like green tea", "Noted.").await;
        let adapter = adapter(memory);

        let request = ChatRequest::new("m", vec![Message::user("what do I like?")]);

        let untouched = adapter.prepare(request.clone(), None).await;
        assert_eq!(untouched, request);

        let rewritten = adapter.prepare(request.clone(), Some("agent-1")).await;
        assert_eq!(rewritten.messages.len(), 2);
        assert!(rewritten.messages[0].content.contains("I like green tea"));

        let unknown_agent = adapter.prepare(request.clone(), Some("agent-2")).await;
        assert_eq!(unknown_agent, request);
    }

    #[tokio::test]
    async fn stream_start_signal_becomes_single_event() {
        let adapter = adapter(InMemoryMemoryStore::new(8));
        let events: Vec<_> = adapter.stream(ChatRequest::new("m", Vec::new())).await.collect().await;

        assert_eq!(events, vec![EngineEvent::ToolCall(ToolInvocation::new("f", "{}"))]);
    }
}
