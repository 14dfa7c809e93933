//! Scripted chat engine for driving the protocol writers end to end

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use osaurus_llm::engine::DeltaStream;
use osaurus_llm::types::{Completion, FinishReason, ToolInvocation, Usage};
use osaurus_llm::{ChatEngine, ChatRequest, EngineError, ModelInfo};

/// How the engine ends its answer
#[derive(Debug, Clone)]
pub enum Ending {
    Finish,
    Tool(ToolInvocation),
    Fail(String),
}

/// Engine that replays fixed deltas and then ends the way it was told
pub struct ScriptedEngine {
    deltas: Vec<&'static str>,
    ending: Ending,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedEngine {
    pub fn text(deltas: &[&'static str]) -> Arc<Self> {
        Self::new(deltas, Ending::Finish)
    }

    pub fn tool_call(name: &str, arguments: &str) -> Arc<Self> {
        Self::new(&[], Ending::Tool(ToolInvocation::new(name, arguments)))
    }

    pub fn failing_after(deltas: &[&'static str], message: &str) -> Arc<Self> {
        Self::new(deltas, Ending::Fail(message.to_owned()))
    }

    fn new(deltas: &[&'static str], ending: Ending) -> Arc<Self> {
        Arc::new(Self {
            deltas: deltas.to_vec(),
            ending,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Requests the engine received, after memory injection
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn ending_error(&self) -> Option<EngineError> {
        match &self.ending {
            Ending::Finish => None,
            Ending::Tool(invocation) => Some(EngineError::ToolInvocation(invocation.clone())),
            Ending::Fail(message) => Some(EngineError::Failed(message.clone())),
        }
    }
}

#[async_trait]
impl ChatEngine for ScriptedEngine {
    async fn complete(&self, request: ChatRequest) -> Result<Completion, EngineError> {
        self.requests.lock().unwrap().push(request);

        if let Some(error) = self.ending_error() {
            return Err(error);
        }

        Ok(Completion {
            text: self.deltas.concat(),
            usage: Usage {
                prompt_tokens: 7,
                completion_tokens: 3,
            },
            finish_reason: FinishReason::Stop,
        })
    }

    async fn stream(&self, request: ChatRequest) -> Result<DeltaStream, EngineError> {
        self.requests.lock().unwrap().push(request);

        let deltas: Vec<_> = self.deltas.iter().map(|d| Ok((*d).to_owned())).collect();
        let ending = self.ending_error().map(Err);

        Ok(stream::iter(deltas.into_iter().chain(ending)).boxed())
    }

    async fn models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo::new("test-model")]
    }
}
