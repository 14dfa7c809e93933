//! The chat-completion engine boundary
//!
//! [`ChatEngine`] is the external collaborator that actually generates text.
//! Handlers never call it directly; they go through [`EngineAdapter`], which
//! injects memory context and turns every engine outcome into one event
//! vocabulary for the protocol writers.

mod adapter;
mod upstream;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use adapter::{EngineAdapter, EngineEvent, EngineOutcome, EventStream, normalize};
pub use upstream::UpstreamEngine;

use crate::types::{ChatRequest, Completion, ToolInvocation};

/// Lazy, finite sequence of UTF-8 text fragments
///
/// May end early with [`EngineError::ToolInvocation`] in place of a further
/// delta, or with [`EngineError::Failed`].
pub type DeltaStream = BoxStream<'static, Result<String, EngineError>>;

/// What an engine call can signal besides text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The model wants a tool run; not a failure
    #[error("model requested tool `{}`", .0.name)]
    ToolInvocation(ToolInvocation),

    #[error("{0}")]
    Failed(String),
}

/// A model the engine can serve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub family: Option<String>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family: None,
            parameter_size: None,
            quantization_level: None,
        }
    }

    /// Explicit family, else the id up to its first `-`, `:` or `.`
    pub fn family(&self) -> String {
        self.family.clone().unwrap_or_else(|| {
            let base = self.id.rsplit('/').next().unwrap_or(&self.id);
            base.split(['-', ':', '.']).next().unwrap_or(base).to_owned()
        })
    }
}

/// Chat-completion backend
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Produce a whole answer
    async fn complete(&self, request: ChatRequest) -> Result<Completion, EngineError>;

    /// Produce an answer incrementally
    async fn stream(&self, request: ChatRequest) -> Result<DeltaStream, EngineError>;

    /// Models available for `/models`, `/tags` and `/show`
    async fn models(&self) -> Vec<ModelInfo>;
}
