//! Shared state for the chat and model routes

use std::sync::Arc;

use osaurus_config::{EngineConfig, StreamingConfig};

use crate::engine::{EngineAdapter, ModelInfo};

/// Shared state for LLM route handlers
#[derive(Clone)]
pub struct LlmState {
    pub(crate) inner: Arc<LlmStateInner>,
}

pub(crate) struct LlmStateInner {
    pub(crate) adapter: EngineAdapter,
    pub(crate) default_model: Option<String>,
    pub(crate) streaming: StreamingConfig,
}

impl LlmState {
    pub fn new(adapter: EngineAdapter, config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(LlmStateInner {
                adapter,
                default_model: config.default_model.clone(),
                streaming: config.streaming.clone(),
            }),
        }
    }

    pub fn adapter(&self) -> &EngineAdapter {
        &self.inner.adapter
    }

    pub async fn models(&self) -> Vec<ModelInfo> {
        self.inner.adapter.engine().models().await
    }

    /// Look a model up by id
    pub async fn find_model(&self, name: &str) -> Option<ModelInfo> {
        self.models().await.into_iter().find(|model| model.id == name)
    }

    /// Model id to hand the engine
    ///
    /// An empty or `default` request resolves to the configured default,
    /// then to the first advertised model. Anything else passes through
    /// untouched; the engine decides whether it exists.
    pub async fn resolve_model(&self, requested: &str) -> String {
        let requested = requested.trim();
        if !requested.is_empty() && requested != "default" {
            return requested.to_owned();
        }

        if let Some(model) = &self.inner.default_model {
            return model.clone();
        }

        self.models()
            .await
            .into_iter()
            .next()
            .map(|model| model.id)
            .unwrap_or_default()
    }
}
