//! Per-agent conversation memory
//!
//! The store is an external collaborator: the gateway only needs it to hand
//! back a context string for an agent and to accept new turns.

use std::fmt::Write as _;

use async_trait::async_trait;
use dashmap::DashMap;
use http::StatusCode;
use jiff::Timestamp;
use osaurus_config::MemoryConfig;
use osaurus_core::HttpError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError for MemoryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

/// One user/assistant exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestTurn {
    pub user: String,
    pub assistant: String,
}

/// Body of `POST /memory/ingest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub agent_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub turns: Vec<IngestTurn>,
    /// ISO date the conversation took place, shown in assembled context
    #[serde(default)]
    pub session_date: Option<String>,
}

/// Entry of `GET /agents`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    pub memory_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Context to prepend to the system prompt, or `None` when there is nothing to add
    async fn assemble_context(&self, agent_id: &str, query: &str) -> Option<String>;

    /// Store a batch of turns, returning how many were kept
    async fn ingest(&self, request: IngestRequest) -> Result<usize, MemoryError>;

    /// Store one exchange observed on a chat route
    async fn record_turn(&self, agent_id: &str, user: &str, assistant: &str);

    /// Agents with at least one stored turn, sorted by id
    async fn agents(&self) -> Vec<AgentSummary>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    user: String,
    assistant: String,
    session_date: Option<String>,
    recorded_at: Timestamp,
}

/// Process-local [`MemoryStore`] keyed by agent id
///
/// Context is recency based: the last `max_context_entries` turns, oldest first.
#[derive(Debug)]
pub struct InMemoryMemoryStore {
    entries: DashMap<String, Vec<MemoryEntry>>,
    max_context_entries: usize,
    enabled: bool,
}

impl InMemoryMemoryStore {
    pub fn new(max_context_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_context_entries,
            enabled: true,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.max_context_entries)
        }
    }

    fn push(&self, agent_id: &str, entries: impl IntoIterator<Item = MemoryEntry>) -> usize {
        let mut slot = self.entries.entry(agent_id.to_owned()).or_default();
        let before = slot.len();
        slot.extend(entries);
        slot.len() - before
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn assemble_context(&self, agent_id: &str, _query: &str) -> Option<String> {
        if !self.enabled || self.max_context_entries == 0 {
            return None;
        }

        let entries = self.entries.get(agent_id)?;
        let skip = entries.len().saturating_sub(self.max_context_entries);

        let mut context = String::from("Relevant memory:");
        for entry in entries.iter().skip(skip) {
            context.push('\n');
            if let Some(date) = &entry.session_date {
                let _ = write!(context, "[{date}] ");
            }
            let _ = write!(context, "User: {}\nAssistant: {}", entry.user, entry.assistant);
        }

        (skip < entries.len()).then_some(context)
    }

    async fn ingest(&self, request: IngestRequest) -> Result<usize, MemoryError> {
        let agent_id = request.agent_id.trim();
        if agent_id.is_empty() {
            return Err(MemoryError::InvalidRequest("agent_id must not be empty".to_owned()));
        }

        let now = Timestamp::now();
        let date = request.session_date;

        let stored = self.push(
            agent_id,
            request
                .turns
                .into_iter()
                .filter(|turn| !turn.user.is_empty() || !turn.assistant.is_empty())
                .map(|turn| MemoryEntry {
                    user: turn.user,
                    assistant: turn.assistant,
                    session_date: date.clone(),
                    recorded_at: now,
                }),
        );

        tracing::debug!(
            agent_id,
            conversation_id = request.conversation_id.as_deref().unwrap_or_default(),
            stored,
            "ingested memory turns"
        );

        Ok(stored)
    }

    async fn record_turn(&self, agent_id: &str, user: &str, assistant: &str) {
        if !self.enabled {
            return;
        }

        self.push(
            agent_id,
            [MemoryEntry {
                user: user.to_owned(),
                assistant: assistant.to_owned(),
                session_date: None,
                recorded_at: Timestamp::now(),
            }],
        );
    }

    async fn agents(&self) -> Vec<AgentSummary> {
        let mut agents: Vec<AgentSummary> = self
            .entries
            .iter()
            .filter(|slot| !slot.value().is_empty())
            .map(|slot| AgentSummary {
                id: slot.key().clone(),
                memory_count: slot.value().len(),
                last_updated: slot.value().iter().map(|e| e.recorded_at).max().map(|t| t.to_string()),
            })
            .collect();

        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest_request(agent_id: &str, turns: &[(&str, &str)]) -> IngestRequest {
        IngestRequest {
            agent_id: agent_id.to_owned(),
            conversation_id: Some("conv-1".to_owned()),
            turns: turns
                .iter()
                .map(|(user, assistant)| IngestTurn {
                    user: (*user).to_owned(),
                    assistant: (*assistant).to_owned(),
                })
                .collect(),
            session_date: Some("2023-05-08".to_owned()),
        }
    }

    #[tokio::test]
    async fn ingest_counts_turns_and_lists_agent() {
        let store = InMemoryMemoryStore::new(8);
        let stored = store
            .ingest(ingest_request("b", &[("hi", "hello"), ("bye", "later")]))
            .await
            .unwrap();
        store.record_turn("a", "q", "r").await;

        assert_eq!(stored, 2);

        let agents = store.agents().await;
        let ids: Vec<_> = agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(agents[1].memory_count, 2);
        assert!(agents[1].last_updated.is_some());
    }

    #[tokio::test]
    async fn empty_agent_id_is_rejected() {
        let store = InMemoryMemoryStore::new(8);
        let err = store.ingest(ingest_request("  ", &[("hi", "hello")])).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn context_keeps_most_recent_entries() {
        let store = InMemoryMemoryStore::new(2);
        store
            .ingest(ingest_request("a", &[("one", "1"), ("two", "2"), ("three", "3")]))
            .await
            .unwrap();

        let context = store.assemble_context("a", "anything").await.unwrap();
        assert!(context.starts_with("Relevant memory:"));
        assert!(!context.contains("User: one"));
        assert!(context.contains("[2023-05-08] User: two\nAssistant: 2"));
        assert!(context.contains("User: three"));
    }

    #[tokio::test]
    async fn disabled_store_returns_no_context() {
        let store = InMemoryMemoryStore::from_config(&MemoryConfig {
            enabled: false,
            ..MemoryConfig::default()
        });
        store.ingest(ingest_request("a", &[("one", "1")])).await.unwrap();

        assert!(store.assemble_context("a", "").await.is_none());
        assert!(store.assemble_context("missing", "").await.is_none());
    }
}
