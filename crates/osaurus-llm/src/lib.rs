//! Chat protocol translation for the Osaurus gateway
//!
//! One internal chat model is decoded from and re-encoded to the `OpenAI`,
//! Anthropic, Open Responses and Ollama wire protocols. Streaming responses go
//! through a [`writer::StreamWriter`] per protocol, fed by the
//! [`engine::EngineAdapter`] which normalizes whatever the engine produces into
//! one event sequence.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod chunker;
pub mod convert;
pub mod engine;
pub mod error;
mod handler;
pub mod memory;
pub mod protocol;
mod state;
pub mod types;
pub mod writer;

pub use engine::{ChatEngine, EngineAdapter, EngineError, EngineEvent, EngineOutcome, ModelInfo, UpstreamEngine};
pub use error::LlmError;
pub use handler::llm_router;
pub use memory::{InMemoryMemoryStore, MemoryStore};
pub use state::LlmState;
pub use types::ChatRequest;
