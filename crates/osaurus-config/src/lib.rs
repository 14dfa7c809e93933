#![allow(clippy::must_use_candidate)]

pub mod cors;
pub mod engine;
mod env;
mod loader;
pub mod memory;
pub mod server;
pub mod stt;
pub mod telemetry;
pub mod tools;

use serde::Deserialize;

pub use cors::*;
pub use engine::*;
pub use memory::*;
pub use server::*;
pub use stt::*;
pub use telemetry::{ExportProtocol, ExporterConfig, LogFormat, TelemetryConfig};
pub use tools::*;

/// Top-level gateway configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listener, CORS and access-log settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat-completion engine backend
    #[serde(default)]
    pub engine: EngineConfig,
    /// Agent memory
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Audio transcription backend
    #[serde(default)]
    pub stt: SttConfig,
    /// Tools exposed over the MCP routes
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Logging and trace export
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
