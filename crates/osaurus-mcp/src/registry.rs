use async_trait::async_trait;
use serde::Serialize;

use crate::error::McpError;

/// Tool description as advertised on `/mcp/tools`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub input_schema: serde_json::Value,
}

/// Source of executable tools
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Tools currently enabled, in a stable order
    async fn list_enabled(&self) -> Vec<ToolSpec>;

    /// Run `name` with a JSON object of arguments and return its text output
    async fn call(&self, name: &str, arguments: serde_json::Value) -> Result<String, McpError>;
}
