//! Tools that ship with the gateway

use async_trait::async_trait;
use indexmap::IndexMap;
use osaurus_config::ToolsConfig;
use serde_json::{Value, json};

use crate::error::McpError;
use crate::registry::{ToolRegistry, ToolSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinTool {
    CurrentTime,
    Echo,
}

impl BuiltinTool {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "current_time" => Some(Self::CurrentTime),
            "echo" => Some(Self::Echo),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::CurrentTime => "current_time",
            Self::Echo => "echo",
        }
    }

    fn spec(self) -> ToolSpec {
        let (description, input_schema) = match self {
            Self::CurrentTime => (
                "Current date and time, optionally in an IANA time zone",
                json!({
                    "type": "object",
                    "properties": {
                        "timezone": {"type": "string", "description": "IANA zone such as Europe/Paris"}
                    }
                }),
            ),
            Self::Echo => (
                "Return the given text unchanged",
                json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }),
            ),
        };

        ToolSpec {
            name: self.name().to_owned(),
            description: description.to_owned(),
            input_schema,
        }
    }

    fn run(self, arguments: &Value) -> Result<String, McpError> {
        match self {
            Self::CurrentTime => {
                let now = jiff::Timestamp::now();
                match arguments.get("timezone").and_then(Value::as_str) {
                    Some(zone) => now
                        .in_tz(zone)
                        .map(|zoned| zoned.to_string())
                        .map_err(|e| McpError::InvalidArguments {
                            tool: self.name().to_owned(),
                            reason: e.to_string(),
                        }),
                    None => Ok(now.to_string()),
                }
            }
            Self::Echo => arguments
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| McpError::InvalidArguments {
                    tool: self.name().to_owned(),
                    reason: "missing string field `text`".to_owned(),
                }),
        }
    }
}

/// Registry of the built-in tools enabled in configuration
#[derive(Debug, Clone)]
pub struct BuiltinToolRegistry {
    tools: IndexMap<&'static str, BuiltinTool>,
}

impl BuiltinToolRegistry {
    /// Enable the configured tools; unknown names are skipped with a warning
    pub fn from_config(config: &ToolsConfig) -> Self {
        let mut tools = IndexMap::new();

        for name in &config.builtin {
            match BuiltinTool::from_name(name) {
                Some(tool) => {
                    tools.insert(tool.name(), tool);
                }
                None => tracing::warn!(tool = %name, "unknown built-in tool, skipping"),
            }
        }

        tracing::debug!(tools = tools.len(), "built-in tools enabled");
        Self { tools }
    }
}

impl Default for BuiltinToolRegistry {
    fn default() -> Self {
        Self::from_config(&ToolsConfig::default())
    }
}

#[async_trait]
impl ToolRegistry for BuiltinToolRegistry {
    async fn list_enabled(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| McpError::ToolNotFound { tool: name.to_owned() })?;

        tool.run(&arguments)
    }
}
