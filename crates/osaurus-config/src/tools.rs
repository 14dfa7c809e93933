use serde::Deserialize;

/// Tools exposed through `/mcp/tools` and `/mcp/call`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Names of enabled built-in tools
    #[serde(default = "default_builtin")]
    pub builtin: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            builtin: default_builtin(),
        }
    }
}

fn default_builtin() -> Vec<String> {
    vec!["current_time".to_owned(), "echo".to_owned()]
}
