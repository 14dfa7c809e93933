use http::StatusCode;
use osaurus_core::HttpError;
use thiserror::Error;

/// Tool subsystem errors
#[derive(Debug, Error)]
pub enum McpError {
    /// Body did not decode into a tool call
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No enabled tool has this name
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// Arguments did not match what the tool expects
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Tool execution returned an error
    #[error("tool execution failed: {0}")]
    Execution(String),
}

impl HttpError for McpError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidArguments { .. } => StatusCode::BAD_REQUEST,
            Self::ToolNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::ToolNotFound { .. } => "not_found",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Execution(_) => "execution_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
