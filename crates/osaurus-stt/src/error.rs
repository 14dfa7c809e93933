use axum::response::{IntoResponse, Response};
use http::StatusCode;
use osaurus_core::{HttpError, json_error};
use thiserror::Error;

pub type Result<T, E = SttError> = std::result::Result<T, E>;

/// Transcription errors
#[derive(Debug, Error)]
pub enum SttError {
    /// No transcription backend is configured
    #[error("audio transcription is not configured")]
    NotConfigured,

    /// Upload was missing a file or carried an unusable field
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Backend could not be reached
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend answered with an error status
    #[error("transcription backend returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Backend answered with a body we could not read
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl HttpError for SttError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Connection(_) | Self::Upstream { .. } | Self::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::NotConfigured => "service_unavailable",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Connection(_) | Self::Upstream { .. } | Self::InvalidResponse(_) => "upstream_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Connection(_) => "failed to reach the transcription backend".to_owned(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for SttError {
    fn into_response(self) -> Response {
        json_error(self.status_code(), self.error_type(), &self.client_message())
    }
}
