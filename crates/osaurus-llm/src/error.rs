use http::StatusCode;
use osaurus_core::HttpError;
use thiserror::Error;

/// Errors surfaced by the chat routes
#[derive(Debug, Error)]
pub enum LlmError {
    /// Body did not decode into the route's request shape
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Requested model is not served by this gateway
    #[error("model '{0}' not found")]
    ModelNotFound(String),

    /// The engine failed to produce an answer
    #[error("engine error: {0}")]
    Engine(String),
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ModelNotFound(_) => StatusCode::NOT_FOUND,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::ModelNotFound(_) => "not_found_error",
            Self::Engine(_) => "api_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            LlmError::InvalidRequest("x".to_owned()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LlmError::Engine("boom".to_owned()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            LlmError::ModelNotFound("m".to_owned()).client_message(),
            "model 'm' not found"
        );
    }
}
