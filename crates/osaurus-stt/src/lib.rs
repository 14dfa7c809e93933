//! Audio transcription route and its multipart upload boundary

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod error;
pub mod multipart;
mod types;
mod whisper;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use osaurus_config::SttConfig;
use osaurus_core::json_response;

pub use error::{Result, SttError};
pub use types::{ResponseFormat, Transcription, TranscriptionRequest};
pub use whisper::WhisperTranscriber;

const DEFAULT_MODEL: &str = "whisper-1";

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<Transcription>;
}

/// Shared state for the transcription route
#[derive(Clone)]
pub struct SttState {
    transcriber: Option<Arc<dyn Transcriber>>,
    default_model: String,
}

impl SttState {
    pub fn new(transcriber: Option<Arc<dyn Transcriber>>, default_model: Option<String>) -> Self {
        Self {
            transcriber,
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
        }
    }

    /// Whisper backend when `stt.base_url` is set, otherwise a route that answers 503
    pub fn from_config(config: &SttConfig) -> Self {
        let transcriber = config.base_url.clone().map(|base_url| {
            tracing::debug!(%base_url, "transcription backend configured");
            Arc::new(WhisperTranscriber::new(base_url, config.api_key.clone())) as Arc<dyn Transcriber>
        });

        Self::new(transcriber, config.default_model.clone())
    }
}

/// Create the endpoint router for STT
pub fn stt_router(state: SttState) -> Router {
    Router::new()
        .route("/audio/transcriptions", post(transcribe))
        .with_state(state)
}

/// Handle `POST /audio/transcriptions`
async fn transcribe(State(state): State<SttState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let boundary = multipart::boundary(content_type)
        .ok_or_else(|| SttError::InvalidRequest("expected multipart/form-data with a boundary".to_owned()))?;

    let mut form = multipart::parse(&body, &boundary);
    let format = ResponseFormat::parse(form.field("response_format").unwrap_or_default())?;

    let Some(transcriber) = state.transcriber.as_ref() else {
        return Err(SttError::NotConfigured);
    };

    let file = form
        .file
        .take()
        .ok_or_else(|| SttError::InvalidRequest("missing audio file".to_owned()))?;

    let temperature = form
        .field("temperature")
        .map(|t| {
            t.trim()
                .parse::<f32>()
                .map_err(|_| SttError::InvalidRequest(format!("invalid temperature '{t}'")))
        })
        .transpose()?;

    let request = TranscriptionRequest {
        audio: file.data,
        filename: file.filename,
        content_type: file
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_owned()),
        model: form
            .field("model")
            .filter(|m| !m.trim().is_empty())
            .map_or_else(|| state.default_model.clone(), str::to_owned),
        language: form.field("language").map(str::to_owned),
        prompt: form.field("prompt").map(str::to_owned),
        temperature,
    };

    tracing::debug!(model = %request.model, bytes = request.audio.len(), "transcribing upload");
    let transcription = transcriber.transcribe(request).await?;

    Ok(match format {
        ResponseFormat::Json => json_response(
            StatusCode::OK,
            &serde_json::json!({ "text": transcription.text }),
        ),
        ResponseFormat::Text => (
            [(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            transcription.text,
        )
            .into_response(),
        ResponseFormat::VerboseJson => json_response(
            StatusCode::OK,
            &serde_json::json!({
                "task": "transcribe",
                "language": transcription.language,
                "duration": transcription.duration,
                "text": transcription.text,
                "segments": transcription.segments,
            }),
        ),
    })
}
