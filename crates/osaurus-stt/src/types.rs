use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::SttError;

/// One upload to transcribe, following the Whisper API fields
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub audio: Bytes,
    pub filename: String,
    pub content_type: String,
    pub model: String,
    /// ISO 639-1 language hint
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub temperature: Option<f32>,
}

/// Backend result, rich enough for `verbose_json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Audio length in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub segments: Vec<serde_json::Value>,
}

/// Shape of the transcription response body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
    VerboseJson,
}

impl ResponseFormat {
    pub fn parse(value: &str) -> Result<Self, SttError> {
        match value.trim() {
            "" | "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "verbose_json" => Ok(Self::VerboseJson),
            other => Err(SttError::InvalidRequest(format!(
                "unsupported response_format '{other}', expected json, text or verbose_json"
            ))),
        }
    }
}
