use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::Transcriber;
use crate::error::{Result, SttError};
use crate::types::{Transcription, TranscriptionRequest};

/// Whisper-compatible HTTP transcription backend
pub struct WhisperTranscriber {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl WhisperTranscriber {
    pub fn new(base_url: Url, api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.filter(|key| !key.expose_secret().is_empty()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.as_str().trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<Transcription> {
        tracing::debug!(
            bytes = request.audio.len(),
            model = %request.model,
            "whisper transcription request"
        );

        let file = reqwest::multipart::Part::stream(request.audio)
            .file_name(request.filename)
            .mime_str(&request.content_type)
            .map_err(|e| SttError::InvalidRequest(format!("invalid content type: {e}")))?;

        // Always ask for the rich shape; the route narrows it afterwards
        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", request.model)
            .text("response_format", "verbose_json");

        if let Some(language) = request.language {
            form = form.text("language", language);
        }
        if let Some(prompt) = request.prompt {
            form = form.text("prompt", prompt);
        }
        if let Some(temperature) = request.temperature {
            form = form.text("temperature", temperature.to_string());
        }

        let mut builder = self.client.post(self.endpoint()).multipart(form);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, "whisper request failed");
            SttError::Connection(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %message, "whisper backend error");

            return Err(match status.as_u16() {
                400 => SttError::InvalidRequest(message),
                code => SttError::Upstream { status: code, message },
            });
        }

        response.json::<Transcription>().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse whisper response");
            SttError::InvalidResponse(e.to_string())
        })
    }
}
