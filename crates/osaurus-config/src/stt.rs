use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Audio transcription backend
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SttConfig {
    /// Whisper-compatible base URL; transcription is unavailable when unset
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Bearer token sent to the backend
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Model used when the upload does not name one
    #[serde(default)]
    pub default_model: Option<String>,
}
