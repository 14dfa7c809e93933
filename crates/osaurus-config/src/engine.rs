use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// OpenAI-compatible backend that performs the actual completions
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Base URL including the version segment (e.g. `http://127.0.0.1:8080/v1`)
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Bearer token sent to the backend
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Model identifiers advertised on the listing routes
    #[serde(default)]
    pub models: Vec<String>,
    /// Model used when a request names none
    #[serde(default)]
    pub default_model: Option<String>,
    /// Argument window sizes for simulated tool-call streaming
    #[serde(default)]
    pub streaming: StreamingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            models: Vec::new(),
            default_model: None,
            streaming: StreamingConfig::default(),
        }
    }
}

/// Byte windows used when replaying tool-call arguments as deltas
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    #[serde(default = "default_openai_window")]
    pub openai_argument_window: usize,
    #[serde(default = "default_narrow_window")]
    pub anthropic_argument_window: usize,
    #[serde(default = "default_narrow_window")]
    pub responses_argument_window: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            openai_argument_window: default_openai_window(),
            anthropic_argument_window: default_narrow_window(),
            responses_argument_window: default_narrow_window(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("http://127.0.0.1:8080/v1").expect("valid default URL")
}

const fn default_openai_window() -> usize {
    1024
}

const fn default_narrow_window() -> usize {
    512
}
