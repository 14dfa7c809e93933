//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use osaurus_config::{AllowList, Config, CorsConfig};
use url::Url;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Loopback listener, CORS off, everything else default
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server.listen_address = Some(SocketAddr::from(([127, 0, 0, 1], 0)));
        config.engine.models = vec!["test-model".to_owned()];

        Self { config }
    }

    /// Allow these origins (`"*"` for any)
    pub fn with_origins(mut self, origins: &[&str]) -> Self {
        self.config.server.cors = CorsConfig {
            allowed_origins: AllowList::from(origins.iter().map(|o| (*o).to_owned()).collect::<Vec<_>>()),
        };
        self
    }

    /// Point the upstream engine at a mock backend
    pub fn with_engine(mut self, base_url: &str) -> Self {
        self.config.engine.base_url = Url::parse(base_url).expect("valid engine URL");
        self
    }

    /// Point the transcription route at a mock Whisper backend
    pub fn with_stt(mut self, base_url: &str) -> Self {
        self.config.stt.base_url = Some(Url::parse(base_url).expect("valid STT URL"));
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.config.server.body_limit_bytes = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
