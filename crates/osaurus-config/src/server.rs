use std::net::SocketAddr;

use serde::Deserialize;

use crate::cors::CorsConfig;

/// Address used when `listen_address` is not configured
pub const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 1337);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_address: Option<SocketAddr>,
    /// Largest request body accepted before answering 413
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub access_log: AccessLogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            body_limit_bytes: default_body_limit(),
            cors: CorsConfig::default(),
            access_log: AccessLogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Configured listen address or the loopback default
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address.unwrap_or(DEFAULT_LISTEN_ADDRESS)
    }
}

/// Per-request access log delivery
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessLogConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Records buffered before new ones are dropped
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
        }
    }
}

const fn default_body_limit() -> usize {
    32 << 20
}

const fn default_enabled() -> bool {
    true
}

const fn default_capacity() -> usize {
    1024
}
