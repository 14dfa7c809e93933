use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Default configuration file, used only when it exists
pub const DEFAULT_CONFIG_PATH: &str = "osaurus.toml";

/// Osaurus protocol gateway
#[derive(Debug, Parser)]
#[command(
    name = "osaurus",
    about = "Serve one local chat engine over the OpenAI, Anthropic, Open Responses and Ollama protocols"
)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "OSAURUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long, env = "OSAURUS_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter in `EnvFilter` syntax
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log: String,
}
