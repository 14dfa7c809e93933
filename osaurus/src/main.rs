#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::path::Path;

use args::{Args, DEFAULT_CONFIG_PATH};
use clap::Parser;
use osaurus_config::Config;
use osaurus_server::Server;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, config_path) = load_config(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_address = Some(listen);
    }

    let _telemetry_guard = osaurus_telemetry::init(config.telemetry.as_ref(), &args.log)?;

    tracing::info!(
        config_path = config_path.as_deref().unwrap_or("<defaults>"),
        listen_address = %config.server.listen_address(),
        "starting osaurus"
    );

    let server = Server::new(config);

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.cancel();
    });

    server.serve(shutdown).await?;

    tracing::info!("osaurus stopped");
    Ok(())
}

/// Load the given file, or `osaurus.toml` if present, or built-in defaults
fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Config, Option<String>)> {
    if let Some(path) = explicit {
        return Ok((Config::load(path)?, Some(path.display().to_string())));
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return Ok((Config::load(default_path)?, Some(DEFAULT_CONFIG_PATH.to_owned())));
    }

    Ok((Config::from_toml("")?, None))
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
