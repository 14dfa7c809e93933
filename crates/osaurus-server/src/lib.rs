//! HTTP assembly for the Osaurus gateway
//!
//! Every feature router is merged into one route table that sits behind the
//! request dispatcher; the dispatcher is the only layer that sees raw paths.

#![allow(clippy::must_use_candidate)]

mod access_log;
mod cors;
mod dispatch;
mod normalize;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use osaurus_config::Config;
use osaurus_llm::{ChatEngine, EngineAdapter, InMemoryMemoryStore, LlmState, MemoryStore, UpstreamEngine, llm_router};
use osaurus_mcp::{BuiltinToolRegistry, ToolRegistry, mcp_router};
use osaurus_stt::{SttState, Transcriber, stt_router};
use tower_http::trace::TraceLayer;

pub use access_log::{AccessLog, AccessLogRecord, AccessLogSink, TracingSink};
pub use cors::CorsPolicy;
pub use normalize::normalize_path;

use crate::dispatch::Dispatcher;

/// Assembled server with all routes and the dispatcher in front
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    access_log: AccessLog,
}

/// Collaborators injected into a [`Server`]
///
/// Anything left unset is built from the configuration: an upstream engine,
/// an in-process memory store, the built-in tools, and a Whisper transcriber
/// when `stt.base_url` is configured.
pub struct ServerBuilder {
    config: Config,
    engine: Option<Arc<dyn ChatEngine>>,
    memory: Option<Arc<dyn MemoryStore>>,
    tools: Option<Arc<dyn ToolRegistry>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    access_log_sink: Option<Arc<dyn AccessLogSink>>,
}

impl ServerBuilder {
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn ChatEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    #[must_use]
    pub fn memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Arc<dyn ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    #[must_use]
    pub fn access_log_sink(mut self, sink: Arc<dyn AccessLogSink>) -> Self {
        self.access_log_sink = Some(sink);
        self
    }

    /// Assemble routes and start the access log task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Server {
        let Self {
            config,
            engine,
            memory,
            tools,
            transcriber,
            access_log_sink,
        } = self;

        let engine: Arc<dyn ChatEngine> = match engine {
            Some(engine) => engine,
            None => Arc::new(UpstreamEngine::new(&config.engine)),
        };
        let memory: Arc<dyn MemoryStore> = match memory {
            Some(memory) => memory,
            None => Arc::new(InMemoryMemoryStore::from_config(&config.memory)),
        };
        let tools: Arc<dyn ToolRegistry> = match tools {
            Some(tools) => tools,
            None => Arc::new(BuiltinToolRegistry::from_config(&config.tools)),
        };
        let stt_state = match transcriber {
            Some(transcriber) => SttState::new(Some(transcriber), config.stt.default_model.clone()),
            None => SttState::from_config(&config.stt),
        };

        let llm_state = LlmState::new(EngineAdapter::new(engine, memory.clone()), &config.engine);

        let routes = Router::new()
            .merge(routes::gateway_router(memory))
            .merge(llm_router(llm_state))
            .merge(mcp_router(tools))
            .merge(stt_router(stt_state))
            .fallback(routes::not_found)
            .method_not_allowed_fallback(routes::not_found);

        let sink: Arc<dyn AccessLogSink> = match access_log_sink {
            Some(sink) => sink,
            None => Arc::new(TracingSink),
        };
        let access_log = AccessLog::spawn(&config.server.access_log, sink);

        let router = Dispatcher {
            routes,
            cors: Arc::new(CorsPolicy::from_config(&config.server.cors)),
            body_limit: config.server.body_limit_bytes,
            access_log: access_log.clone(),
        }
        .into_router()
        .layer(TraceLayer::new_for_http());

        Server {
            router,
            listen_address: config.server.listen_address(),
            access_log,
        }
    }
}

impl Server {
    /// Start configuring a server
    pub fn builder(config: Config) -> ServerBuilder {
        ServerBuilder {
            config,
            engine: None,
            memory: None,
            tools: None,
            transcriber: None,
            access_log_sink: None,
        }
    }

    /// Build the server with every collaborator derived from configuration
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Access log records dropped so far because the channel was full
    #[must_use]
    pub fn dropped_access_logs(&self) -> u64 {
        self.access_log.dropped()
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered, then lets in-flight
    /// responses finish.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails
    pub async fn serve_on(
        self,
        listener: tokio::net::TcpListener,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
