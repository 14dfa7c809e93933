//! Test server wrapper that starts Osaurus on a random port

use std::net::SocketAddr;
use std::sync::Arc;

use osaurus_config::Config;
use osaurus_llm::{ChatEngine, InMemoryMemoryStore};
use osaurus_server::Server;
use tokio_util::sync::CancellationToken;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
    memory: Arc<InMemoryMemoryStore>,
}

impl TestServer {
    /// Start a test server answering from `engine`
    ///
    /// Binds to port 0 for automatic port assignment
    pub async fn start(config: Config, engine: Arc<dyn ChatEngine>) -> anyhow::Result<Self> {
        let memory = Arc::new(InMemoryMemoryStore::from_config(&config.memory));
        let server = Server::builder(config).engine(engine).memory(memory.clone()).build();

        Self::run(server, memory).await
    }

    /// Start a test server whose collaborators all come from `config`
    pub async fn start_from_config(config: Config) -> anyhow::Result<Self> {
        let memory = Arc::new(InMemoryMemoryStore::from_config(&config.memory));
        let server = Server::builder(config).memory(memory.clone()).build();

        Self::run(server, memory).await
    }

    async fn run(server: Server, memory: Arc<InMemoryMemoryStore>) -> anyhow::Result<Self> {
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            server.serve_on(listener, shutdown_clone).await.ok();
        });

        let client = reqwest::Client::new();

        Ok(Self {
            addr,
            shutdown,
            client,
            memory,
        })
    }

    /// URL of `path` on the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Memory store shared with the server
    pub fn memory(&self) -> &InMemoryMemoryStore {
        &self.memory
    }

    /// Server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
