//! `MatchServer` builder and accept loop.
//!
//! This is the entry point for running a match server. It ties together
//! all the layers: transport → protocol → connection state machine →
//! match actors.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use rgmatch_game::{Engine, MatchRegistry};
use rgmatch_protocol::Codec;
use rgmatch_transport::{TcpTransport, Transport, TransportError};

use crate::handler::handle_connection;
use crate::{ServerConfig, ServerError};

/// Shared server state passed to each connection task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry synchronizes itself; the connection count is atomic.
pub(crate) struct ServerState<E: Engine, C: Codec> {
    pub(crate) registry: MatchRegistry<E>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    pub(crate) connections: AtomicUsize,
}

/// Builder for configuring and starting a match server.
///
/// # Example
///
/// ```rust,ignore
/// use rgmatch::prelude::*;
///
/// let server = MatchServerBuilder::new()
///     .bind("0.0.0.0", 8007)
///     .max_connections(16)
///     .build(MyEngine, BincodeCodec)
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Clone, Default)]
pub struct MatchServerBuilder {
    config: ServerConfig,
}

impl MatchServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the host and port to bind to and advertise in match URIs.
    pub fn bind(mut self, host: &str, port: u16) -> Self {
        self.config.host = host.to_string();
        self.config.port = port;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the default turn limit for new matches.
    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.config.matches.max_turns = max_turns;
        self
    }

    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.max_frame_len = len;
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build<E: Engine, C: Codec>(
        self,
        engine: E,
        codec: C,
    ) -> Result<MatchServer<E, C>, ServerError> {
        let mut config = self.config;
        let transport = TcpTransport::bind(&config.bind_addr())
            .await?
            .with_max_frame_len(config.max_frame_len);
        config.port = transport
            .local_addr()
            .map_err(TransportError::AcceptFailed)?
            .port();

        let registry = MatchRegistry::new(Arc::new(engine), &config.host, config.port);
        let state = Arc::new(ServerState {
            registry,
            codec,
            config,
            connections: AtomicUsize::new(0),
        });

        Ok(MatchServer { transport, state })
    }
}

/// A bound match server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MatchServer<E: Engine, C: Codec> {
    transport: TcpTransport,
    state: Arc<ServerState<E, C>>,
}

impl<E: Engine, C: Codec> MatchServer<E, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The effective configuration, with the bound port filled in.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// The live match registry.
    pub fn registry(&self) -> &MatchRegistry<E> {
        &self.state.registry
    }

    /// Runs the accept loop.
    ///
    /// Spawns a task per accepted connection. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), ServerError> {
        tracing::info!(
            host = %self.state.config.host,
            port = self.state.config.port,
            max_connections = self.state.config.max_connections,
            "match server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
