//! `PlazaServer` builder and accept loop.
//!
//! This is the entry point for running a presence server. It ties together
//! all the layers: transport → protocol → session → room.

use std::sync::Arc;
use std::time::Duration;

use plaza_protocol::{Codec, JsonCodec};
use plaza_room::RoomRegistry;
use plaza_session::{IdentityVerifier, SessionContext, SpaceDirectory};
use plaza_transport::{DEFAULT_HANDSHAKE_TIMEOUT, Handshake, Transport, WebSocketTransport};

use crate::PlazaError;
use crate::config::DEFAULT_BIND_ADDR;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Nothing in
/// here needs a lock: the registry synchronizes itself and the rest is
/// read-only.
pub(crate) struct ServerState<V, D, C> {
    pub(crate) context: Arc<SessionContext<V, D>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a presence server.
///
/// # Example
///
/// ```rust,ignore
/// use plaza::prelude::*;
///
/// let server = PlazaServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(JwtVerifier::hs256(b"secret"), spaces)
///     .await?;
/// server.run().await
/// ```
pub struct PlazaServerBuilder {
    bind_addr: String,
    registry: RoomRegistry,
    handshake_timeout: Duration,
}

impl PlazaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            registry: RoomRegistry::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a new peer gets to complete the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Uses an existing registry instead of a fresh one.
    pub fn registry(mut self, registry: RoomRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<V, D>(
        self,
        verifier: V,
        spaces: D,
    ) -> Result<PlazaServer<V, D, JsonCodec>, PlazaError>
    where
        V: IdentityVerifier,
        D: SpaceDirectory,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_handshake_timeout(self.handshake_timeout);

        let state = Arc::new(ServerState {
            context: Arc::new(SessionContext::new(self.registry, verifier, spaces)),
            codec: JsonCodec,
        });

        Ok(PlazaServer { transport, state })
    }
}

impl Default for PlazaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound presence server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PlazaServer<V, D, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<V, D, C>>,
}

impl PlazaServer<(), (), ()> {
    /// Creates a new builder.
    pub fn builder() -> PlazaServerBuilder {
        PlazaServerBuilder::new()
    }
}

impl<V, D, C> PlazaServer<V, D, C>
where
    V: IdentityVerifier,
    D: SpaceDirectory,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry every session of this server shares.
    pub fn registry(&self) -> &RoomRegistry {
        self.state.context.registry()
    }

    /// Runs the accept loop.
    ///
    /// Spawns one task per accepted peer. The WebSocket upgrade runs on
    /// that task, so a peer that never finishes it only ties up its own
    /// task. Runs until the process is terminated; a failed accept is logged
    /// and the loop keeps going.
    pub async fn run(mut self) -> Result<(), PlazaError> {
        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, "plaza server running"),
            Err(_) => tracing::info!("plaza server running"),
        }

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let conn = match pending.complete().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                        };
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
