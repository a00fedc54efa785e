//! The acceptor and the wiring that turns sockets into sessions.
//!
//! [`Server::bind`] opens the listener and builds the shared
//! [`ServerContext`]; [`Server::run`] accepts connections and spawns the
//! reader/writer task pair for each (see [`connection`]). A
//! `tokio::sync::watch` shutdown signal fans out to every task; each
//! observes it at its next frame boundary, flushes a pending Disconnect,
//! and closes.

pub(crate) mod connection;
pub(crate) mod handler;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use hearth_core::codec::buffer::BufferPool;

use crate::auth::{KeyError, OfflineVerifier, ServerKeyPair, SessionVerifier};
use crate::bridge::{DefaultEventSink, DefaultHandler, EventSink, FlatWorld, InboundHandler, WorldSource};
use crate::config::ServerConfig;
use crate::net::session::SessionManager;

/// Monotonically increasing per-process connection identifier.
pub type ConnectionId = u64;

/// Fatal initialisation failures. Anything here exits the process with
/// status 1.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind TCP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("accept loop failed: {0}")]
    Accept(#[source] std::io::Error),
}

/// Everything a connection task needs a handle on.
pub struct ServerContext {
    pub config: ServerConfig,
    pub sessions: SessionManager,
    pub verifier: Arc<dyn SessionVerifier>,
    pub events: Arc<dyn EventSink>,
    pub world: Arc<dyn WorldSource>,
    pub handler: Arc<dyn InboundHandler>,
    pub keys: ServerKeyPair,
    pub pool: BufferPool,
}

/// Collaborator overrides for [`Server::bind`]. Fields left `None` get
/// the crate defaults: offline verification, a flat world, a logging
/// event sink, and the default gameplay handler.
#[derive(Default)]
pub struct Collaborators {
    pub verifier: Option<Arc<dyn SessionVerifier>>,
    pub events: Option<Arc<dyn EventSink>>,
    pub world: Option<Arc<dyn WorldSource>>,
    pub handler: Option<Arc<dyn InboundHandler>>,
}

/// The bound, not-yet-running server.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: Arc<ServerContext>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Triggers a graceful shutdown from outside the accept loop.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

impl Server {
    /// Generates the login keypair, binds the configured port, and
    /// assembles the shared context.
    ///
    /// # Errors
    ///
    /// [`ServerError::Key`] when keypair generation fails and
    /// [`ServerError::Bind`] when the port cannot be bound; both are
    /// fatal at startup.
    pub async fn bind(
        config: ServerConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ServerError> {
        let keys = ServerKeyPair::generate()?;
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .map_err(|source| ServerError::Bind {
                port: config.port,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            port: config.port,
            source,
        })?;

        let sessions = SessionManager::new(config.max_players);
        let events = collaborators.events.unwrap_or_else(|| {
            Arc::new(DefaultEventSink {
                motd: config.motd.clone(),
                max_players: config.max_players,
            })
        });
        let ctx = Arc::new(ServerContext {
            sessions,
            verifier: collaborators
                .verifier
                .unwrap_or_else(|| Arc::new(OfflineVerifier)),
            events,
            world: collaborators
                .world
                .unwrap_or_else(|| Arc::new(FlatWorld::default())),
            handler: collaborators
                .handler
                .unwrap_or_else(|| Arc::new(DefaultHandler)),
            keys,
            pool: BufferPool::new(),
            config,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            listener,
            local_addr,
            ctx,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    /// The address actually bound; port 0 in the config resolves here.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that stops [`run`](Self::run) and closes every session.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Accepts connections until the shutdown signal fires.
    ///
    /// Accept errors on individual connections are logged and survived;
    /// only a dead listener stops the loop.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            local_addr,
            ctx,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;
        info!(addr = %local_addr, "listening");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("shutdown signal received; closing sessions");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            connection::spawn_connection(
                                Arc::clone(&ctx),
                                stream,
                                addr,
                                shutdown_rx.clone(),
                            );
                        }
                        Err(e) if is_transient_accept_error(&e) => {
                            warn!("transient accept failure: {e}");
                        }
                        Err(e) => {
                            error!("listener failed: {e}");
                            return Err(ServerError::Accept(e));
                        }
                    }
                }
            }
        }

        // Give connections one frame boundary to flush their farewells.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        Ok(())
    }
}

/// Per-connection accept failures that do not indicate a dead listener.
fn is_transient_accept_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}
