//! RTMP server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};

use crate::error::{Error, Result};
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::handler::RtmpHandler;
use crate::session::{SessionHandle, SessionProtocol};

/// RTMP server
pub struct RtmpServer {
    config: ServerConfig,
    handler: Arc<dyn RtmpHandler>,
    protocol: Arc<dyn SessionProtocol>,
    registry: Arc<StreamRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    disposed: watch::Sender<bool>,
}

impl RtmpServer {
    /// Create a new server with the given configuration, handler and
    /// post-handshake protocol
    pub fn new(
        config: ServerConfig,
        handler: impl RtmpHandler,
        protocol: impl SessionProtocol,
    ) -> Self {
        Self::with_registry(
            config,
            handler,
            protocol,
            Arc::new(StreamRegistry::new()),
        )
    }

    /// Create a new server sharing an existing registry
    pub fn with_registry(
        config: ServerConfig,
        handler: impl RtmpHandler,
        protocol: impl SessionProtocol,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            handler: Arc::new(handler),
            protocol: Arc::new(protocol),
            registry,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            disposed: watch::channel(false).0,
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server
    ///
    /// Binds `config.bind_addr` and accepts until [`dispose`](Self::dispose)
    /// is called, which makes this return [`Error::ListenerClosed`]. A failed
    /// accept ends the loop with that error.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run_on(listener).await
    }

    /// Run the accept loop on an already bound listener
    pub async fn run_on(&self, listener: TcpListener) -> Result<()> {
        let mut disposed = self.disposed.subscribe();
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "RTMP server listening");

        loop {
            tokio::select! {
                _ = wait_disposed(&mut disposed) => {
                    tracing::info!(addr = %addr, "RTMP server disposed");
                    return Err(Error::ListenerClosed);
                }
                accepted = listener.accept() => {
                    let (socket, peer_addr) = accepted.map_err(|e| {
                        tracing::error!(error = %e, "Failed to accept connection");
                        e
                    })?;
                    self.handle_connection(socket, peer_addr);
                }
            }
        }
    }

    /// Run the server with graceful shutdown
    ///
    /// Returns `Ok(())` once `shutdown` resolves. Connections already
    /// accepted keep running.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.run_on(listener) => result,
        }
    }

    /// Close the accept loop
    ///
    /// Safe to call more than once, and before `run`.
    pub fn dispose(&self) {
        self.disposed.send_replace(true);
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let session = Arc::new(SessionHandle::new(session_id, peer_addr));
        let config = self.config.clone();
        let handler = Arc::clone(&self.handler);
        let protocol = Arc::clone(&self.protocol);
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            let _permit = permit;

            let mut connection = Connection::new(
                Arc::clone(&session),
                socket,
                config,
                Arc::clone(&handler),
                protocol,
                Arc::clone(&registry),
            );

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }
            drop(connection);

            registry.release(&session).await;
            handler.on_session_end(&session);

            tracing::debug!(
                session_id = session_id,
                role = ?session.role(),
                duration_ms = session.duration().as_millis() as u64,
                "Connection closed"
            );
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

async fn wait_disposed(rx: &mut watch::Receiver<bool>) {
    // A dropped sender also ends the loop
    let _ = rx.wait_for(|disposed| *disposed).await;
}
