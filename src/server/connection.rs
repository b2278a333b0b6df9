//! Per-connection RTMP handler
//!
//! Manages the lifecycle of a single connection:
//! 1. Connection check with the handler
//! 2. Handshake (bounded by `handshake_timeout`)
//! 3. Post-handshake protocol, until the peer leaves or the session is closed
//!
//! Registry teardown happens in the listener once `run` returns.

use std::sync::Arc;

use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{server_handshake, HandshakeMode};
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::server::handler::RtmpHandler;
use crate::session::{SessionContext, SessionHandle, SessionIo, SessionProtocol};

/// Per-connection handler
pub struct Connection<S> {
    session: Arc<SessionHandle>,
    io: S,
    config: ServerConfig,
    handler: Arc<dyn RtmpHandler>,
    protocol: Arc<dyn SessionProtocol>,
    registry: Arc<StreamRegistry>,
}

impl<S: SessionIo> Connection<S> {
    /// Create a new connection handler
    pub fn new(
        session: Arc<SessionHandle>,
        io: S,
        config: ServerConfig,
        handler: Arc<dyn RtmpHandler>,
        protocol: Arc<dyn SessionProtocol>,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        Self {
            session,
            io,
            config,
            handler,
            protocol,
            registry,
        }
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    /// Run the connection
    pub async fn run(&mut self) -> Result<()> {
        // Check if handler allows connection
        if !self.handler.on_connection(&self.session) {
            return Err(Error::Rejected("Connection rejected by handler".into()));
        }

        let mode = self.do_handshake().await?;
        self.handler.on_handshake_complete(&self.session, mode);

        let ctx = SessionContext::new(
            Arc::clone(&self.session),
            Arc::clone(&self.registry),
            Arc::clone(&self.handler),
        );

        let Self {
            session,
            io,
            protocol,
            ..
        } = self;

        tokio::select! {
            result = protocol.serve(io, &ctx) => result,
            _ = session.closed() => {
                tracing::debug!(session_id = session.id(), "Session closed by server");
                Err(Error::SessionClosed)
            }
        }
    }

    /// Perform RTMP handshake
    async fn do_handshake(&mut self) -> Result<HandshakeMode> {
        let mode = timeout(self.config.handshake_timeout, server_handshake(&mut self.io))
            .await
            .map_err(|_| Error::Timeout)??;

        tracing::debug!(
            session_id = self.session.id(),
            mode = ?mode,
            "Handshake complete"
        );
        Ok(mode)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::protocol::{client_handshake, HandshakeClient};
    use crate::registry::{Admission, Group};
    use crate::session::{ProtocolFuture, SessionRole};

    struct DenyPublish;

    impl RtmpHandler for DenyPublish {
        fn decide_publish(&self, _session: &SessionHandle, _group: &Group) -> bool {
            false
        }

        fn decide_subscribe(&self, _session: &SessionHandle, _group: &Group) -> bool {
            true
        }
    }

    /// Reads one byte: b'P' publishes "abc", b'S' plays "abc". Then echoes
    /// until EOF.
    struct OneByteCommands;

    impl SessionProtocol for OneByteCommands {
        fn serve<'a>(
            &'a self,
            io: &'a mut dyn SessionIo,
            ctx: &'a SessionContext,
        ) -> ProtocolFuture<'a> {
            Box::pin(async move {
                let mut cmd = [0u8; 1];
                io.read_exact(&mut cmd).await?;
                let admission = match cmd[0] {
                    b'P' => ctx.publish("live", "abc").await?,
                    _ => ctx.play("live", "abc").await?,
                };
                if admission == Admission::Accepted {
                    io.write_all(&[1]).await?;
                }

                let mut buf = [0u8; 64];
                loop {
                    let n = io.read(&mut buf).await?;
                    if n == 0 {
                        return Ok(());
                    }
                    io.write_all(&buf[..n]).await?;
                }
            })
        }
    }

    fn connection(
        io: tokio::io::DuplexStream,
        config: ServerConfig,
        registry: &Arc<StreamRegistry>,
    ) -> Connection<tokio::io::DuplexStream> {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        Connection::new(
            Arc::new(SessionHandle::new(1, addr)),
            io,
            config,
            Arc::new(DenyPublish),
            Arc::new(OneByteCommands),
            Arc::clone(registry),
        )
    }

    #[tokio::test]
    async fn test_subscriber_runs_until_eof() {
        let registry = Arc::new(StreamRegistry::new());
        let (mut client, server_io) = tokio::io::duplex(16 * 1024);
        let mut conn = connection(server_io, ServerConfig::default(), &registry);
        let session = Arc::clone(conn.session());

        let task = tokio::spawn(async move { conn.run().await });

        client_handshake(&mut client).await.unwrap();
        client.write_all(b"S").await.unwrap();
        let mut status = [0u8; 1];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status[0], 1);

        client.write_all(b"hi").await.unwrap();
        let mut echo = [0u8; 2];
        client.read_exact(&mut echo).await.unwrap();
        assert_eq!(&echo, b"hi");

        drop(client);
        task.await.unwrap().unwrap();
        assert_eq!(session.role(), SessionRole::Subscriber);
    }

    #[tokio::test]
    async fn test_rejected_publisher_is_closed() {
        let registry = Arc::new(StreamRegistry::new());
        let (mut client, server_io) = tokio::io::duplex(16 * 1024);
        let mut conn = connection(server_io, ServerConfig::default(), &registry);

        let task = tokio::spawn(async move { conn.run().await });

        client_handshake(&mut client).await.unwrap();
        client.write_all(b"P").await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::SessionClosed)));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let registry = Arc::new(StreamRegistry::new());
        let (_client, server_io) = tokio::io::duplex(16 * 1024);
        let config = ServerConfig::default().handshake_timeout(Duration::from_millis(50));
        let mut conn = connection(server_io, config, &registry);

        let result = conn.run().await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(conn.session().role(), SessionRole::Unclassified);
    }

    /// Refuses every connection when `refuse` is set, records handshake
    /// modes otherwise
    #[derive(Default)]
    struct Gate {
        refuse: bool,
        modes: std::sync::Mutex<Vec<HandshakeMode>>,
    }

    impl RtmpHandler for Gate {
        fn on_connection(&self, _session: &SessionHandle) -> bool {
            !self.refuse
        }

        fn on_handshake_complete(&self, _session: &SessionHandle, mode: HandshakeMode) {
            self.modes.lock().unwrap().push(mode);
        }

        fn decide_publish(&self, _session: &SessionHandle, _group: &Group) -> bool {
            true
        }

        fn decide_subscribe(&self, _session: &SessionHandle, _group: &Group) -> bool {
            true
        }
    }

    fn gated(
        io: tokio::io::DuplexStream,
        handler: &Arc<Gate>,
    ) -> Connection<tokio::io::DuplexStream> {
        let addr: SocketAddr = "127.0.0.1:50001".parse().unwrap();
        Connection::new(
            Arc::new(SessionHandle::new(7, addr)),
            io,
            ServerConfig::default(),
            Arc::clone(handler) as Arc<dyn RtmpHandler>,
            Arc::new(OneByteCommands),
            Arc::new(StreamRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_refused_connection_gets_no_handshake() {
        let handler = Arc::new(Gate {
            refuse: true,
            ..Default::default()
        });
        let (mut client, server_io) = tokio::io::duplex(16 * 1024);
        let mut conn = gated(server_io, &handler);

        client
            .write_all(&HandshakeClient::new().c0c1())
            .await
            .unwrap();

        let result = conn.run().await;
        assert!(matches!(result, Err(Error::Rejected(_))));
        drop(conn);

        // Nothing was written back, not even S0
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
        assert!(handler.modes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handshake_complete_reports_mode() {
        let handler = Arc::new(Gate::default());
        let (mut client, server_io) = tokio::io::duplex(16 * 1024);
        let mut conn = gated(server_io, &handler);

        let task = tokio::spawn(async move { conn.run().await });

        client_handshake(&mut client).await.unwrap();
        client.write_all(b"S").await.unwrap();
        let mut status = [0u8; 1];
        client.read_exact(&mut status).await.unwrap();
        drop(client);
        task.await.unwrap().unwrap();

        assert_eq!(*handler.modes.lock().unwrap(), vec![HandshakeMode::Simple]);
    }

    #[tokio::test]
    async fn test_bad_version_fails_handshake() {
        let registry = Arc::new(StreamRegistry::new());
        let (mut client, server_io) = tokio::io::duplex(16 * 1024);
        let mut conn = connection(server_io, ServerConfig::default(), &registry);

        let task = tokio::spawn(async move { conn.run().await });
        client.write_all(&[6u8; 1537]).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::Handshake(_))));
        assert_eq!(registry.stream_count().await, 0);
    }
}
