//! RTMP client connector
//!
//! Opens the TCP connection and performs the client side of the handshake.
//! The connected stream is then handed to whatever speaks the
//! post-handshake protocol.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::time::timeout;

use super::config::{ClientConfig, RtmpUrl};
use crate::error::{Error, Result};
use crate::protocol::client_handshake;

/// A connected, handshaken RTMP client connection
pub struct RtmpConnector {
    config: ClientConfig,
    url: RtmpUrl,
    peer_addr: SocketAddr,
    stream: TcpStream,
}

impl RtmpConnector {
    /// Connect to the server named by `config.url` and run the handshake
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let url = config.parse_url()?;
        let addr = url.addr();

        tracing::debug!(addr = %addr, app = %url.app, "Connecting");

        let mut stream = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout)??;

        if config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }
        let peer_addr = stream.peer_addr()?;

        timeout(config.handshake_timeout, client_handshake(&mut stream))
            .await
            .map_err(|_| Error::Timeout)??;

        tracing::info!(peer = %peer_addr, app = %url.app, "Connected");

        Ok(Self {
            config,
            url,
            peer_addr,
            stream,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Parsed target URL
    pub fn url(&self) -> &RtmpUrl {
        &self.url
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Give up the connector and keep the stream
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;
    use crate::error::ProtocolError;
    use crate::protocol::{server_handshake, HandshakeMode};

    #[tokio::test]
    async fn test_connect_and_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            server_handshake(&mut socket).await.unwrap()
        });

        let config = ClientConfig::new(format!("rtmp://127.0.0.1:{port}/live/abc"));
        let connector = RtmpConnector::connect(config).await.unwrap();

        assert_eq!(connector.peer_addr().port(), port);
        assert_eq!(connector.url().stream_name.as_deref(), Some("abc"));
        assert_eq!(server.await.unwrap(), HandshakeMode::Simple);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Accept but never answer
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let config = ClientConfig::new(format!("rtmp://127.0.0.1:{port}/live"))
            .handshake_timeout(Duration::from_millis(100));
        let result = RtmpConnector::connect(config).await;

        assert!(matches!(result, Err(Error::Timeout)));
        server.abort();
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = RtmpConnector::connect(ClientConfig::new("localhost/live")).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::InvalidUrl(_)))
        ));
    }
}
