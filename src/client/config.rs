//! Client configuration

use std::time::Duration;

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::constants::DEFAULT_PORT;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target URL, `rtmp://host[:port]/app[/stream]`
    pub url: String,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Create a config for `url` with default timeouts
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Parse the configured URL
    pub fn parse_url(&self) -> Result<RtmpUrl> {
        RtmpUrl::parse(&self.url)
    }
}

/// Parsed RTMP URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    pub host: String,
    pub port: u16,
    pub app: String,
    /// Everything after the app segment, if present
    pub stream_name: Option<String>,
}

impl RtmpUrl {
    /// Parse `rtmp://host[:port]/app[/stream]`
    ///
    /// The stream name keeps any further `/` segments and query string.
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || Error::Protocol(ProtocolError::InvalidUrl(url.to_string()));

        let rest = url.strip_prefix("rtmp://").ok_or_else(invalid)?;
        let (authority, path) = rest.split_once('/').ok_or_else(invalid)?;

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (authority, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(invalid());
        }

        let (app, stream_name) = match path.split_once('/') {
            Some((app, stream)) if !stream.is_empty() => (app, Some(stream.to_string())),
            Some((app, _)) => (app, None),
            None => (path, None),
        };
        if app.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
            app: app.to_string(),
            stream_name,
        })
    }

    /// `host:port` suitable for `TcpStream::connect`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
