//! Error types
//!
//! A single [`Error`] enum covers transport, handshake framing and session
//! lifecycle failures. Digest mismatches during the handshake and policy
//! rejections are not errors and never show up here.

use std::fmt;
use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Transport failure (reset, short read, refused connect)
    Io(io::Error),
    /// Handshake framing failure
    Handshake(HandshakeError),
    /// Post-handshake protocol misuse
    Protocol(ProtocolError),
    /// A deadline expired (connect or handshake)
    Timeout,
    /// Peer closed the connection
    ConnectionClosed,
    /// Session was closed by the server (e.g. policy rejection)
    SessionClosed,
    /// Listener was disposed while accepting
    ListenerClosed,
    /// Connection refused by the application handler
    Rejected(String),
}

/// Handshake-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Version byte (C0/S0) differs from 3
    InvalidVersion(u8),
    /// Operation called out of order
    InvalidState(&'static str),
}

/// Errors raised while classifying a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Session already carries a role; roles never change
    AlreadyClassified,
    /// Malformed rtmp:// URL
    InvalidUrl(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Handshake(e) => write!(f, "Handshake error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::ConnectionClosed => write!(f, "Connection closed by peer"),
            Error::SessionClosed => write!(f, "Session closed by server"),
            Error::ListenerClosed => write!(f, "Listener closed"),
            Error::Rejected(reason) => write!(f, "Rejected: {}", reason),
        }
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::InvalidVersion(v) => write!(f, "invalid RTMP version {}", v),
            HandshakeError::InvalidState(op) => write!(f, "{} called out of order", op),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::AlreadyClassified => write!(f, "session already classified"),
            ProtocolError::InvalidUrl(url) => write!(f, "invalid RTMP URL: {}", url),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Handshake(e) => Some(e),
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for HandshakeError {}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self {
        Error::Handshake(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}
