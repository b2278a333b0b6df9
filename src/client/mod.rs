//! RTMP client side
//!
//! Connects to a remote RTMP server and completes the handshake, e.g. for
//! relaying a stream between servers.

pub mod config;
pub mod connector;

pub use config::{ClientConfig, RtmpUrl};
pub use connector::RtmpConnector;
