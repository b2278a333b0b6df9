//! RTMP server
//!
//! Accepts TCP connections, runs the handshake and hands each session to the
//! post-handshake protocol with a [`SessionContext`](crate::session::SessionContext)
//! bound to the shared stream registry.

pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;

pub use config::ServerConfig;
pub use handler::RtmpHandler;
pub use listener::RtmpServer;
