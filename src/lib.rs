//! rtmp-hub: RTMP connection acceptance, handshake and stream routing
//!
//! This library provides the front door of an RTMP media server:
//! - Handshake engine for both roles, simple and complex (HMAC-SHA256) modes
//! - TCP acceptor spawning one task per connection
//! - Stream registry mapping stream names to routing groups, with
//!   publish/subscribe admission delegated to an application handler
//!
//! The post-handshake protocol (chunk streams, AMF commands) is plugged in
//! through [`SessionProtocol`].
//!
//! # Example: Server
//!
//! ```no_run
//! use rtmp_hub::registry::Group;
//! use rtmp_hub::session::{ProtocolFuture, SessionContext, SessionHandle, SessionIo, SessionProtocol};
//! use rtmp_hub::{RtmpHandler, RtmpServer, ServerConfig};
//!
//! struct AllowAll;
//!
//! impl RtmpHandler for AllowAll {
//!     fn decide_publish(&self, _session: &SessionHandle, group: &Group) -> bool {
//!         !group.has_publisher()
//!     }
//!
//!     fn decide_subscribe(&self, _session: &SessionHandle, _group: &Group) -> bool {
//!         true
//!     }
//! }
//!
//! struct Chunks;
//!
//! impl SessionProtocol for Chunks {
//!     fn serve<'a>(&'a self, _io: &'a mut dyn SessionIo, _ctx: &'a SessionContext) -> ProtocolFuture<'a> {
//!         Box::pin(async { Ok(()) })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RtmpServer::new(ServerConfig::default(), AllowAll, Chunks);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

// Re-export main types for convenience
pub use client::config::ClientConfig;
pub use client::connector::RtmpConnector;
pub use error::{Error, Result};
pub use registry::{Admission, Group, StreamRegistry};
pub use server::config::ServerConfig;
pub use server::handler::RtmpHandler;
pub use server::listener::RtmpServer;
pub use session::{SessionContext, SessionProtocol};
