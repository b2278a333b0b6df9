//! RTMP handshake protocol
//!
//! Handshake framing and the HMAC-SHA256 digest scheme of the complex
//! handshake. Everything after the handshake lives outside this crate.

pub mod constants;
pub mod digest;
pub mod handshake;

pub use handshake::{
    client_handshake, server_handshake, HandshakeClient, HandshakeMode, HandshakeRole,
    HandshakeServer,
};
