//! Session state and the post-handshake protocol seam
//!
//! A [`SessionHandle`] is shared between the connection task, the registry
//! and the routing group the session ends up in. The protocol that runs
//! after the handshake is supplied by the application through
//! [`SessionProtocol`] and classifies the session via [`SessionContext`].

pub mod context;
pub mod protocol;
pub mod state;

pub use context::SessionContext;
pub use protocol::{ProtocolFuture, SessionIo, SessionProtocol};
pub use state::{Membership, SessionHandle, SessionRole};
