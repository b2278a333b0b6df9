//! Application handler trait
//!
//! The handler is the policy side of the server: it decides whether a
//! publisher or subscriber may join a stream and gets notified of session
//! lifecycle events. Decisions are made synchronously while the session
//! waits; keep them cheap.

use crate::protocol::HandshakeMode;
use crate::registry::Group;
use crate::session::SessionHandle;

/// Callbacks invoked by the server
///
/// Only the two decision methods are required; lifecycle hooks default to
/// no-ops.
pub trait RtmpHandler: Send + Sync + 'static {
    /// Called for every accepted TCP connection, before the handshake
    ///
    /// Return false to drop the connection.
    fn on_connection(&self, _session: &SessionHandle) -> bool {
        true
    }

    /// Called once the handshake completed
    fn on_handshake_complete(&self, _session: &SessionHandle, _mode: HandshakeMode) {}

    /// May `session` publish into `group`?
    ///
    /// `group` already exists and may have a publisher; the group itself
    /// still refuses a second publisher if this returns true.
    fn decide_publish(&self, session: &SessionHandle, group: &Group) -> bool;

    /// May `session` play from `group`?
    fn decide_subscribe(&self, session: &SessionHandle, group: &Group) -> bool;

    /// Called after the session was torn down and removed from its group
    fn on_session_end(&self, _session: &SessionHandle) {}
}
