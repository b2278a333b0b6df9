//! Session state machine
//!
//! Tracks what a connection has become after the handshake and where it
//! stands with the registry.
//!
//! ```text
//! Unclassified ──► Publisher  ──┐
//!      │       ──► Subscriber ──┼──► Deregistered
//!      └─────────► Rejected     │
//! ```
//!
//! `Rejected` and `Deregistered` are terminal and a session never switches
//! between publishing and playing.

use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::{ProtocolError, Result};

/// What the peer asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Handshake done (or pending), no publish/play yet
    Unclassified,
    /// Sending media into a stream
    Publisher,
    /// Receiving media from a stream
    Subscriber,
}

/// Registry membership of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Not registered anywhere
    Unclassified,
    /// Registered as the publisher of its group
    Publisher,
    /// Registered as a subscriber of its group
    Subscriber,
    /// Refused by policy or by the group
    Rejected,
    /// Removed from its group after termination
    Deregistered,
}

#[derive(Debug)]
struct SessionState {
    role: SessionRole,
    membership: Membership,
    app: String,
    stream_name: String,
}

/// Shared handle to one accepted connection
#[derive(Debug)]
pub struct SessionHandle {
    id: u64,
    peer_addr: SocketAddr,
    connected_at: Instant,
    state: Mutex<SessionState>,
    closed: watch::Sender<bool>,
}

impl SessionHandle {
    /// Create a new, unclassified session
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        let (closed, _) = watch::channel(false);

        Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            state: Mutex::new(SessionState {
                role: SessionRole::Unclassified,
                membership: Membership::Unclassified,
                app: String::new(),
                stream_name: String::new(),
            }),
            closed,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Unique session ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn role(&self) -> SessionRole {
        self.state().role
    }

    pub fn membership(&self) -> Membership {
        self.state().membership
    }

    /// Application (namespace) name, empty until classified
    pub fn app(&self) -> String {
        self.state().app.clone()
    }

    /// Stream name, empty until classified
    pub fn stream_name(&self) -> String {
        self.state().stream_name.clone()
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Record what the peer asked for
    ///
    /// Fails if the session already has a role.
    pub fn classify(
        &self,
        role: SessionRole,
        app: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Result<()> {
        let mut state = self.state();
        if state.role != SessionRole::Unclassified || role == SessionRole::Unclassified {
            return Err(ProtocolError::AlreadyClassified.into());
        }

        state.role = role;
        state.app = app.into();
        state.stream_name = stream_name.into();
        Ok(())
    }

    /// Mark the session as registered in its group
    pub(crate) fn mark_registered(&self) {
        let mut state = self.state();
        if state.membership == Membership::Unclassified {
            state.membership = match state.role {
                SessionRole::Publisher => Membership::Publisher,
                SessionRole::Subscriber => Membership::Subscriber,
                SessionRole::Unclassified => Membership::Unclassified,
            };
        }
    }

    pub(crate) fn mark_rejected(&self) {
        let mut state = self.state();
        if state.membership == Membership::Unclassified {
            state.membership = Membership::Rejected;
        }
    }

    /// Returns true if this call performed the transition
    pub(crate) fn mark_deregistered(&self) -> bool {
        let mut state = self.state();
        match state.membership {
            Membership::Publisher | Membership::Subscriber => {
                state.membership = Membership::Deregistered;
                true
            }
            _ => false,
        }
    }

    /// Ask the connection task to drop the connection
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once [`Self::close`] has been called
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
