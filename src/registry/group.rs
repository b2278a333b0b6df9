//! Per-stream routing group
//!
//! A group binds one publisher to any number of subscribers for a single
//! stream name. Media fan-out happens elsewhere; the group only owns the
//! membership and its own start state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::error::RegistryError;
use crate::session::SessionHandle;

/// Lifecycle state of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Created, processing not started yet
    Idle,
    /// Processing started
    Running,
}

#[derive(Debug, Default)]
struct Members {
    publisher: Option<Arc<SessionHandle>>,
    subscribers: HashMap<u64, Arc<SessionHandle>>,
}

/// Routing unit for one stream name
#[derive(Debug)]
pub struct Group {
    app: String,
    stream_name: String,
    running: AtomicBool,
    members: Mutex<Members>,
    created_at: Instant,
}

impl Group {
    /// Create a new, idle group
    pub fn new(app: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            stream_name: stream_name.into(),
            running: AtomicBool::new(false),
            members: Mutex::new(Members::default()),
            created_at: Instant::now(),
        }
    }

    fn members(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Application name of the session that created the group
    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn state(&self) -> GroupState {
        if self.running.load(Ordering::Acquire) {
            GroupState::Running
        } else {
            GroupState::Idle
        }
    }

    /// Start the group if it is idle
    ///
    /// Safe to call any number of times. Returns true only for the call that
    /// performed the `Idle -> Running` transition.
    pub fn ensure_started(&self) -> bool {
        let started = self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if started {
            tracing::debug!(stream = %self.stream_name, app = %self.app, "Group started");
        }
        started
    }

    /// Install `session` as the publisher
    ///
    /// Check-and-set under the group lock: fails if another session already
    /// publishes. Re-adding the current publisher is a no-op.
    pub fn add_publisher(&self, session: &Arc<SessionHandle>) -> Result<(), RegistryError> {
        let mut members = self.members();

        if let Some(current) = &members.publisher {
            if current.id() == session.id() {
                return Ok(());
            }
            return Err(RegistryError::StreamAlreadyPublishing(
                self.stream_name.clone(),
            ));
        }

        members.publisher = Some(Arc::clone(session));
        tracing::info!(
            stream = %self.stream_name,
            session_id = session.id(),
            subscribers = members.subscribers.len(),
            "Publisher registered"
        );
        Ok(())
    }

    /// Remove `session` if it is the current publisher
    ///
    /// Returns false (and changes nothing) for any other session.
    pub fn remove_publisher(&self, session: &SessionHandle) -> bool {
        let mut members = self.members();

        let is_current = members
            .publisher
            .as_ref()
            .is_some_and(|current| current.id() == session.id());
        if !is_current {
            return false;
        }

        members.publisher = None;
        tracing::info!(
            stream = %self.stream_name,
            session_id = session.id(),
            "Publisher removed"
        );
        true
    }

    pub fn add_subscriber(&self, session: &Arc<SessionHandle>) -> Result<(), RegistryError> {
        let mut members = self.members();

        if members.subscribers.contains_key(&session.id()) {
            return Err(RegistryError::AlreadySubscribed {
                stream: self.stream_name.clone(),
                session_id: session.id(),
            });
        }

        members
            .subscribers
            .insert(session.id(), Arc::clone(session));
        tracing::info!(
            stream = %self.stream_name,
            session_id = session.id(),
            subscribers = members.subscribers.len(),
            "Subscriber added"
        );
        Ok(())
    }

    /// Remove a subscriber; unknown sessions are ignored
    pub fn remove_subscriber(&self, session: &SessionHandle) -> bool {
        let mut members = self.members();
        let removed = members.subscribers.remove(&session.id()).is_some();

        if removed {
            tracing::debug!(
                stream = %self.stream_name,
                session_id = session.id(),
                subscribers = members.subscribers.len(),
                "Subscriber removed"
            );
        }
        removed
    }

    /// Check if the group has a publisher
    pub fn has_publisher(&self) -> bool {
        self.members().publisher.is_some()
    }

    pub fn publisher_id(&self) -> Option<u64> {
        self.members().publisher.as_ref().map(|p| p.id())
    }

    /// Get the number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.members().subscribers.len()
    }

    /// Snapshot of the group
    pub fn stats(&self) -> GroupStats {
        let members = self.members();
        GroupStats {
            stream_name: self.stream_name.clone(),
            state: self.state(),
            publisher_id: members.publisher.as_ref().map(|p| p.id()),
            subscriber_count: members.subscribers.len(),
        }
    }
}

/// Statistics for a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStats {
    pub stream_name: String,
    pub state: GroupState,
    pub publisher_id: Option<u64>,
    pub subscriber_count: usize,
}
