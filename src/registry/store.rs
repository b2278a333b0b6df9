//! Stream registry implementation
//!
//! The central registry that owns every routing group and admits sessions
//! into them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::error::RegistryError;
use super::group::Group;
use crate::server::handler::RtmpHandler;
use crate::session::{SessionHandle, SessionRole};

/// Outcome of an admission request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Session was added to its group
    Accepted,
    /// Session was refused and closed
    Rejected(RejectReason),
}

/// Why a session was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The handler's decision callback said no
    Policy,
    /// The group refused the session (e.g. stream already published)
    Conflict(RegistryError),
}

/// Central registry for all routing groups
///
/// A single mutex guards the whole map. It is held only for the lookup or
/// insert, never across a decision callback or I/O.
pub struct StreamRegistry {
    groups: Mutex<HashMap<String, Arc<Group>>>,
}

impl StreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Get the group for `stream_name`, creating it on first use
    ///
    /// The group is keyed by stream name only; `app` is recorded on creation.
    /// Every call makes sure the group is started, which is a no-op for a
    /// running group.
    pub async fn get_or_create(&self, app: &str, stream_name: &str) -> Arc<Group> {
        let group = {
            let mut groups = self.groups.lock().await;
            let group = groups.entry(stream_name.to_string()).or_insert_with(|| {
                tracing::debug!(stream = %stream_name, app = %app, "Group created");
                Arc::new(Group::new(app, stream_name))
            });
            Arc::clone(group)
        };

        group.ensure_started();
        group
    }

    /// Look up a group without creating it
    pub async fn group(&self, stream_name: &str) -> Option<Arc<Group>> {
        self.groups.lock().await.get(stream_name).cloned()
    }

    /// Get total number of groups
    pub async fn stream_count(&self) -> usize {
        self.groups.lock().await.len()
    }

    /// Admit a publishing session into its group
    ///
    /// The handler decides first; the group then enforces a single
    /// publisher. A refused session is closed.
    pub async fn admit_publisher(
        &self,
        session: &Arc<SessionHandle>,
        handler: &dyn RtmpHandler,
    ) -> Admission {
        let group = self
            .get_or_create(&session.app(), &session.stream_name())
            .await;

        if !handler.decide_publish(session, &group) {
            tracing::warn!(
                stream = %group.stream_name(),
                session_id = session.id(),
                "Publish rejected by handler, closing session"
            );
            return reject(session, RejectReason::Policy);
        }

        match group.add_publisher(session) {
            Ok(()) => {
                session.mark_registered();
                Admission::Accepted
            }
            Err(e) => {
                tracing::warn!(
                    session_id = session.id(),
                    error = %e,
                    "Publish refused, closing session"
                );
                reject(session, RejectReason::Conflict(e))
            }
        }
    }

    /// Admit a playing session into its group
    ///
    /// Refused subscribers are closed, same as publishers.
    pub async fn admit_subscriber(
        &self,
        session: &Arc<SessionHandle>,
        handler: &dyn RtmpHandler,
    ) -> Admission {
        let group = self
            .get_or_create(&session.app(), &session.stream_name())
            .await;

        if !handler.decide_subscribe(session, &group) {
            tracing::warn!(
                stream = %group.stream_name(),
                session_id = session.id(),
                "Play rejected by handler, closing session"
            );
            return reject(session, RejectReason::Policy);
        }

        match group.add_subscriber(session) {
            Ok(()) => {
                session.mark_registered();
                Admission::Accepted
            }
            Err(e) => {
                tracing::warn!(
                    session_id = session.id(),
                    error = %e,
                    "Play refused, closing session"
                );
                reject(session, RejectReason::Conflict(e))
            }
        }
    }

    /// Remove a publisher from its group
    ///
    /// Sessions that never made it into the group are ignored.
    pub async fn remove_publisher(&self, session: &SessionHandle) {
        let group = self
            .get_or_create(&session.app(), &session.stream_name())
            .await;
        group.remove_publisher(session);
        session.mark_deregistered();
    }

    /// Remove a subscriber from its group
    pub async fn remove_subscriber(&self, session: &SessionHandle) {
        let group = self
            .get_or_create(&session.app(), &session.stream_name())
            .await;
        group.remove_subscriber(session);
        session.mark_deregistered();
    }

    /// Tear down whatever membership a terminated session has
    ///
    /// Unclassified sessions were never registered and are left alone.
    pub async fn release(&self, session: &SessionHandle) {
        match session.role() {
            SessionRole::Unclassified => {}
            SessionRole::Publisher => self.remove_publisher(session).await,
            SessionRole::Subscriber => self.remove_subscriber(session).await,
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn reject(session: &SessionHandle, reason: RejectReason) -> Admission {
    session.mark_rejected();
    session.close();
    Admission::Rejected(reason)
}
