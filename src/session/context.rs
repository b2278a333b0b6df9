//! Session context
//!
//! Handed to [`SessionProtocol::serve`](super::SessionProtocol::serve). It is
//! the only way for the protocol to turn a connection into a publisher or a
//! subscriber.

use std::sync::Arc;

use crate::error::Result;
use crate::registry::{Admission, StreamRegistry};
use crate::server::handler::RtmpHandler;
use crate::session::state::{SessionHandle, SessionRole};

/// Context passed to the post-handshake protocol
#[derive(Clone)]
pub struct SessionContext {
    session: Arc<SessionHandle>,
    registry: Arc<StreamRegistry>,
    handler: Arc<dyn RtmpHandler>,
}

impl SessionContext {
    /// Create a new context
    pub fn new(
        session: Arc<SessionHandle>,
        registry: Arc<StreamRegistry>,
        handler: Arc<dyn RtmpHandler>,
    ) -> Self {
        Self {
            session,
            registry,
            handler,
        }
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Classify the session as a publisher and ask the registry to admit it
    ///
    /// On rejection the session is closed; the protocol future will be
    /// dropped shortly after.
    pub async fn publish(&self, app: &str, stream_name: &str) -> Result<Admission> {
        self.session
            .classify(SessionRole::Publisher, app, stream_name)?;
        Ok(self
            .registry
            .admit_publisher(&self.session, self.handler.as_ref())
            .await)
    }

    /// Classify the session as a subscriber and ask the registry to admit it
    pub async fn play(&self, app: &str, stream_name: &str) -> Result<Admission> {
        self.session
            .classify(SessionRole::Subscriber, app, stream_name)?;
        Ok(self
            .registry
            .admit_subscriber(&self.session, self.handler.as_ref())
            .await)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
