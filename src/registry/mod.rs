//! Stream registry for pub/sub routing
//!
//! The registry maps stream names to routing groups. A group is created the
//! first time a stream name is referenced and lives as long as the registry.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<StreamRegistry>
//!                  ┌─────────────────────────────┐
//!                  │ groups: Mutex<HashMap<      │
//!                  │   stream name, Arc<Group>>> │
//!                  └──────────────┬──────────────┘
//!                                 │ get_or_create()
//!                                 ▼
//!   admit_publisher() ──► RtmpHandler::decide_publish() ──► Group::add_publisher()
//!   admit_subscriber() ─► RtmpHandler::decide_subscribe() ─► Group::add_subscriber()
//! ```
//!
//! The map lock is held only while the map itself is touched. Decision
//! callbacks and group bookkeeping run outside of it, so two publishers
//! racing for the same stream can both reach the callback. The group's
//! `add_publisher` is the single authority on who gets the stream.

pub mod error;
pub mod group;
pub mod store;

pub use error::RegistryError;
pub use group::{Group, GroupState, GroupStats};
pub use store::{Admission, RejectReason, StreamRegistry};
