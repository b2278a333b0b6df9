//! Registry error types
//!
//! Error types for group membership operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Stream already has a publisher
    StreamAlreadyPublishing(String),
    /// Session is already subscribed to this stream
    AlreadySubscribed { stream: String, session_id: u64 },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::StreamAlreadyPublishing(stream) => {
                write!(f, "Stream already has a publisher: {}", stream)
            }
            RegistryError::AlreadySubscribed { stream, session_id } => {
                write!(f, "Session {} already subscribed to {}", session_id, stream)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
