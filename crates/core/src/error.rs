use thiserror::Error;

/// Error kinds surfaced by the kleio crates.
///
/// Composite coordinator operations wrap the failing step in `Create` or
/// `Delete` so callers can reach the underlying fault through `source()`.
/// `InconsistentState` is raised only when a compensating rollback itself
/// failed; the named identifier then requires manual reconciliation.
#[derive(Debug, Error)]
pub enum KleioError {
    #[error("precondition failed: {message}")]
    Precondition { message: String },
    #[error("metadata write rejected: {message}")]
    MetadataWrite { message: String },
    #[error("metadata read failed: {message}")]
    MetadataRead { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("agent call failed: {message}")]
    Agent { message: String },
    #[error("circular dependency detected: {message}")]
    CircularDependency { message: String },
    #[error("reconnection failed: {message}")]
    Reconnection { message: String },
    #[error("inconsistent state for <{identifier}>: {message}")]
    InconsistentState { identifier: String, message: String },
    #[error("config error: {message}")]
    Config { message: String },
    #[error("create failed for <{identifier}>")]
    Create {
        identifier: String,
        #[source]
        source: Box<KleioError>,
    },
    #[error("delete failed for <{identifier}>")]
    Delete {
        identifier: String,
        #[source]
        source: Box<KleioError>,
    },
}

impl KleioError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn metadata_write(message: impl Into<String>) -> Self {
        Self::MetadataWrite {
            message: message.into(),
        }
    }

    pub fn metadata_read(message: impl Into<String>) -> Self {
        Self::MetadataRead {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent {
            message: message.into(),
        }
    }

    pub fn circular(message: impl Into<String>) -> Self {
        Self::CircularDependency {
            message: message.into(),
        }
    }

    pub fn reconnection(message: impl Into<String>) -> Self {
        Self::Reconnection {
            message: message.into(),
        }
    }

    pub fn inconsistent(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InconsistentState {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn create(identifier: impl Into<String>, source: KleioError) -> Self {
        Self::Create {
            identifier: identifier.into(),
            source: Box::new(source),
        }
    }

    pub fn delete(identifier: impl Into<String>, source: KleioError) -> Self {
        Self::Delete {
            identifier: identifier.into(),
            source: Box::new(source),
        }
    }
}

pub type KleioResult<T> = Result<T, KleioError>;
