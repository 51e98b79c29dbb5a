//! Error types for threadgraph

use thiserror::Error;

/// Result type alias using threadgraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Threadgraph error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Lookup errors (E001-E099)
    #[error("Entity '{name}' not found in thread '{thread_id}'.")]
    EntityNotFound { name: String, thread_id: String },

    #[error("Observation '{observation_id}' not found on entity '{entity}'.")]
    ObservationNotFound {
        entity: String,
        observation_id: String,
    },

    #[error(
        "Observation '{observation_id}' has already been superseded by '{superseded_by}'. Update the current version instead."
    )]
    ObservationSuperseded {
        observation_id: String,
        superseded_by: String,
    },

    // Input errors (E100-E199)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Lock errors (E300-E399)
    #[error("Lock timeout: resource '{0}' is held by another writer. Try again later.")]
    LockTimeout(String),

    // Storage errors (E400-E499)
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a thread-scoped entity lookup failure
    pub fn entity_not_found(name: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            name: name.into(),
            thread_id: thread_id.into(),
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::EntityNotFound { .. } => "E001",
            Self::ObservationNotFound { .. } => "E002",
            Self::ObservationSuperseded { .. } => "E003",
            Self::InvalidInput(_) => "E100",
            Self::LockTimeout(_) => "E300",
            Self::Storage(_) => "E400",
            Self::Serialization(_) => "E401",
            Self::Io(_) => "E9999",
        }
    }

    /// Whether this error is a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound { .. } | Self::ObservationNotFound { .. }
        )
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::EntityNotFound { thread_id, .. } => Some(format!(
                "threadgraph --thread {} read",
                thread_id
            )),
            Self::ObservationNotFound { entity, .. } => {
                Some(format!("threadgraph open {}", entity))
            }
            Self::ObservationSuperseded { superseded_by, .. } => {
                Some(format!("update observation '{}' instead", superseded_by))
            }
            Self::LockTimeout(_) => Some("threadgraph config set locking.timeout_secs 30".to_string()),
            Self::Storage(_) => Some("threadgraph config get storage.memory_dir".to_string()),
            _ => None,
        }
    }
}
