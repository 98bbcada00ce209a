//! Store error types.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Username already registered.
    #[error("username already taken: {username}")]
    UsernameTaken { username: String },

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// The acting user may not perform the operation.
    #[error("not authorized to {action}")]
    Unauthorized { action: &'static str },

    /// A field failed validation. Raised before any mutation.
    #[error("{field} {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Capacity cannot shrink below the current member count.
    #[error("capacity {capacity} is below the current member count {joined}")]
    CapacityViolation { capacity: u32, joined: usize },

    /// State directory could not be determined.
    #[error("state directory not found")]
    StateDirNotFound,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(action: &'static str) -> Self {
        Self::Unauthorized { action }
    }

    /// Creates a validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
