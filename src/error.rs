//! Error types for the form engine
//!
//! Semantic validation failures are never errors: they travel as messages in
//! `FormState::errors`. The variants here cover infrastructure faults.

use thiserror::Error;

/// Errors raised by the engine and its collaborators
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    /// The validation port itself failed (network fault, crash, ...)
    #[error("validation port failed for {scope}: {message}")]
    PortFailure { scope: String, message: String },

    /// The caller-supplied submit handler failed
    #[error("submit handler failed: {0}")]
    SubmitFailed(String),

    /// Reading or writing a persisted snapshot failed
    #[error("storage {operation} failed for key {key}: {message}")]
    StorageFailure {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// The engine was built without a validation port
    #[error("no validation port configured")]
    MissingValidator,
}

impl FormError {
    /// Wrap a port failure for a single field
    pub fn field_port_failure(name: &str, err: &anyhow::Error) -> Self {
        FormError::PortFailure {
            scope: format!("field '{name}'"),
            message: format!("{err:#}"),
        }
    }

    /// Wrap a port failure for a whole-form validation
    pub fn form_port_failure(err: &anyhow::Error) -> Self {
        FormError::PortFailure {
            scope: "form".to_string(),
            message: format!("{err:#}"),
        }
    }

    /// Whether this error came from the validation port
    pub fn is_port_failure(&self) -> bool {
        matches!(self, FormError::PortFailure { .. })
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, FormError>;
