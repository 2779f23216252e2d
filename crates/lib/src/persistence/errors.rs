//! Persistence error types.

use thiserror::Error;

use super::DocumentId;
use crate::path::FieldPathBuf;

/// Errors returned by [`Persistence`](super::Persistence) implementations.
///
/// A failed save never applies partially: the editing context keeps its values
/// and stays open for a retry.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PersistenceError {
    /// The backend rejected a field value
    #[error("The following field is invalid: {path} ({reason})")]
    ValidationFailed { path: FieldPathBuf, reason: String },

    /// The backend could not be reached; the request may be retried
    #[error("Network error: {reason}")]
    NetworkError { reason: String },

    /// No document with this id exists in the collection
    #[error("Document {id} not found in '{collection}'")]
    NotFound { collection: String, id: DocumentId },

    /// The backend does not know the collection
    #[error("Unknown collection: {collection}")]
    UnknownCollection { collection: String },
}

impl PersistenceError {
    /// Check if this error is a per-field validation failure
    pub fn is_validation_failed(&self) -> bool {
        matches!(self, PersistenceError::ValidationFailed { .. })
    }

    /// Check if this error is a transient network failure
    pub fn is_network_error(&self) -> bool {
        matches!(self, PersistenceError::NetworkError { .. })
    }

    /// Check if this error indicates a document or collection was not found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PersistenceError::NotFound { .. } | PersistenceError::UnknownCollection { .. }
        )
    }

    /// Get the failing field path of a validation failure
    pub fn field_path(&self) -> Option<&FieldPathBuf> {
        match self {
            PersistenceError::ValidationFailed { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<PersistenceError> for crate::Error {
    fn from(err: PersistenceError) -> Self {
        crate::Error::Persistence(err)
    }
}
