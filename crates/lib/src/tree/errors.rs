//! Error types for field value operations.

use thiserror::Error;

use super::RowId;
use crate::path::FieldPathBuf;

/// Structured error types for the value tree and its row and tab controllers.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    /// The path has no schema node, or the value's shape disagrees with the node's kind
    #[error("Schema mismatch at '{path}': {reason}")]
    SchemaMismatch { path: FieldPathBuf, reason: String },

    /// The field (or one of its containers) is read-only
    #[error("Field '{path}' is read-only")]
    ReadOnly { path: FieldPathBuf },

    /// No row with the given id exists in the collection
    #[error("Row '{id}' not found in '{path}'")]
    RowNotFound { path: FieldPathBuf, id: RowId },

    /// A row index is past the end of the collection
    #[error("Row index {index} out of range for '{path}' ({len} rows)")]
    IndexOutOfRange {
        path: FieldPathBuf,
        index: usize,
        len: usize,
    },

    /// A block row names a variant its field does not declare
    #[error("Unknown block '{block}' for '{path}'")]
    UnknownBlock { path: FieldPathBuf, block: String },

    /// Adding a row would exceed the field's `maxRows`
    #[error("Field '{path}' allows at most {max} rows")]
    RowLimit { path: FieldPathBuf, max: usize },

    /// Removing a row would go below the field's `minRows`
    #[error("Field '{path}' requires at least {min} rows")]
    MinRows { path: FieldPathBuf, min: usize },

    /// A tab key that the tabs field does not declare
    #[error("Unknown tab '{tab}' for '{path}'")]
    UnknownTab { path: FieldPathBuf, tab: String },
}

impl FieldError {
    pub(crate) fn mismatch(path: impl Into<FieldPathBuf>, reason: impl Into<String>) -> Self {
        FieldError::SchemaMismatch {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error indicates a path or value that disagrees with the schema
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            FieldError::SchemaMismatch { .. } | FieldError::UnknownBlock { .. }
        )
    }

    /// Check if this error indicates a row or tab was not found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FieldError::RowNotFound { .. }
                | FieldError::IndexOutOfRange { .. }
                | FieldError::UnknownTab { .. }
        )
    }

    /// Check if this error was caused by writing a read-only field
    pub fn is_read_only(&self) -> bool {
        matches!(self, FieldError::ReadOnly { .. })
    }

    /// Check if this error was caused by a row count constraint
    pub fn is_row_limit(&self) -> bool {
        matches!(self, FieldError::RowLimit { .. } | FieldError::MinRows { .. })
    }

    /// Get the field path this error refers to
    pub fn path(&self) -> &FieldPathBuf {
        match self {
            FieldError::SchemaMismatch { path, .. }
            | FieldError::ReadOnly { path }
            | FieldError::RowNotFound { path, .. }
            | FieldError::IndexOutOfRange { path, .. }
            | FieldError::UnknownBlock { path, .. }
            | FieldError::RowLimit { path, .. }
            | FieldError::MinRows { path, .. }
            | FieldError::UnknownTab { path, .. } => path,
        }
    }
}

impl From<FieldError> for crate::Error {
    fn from(err: FieldError) -> Self {
        crate::Error::Field(err)
    }
}
