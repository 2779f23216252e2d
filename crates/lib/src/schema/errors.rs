//! Error types for schema loading and validation.

use thiserror::Error;

/// Structured error types for schema operations.
///
/// Schema errors are configuration errors: they are raised while a schema is
/// loaded, before any editing session starts, and are never user-recoverable.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No collection with the given slug is loaded
    #[error("Unknown collection: {collection}")]
    UnknownCollection { collection: String },

    /// Two collections share a slug
    #[error("Duplicate collection: {collection}")]
    DuplicateCollection { collection: String },

    /// A field name cannot be used as a path component
    #[error("Invalid field name '{name}' in '{collection}': {reason}")]
    InvalidFieldName {
        collection: String,
        name: String,
        reason: String,
    },

    /// A field kind that needs a name has none
    #[error("{kind} field at '{path}' in '{collection}' needs a name")]
    MissingName {
        collection: String,
        path: String,
        kind: String,
    },

    /// Two fields at the same data level share a name
    #[error("Duplicate field '{path}' in '{collection}'")]
    DuplicateField { collection: String, path: String },

    /// An array or blocks field declares no children
    #[error("Field '{path}' in '{collection}' declares no children")]
    EmptyContainer { collection: String, path: String },

    /// Two block variants of one field share a slug
    #[error("Duplicate block '{block}' in '{collection}.{path}'")]
    DuplicateBlock {
        collection: String,
        path: String,
        block: String,
    },

    /// A relationship targets a collection that is not loaded
    #[error("Field '{path}' in '{collection}' relates to unknown collection '{target}'")]
    UnknownRelationTarget {
        collection: String,
        path: String,
        target: String,
    },

    /// A declared default value does not fit its field
    #[error("Invalid default for '{path}' in '{collection}': {reason}")]
    InvalidDefault {
        collection: String,
        path: String,
        reason: String,
    },

    /// A schema path does not name a field
    #[error("Unknown field '{path}' in '{collection}'")]
    UnknownField { collection: String, path: String },

    /// `useAsTitle` names a field that is not a top-level text field
    #[error("Collection '{collection}' uses unknown field '{field}' as title")]
    InvalidUseAsTitle { collection: String, field: String },
}

impl SchemaError {
    /// Check if this error indicates a collection or field was not found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchemaError::UnknownCollection { .. } | SchemaError::UnknownField { .. }
        )
    }

    /// Get the collection this error refers to
    pub fn collection(&self) -> &str {
        match self {
            SchemaError::UnknownCollection { collection }
            | SchemaError::DuplicateCollection { collection }
            | SchemaError::InvalidFieldName { collection, .. }
            | SchemaError::MissingName { collection, .. }
            | SchemaError::DuplicateField { collection, .. }
            | SchemaError::EmptyContainer { collection, .. }
            | SchemaError::DuplicateBlock { collection, .. }
            | SchemaError::UnknownRelationTarget { collection, .. }
            | SchemaError::InvalidDefault { collection, .. }
            | SchemaError::UnknownField { collection, .. }
            | SchemaError::InvalidUseAsTitle { collection, .. } => collection,
        }
    }
}

impl From<SchemaError> for crate::Error {
    fn from(err: SchemaError) -> Self {
        crate::Error::Schema(err)
    }
}
