//!
//! Formstack: the field-state and drawer-stack engine behind a document editing admin interface.
//!
//! ## Core Concepts
//!
//! * **Schema (`schema::CollectionSchema`)**: Immutable, recursive field definitions for a collection,
//!   loaded once before any editing session starts.
//! * **Field Value Tree (`tree::FieldValueTree`)**: The in-memory document being edited, shaped by its
//!   schema and addressed with dot/index paths such as `items.0.title`.
//! * **Forms (`form::FormState`)**: A value tree plus its presentation side table (active tabs,
//!   collapsed rows). Row and tab controllers live on this type (`rows`, `tabs`).
//! * **Drawer Stack (`drawer::DrawerStack`)**: An arena of independent editing contexts addressed by
//!   level. Committing a drawer routes its result to the exact field that opened it.
//! * **Relationships (`relationship::Relationships`)**: Inline create, inline edit and browse flows for
//!   relationship and upload fields, built on top of the drawer stack.
//! * **Field Registry (`registry::FieldRegistry`)**: Maps field kinds to controllers and resolves
//!   labels, placeholders and descriptions.
//! * **Persistence (`persistence::Persistence`)**: The async boundary to the document backend, with an
//!   in-memory implementation for development and tests.

pub mod config;
pub mod constants;
pub mod drawer;
pub mod form;
pub mod path;
pub mod persistence;
pub mod registry;
pub mod relationship;
pub mod richtext;
pub mod rows;
pub mod schema;
pub mod tabs;
pub mod tree;

pub use config::EngineConfig;
pub use drawer::DrawerStack;
pub use form::FormState;
pub use path::{FieldPath, FieldPathBuf};
pub use tree::{FieldValueTree, Value};

/// Result type used throughout the Formstack library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Formstack library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured schema errors from the schema module
    #[error(transparent)]
    Schema(schema::SchemaError),

    /// Structured field errors from the tree, rows and tabs modules
    #[error(transparent)]
    Field(tree::FieldError),

    /// Structured drawer stack errors from the drawer module
    #[error(transparent)]
    Drawer(drawer::DrawerError),

    /// Structured backend errors from the persistence module
    #[error(transparent)]
    Persistence(persistence::PersistenceError),

    /// Structured rich text errors from the richtext module
    #[error(transparent)]
    RichText(richtext::RichTextError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
            Error::Schema(_) => "schema",
            Error::Field(_) => "tree",
            Error::Drawer(_) => "drawer",
            Error::Persistence(_) => "persistence",
            Error::RichText(_) => "richtext",
        }
    }

    /// Check if this error indicates a value or path that disagrees with the schema.
    pub fn is_schema_mismatch(&self) -> bool {
        match self {
            Error::Field(field_err) => field_err.is_schema_mismatch(),
            Error::Schema(_) => true,
            _ => false,
        }
    }

    /// Check if this error indicates a drawer was committed or cancelled out of order.
    pub fn is_stack_order_violation(&self) -> bool {
        match self {
            Error::Drawer(drawer_err) => drawer_err.is_stack_order_violation(),
            _ => false,
        }
    }

    /// Check if this error indicates the drawer stack is full.
    pub fn is_depth_exceeded(&self) -> bool {
        match self {
            Error::Drawer(drawer_err) => drawer_err.is_depth_exceeded(),
            _ => false,
        }
    }

    /// Check if this error is a per-field validation failure from the backend.
    pub fn is_validation_failed(&self) -> bool {
        match self {
            Error::Persistence(persistence_err) => persistence_err.is_validation_failed(),
            _ => false,
        }
    }

    /// Check if this error is a transient network failure.
    pub fn is_network_error(&self) -> bool {
        match self {
            Error::Persistence(persistence_err) => persistence_err.is_network_error(),
            _ => false,
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Schema(schema_err) => schema_err.is_not_found(),
            Error::Field(field_err) => field_err.is_not_found(),
            Error::Drawer(drawer_err) => drawer_err.is_not_found(),
            Error::Persistence(persistence_err) => persistence_err.is_not_found(),
            Error::RichText(richtext_err) => richtext_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error was caused by writing to a read-only field.
    pub fn is_read_only(&self) -> bool {
        match self {
            Error::Field(field_err) => field_err.is_read_only(),
            _ => false,
        }
    }

    /// Check if this error was caused by touching a drawer with a save in flight.
    pub fn is_pending(&self) -> bool {
        match self {
            Error::Drawer(drawer_err) => drawer_err.is_pending(),
            _ => false,
        }
    }

    /// Check if this error is a programming error that must never reach the end user.
    pub fn is_programming_error(&self) -> bool {
        self.is_stack_order_violation() || self.is_schema_mismatch()
    }
}
