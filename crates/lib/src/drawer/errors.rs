//! Drawer stack error types.

use thiserror::Error;

use super::DrawerId;
use crate::path::FieldRef;

/// Errors from drawer stack transitions.
///
/// `StackOrderViolation` is a programming error: only the top drawer can be
/// committed or cancelled, and naming a level below or above it is a violation. `DepthExceeded` is an expected, recoverable condition
/// surfaced to the user as a blocked action.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DrawerError {
    /// Opening another drawer would exceed the configured depth
    #[error("Cannot open more than {max} drawers")]
    DepthExceeded { max: usize },

    /// A level other than the top was committed or cancelled
    #[error("Cannot {operation} drawer at level {level}: level {top} is on top")]
    StackOrderViolation {
        operation: &'static str,
        level: usize,
        top: usize,
    },

    /// The root form cannot be popped
    #[error("The root form cannot be closed")]
    RootLevel,

    /// No context exists at this level
    #[error("No drawer at level {level}")]
    UnknownLevel { level: usize },

    /// The field that opened the drawer no longer exists
    #[error("Origin field {origin} of drawer {drawer} no longer exists")]
    OriginGone { drawer: DrawerId, origin: FieldRef },

    /// Only the top context accepts input
    #[error("Level {level} is not interactive: level {top} is on top")]
    NotInteractive { level: usize, top: usize },

    /// The context has a save in flight
    #[error("Level {level} has a save in flight")]
    Pending { level: usize },

    /// The context is a selection list without a form
    #[error("Level {level} has no form")]
    NoForm { level: usize },

    /// The context is not a selection list
    #[error("Level {level} is not a selection drawer")]
    NotSelecting { level: usize },
}

impl DrawerError {
    /// Check if this error indicates out-of-order commit or cancel
    pub fn is_stack_order_violation(&self) -> bool {
        matches!(self, DrawerError::StackOrderViolation { .. })
    }

    /// Check if this error indicates the stack is full
    pub fn is_depth_exceeded(&self) -> bool {
        matches!(self, DrawerError::DepthExceeded { .. })
    }

    /// Check if this error indicates a missing level or origin
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DrawerError::UnknownLevel { .. } | DrawerError::OriginGone { .. }
        )
    }

    /// Check if this error was caused by a save in flight
    pub fn is_pending(&self) -> bool {
        matches!(self, DrawerError::Pending { .. })
    }
}

impl From<DrawerError> for crate::Error {
    fn from(err: DrawerError) -> Self {
        crate::Error::Drawer(err)
    }
}
