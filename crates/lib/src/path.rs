//! Path types for addressing values inside a form tree.
//!
//! Field paths are dot separated and index qualified: `items.0.title` names the
//! `title` field of the first row of the `items` array. The [`FieldPath`] /
//! [`FieldPathBuf`] pair follows the same borrowed/owned pattern as
//! `std::path::Path` / `std::path::PathBuf`.
//!
//! Index paths are positional and change when rows move. [`FieldRef`] is the
//! stable counterpart: it records row ids instead of indexes and is resolved back
//! to a [`FieldPathBuf`] against the live tree when it is needed.
//!
//! # Usage
//!
//! ```rust
//! use formstack::path::FieldPathBuf;
//!
//! let path = FieldPathBuf::new().push("items").push_index(0).push("title");
//! assert_eq!(path.as_str(), "items.0.title");
//! assert_eq!(path.schema_path().as_str(), "items.title");
//! ```

use std::{borrow::Borrow, fmt, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::RowId;

/// Error type for path component validation failures.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Invalid component: field names cannot contain dots or be numeric.
    #[error("Invalid component '{component}': {reason}")]
    InvalidComponent { component: String, reason: String },
}

/// Normalizes a path string by dropping empty components.
///
/// ```rust
/// # use formstack::path::normalize_path;
/// assert_eq!(normalize_path(""), "");
/// assert_eq!(normalize_path(".items"), "items");
/// assert_eq!(normalize_path("items..0.title."), "items.0.title");
/// ```
pub fn normalize_path(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    input
        .split('.')
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Returns the row index a component encodes, if it is numeric.
pub fn parse_index(component: &str) -> Option<usize> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    component.parse().ok()
}

/// A validated field name.
///
/// Field names become path components, so they cannot contain dots and cannot be
/// purely numeric (numeric components address rows).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    inner: String,
}

impl Component {
    /// Creates a new component from a field name.
    pub fn new(s: impl Into<String>) -> Result<Self, PathError> {
        let s = s.into();

        if s.is_empty() {
            return Err(PathError::InvalidComponent {
                component: s,
                reason: "field names cannot be empty".to_string(),
            });
        }
        if s.contains('.') {
            return Err(PathError::InvalidComponent {
                component: s,
                reason: "field names cannot contain dots".to_string(),
            });
        }
        if parse_index(&s).is_some() {
            return Err(PathError::InvalidComponent {
                component: s,
                reason: "field names cannot be numeric".to_string(),
            });
        }

        Ok(Component { inner: s })
    }

    /// Returns the component as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// An owned, normalized field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPathBuf {
    inner: String,
}

/// A borrowed field path.
///
/// This type is unsized and must always be used behind a reference.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FieldPath {
    inner: str,
}

impl FieldPathBuf {
    /// Creates a new empty path (the document root).
    pub fn new() -> Self {
        Self {
            inner: String::new(),
        }
    }

    /// Creates a path by normalizing the input string.
    pub fn normalize(path: &str) -> Self {
        Self {
            inner: normalize_path(path),
        }
    }

    /// Appends one or more components, normalizing the input.
    pub fn push(mut self, path: impl AsRef<str>) -> Self {
        let normalized = normalize_path(path.as_ref());
        if normalized.is_empty() {
            return self;
        }

        if !self.inner.is_empty() {
            self.inner.push('.');
        }
        self.inner.push_str(&normalized);
        self
    }

    /// Appends a row index.
    pub fn push_index(self, index: usize) -> Self {
        self.push(index.to_string())
    }

    /// Joins this path with another path.
    pub fn join(self, other: impl AsRef<FieldPath>) -> Self {
        self.push(other.as_ref().as_str())
    }
}

impl FieldPath {
    /// Wraps a string slice as a path without normalizing it.
    ///
    /// Components are always read through [`FieldPath::components`], which skips
    /// empty components, so an unnormalized slice still addresses the same field.
    pub fn new(s: &str) -> &FieldPath {
        // SAFETY: FieldPath is repr(transparent) over str
        unsafe { &*(s as *const str as *const FieldPath) }
    }

    /// Returns an iterator over the path components.
    pub fn components(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.inner.split('.').filter(|s| !s.is_empty())
    }

    /// Returns the number of components in the path.
    pub fn len(&self) -> usize {
        self.components().count()
    }

    /// Returns `true` if the path has no components.
    pub fn is_empty(&self) -> bool {
        self.components().next().is_none()
    }

    /// Returns the last component of the path, or `None` if empty.
    pub fn last(&self) -> Option<&str> {
        self.components().next_back()
    }

    /// Returns the parent path, or `None` if the path is empty.
    ///
    /// The parent of a single-component path is the empty path.
    pub fn parent(&self) -> Option<&FieldPath> {
        let trimmed = self.inner.trim_end_matches('.');
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.rfind('.') {
            Some(last_dot) => Some(FieldPath::new(&trimmed[..last_dot])),
            None => Some(FieldPath::new("")),
        }
    }

    /// Returns the path with row indexes removed, which addresses the schema node.
    pub fn schema_path(&self) -> FieldPathBuf {
        let mut out = FieldPathBuf::new();
        for component in self.components() {
            if parse_index(component).is_none() {
                out = out.push(component);
            }
        }
        out
    }

    /// Returns the row indexes the path passes through, outermost first.
    pub fn index_segments(&self) -> impl Iterator<Item = usize> + '_ {
        self.components().filter_map(parse_index)
    }

    /// Returns `true` if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: impl AsRef<FieldPath>) -> bool {
        let mut own = self.components();
        prefix
            .as_ref()
            .components()
            .all(|component| own.next() == Some(component))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Converts this `FieldPath` to an owned, normalized `FieldPathBuf`.
    pub fn to_path_buf(&self) -> FieldPathBuf {
        FieldPathBuf::normalize(&self.inner)
    }
}

impl Default for FieldPathBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for FieldPathBuf {
    type Target = FieldPath;

    fn deref(&self) -> &Self::Target {
        FieldPath::new(&self.inner)
    }
}

impl AsRef<FieldPath> for FieldPathBuf {
    fn as_ref(&self) -> &FieldPath {
        self
    }
}

impl AsRef<FieldPath> for FieldPath {
    fn as_ref(&self) -> &FieldPath {
        self
    }
}

impl AsRef<FieldPath> for str {
    fn as_ref(&self) -> &FieldPath {
        FieldPath::new(self)
    }
}

impl AsRef<FieldPath> for String {
    fn as_ref(&self) -> &FieldPath {
        FieldPath::new(self)
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl AsRef<str> for FieldPathBuf {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl Borrow<FieldPath> for FieldPathBuf {
    fn borrow(&self) -> &FieldPath {
        self
    }
}

impl FromStr for FieldPathBuf {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

impl From<&str> for FieldPathBuf {
    fn from(s: &str) -> Self {
        Self::normalize(s)
    }
}

impl From<String> for FieldPathBuf {
    fn from(s: String) -> Self {
        Self::normalize(&s)
    }
}

impl From<&FieldPath> for FieldPathBuf {
    fn from(path: &FieldPath) -> Self {
        path.to_path_buf()
    }
}

impl From<&FieldPathBuf> for FieldPathBuf {
    fn from(path: &FieldPathBuf) -> Self {
        path.clone()
    }
}

impl From<FieldPathBuf> for String {
    fn from(path: FieldPathBuf) -> Self {
        path.inner
    }
}

impl fmt::Display for FieldPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "(root)")
        } else {
            write!(f, "{}", &self.inner)
        }
    }
}

/// One step of a [`FieldRef`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefSegment {
    /// A named field (group, tab, array or leaf)
    Field(String),
    /// A row, identified by its stable id rather than its position
    Row(RowId),
}

/// A position-independent reference to a field.
///
/// Produced by [`FieldValueTree::stable_ref`](crate::tree::FieldValueTree::stable_ref)
/// and resolved with [`FieldValueTree::resolve`](crate::tree::FieldValueTree::resolve).
/// Reordering sibling rows changes the resolved index path but not the referenced field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldRef {
    segments: Vec<RefSegment>,
}

impl FieldRef {
    pub(crate) fn new(segments: Vec<RefSegment>) -> Self {
        Self { segments }
    }

    /// Returns the reference's segments.
    pub fn segments(&self) -> &[RefSegment] {
        &self.segments
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                RefSegment::Field(name) => name.clone(),
                RefSegment::Row(id) => format!("#{id}"),
            })
            .collect();
        write!(f, "{}", parts.join("."))
    }
}
