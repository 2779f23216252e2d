//! Rows of array and blocks fields.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Doc;
use crate::path::{FieldPath, FieldPathBuf};

/// Stable identity of a row.
///
/// Ids are generated once when a row is created and travel with the row's subtree
/// through moves; indexes are always derived from position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One element of an array or blocks field, carrying its own subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub(crate) id: RowId,
    pub(crate) block_type: Option<String>,
    pub(crate) fields: Doc,
}

impl Row {
    /// Creates a row with a fresh id.
    pub fn new(block_type: Option<String>, fields: Doc) -> Self {
        Self::with_id(RowId::generate(), block_type, fields)
    }

    pub fn with_id(id: RowId, block_type: Option<String>, fields: Doc) -> Self {
        Self {
            id,
            block_type,
            fields,
        }
    }

    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// The block variant slug; `None` for array rows.
    pub fn block_type(&self) -> Option<&str> {
        self.block_type.as_deref()
    }

    pub fn fields(&self) -> &Doc {
        &self.fields
    }

    pub fn get(&self, path: impl AsRef<FieldPath>) -> Option<&super::Value> {
        self.fields.get(path)
    }

    /// Returns a deep copy in which this row and every nested row has a new id.
    pub fn with_fresh_ids(&self) -> Row {
        let mut copy = self.clone();
        copy.id = RowId::generate();
        copy.fields.refresh_row_ids();
        copy
    }

    pub(crate) fn equivalent(&self, other: &Row) -> bool {
        self.id == other.id
            && self.block_type == other.block_type
            && self.fields.equivalent(&other.fields)
    }
}

/// The address of a row for automated tooling.
///
/// Renders as `{path}.{index}#{id}`, which carries both the positional path and the
/// stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAddress {
    pub path: FieldPathBuf,
    pub index: usize,
    pub id: RowId,
}

impl RowAddress {
    /// Returns the index path of the row itself.
    pub fn row_path(&self) -> FieldPathBuf {
        self.path.clone().push_index(self.index)
    }
}

impl fmt::Display for RowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}#{}", self.path.as_str(), self.index, self.id)
    }
}
