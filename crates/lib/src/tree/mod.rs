//! The Field Value Tree.
//!
//! A [`FieldValueTree`] is the document being edited in one editing context. Its
//! shape is checked against the collection schema on every write: a path without a
//! schema node, or a value whose shape disagrees with the node's kind, fails with
//! [`FieldError::SchemaMismatch`] and leaves the tree untouched.
//!
//! Dirtiness is tracked per path against the last-saved baseline. `Null` and absent
//! keys compare equal, so an edit that is undone leaves the path clean.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use formstack::{FieldValueTree, schema::{CollectionSchema, FieldSchema}};
//!
//! let schema = Arc::new(CollectionSchema::new(
//!     "posts",
//!     vec![FieldSchema::text("title"), FieldSchema::number("views")],
//! ));
//! let mut tree = FieldValueTree::new(schema);
//!
//! tree.set("title", "Hello").unwrap();
//! tree.set("views", "42").unwrap();
//! assert!(*tree.get("views").unwrap() == 42.0);
//! assert!(tree.is_dirty("title"));
//!
//! tree.mark_saved();
//! assert!(!tree.is_dirty("title"));
//! assert!(tree.set("missing", "x").is_err());
//! ```

mod convert;
mod errors;
mod row;
mod value;

use std::sync::Arc;

use tracing::debug;

pub use errors::FieldError;
pub use row::{Row, RowAddress, RowId};
pub use value::{Doc, Entry, Value};

pub(crate) use convert::{defaults_for, value_from_json};
use convert::{doc_from_json, normalize_value};

use crate::{
    Result,
    path::{FieldPath, FieldPathBuf, FieldRef, RefSegment, parse_index},
    schema::{CollectionSchema, FieldKind, FieldSchema, Resolved, SchemaNode, level_nodes},
};

/// An immutable copy of a tree's values.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    data: Doc,
}

impl Snapshot {
    pub fn get(&self, path: impl AsRef<FieldPath>) -> Option<&Value> {
        self.data.get(path)
    }

    pub fn data(&self) -> &Doc {
        &self.data
    }
}

/// The values of one document, shaped by its collection schema.
#[derive(Debug, Clone)]
pub struct FieldValueTree {
    schema: Arc<CollectionSchema>,
    data: Doc,
    saved: Doc,
}

impl FieldValueTree {
    /// Creates a tree holding the schema's declared defaults as its clean baseline.
    pub fn new(schema: Arc<CollectionSchema>) -> Self {
        let data = defaults_for(&schema.fields, FieldPath::new(""));
        Self {
            saved: data.clone(),
            data,
            schema,
        }
    }

    /// Creates a tree from a persistence payload.
    pub fn from_json(schema: Arc<CollectionSchema>, json: &serde_json::Value) -> Result<Self> {
        let mut tree = Self::new(schema);
        tree.load_json(json)?;
        Ok(tree)
    }

    pub fn schema(&self) -> &Arc<CollectionSchema> {
        &self.schema
    }

    /// The collection slug this tree belongs to.
    pub fn collection(&self) -> &str {
        &self.schema.slug
    }

    pub fn data(&self) -> &Doc {
        &self.data
    }

    pub fn get(&self, path: impl AsRef<FieldPath>) -> Option<&Value> {
        self.data.get(path)
    }

    pub fn entry(&self, path: impl AsRef<FieldPath>) -> Option<Entry<'_>> {
        self.data.entry(path)
    }

    /// Resolves a path against the schema, using live block types.
    pub fn node(&self, path: impl AsRef<FieldPath>) -> Option<Resolved<'_>> {
        self.schema.resolve(path.as_ref(), &self.data)
    }

    /// The display title taken from the collection's `useAsTitle` field.
    pub fn title(&self) -> Option<String> {
        let field = self.schema.use_as_title.as_deref()?;
        self.data
            .get(field)
            .and_then(Value::as_text)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
    }

    /// Writes a value at `path`.
    ///
    /// Missing groups on the way are created; rows must already exist. Rows
    /// themselves are added and removed through the row controller.
    pub fn set(&mut self, path: impl AsRef<FieldPath>, value: impl Into<Value>) -> Result<()> {
        let path = path.as_ref();
        let schema = Arc::clone(&self.schema);
        let node = leaf_node(&schema, path, &self.data)?;
        self.check_writable(path)?;
        let value = normalize_value(node, value.into(), path)?;
        self.insert(path, value)
    }

    /// Writes a JSON value at `path`, converting it like a persistence payload.
    pub fn set_json(&mut self, path: impl AsRef<FieldPath>, json: &serde_json::Value) -> Result<()> {
        let path = path.as_ref();
        let schema = Arc::clone(&self.schema);
        let node = leaf_node(&schema, path, &self.data)?;
        self.check_writable(path)?;
        let value = value_from_json(node, json, path)?;
        self.insert(path, value)
    }

    /// Sets `path` to the explicit empty value.
    pub fn clear(&mut self, path: impl AsRef<FieldPath>) -> Result<()> {
        self.set(path, Value::Null)
    }

    fn insert(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        let (Some(parent), Some(name)) = (path.parent(), path.last()) else {
            return Err(FieldError::mismatch(path, "cannot replace the document root").into());
        };
        debug!(collection = %self.schema.slug, path = %path, kind = value.type_name(), "Set field");
        self.data.level_mut(parent)?.insert(name, value);
        Ok(())
    }

    /// Fails with `ReadOnly` if the field or any of its containers is read-only.
    pub(crate) fn check_writable(&self, path: &FieldPath) -> std::result::Result<(), FieldError> {
        let mut prefix = FieldPathBuf::new();
        for component in path.components() {
            prefix = prefix.push(component);
            if parse_index(component).is_some() {
                continue;
            }
            if let Some(Resolved::Node(node)) = self.schema.resolve(&prefix, &self.data)
                && node.read_only()
            {
                return Err(FieldError::ReadOnly { path: prefix });
            }
        }
        Ok(())
    }

    /// Returns true if the value at `path` differs from the last-saved baseline.
    pub fn is_dirty(&self, path: impl AsRef<FieldPath>) -> bool {
        !self.data.entries_equivalent(&self.saved, path.as_ref())
    }

    /// Returns true if any value differs from the last-saved baseline.
    pub fn is_modified(&self) -> bool {
        !self.data.equivalent(&self.saved)
    }

    /// Lists the index paths whose values differ from the baseline.
    ///
    /// Reordered or resized row collections are reported as the collection's path.
    pub fn dirty_paths(&self) -> Vec<FieldPathBuf> {
        let mut out = Vec::new();
        self.data.diff(&self.saved, &FieldPathBuf::new(), &mut out);
        out
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            data: self.data.clone(),
        }
    }

    /// Replaces the current values with a snapshot. The baseline is unchanged.
    pub fn restore(&mut self, snapshot: Snapshot) {
        debug!(collection = %self.schema.slug, "Restored snapshot");
        self.data = snapshot.data;
    }

    /// Makes the current values the new clean baseline.
    pub fn mark_saved(&mut self) {
        self.saved = self.data.clone();
    }

    /// Discards every change since the last save.
    pub fn reset(&mut self) {
        self.data = self.saved.clone();
    }

    /// Replaces values and baseline with a persistence payload.
    pub fn load_json(&mut self, json: &serde_json::Value) -> Result<()> {
        let data = doc_from_json(&self.schema.fields, json, FieldPath::new(""))?;
        self.saved = data.clone();
        self.data = data;
        Ok(())
    }

    /// Exports the values as a persistence payload.
    pub fn to_json(&self) -> serde_json::Value {
        self.data.to_json()
    }

    pub fn rows(&self, path: impl AsRef<FieldPath>) -> Option<&[Row]> {
        self.data.get(path)?.as_rows()
    }

    /// Finds a row by id, returning its current index.
    pub fn row(&self, path: impl AsRef<FieldPath>, id: &RowId) -> Option<(usize, &Row)> {
        self.rows(path)?
            .iter()
            .enumerate()
            .find(|(_, row)| &row.id == id)
    }

    /// Returns the rows of the array or blocks field at `path`, creating the
    /// collection if it is absent.
    pub(crate) fn rows_mut(&mut self, path: &FieldPath) -> std::result::Result<&mut Vec<Row>, FieldError> {
        match self.schema.resolve(path, &self.data) {
            Some(Resolved::Node(node)) if node.kind().has_rows() => {}
            _ => return Err(FieldError::mismatch(path, "not an array or blocks field")),
        }
        let (Some(parent), Some(name)) = (path.parent(), path.last()) else {
            return Err(FieldError::mismatch(path, "not an array or blocks field"));
        };
        let level = self.data.level_mut(parent)?;
        if !matches!(level.get_local(name), Some(Value::Rows(_))) {
            level.insert(name, Value::Rows(Vec::new()));
        }
        match level.get_local_mut(name) {
            Some(Value::Rows(rows)) => Ok(rows),
            _ => Err(FieldError::mismatch(path, "not an array or blocks field")),
        }
    }

    /// Records `path` as a reference that survives row reordering.
    pub fn stable_ref(&self, path: impl AsRef<FieldPath>) -> Result<FieldRef> {
        let path = path.as_ref();
        if self.schema.resolve(path, &self.data).is_none() {
            return Err(FieldError::mismatch(path, "no schema node").into());
        }

        let mut segments = Vec::new();
        let mut walked = FieldPathBuf::new();
        for component in path.components() {
            match parse_index(component) {
                Some(index) => {
                    let rows = self.rows(&walked).unwrap_or_default();
                    let row = rows.get(index).ok_or_else(|| FieldError::IndexOutOfRange {
                        path: walked.clone(),
                        index,
                        len: rows.len(),
                    })?;
                    segments.push(RefSegment::Row(row.id.clone()));
                }
                None => segments.push(RefSegment::Field(component.to_string())),
            }
            walked = walked.push(component);
        }
        Ok(FieldRef::new(segments))
    }

    /// Resolves a stable reference to the field's current index path.
    ///
    /// Returns `None` if a referenced row no longer exists.
    pub fn resolve(&self, reference: &FieldRef) -> Option<FieldPathBuf> {
        let mut path = FieldPathBuf::new();
        for segment in reference.segments() {
            path = match segment {
                RefSegment::Field(name) => path.push(name),
                RefSegment::Row(id) => {
                    let index = self.rows(&path)?.iter().position(|row| &row.id == id)?;
                    path.push_index(index)
                }
            };
        }
        self.schema.resolve(&path, &self.data)?;
        Some(path)
    }

    /// Lists required fields that are blank, including those inside rows.
    pub fn missing_required(&self) -> Vec<FieldPathBuf> {
        let mut out = Vec::new();
        collect_missing(&self.schema.fields, Some(&self.data), &FieldPathBuf::new(), &mut out);
        out
    }
}

fn leaf_node<'a>(
    schema: &'a CollectionSchema,
    path: &FieldPath,
    data: &Doc,
) -> std::result::Result<SchemaNode<'a>, FieldError> {
    match schema.resolve(path, data) {
        Some(Resolved::Node(node)) if node.kind().is_presentational() => {
            Err(FieldError::mismatch(path, "presentational fields hold no value"))
        }
        Some(Resolved::Node(node)) => Ok(node),
        Some(Resolved::Row { .. }) => Err(FieldError::mismatch(
            path,
            "rows are changed through the row controller",
        )),
        None => Err(FieldError::mismatch(path, "no schema node")),
    }
}

fn collect_missing(fields: &[FieldSchema], doc: Option<&Doc>, prefix: &FieldPathBuf, out: &mut Vec<FieldPathBuf>) {
    for node in level_nodes(fields) {
        let path = prefix.clone().push(node.name());
        let value = doc.and_then(|doc| doc.get_local(node.name()));
        if node.required() && value.is_none_or(|value| value.is_blank() || *value == "") {
            out.push(path.clone());
        }

        match (node.kind(), value) {
            (FieldKind::Group, value) => {
                collect_missing(node.fields(), value.and_then(Value::as_group), &path, out)
            }
            (FieldKind::Array | FieldKind::Blocks, Some(Value::Rows(rows))) => {
                for (index, row) in rows.iter().enumerate() {
                    let fields: &[FieldSchema] = match row.block_type().and_then(|slug| node.block(slug)) {
                        Some(block) => &block.fields,
                        None => node.fields(),
                    };
                    collect_missing(fields, Some(&row.fields), &path.clone().push_index(index), out);
                }
            }
            _ => {}
        }
    }
}
