//! One editing surface: a value tree plus its presentation state.
//!
//! Presentation state (which tab is active, which rows are collapsed) never lives in
//! the value tree, so toggling it can never make a document dirty. Row and tab
//! operations are implemented on [`FormState`] in the `rows` and `tabs` modules.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    Result,
    path::{FieldPath, FieldPathBuf},
    persistence::UploadFile,
    schema::CollectionSchema,
    tree::{FieldValueTree, RowId, Snapshot, Value},
};

/// Presentation side table, keyed by tab group path and row id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    pub(crate) active_tabs: BTreeMap<FieldPathBuf, String>,
    pub(crate) collapsed: BTreeSet<RowId>,
}

impl Presentation {
    /// The explicitly selected tab of a tabs field, if any.
    pub fn selected_tab(&self, group_path: &FieldPath) -> Option<&str> {
        self.active_tabs.get(group_path).map(String::as_str)
    }

    pub fn is_collapsed(&self, id: &RowId) -> bool {
        self.collapsed.contains(id)
    }
}

/// A document being edited in one context of the drawer stack.
#[derive(Debug, Clone)]
pub struct FormState {
    pub(crate) tree: FieldValueTree,
    pub(crate) presentation: Presentation,
    upload: Option<UploadFile>,
}

impl FormState {
    pub fn new(tree: FieldValueTree) -> Self {
        Self {
            tree,
            presentation: Presentation::default(),
            upload: None,
        }
    }

    /// Creates a form holding the collection's defaults.
    pub fn for_collection(schema: Arc<CollectionSchema>) -> Self {
        Self::new(FieldValueTree::new(schema))
    }

    pub fn tree(&self) -> &FieldValueTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut FieldValueTree {
        &mut self.tree
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn collection(&self) -> &str {
        self.tree.collection()
    }

    pub fn get(&self, path: impl AsRef<FieldPath>) -> Option<&Value> {
        self.tree.get(path)
    }

    pub fn set(&mut self, path: impl AsRef<FieldPath>, value: impl Into<Value>) -> Result<()> {
        self.tree.set(path, value)
    }

    pub fn set_json(&mut self, path: impl AsRef<FieldPath>, json: &serde_json::Value) -> Result<()> {
        self.tree.set_json(path, json)
    }

    pub fn clear(&mut self, path: impl AsRef<FieldPath>) -> Result<()> {
        self.tree.clear(path)
    }

    pub fn is_dirty(&self, path: impl AsRef<FieldPath>) -> bool {
        self.tree.is_dirty(path)
    }

    /// Returns true if any value changed or a file is waiting to be uploaded.
    pub fn is_modified(&self) -> bool {
        self.tree.is_modified() || self.upload.is_some()
    }

    pub fn dirty_paths(&self) -> Vec<FieldPathBuf> {
        self.tree.dirty_paths()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tree.snapshot()
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.tree.restore(snapshot);
    }

    /// Attaches a file to send with the next save of an upload-collection document.
    pub fn attach_file(&mut self, file: UploadFile) {
        self.upload = Some(file);
    }

    pub fn upload(&self) -> Option<&UploadFile> {
        self.upload.as_ref()
    }

    pub(crate) fn clear_upload(&mut self) {
        self.upload = None;
    }
}
