//! Drawer contexts and the requests that open them.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{
    Result,
    form::FormState,
    path::{FieldPath, FieldPathBuf, FieldRef},
    persistence::{DocumentId, Filter, PersistenceError, SavedDocument},
    relationship::{BrowseState, RelationshipRef},
};

/// What a drawer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawerMode {
    /// Authoring a new document
    Create,
    /// Editing an existing document
    Update,
    /// Choosing existing documents from a list
    Select,
}

impl fmt::Display for DrawerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawerMode::Create => f.write_str("create"),
            DrawerMode::Update => f.write_str("update"),
            DrawerMode::Select => f.write_str("select"),
        }
    }
}

/// Identifier of a context, rendered as `doc-drawer_{collection}_{level}_{serial}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DrawerId(String);

impl DrawerId {
    pub(crate) fn new(collection: &str, level: usize, serial: u64) -> Self {
        Self(format!("doc-drawer_{collection}_{level}_{serial}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DrawerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The field that opened a drawer and will receive its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginField {
    /// Level of the context holding the field
    pub level: usize,
    /// Position-independent reference to the field
    pub field: FieldRef,
}

/// The value a drawer hands back to its origin field.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawerResult {
    /// A document was created or updated
    Saved(SavedDocument),
    /// Documents were chosen from a list
    Selected(Vec<RelationshipRef>),
}

/// Callback applying a drawer's result to the origin form.
///
/// Invoked at most once, with the origin field's current index path.
pub type ResultSink =
    Box<dyn FnOnce(&mut FormState, &FieldPath, DrawerResult) -> Result<()> + Send>;

/// Identifies one in-flight save of one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveToken(pub(crate) u64);

/// Everything needed to open a drawer.
pub struct DrawerRequest {
    pub(crate) collection: String,
    pub(crate) mode: DrawerMode,
    pub(crate) origin_level: usize,
    pub(crate) origin_path: FieldPathBuf,
    pub(crate) document: Option<SavedDocument>,
    pub(crate) filter: Filter,
    pub(crate) has_many: bool,
    pub(crate) sink: Option<ResultSink>,
    pub(crate) commit_on_save: bool,
}

impl DrawerRequest {
    fn new(
        collection: impl Into<String>,
        mode: DrawerMode,
        origin_level: usize,
        origin_path: impl AsRef<FieldPath>,
    ) -> Self {
        Self {
            collection: collection.into(),
            mode,
            origin_level,
            origin_path: origin_path.as_ref().to_path_buf(),
            document: None,
            filter: Filter::default(),
            has_many: false,
            sink: None,
            commit_on_save: false,
        }
    }

    /// Requests a drawer authoring a new `collection` document.
    pub fn create(
        collection: impl Into<String>,
        origin_level: usize,
        origin_path: impl AsRef<FieldPath>,
    ) -> Self {
        Self::new(collection, DrawerMode::Create, origin_level, origin_path)
    }

    /// Requests a drawer editing `document`, pre-loaded with its data.
    pub fn update(
        document: SavedDocument,
        origin_level: usize,
        origin_path: impl AsRef<FieldPath>,
    ) -> Self {
        let mut request = Self::new(
            document.collection.clone(),
            DrawerMode::Update,
            origin_level,
            origin_path,
        );
        request.document = Some(document);
        request
    }

    /// Requests a drawer listing `collection` documents for selection.
    pub fn select(
        collection: impl Into<String>,
        origin_level: usize,
        origin_path: impl AsRef<FieldPath>,
        filter: Filter,
    ) -> Self {
        let mut request = Self::new(collection, DrawerMode::Select, origin_level, origin_path);
        request.filter = filter;
        request
    }

    /// Allows more than one document to be selected.
    pub fn multiple(mut self, has_many: bool) -> Self {
        self.has_many = has_many;
        self
    }

    /// Sets the callback that applies the drawer's result to the origin form.
    pub fn with_sink(
        mut self,
        sink: impl FnOnce(&mut FormState, &FieldPath, DrawerResult) -> Result<()> + Send + 'static,
    ) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Commits the drawer to its origin as soon as a save succeeds.
    pub fn commit_on_save(mut self, commit: bool) -> Self {
        self.commit_on_save = commit;
        self
    }
}

impl fmt::Debug for DrawerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawerRequest")
            .field("collection", &self.collection)
            .field("mode", &self.mode)
            .field("origin_level", &self.origin_level)
            .field("origin_path", &self.origin_path)
            .field("has_sink", &self.sink.is_some())
            .field("commit_on_save", &self.commit_on_save)
            .finish_non_exhaustive()
    }
}

/// One editing context of the stack.
///
/// Level 0 is the root form and has no origin. Every drawer above it records the
/// field that opened it.
pub struct DrawerContext {
    pub(crate) level: usize,
    pub(crate) id: DrawerId,
    pub(crate) collection: String,
    pub(crate) mode: DrawerMode,
    pub(crate) origin: Option<OriginField>,
    pub(crate) form: Option<FormState>,
    pub(crate) browse: Option<BrowseState>,
    pub(crate) sink: Option<ResultSink>,
    pub(crate) pending: Option<SaveToken>,
    pub(crate) document_id: Option<DocumentId>,
    pub(crate) field_errors: BTreeMap<FieldPathBuf, String>,
    pub(crate) commit_on_save: bool,
}

impl DrawerContext {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn id(&self) -> &DrawerId {
        &self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn mode(&self) -> DrawerMode {
        self.mode
    }

    /// The field that receives this drawer's result; `None` for the root form.
    pub fn origin(&self) -> Option<&OriginField> {
        self.origin.as_ref()
    }

    pub fn form(&self) -> Option<&FormState> {
        self.form.as_ref()
    }

    pub fn browse(&self) -> Option<&BrowseState> {
        self.browse.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The persisted document's id, once it has one.
    pub fn document_id(&self) -> Option<&DocumentId> {
        self.document_id.as_ref()
    }

    /// Validation failures reported by the last save, keyed by field path.
    pub fn field_errors(&self) -> &BTreeMap<FieldPathBuf, String> {
        &self.field_errors
    }

    pub(crate) fn record_failure(&mut self, err: &crate::Error) {
        if let crate::Error::Persistence(PersistenceError::ValidationFailed { path, reason }) = err {
            self.field_errors.insert(path.clone(), reason.clone());
        }
    }
}

impl fmt::Debug for DrawerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawerContext")
            .field("level", &self.level)
            .field("id", &self.id)
            .field("collection", &self.collection)
            .field("mode", &self.mode)
            .field("origin", &self.origin)
            .field("pending", &self.pending)
            .field("document_id", &self.document_id)
            .field("field_errors", &self.field_errors)
            .finish_non_exhaustive()
    }
}
