//! Relationship values and the flows that edit them.
//!
//! Relationship and upload fields store [`RelationshipRef`]s: the target's collection
//! and id plus a cached display title and URL. [`Relationships`] implements the
//! three ways a user fills such a field from a drawer:
//!
//! * **inline create**: a Create drawer whose saved document is appended to (or
//!   replaces) the field's value;
//! * **inline edit**: an Update drawer, pre-loaded from the backend, whose saved
//!   document refreshes the cached title and URL in place;
//! * **browse**: a Select drawer listing existing documents.
//!
//! Every flow records the opening field as the drawer's origin, so results land in
//! that field even if rows above it were reordered meanwhile. Self-referential
//! relationships nest as deep as the configured drawer depth allows.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Result,
    drawer::{DrawerId, DrawerRequest, DrawerResult, DrawerStack},
    form::FormState,
    path::{FieldPath, FieldPathBuf},
    persistence::{DocumentId, Filter, Page, Persistence, PersistenceError, SavedDocument},
    schema::Resolved,
    tree::{FieldError, Value},
};

/// A reference to another document with its cached display values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRef {
    #[serde(rename = "relationTo")]
    pub collection: String,
    #[serde(rename = "value")]
    pub id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RelationshipRef {
    pub fn new(collection: impl Into<String>, id: impl Into<DocumentId>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            title: None,
            url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns true if both refer to the same document, ignoring display values.
    pub fn same_document(&self, other: &RelationshipRef) -> bool {
        self.collection == other.collection && self.id == other.id
    }

    /// Parses a payload reference.
    ///
    /// Accepts `{ "relationTo", "value" }` objects, populated documents with an
    /// `id`, and bare id strings when the field has a single target collection.
    pub fn from_json(json: &serde_json::Value, default_collection: Option<&str>) -> Option<Self> {
        match json {
            serde_json::Value::String(id) => {
                Some(Self::new(default_collection?, DocumentId::new(id.clone())))
            }
            serde_json::Value::Object(object) if object.contains_key("relationTo") => {
                serde_json::from_value(json.clone()).ok()
            }
            serde_json::Value::Object(object) => {
                let id = object.get("id")?.as_str()?;
                let mut reference = Self::new(default_collection?, DocumentId::new(id));
                reference.url = object.get("url").and_then(|u| u.as_str()).map(str::to_string);
                Some(reference)
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// The value of a relationship or upload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipValue {
    Single(Option<RelationshipRef>),
    Many(Vec<RelationshipRef>),
}

impl RelationshipValue {
    /// An empty value of the given cardinality.
    pub fn empty(has_many: bool) -> Self {
        if has_many {
            RelationshipValue::Many(Vec::new())
        } else {
            RelationshipValue::Single(None)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RelationshipValue::Single(single) => single.is_none(),
            RelationshipValue::Many(many) => many.is_empty(),
        }
    }

    pub fn refs(&self) -> std::slice::Iter<'_, RelationshipRef> {
        match self {
            RelationshipValue::Single(single) => single.as_slice().iter(),
            RelationshipValue::Many(many) => many.iter(),
        }
    }

    pub fn contains(&self, reference: &RelationshipRef) -> bool {
        self.refs().any(|existing| existing.same_document(reference))
    }

    /// Adds a reference. Single values are replaced; a document already in a
    /// many value is refreshed instead of duplicated.
    pub fn insert(&mut self, reference: RelationshipRef) {
        match self {
            RelationshipValue::Single(single) => *single = Some(reference),
            RelationshipValue::Many(many) => {
                match many.iter_mut().find(|existing| existing.same_document(&reference)) {
                    Some(existing) => *existing = reference,
                    None => many.push(reference),
                }
            }
        }
    }

    /// Refreshes the cached title and URL of every reference to the same document.
    pub fn update_display(&mut self, reference: &RelationshipRef) -> bool {
        let targets: Vec<&mut RelationshipRef> = match self {
            RelationshipValue::Single(single) => single.iter_mut().collect(),
            RelationshipValue::Many(many) => many.iter_mut().collect(),
        };
        let mut updated = false;
        for existing in targets {
            if existing.same_document(reference) {
                existing.title = reference.title.clone();
                existing.url = reference.url.clone();
                updated = true;
            }
        }
        updated
    }

    /// Removes every reference to the document. Returns true if one was removed.
    pub fn remove(&mut self, reference: &RelationshipRef) -> bool {
        match self {
            RelationshipValue::Single(single) => {
                if single.as_ref().is_some_and(|r| r.same_document(reference)) {
                    *single = None;
                    return true;
                }
                false
            }
            RelationshipValue::Many(many) => {
                let before = many.len();
                many.retain(|existing| !existing.same_document(reference));
                many.len() != before
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RelationshipValue::Single(Some(reference)) => reference.to_json(),
            RelationshipValue::Single(None) => serde_json::Value::Null,
            RelationshipValue::Many(many) => {
                serde_json::Value::Array(many.iter().map(RelationshipRef::to_json).collect())
            }
        }
    }
}

/// The list state of a Select drawer.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseState {
    collection: String,
    filter: Filter,
    has_many: bool,
    page: Option<Page>,
    selected: Vec<RelationshipRef>,
}

impl BrowseState {
    pub(crate) fn new(collection: String, filter: Filter, has_many: bool) -> Self {
        Self {
            collection,
            filter,
            has_many,
            page: None,
            selected: Vec::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn has_many(&self) -> bool {
        self.has_many
    }

    /// The last loaded page, if any.
    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    pub fn items(&self) -> &[SavedDocument] {
        self.page.as_ref().map(|page| page.items.as_slice()).unwrap_or_default()
    }

    pub fn selected(&self) -> &[RelationshipRef] {
        &self.selected
    }

    pub fn is_selected(&self, id: &DocumentId) -> bool {
        self.selected.iter().any(|reference| &reference.id == id)
    }

    fn select(&mut self, reference: RelationshipRef) {
        if !self.has_many {
            self.selected.clear();
        }
        if !self.selected.iter().any(|r| r.same_document(&reference)) {
            self.selected.push(reference);
        }
    }
}

/// Relationship flows over a [`DrawerStack`], obtained with
/// [`DrawerStack::relationships`].
pub struct Relationships<'s> {
    stack: &'s mut DrawerStack,
}

struct RelationshipField {
    has_many: bool,
    targets: Vec<String>,
}

fn relationship_field(form: &FormState, path: &FieldPath) -> Result<RelationshipField> {
    match form.tree().node(path) {
        Some(Resolved::Node(node)) if node.kind().is_relationship() => Ok(RelationshipField {
            has_many: node.has_many(),
            targets: node.relation_to().to_vec(),
        }),
        _ => Err(FieldError::mismatch(path, "not a relationship or upload field").into()),
    }
}

fn current_value(form: &FormState, path: &FieldPath, has_many: bool) -> RelationshipValue {
    form.get(path)
        .and_then(Value::as_relationship)
        .cloned()
        .unwrap_or_else(|| RelationshipValue::empty(has_many))
}

impl<'s> Relationships<'s> {
    pub(crate) fn new(stack: &'s mut DrawerStack) -> Self {
        Self { stack }
    }

    fn field(&self, level: usize, path: &FieldPath, collection: Option<&str>) -> Result<RelationshipField> {
        let form = self.stack.form(level)?;
        let field = relationship_field(form, path)?;
        if let Some(collection) = collection
            && !field.targets.iter().any(|target| target == collection)
        {
            return Err(FieldError::mismatch(
                path,
                format!("'{collection}' is not a valid target"),
            )
            .into());
        }
        form.tree().check_writable(path)?;
        Ok(field)
    }

    /// Replaces the field's value with `refs`.
    pub fn set_value(
        &mut self,
        level: usize,
        path: impl AsRef<FieldPath>,
        refs: Vec<RelationshipRef>,
    ) -> Result<()> {
        let path = path.as_ref();
        let field = self.field(level, path, None)?;
        if !field.has_many && refs.len() > 1 {
            return Err(FieldError::mismatch(
                path,
                "a single relationship cannot hold many documents",
            )
            .into());
        }
        let value = if field.has_many {
            RelationshipValue::Many(refs)
        } else {
            RelationshipValue::Single(refs.into_iter().next())
        };
        self.stack.form_mut(level)?.set(path, value)
    }

    /// Opens a Create drawer for `collection`; saving it adds the new document to
    /// the field and closes the drawer.
    pub fn add_inline_created(
        &mut self,
        level: usize,
        path: impl AsRef<FieldPath>,
        collection: &str,
    ) -> Result<DrawerId> {
        let path = path.as_ref();
        let has_many = self.field(level, path, Some(collection))?.has_many;
        let request = DrawerRequest::create(collection, level, path)
            .commit_on_save(true)
            .with_sink(move |form, path, result| {
                let DrawerResult::Saved(document) = result else {
                    return Ok(());
                };
                let mut value = current_value(form, path, has_many);
                value.insert(document.to_ref());
                form.set(path, value)
            });
        self.stack.push(request)
    }

    /// Fetches the referenced document and opens an Update drawer for it; saving
    /// refreshes the reference's cached title and URL.
    pub async fn edit_inline(
        &mut self,
        level: usize,
        path: impl AsRef<FieldPath>,
        reference: &RelationshipRef,
        persistence: &dyn Persistence,
    ) -> Result<DrawerId> {
        let path = path.as_ref().to_path_buf();
        let has_many = self.field(level, &path, Some(&reference.collection))?.has_many;
        let document = persistence
            .fetch_one(&reference.collection, &reference.id)
            .await?;

        let request = DrawerRequest::update(document, level, &path)
            .commit_on_save(true)
            .with_sink(move |form, path, result| {
                let DrawerResult::Saved(document) = result else {
                    return Ok(());
                };
                let mut value = current_value(form, path, has_many);
                if value.update_display(&document.to_ref()) {
                    form.set(path, value)?;
                }
                Ok(())
            });
        self.stack.push(request)
    }

    /// Opens a Select drawer over the field's first target collection.
    pub fn browse(&mut self, level: usize, path: impl AsRef<FieldPath>, filter: Filter) -> Result<DrawerId> {
        let path = path.as_ref();
        let field = self.field(level, path, None)?;
        let collection = field
            .targets
            .first()
            .cloned()
            .ok_or_else(|| FieldError::mismatch(path, "relationship without targets"))?;
        self.browse_collection(level, path, &collection, filter)
    }

    /// Opens a Select drawer over one of the field's target collections.
    ///
    /// Committing the selection replaces a single value with the chosen document.
    /// Has-many fields list only documents not yet related, and the chosen ones are
    /// appended after the existing references.
    pub fn browse_collection(
        &mut self,
        level: usize,
        path: impl AsRef<FieldPath>,
        collection: &str,
        mut filter: Filter,
    ) -> Result<DrawerId> {
        let path = path.as_ref();
        let has_many = self.field(level, path, Some(collection))?.has_many;
        if has_many {
            let form = self.stack.form(level)?;
            filter = filter.exclude(
                current_value(form, path, has_many)
                    .refs()
                    .filter(|reference| reference.collection == collection)
                    .map(|reference| reference.id.clone()),
            );
        }

        let request = DrawerRequest::select(collection, level, path, filter)
            .multiple(has_many)
            .with_sink(move |form, path, result| {
                let DrawerResult::Selected(refs) = result else {
                    return Ok(());
                };
                let mut value = current_value(form, path, has_many);
                for reference in refs {
                    value.insert(reference);
                }
                form.set(path, value)
            });
        self.stack.push(request)
    }

    /// Loads one page of the Select drawer's list.
    pub async fn load_browse_page(
        &mut self,
        level: usize,
        persistence: &dyn Persistence,
        page: usize,
    ) -> Result<&Page> {
        let browse = self.stack.browse_mut(level)?;
        let collection = browse.collection.clone();
        let filter = browse.filter.clone();

        let loaded = persistence.fetch_many(&collection, &filter, page).await?;
        debug!(level, collection = %collection, page, items = loaded.items.len(), "Loaded browse page");

        let browse = self.stack.browse_mut(level)?;
        Ok(browse.page.insert(loaded))
    }

    /// Toggles a listed document. Returns true if it is now selected.
    ///
    /// Single-value fields keep at most one selection.
    pub fn toggle_selection(&mut self, level: usize, id: &DocumentId) -> Result<bool> {
        let browse = self.stack.browse_mut(level)?;
        if let Some(position) = browse.selected.iter().position(|r| &r.id == id) {
            browse.selected.remove(position);
            return Ok(false);
        }
        let reference = browse
            .items()
            .iter()
            .find(|document| &document.id == id)
            .map(SavedDocument::to_ref)
            .ok_or_else(|| PersistenceError::NotFound {
                collection: browse.collection.clone(),
                id: id.clone(),
            })?;
        browse.select(reference);
        Ok(true)
    }

    /// Selects a document that is not necessarily on the loaded page.
    pub fn select(&mut self, level: usize, reference: RelationshipRef) -> Result<()> {
        let browse = self.stack.browse_mut(level)?;
        if reference.collection != browse.collection {
            return Err(PersistenceError::UnknownCollection {
                collection: reference.collection,
            }
            .into());
        }
        browse.select(reference);
        Ok(())
    }

    /// Commits the Select drawer at `level` with its selected documents.
    pub fn commit_selection(&mut self, level: usize) -> Result<()> {
        let selected = self.stack.browse_mut(level)?.selected.clone();
        self.stack.commit(level, DrawerResult::Selected(selected))
    }

    /// Removes a document from the field. Returns true if it was present.
    pub fn remove_ref(
        &mut self,
        level: usize,
        path: impl AsRef<FieldPath>,
        reference: &RelationshipRef,
    ) -> Result<bool> {
        let path = path.as_ref();
        let has_many = self.field(level, path, None)?.has_many;
        let form = self.stack.form_mut(level)?;
        let mut value = current_value(form, path, has_many);
        if !value.remove(reference) {
            return Ok(false);
        }
        form.set(path, value)?;
        Ok(true)
    }

    /// The index path the drawer at `level` will deliver its result to.
    pub fn origin_path(&self, level: usize) -> Option<FieldPathBuf> {
        let origin = self.stack.context(level)?.origin()?;
        self.stack
            .form(origin.level)
            .ok()?
            .tree()
            .resolve(&origin.field)
    }
}
