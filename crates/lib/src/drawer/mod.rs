//! The drawer stack.
//!
//! A [`DrawerStack`] owns every editing context of a session in an arena indexed by
//! level: the root form at level 0 and one drawer per level above it. Only the top
//! context accepts input. Opening a drawer never touches the contexts below it, so
//! their unsaved state survives any amount of nesting.
//!
//! Each drawer records its [`OriginField`]: the level and stable [`FieldRef`] of the
//! field that opened it. Committing pops the drawer, resolves the reference against
//! the origin form's current rows and hands the result to the drawer's sink. Rows
//! moved in the meantime are followed; a removed row drops the result with
//! [`DrawerError::OriginGone`].
//!
//! # Saving
//!
//! A save suspends at the persistence call. It is split around that point:
//! [`DrawerStack::begin_save`] marks the context pending and returns a
//! [`SaveTicket`]; [`DrawerStack::finish_save`] applies the outcome. A drawer with
//! a save in flight can still be cancelled or discarded. Its ticket then no longer
//! matches any context and the late result is dropped.
//!
//! ```
//! use std::sync::Arc;
//! use formstack::{
//!     DrawerStack, EngineConfig,
//!     drawer::{DrawerRequest, StackState},
//!     schema::{CollectionSchema, FieldSchema, SchemaSet},
//! };
//!
//! let schemas = Arc::new(SchemaSet::new(vec![CollectionSchema::new(
//!     "posts",
//!     vec![
//!         FieldSchema::text("title"),
//!         FieldSchema::relationship("related", ["posts"]),
//!     ],
//! )]).unwrap());
//!
//! let mut stack = DrawerStack::new(schemas, "posts", EngineConfig::default()).unwrap();
//! stack.push(DrawerRequest::create("posts", 0, "related")).unwrap();
//! stack.push(DrawerRequest::create("posts", 1, "related")).unwrap();
//! assert_eq!(stack.state(), StackState::Open(2));
//!
//! assert!(stack.cancel(1).is_err());
//! stack.cancel(2).unwrap();
//! stack.cancel(1).unwrap();
//! assert_eq!(stack.state(), StackState::Empty);
//! ```

mod context;
mod errors;

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, error, warn};

pub use context::{
    DrawerContext, DrawerId, DrawerMode, DrawerRequest, DrawerResult, OriginField, ResultSink,
    SaveToken,
};
pub use errors::DrawerError;

use crate::{
    EngineConfig, Result,
    form::FormState,
    path::FieldPathBuf,
    persistence::{DocumentId, Persistence, SavedDocument, UploadFile},
    relationship::{BrowseState, Relationships},
    schema::SchemaSet,
    tree::FieldValueTree,
};

/// Whether any drawer is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    /// Only the root form exists
    Empty,
    /// `n` drawers are stacked above the root form
    Open(usize),
}

/// A save taken out of a context, to be run against a backend.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    pub level: usize,
    pub token: SaveToken,
    pub collection: String,
    pub document_id: Option<DocumentId>,
    pub payload: serde_json::Value,
    pub upload: Option<UploadFile>,
}

impl SaveTicket {
    /// Sends the save: the attached file first, then the document.
    pub async fn execute(&self, persistence: &dyn Persistence) -> Result<SavedDocument> {
        let mut payload = self.payload.clone();
        if let Some(file) = &self.upload {
            let stored = persistence.upload_file(&self.collection, file.clone()).await?;
            stored.apply_to(&mut payload);
        }
        persistence
            .save(&self.collection, self.document_id.as_ref(), payload)
            .await
    }
}

/// How a finished save was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The context's values are the new clean baseline
    Saved(SavedDocument),
    /// The drawer was saved and committed to its origin field
    Committed(SavedDocument),
    /// The context was closed while the save was in flight
    Dropped,
}

/// The stack of editing contexts of one session.
pub struct DrawerStack {
    schemas: Arc<SchemaSet>,
    config: EngineConfig,
    contexts: Vec<DrawerContext>,
    next_serial: u64,
    next_token: u64,
}

impl DrawerStack {
    /// Creates a stack whose root form authors a new `root_collection` document.
    pub fn new(schemas: Arc<SchemaSet>, root_collection: &str, config: EngineConfig) -> Result<Self> {
        let schema = schemas.collection(root_collection)?;
        Ok(Self::with_root(schemas, FormState::for_collection(schema), None, config))
    }

    /// Creates a stack around an existing root form.
    pub fn with_root(
        schemas: Arc<SchemaSet>,
        form: FormState,
        document_id: Option<DocumentId>,
        config: EngineConfig,
    ) -> Self {
        let collection = form.collection().to_string();
        let root = DrawerContext {
            level: 0,
            id: DrawerId::new(&collection, 0, 0),
            mode: if document_id.is_some() {
                DrawerMode::Update
            } else {
                DrawerMode::Create
            },
            collection,
            origin: None,
            form: Some(form),
            browse: None,
            sink: None,
            pending: None,
            document_id,
            field_errors: Default::default(),
            commit_on_save: false,
        };
        Self {
            schemas,
            config,
            contexts: vec![root],
            next_serial: 1,
            next_token: 1,
        }
    }

    pub fn schemas(&self) -> &Arc<SchemaSet> {
        &self.schemas
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of drawers above the root form.
    pub fn depth(&self) -> usize {
        self.contexts.len() - 1
    }

    pub fn state(&self) -> StackState {
        match self.depth() {
            0 => StackState::Empty,
            n => StackState::Open(n),
        }
    }

    /// The root form's context.
    pub fn root(&self) -> &DrawerContext {
        &self.contexts[0]
    }

    /// The top drawer, or `None` when only the root form exists.
    pub fn top(&self) -> Option<&DrawerContext> {
        if self.depth() == 0 {
            return None;
        }
        self.contexts.last()
    }

    pub fn context(&self, level: usize) -> Option<&DrawerContext> {
        self.contexts.get(level)
    }

    /// Open drawers ordered by level, excluding the root form.
    pub fn drawers(&self) -> impl Iterator<Item = &DrawerContext> {
        self.contexts.iter().skip(1)
    }

    /// Finds the `nth` open drawer (0-based) editing `collection`.
    pub fn find(&self, collection: &str, nth: usize) -> Option<&DrawerContext> {
        self.drawers()
            .filter(|context| context.collection == collection)
            .nth(nth)
    }

    /// Returns true if `level` is the top context and has no save in flight.
    pub fn is_interactive(&self, level: usize) -> bool {
        level == self.depth()
            && self
                .contexts
                .get(level)
                .is_some_and(|context| context.pending.is_none())
    }

    /// The form at `level`, readable at any level.
    pub fn form(&self, level: usize) -> Result<&FormState> {
        let context = self
            .contexts
            .get(level)
            .ok_or(DrawerError::UnknownLevel { level })?;
        Ok(context.form.as_ref().ok_or(DrawerError::NoForm { level })?)
    }

    /// The form at `level` for editing. Only the interactive top accepts input.
    pub fn form_mut(&mut self, level: usize) -> Result<&mut FormState> {
        let context = self.interactive_mut(level)?;
        Ok(context.form.as_mut().ok_or(DrawerError::NoForm { level })?)
    }

    pub(crate) fn browse_mut(&mut self, level: usize) -> Result<&mut BrowseState> {
        let context = self.interactive_mut(level)?;
        Ok(context
            .browse
            .as_mut()
            .ok_or(DrawerError::NotSelecting { level })?)
    }

    /// Field errors recorded on a context by its last failed save.
    pub fn field_errors(&self, level: usize) -> Result<&BTreeMap<FieldPathBuf, String>> {
        let context = self
            .contexts
            .get(level)
            .ok_or(DrawerError::UnknownLevel { level })?;
        Ok(&context.field_errors)
    }

    /// Relationship flows operating on this stack.
    pub fn relationships(&mut self) -> Relationships<'_> {
        Relationships::new(self)
    }

    fn interactive_mut(&mut self, level: usize) -> Result<&mut DrawerContext> {
        let top = self.depth();
        let context = self
            .contexts
            .get_mut(level)
            .ok_or(DrawerError::UnknownLevel { level })?;
        if level != top {
            return Err(DrawerError::NotInteractive { level, top }.into());
        }
        if context.pending.is_some() {
            return Err(DrawerError::Pending { level }.into());
        }
        Ok(context)
    }

    /// Opens a drawer on top of the stack.
    ///
    /// The origin must be the interactive top context and `origin_path` must
    /// resolve in its form. Fails with [`DrawerError::DepthExceeded`] when the stack
    /// already holds `max_drawer_depth` drawers.
    pub fn push(&mut self, request: DrawerRequest) -> Result<DrawerId> {
        let max = self.config.max_drawer_depth;
        if self.depth() >= max {
            warn!(max, collection = %request.collection, "Drawer depth exceeded");
            return Err(DrawerError::DepthExceeded { max }.into());
        }

        let origin_level = request.origin_level;
        let schema = self.schemas.collection(&request.collection)?;
        let field = self
            .form_mut(origin_level)?
            .tree()
            .stable_ref(&request.origin_path)?;

        let (form, browse) = match (request.mode, &request.document) {
            (DrawerMode::Select, _) => (
                None,
                Some(BrowseState::new(
                    request.collection.clone(),
                    request.filter,
                    request.has_many,
                )),
            ),
            (_, Some(document)) => (
                Some(FormState::new(FieldValueTree::from_json(
                    schema,
                    &document.data,
                )?)),
                None,
            ),
            (_, None) => (Some(FormState::for_collection(schema)), None),
        };

        let level = self.contexts.len();
        let id = DrawerId::new(&request.collection, level, self.next_serial);
        self.next_serial += 1;

        debug!(
            level,
            id = %id,
            mode = %request.mode,
            origin_level,
            origin = %field,
            "Pushed drawer"
        );

        self.contexts.push(DrawerContext {
            level,
            id: id.clone(),
            collection: request.collection,
            mode: request.mode,
            origin: Some(OriginField {
                level: origin_level,
                field,
            }),
            form,
            browse,
            sink: request.sink,
            pending: None,
            document_id: request.document.map(|document| document.id),
            field_errors: Default::default(),
            commit_on_save: request.commit_on_save,
        });
        Ok(id)
    }

    fn check_top(&self, level: usize, operation: &'static str) -> Result<()> {
        let top = self.depth();
        if level == 0 {
            return Err(DrawerError::RootLevel.into());
        }
        if level != top {
            error!(operation, level, top, "Drawer stack order violation");
            return Err(DrawerError::StackOrderViolation {
                operation,
                level,
                top,
            }
            .into());
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<DrawerContext> {
        if self.contexts.len() <= 1 {
            return Err(DrawerError::RootLevel.into());
        }
        self.contexts.pop().ok_or_else(|| DrawerError::RootLevel.into())
    }

    /// Pops the top drawer and applies `result` to its origin field.
    ///
    /// The sink has run and the origin tree holds the result when this returns.
    pub fn commit(&mut self, level: usize, result: DrawerResult) -> Result<()> {
        self.check_top(level, "commit")?;
        if self.contexts[level].pending.is_some() {
            return Err(DrawerError::Pending { level }.into());
        }
        let context = self.pop()?;
        self.deliver(context, result)
    }

    fn deliver(&mut self, mut context: DrawerContext, result: DrawerResult) -> Result<()> {
        let Some(origin) = context.origin.take() else {
            return Err(DrawerError::RootLevel.into());
        };
        let form = self
            .contexts
            .get_mut(origin.level)
            .ok_or(DrawerError::UnknownLevel {
                level: origin.level,
            })?
            .form
            .as_mut()
            .ok_or(DrawerError::NoForm {
                level: origin.level,
            })?;

        let Some(path) = form.tree.resolve(&origin.field) else {
            warn!(
                id = %context.id,
                origin = %origin.field,
                "Dropping drawer result: origin field no longer exists"
            );
            return Err(DrawerError::OriginGone {
                drawer: context.id,
                origin: origin.field,
            }
            .into());
        };

        debug!(id = %context.id, level = context.level, path = %path, "Committed drawer");
        match context.sink.take() {
            Some(sink) => sink(form, &path, result),
            None => Ok(()),
        }
    }

    /// Pops the top drawer without applying anything.
    pub fn cancel(&mut self, level: usize) -> Result<()> {
        self.check_top(level, "cancel")?;
        let context = self.pop()?;
        if context.pending.is_some() {
            warn!(id = %context.id, "Cancelled drawer with a save in flight");
        }
        debug!(id = %context.id, level, "Cancelled drawer");
        Ok(())
    }

    /// Closes the drawer at `level` and every drawer above it. No sinks run.
    ///
    /// Returns the number of drawers closed.
    pub fn discard(&mut self, level: usize) -> Result<usize> {
        if level == 0 {
            return Err(DrawerError::RootLevel.into());
        }
        if level > self.depth() {
            return Err(DrawerError::UnknownLevel { level }.into());
        }
        let discarded = self.contexts.split_off(level);
        for context in discarded.iter().rev() {
            if context.pending.is_some() {
                warn!(id = %context.id, "Discarded drawer with a save in flight");
            }
            debug!(id = %context.id, level = context.level, "Discarded drawer");
        }
        Ok(discarded.len())
    }

    /// Closes every drawer, leaving the root form.
    pub fn close_all(&mut self) -> usize {
        let closed = self.contexts.len() - 1;
        if closed > 0 {
            self.contexts.truncate(1);
            debug!(closed, "Closed all drawers");
        }
        closed
    }

    /// Starts saving the form at `level`.
    ///
    /// The context becomes pending (not interactive) until the ticket is finished.
    pub fn begin_save(&mut self, level: usize) -> Result<SaveTicket> {
        let token = SaveToken(self.next_token);
        self.next_token += 1;

        let context = self.interactive_mut(level)?;
        let form = context.form.as_ref().ok_or(DrawerError::NoForm { level })?;
        let ticket = SaveTicket {
            level,
            token,
            collection: context.collection.clone(),
            document_id: context.document_id.clone(),
            payload: form.tree.to_json(),
            upload: form.upload().cloned(),
        };
        context.pending = Some(token);
        debug!(id = %context.id, level, "Started save");
        Ok(ticket)
    }

    /// Applies the outcome of a save started with [`DrawerStack::begin_save`].
    ///
    /// On success the form's values become its clean baseline and, for drawers
    /// opened with `commit_on_save`, the drawer is committed with the saved
    /// document. On failure nothing changes except that validation failures are
    /// recorded in the context's field errors; the error is returned.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        outcome: Result<SavedDocument>,
    ) -> Result<SaveOutcome> {
        let Some(context) = self
            .contexts
            .get_mut(ticket.level)
            .filter(|context| context.pending == Some(ticket.token))
        else {
            warn!(level = ticket.level, collection = %ticket.collection, "Dropping stale save result");
            return Ok(SaveOutcome::Dropped);
        };
        context.pending = None;

        let document = match outcome {
            Ok(document) => document,
            Err(err) => {
                warn!(id = %context.id, error = %err, "Save failed");
                context.record_failure(&err);
                return Err(err);
            }
        };

        context.field_errors.clear();
        context.document_id = Some(document.id.clone());
        if context.mode == DrawerMode::Create {
            context.mode = DrawerMode::Update;
        }
        if let Some(form) = context.form.as_mut() {
            form.tree.mark_saved();
            form.clear_upload();
        }
        debug!(id = %context.id, document = %document.id, "Saved");

        if ticket.level > 0 && context.commit_on_save {
            let context = self.pop()?;
            self.deliver(context, DrawerResult::Saved(document.clone()))?;
            return Ok(SaveOutcome::Committed(document));
        }
        Ok(SaveOutcome::Saved(document))
    }

    /// Saves the form at `level` through `persistence`.
    pub async fn save(&mut self, level: usize, persistence: &dyn Persistence) -> Result<SaveOutcome> {
        let ticket = self.begin_save(level)?;
        let outcome = ticket.execute(persistence).await;
        self.finish_save(ticket, outcome)
    }
}

impl std::fmt::Debug for DrawerStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawerStack")
            .field("config", &self.config)
            .field("contexts", &self.contexts)
            .finish_non_exhaustive()
    }
}
