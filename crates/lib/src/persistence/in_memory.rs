//! In-memory persistence backend.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{
    DocumentId, Filter, Page, Persistence, PersistenceError, SavedDocument, StoredFile, UploadFile,
};
use crate::{
    Error, Result,
    constants::DEFAULT_PAGE_SIZE,
    schema::{CollectionSchema, SchemaSet},
    tree::FieldValueTree,
};

const REQUIRED_MESSAGE: &str = "This field is required.";

/// A backend keeping every collection in memory.
///
/// Saves are checked against the collection schema: payloads that do not fit the
/// schema, or that leave a required field blank, fail with
/// [`PersistenceError::ValidationFailed`] naming the first failing path.
/// Documents are listed in insertion order.
///
/// Failures can be injected with [`InMemoryPersistence::fail_next_with`]; each
/// injected error is returned by exactly one subsequent call.
#[derive(Debug)]
pub struct InMemoryPersistence {
    schemas: Arc<SchemaSet>,
    documents: RwLock<BTreeMap<String, Vec<SavedDocument>>>,
    failures: Mutex<VecDeque<PersistenceError>>,
    page_size: usize,
}

impl InMemoryPersistence {
    pub fn new(schemas: Arc<SchemaSet>) -> Self {
        Self {
            schemas,
            documents: RwLock::new(BTreeMap::new()),
            failures: Mutex::new(VecDeque::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the number of documents per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes the next call fail with `err`.
    pub async fn fail_next_with(&self, err: PersistenceError) {
        self.failures.lock().await.push_back(err);
    }

    /// Returns the number of documents stored in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    async fn take_failure(&self) -> Result<()> {
        match self.failures.lock().await.pop_front() {
            Some(err) => {
                warn!(error = %err, "Returning injected failure");
                Err(err.into())
            }
            None => Ok(()),
        }
    }

    fn schema(&self, collection: &str) -> Result<Arc<CollectionSchema>> {
        self.schemas.get(collection).cloned().ok_or_else(|| {
            PersistenceError::UnknownCollection {
                collection: collection.to_string(),
            }
            .into()
        })
    }
}

fn validate(schema: &Arc<CollectionSchema>, payload: &serde_json::Value) -> Result<FieldValueTree> {
    let tree = FieldValueTree::from_json(Arc::clone(schema), payload).map_err(|err| match err {
        Error::Field(field_err) => PersistenceError::ValidationFailed {
            path: field_err.path().clone(),
            reason: field_err.to_string(),
        }
        .into(),
        other => other,
    })?;

    if let Some(path) = tree.missing_required().into_iter().next() {
        return Err(PersistenceError::ValidationFailed {
            path,
            reason: REQUIRED_MESSAGE.to_string(),
        }
        .into());
    }
    Ok(tree)
}

fn merge(target: &mut serde_json::Value, overlay: serde_json::Value) {
    if let (Some(target), serde_json::Value::Object(overlay)) = (target.as_object_mut(), overlay) {
        target.extend(overlay);
    }
}

fn title_of(schema: &CollectionSchema, data: &serde_json::Value) -> Option<String> {
    let field = schema.use_as_title.as_deref()?;
    data.get(field)
        .and_then(|title| title.as_str())
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn save(
        &self,
        collection: &str,
        id: Option<&DocumentId>,
        payload: serde_json::Value,
    ) -> Result<SavedDocument> {
        self.take_failure().await?;
        let schema = self.schema(collection)?;
        let tree = validate(&schema, &payload)?;

        if schema.upload && id.is_none() && payload.get("url").is_none() {
            return Err(PersistenceError::ValidationFailed {
                path: "file".into(),
                reason: "No file was uploaded.".to_string(),
            }
            .into());
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut documents = self.documents.write().await;
        let stored = documents.entry(collection.to_string()).or_default();

        // Payload keys without a schema node (file metadata) are kept as sent.
        let mut data = payload;
        merge(&mut data, tree.to_json());

        let document = match id {
            Some(id) => {
                let existing = stored.iter_mut().find(|doc| &doc.id == id).ok_or_else(|| {
                    PersistenceError::NotFound {
                        collection: collection.to_string(),
                        id: id.clone(),
                    }
                })?;
                let mut merged = existing.data.clone();
                merge(&mut merged, data);
                merge(&mut merged, serde_json::json!({ "updatedAt": now }));
                existing.title = title_of(&schema, &merged);
                existing.url = merged.get("url").and_then(|u| u.as_str()).map(str::to_string);
                existing.data = merged;
                existing.clone()
            }
            None => {
                let id = DocumentId::generate();
                merge(
                    &mut data,
                    serde_json::json!({
                        "id": id.as_str(),
                        "createdAt": now,
                        "updatedAt": now,
                    }),
                );
                let document = SavedDocument {
                    collection: collection.to_string(),
                    title: title_of(&schema, &data),
                    url: data.get("url").and_then(|u| u.as_str()).map(str::to_string),
                    id,
                    data,
                };
                stored.push(document.clone());
                document
            }
        };

        debug!(collection, id = %document.id, "Saved document");
        Ok(document)
    }

    async fn fetch_one(&self, collection: &str, id: &DocumentId) -> Result<SavedDocument> {
        self.take_failure().await?;
        self.schema(collection)?;
        let documents = self.documents.read().await;
        documents
            .get(collection)
            .and_then(|stored| stored.iter().find(|doc| &doc.id == id))
            .cloned()
            .ok_or_else(|| {
                PersistenceError::NotFound {
                    collection: collection.to_string(),
                    id: id.clone(),
                }
                .into()
            })
    }

    async fn fetch_many(&self, collection: &str, filter: &Filter, page: usize) -> Result<Page> {
        self.take_failure().await?;
        self.schema(collection)?;
        let documents = self.documents.read().await;
        let matching: Vec<&SavedDocument> = documents
            .get(collection)
            .map(|stored| stored.iter().filter(|doc| filter.matches(doc)).collect())
            .unwrap_or_default();

        let page = page.max(1);
        let total_docs = matching.len();
        let total_pages = total_docs.div_ceil(self.page_size).max(1);
        let items = matching
            .into_iter()
            .skip((page - 1).saturating_mul(self.page_size))
            .take(self.page_size)
            .cloned()
            .collect();

        Ok(Page {
            items,
            page,
            total_pages,
            total_docs,
        })
    }

    async fn upload_file(&self, collection: &str, file: UploadFile) -> Result<StoredFile> {
        self.take_failure().await?;
        let schema = self.schema(collection)?;
        if !schema.upload {
            return Err(PersistenceError::ValidationFailed {
                path: "file".into(),
                reason: format!("'{collection}' does not accept uploads"),
            }
            .into());
        }

        let stored = StoredFile {
            url: format!("/{collection}/file/{}", file.filename),
            filesize: file.bytes.len(),
            filename: file.filename,
            mime_type: file.mime_type,
        };
        debug!(collection, url = %stored.url, "Stored file");
        Ok(stored)
    }
}
