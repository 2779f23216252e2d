//! The persistence boundary.
//!
//! Documents are saved, fetched and listed through the async [`Persistence`] trait.
//! These calls are the only suspension points of an editing session; everything
//! else in the engine is synchronous. [`InMemoryPersistence`] implements the trait
//! for development and tests.

mod errors;
mod in_memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use errors::PersistenceError;
pub use in_memory::InMemoryPersistence;

use crate::{Result, relationship::RelationshipRef};

/// Identifier of a persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A document as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDocument {
    pub collection: String,
    pub id: DocumentId,
    /// The stored payload, including backend bookkeeping such as `createdAt`
    pub data: serde_json::Value,
    /// Display title derived from the collection's `useAsTitle` field
    pub title: Option<String>,
    /// File URL of upload-collection documents
    pub url: Option<String>,
}

impl SavedDocument {
    /// Returns the denormalized reference used by relationship fields.
    pub fn to_ref(&self) -> RelationshipRef {
        RelationshipRef {
            collection: self.collection.clone(),
            id: self.id.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }

    /// Reads a top-level payload key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<SavedDocument>,
    /// 1-based page number
    pub page: usize,
    pub total_pages: usize,
    pub total_docs: usize,
}

impl Page {
    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }
}

/// A file selected for upload, sent before the owning document is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// A stored file, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub filesize: usize,
}

impl StoredFile {
    /// Merges the file metadata into a document payload.
    pub fn apply_to(&self, payload: &mut serde_json::Value) {
        if let Some(object) = payload.as_object_mut() {
            object.insert("filename".into(), self.filename.clone().into());
            object.insert("url".into(), self.url.clone().into());
            object.insert("mimeType".into(), self.mime_type.clone().into());
            object.insert("filesize".into(), self.filesize.into());
        }
    }
}

/// Restricts which documents a listing returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Documents that must not be offered, such as those already selected
    pub exclude_ids: Vec<DocumentId>,
    /// Accepted MIME types; `image/*` matches any image type
    pub mime_types: Vec<String>,
    /// Top-level payload keys that must equal the given values
    pub equals: Vec<(String, serde_json::Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(mut self, ids: impl IntoIterator<Item = DocumentId>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_types.push(mime_type.into());
        self
    }

    pub fn equals(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.equals.push((key.into(), value.into()));
        self
    }

    /// Returns true if the document passes every constraint.
    pub fn matches(&self, document: &SavedDocument) -> bool {
        if self.exclude_ids.contains(&document.id) {
            return false;
        }

        if !self.mime_types.is_empty() {
            let mime_type = document
                .get("mimeType")
                .and_then(|m| m.as_str())
                .unwrap_or_default();
            if !self
                .mime_types
                .iter()
                .any(|accepted| mime_matches(accepted, mime_type))
            {
                return false;
            }
        }

        self.equals
            .iter()
            .all(|(key, value)| document.get(key) == Some(value))
    }
}

fn mime_matches(accepted: &str, mime_type: &str) -> bool {
    match accepted.strip_suffix("/*") {
        Some(major) => mime_type
            .split_once('/')
            .is_some_and(|(candidate, _)| candidate == major),
        None => accepted == mime_type,
    }
}

/// The document backend an editing session talks to.
///
/// Implementations must be `Send + Sync`; the engine holds them behind shared
/// references across await points.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Creates (`id` is `None`) or updates a document.
    ///
    /// Fails with [`PersistenceError::ValidationFailed`] naming the first invalid
    /// field, or [`PersistenceError::NetworkError`] on transport failure.
    async fn save(
        &self,
        collection: &str,
        id: Option<&DocumentId>,
        payload: serde_json::Value,
    ) -> Result<SavedDocument>;

    /// Fetches one document by id.
    async fn fetch_one(&self, collection: &str, id: &DocumentId) -> Result<SavedDocument>;

    /// Lists one page of a collection's documents matching `filter`.
    async fn fetch_many(&self, collection: &str, filter: &Filter, page: usize) -> Result<Page>;

    /// Stores a file for an upload collection.
    async fn upload_file(&self, collection: &str, file: UploadFile) -> Result<StoredFile>;
}
