use formstack::persistence::{
    DocumentId, Filter, InMemoryPersistence, Persistence, PersistenceError, UploadFile,
};
use serde_json::json;

use crate::helpers::*;

fn backend() -> InMemoryPersistence {
    InMemoryPersistence::new(test_schemas())
}

// ===== SAVE =====

#[tokio::test]
async fn test_create_assigns_id_and_title() {
    let persistence = backend();

    let doc = persistence
        .save("users", None, json!({ "name": "Ada", "email": "ada@example.com" }))
        .await
        .expect("Failed to create user");

    assert_eq!(doc.collection, "users");
    assert_eq!(doc.title.as_deref(), Some("Ada"));
    assert_eq!(doc.get("id").and_then(|id| id.as_str()), Some(doc.id.as_str()));
    assert!(doc.get("createdAt").is_some());
    assert_eq!(persistence.count("users").await, 1);
}

#[tokio::test]
async fn test_update_merges_into_existing_document() {
    let persistence = backend();
    let created = persistence
        .save("users", None, json!({ "name": "Ada", "email": "ada@example.com" }))
        .await
        .expect("Failed to create user");

    let updated = persistence
        .save("users", Some(&created.id), json!({ "name": "Ada Lovelace" }))
        .await
        .expect("Failed to update user");

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.title.as_deref(), Some("Ada Lovelace"));
    assert_eq!(updated.get("email"), Some(&json!("ada@example.com")));
    assert_eq!(persistence.count("users").await, 1);

    let fetched = persistence
        .fetch_one("users", &created.id)
        .await
        .expect("Failed to fetch user");
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn test_save_validates_required_fields() {
    let persistence = backend();

    let err = persistence
        .save("users", None, json!({ "email": "nobody@example.com" }))
        .await
        .unwrap_err();

    assert!(err.is_validation_failed());
    match err {
        formstack::Error::Persistence(persistence_err) => {
            assert_eq!(persistence_err.field_path().map(|p| p.as_str()), Some("name"));
        }
        other => panic!("Expected a persistence error, got {other:?}"),
    }
    assert_eq!(persistence.count("users").await, 0);
}

#[tokio::test]
async fn test_save_rejects_payload_that_does_not_fit_schema() {
    let persistence = backend();

    let err = persistence
        .save("posts", None, json!({ "title": "Post", "views": "lots" }))
        .await
        .unwrap_err();
    assert!(err.is_validation_failed());
}

#[tokio::test]
async fn test_unknown_collection_and_document() {
    let persistence = backend();

    assert!(persistence.save("pages", None, json!({})).await.unwrap_err().is_not_found());
    assert!(
        persistence
            .fetch_one("users", &DocumentId::new("missing"))
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        persistence
            .save("users", Some(&DocumentId::new("missing")), json!({ "name": "X" }))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_injected_failure_is_returned_once() {
    let persistence = backend();
    persistence
        .fail_next_with(PersistenceError::NetworkError {
            reason: "connection reset".to_string(),
        })
        .await;

    let err = persistence
        .save("users", None, json!({ "name": "Ada" }))
        .await
        .unwrap_err();
    assert!(err.is_network_error());

    persistence
        .save("users", None, json!({ "name": "Ada" }))
        .await
        .expect("Retry should succeed");
}

// ===== LISTING =====

#[tokio::test]
async fn test_fetch_many_paginates_and_filters() {
    let persistence = backend().with_page_size(2);
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let doc = persistence
            .save("users", None, json!({ "name": name }))
            .await
            .expect("Failed to create user");
        ids.push(doc.id);
    }

    let first = persistence
        .fetch_many("users", &Filter::new(), 1)
        .await
        .expect("Failed to list users");
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.total_docs, 3);
    assert_eq!(first.total_pages, 2);
    assert!(first.has_next_page());

    let second = persistence
        .fetch_many("users", &Filter::new(), 2)
        .await
        .expect("Failed to list users");
    assert_eq!(second.items.len(), 1);
    assert!(!second.has_next_page());

    let filtered = persistence
        .fetch_many("users", &Filter::new().exclude([ids[0].clone()]), 1)
        .await
        .expect("Failed to list users");
    assert_eq!(filtered.total_docs, 2);
    assert!(filtered.items.iter().all(|doc| doc.id != ids[0]));

    let by_name = persistence
        .fetch_many("users", &Filter::new().equals("name", "c"), 1)
        .await
        .expect("Failed to list users");
    assert_eq!(by_name.items.len(), 1);
    assert_eq!(by_name.items[0].id, ids[2]);
}

#[tokio::test]
async fn test_empty_listing_has_one_page() {
    let persistence = backend();
    let page = persistence
        .fetch_many("media", &Filter::new(), 1)
        .await
        .expect("Failed to list media");
    assert!(page.items.is_empty());
    assert_eq!(page.total_pages, 1);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let persistence = backend().with_page_size(2);
    persistence
        .save("users", None, json!({ "name": "a" }))
        .await
        .expect("Failed to create user");

    for page in [5, usize::MAX] {
        let listing = persistence
            .fetch_many("users", &Filter::new(), page)
            .await
            .expect("Failed to list users");
        assert!(listing.items.is_empty());
        assert_eq!(listing.total_docs, 1);
        assert_eq!(listing.page, page);
        assert!(!listing.has_next_page());
    }
}

// ===== UPLOADS =====

#[tokio::test]
async fn test_upload_then_save_carries_url() {
    let persistence = backend();

    let stored = persistence
        .upload_file("media", UploadFile::new("cat.png", "image/png", vec![1, 2, 3]))
        .await
        .expect("Failed to upload file");
    assert_eq!(stored.url, "/media/file/cat.png");
    assert_eq!(stored.filesize, 3);

    let mut payload = json!({ "alt": "A cat" });
    stored.apply_to(&mut payload);
    let doc = persistence
        .save("media", None, payload)
        .await
        .expect("Failed to save media");
    assert_eq!(doc.url.as_deref(), Some("/media/file/cat.png"));
    assert_eq!(doc.get("mimeType"), Some(&json!("image/png")));

    let images = persistence
        .fetch_many("media", &Filter::new().mime_type("image/*"), 1)
        .await
        .expect("Failed to list media");
    assert_eq!(images.total_docs, 1);
    let documents = persistence
        .fetch_many("media", &Filter::new().mime_type("application/pdf"), 1)
        .await
        .expect("Failed to list media");
    assert_eq!(documents.total_docs, 0);
}

#[tokio::test]
async fn test_upload_collection_requires_file() {
    let persistence = backend();

    let err = persistence
        .save("media", None, json!({ "alt": "Nothing" }))
        .await
        .unwrap_err();
    assert!(err.is_validation_failed());

    let err = persistence
        .upload_file("users", UploadFile::new("x.txt", "text/plain", Vec::new()))
        .await
        .unwrap_err();
    assert!(err.is_validation_failed());
}
