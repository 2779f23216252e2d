//! End-to-end editing sessions across the tree, row, tab, drawer and relationship
//! controllers.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use formstack::{
    DrawerStack, EngineConfig, FormState, Value,
    drawer::{DrawerRequest, SaveOutcome, StackState},
    persistence::{InMemoryPersistence, UploadFile},
    registry::FieldRegistry,
    schema::{LabelSource, SchemaSet},
};

use crate::helpers::*;

#[test]
fn test_tab_value_survives_switching() {
    let mut form = posts_form();

    form.set_active_tab("content", "seo").expect("Failed to open seo tab");
    form.set("seo.slug", "hello-world").expect("Failed to type slug");

    form.set_active_tab("content", "tab-0").expect("Failed to open main tab");
    form.set("intro", "Welcome").expect("Failed to type intro");
    form.set_active_tab("content", "seo").expect("Failed to reopen seo tab");

    assert!(*form.get("seo.slug").unwrap() == "hello-world");
    assert!(*form.get("intro").unwrap() == "Welcome");
    assert!(form.is_dirty("seo.slug"));
}

#[test]
fn test_add_then_remove_restores_collection() {
    let mut form = posts_form();
    let first = form.add_row("items", 0, None).expect("Failed to add row");
    let second = form.add_row("items", 1, None).expect("Failed to add row");
    form.set("items.1.caption", "kept").expect("Failed to set caption");
    let before = form.tree().rows("items").unwrap().to_vec();

    let added = form.add_row("items", 1, None).expect("Failed to add row");
    assert_eq!(form.tree().rows("items").map(<[_]>::len), Some(3));
    form.remove_row("items", added.id()).expect("Failed to remove row");

    let after = form.tree().rows("items").unwrap();
    assert_eq!(after, before.as_slice());
    assert_eq!(after[0].id(), first.id());
    assert_eq!(after[1].id(), second.id());
}

#[test]
fn test_push_push_cancel_cancel_runs_no_sinks() {
    let (mut stack, _) = setup();
    let invoked = Arc::new(AtomicUsize::new(0));

    for level in 0..2 {
        let counter = Arc::clone(&invoked);
        stack
            .push(
                DrawerRequest::create("posts", level, "related").with_sink(move |_, _, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .expect("Failed to push drawer");
    }
    assert_eq!(stack.state(), StackState::Open(2));

    stack.cancel(2).expect("Failed to cancel inner drawer");
    stack.cancel(1).expect("Failed to cancel outer drawer");

    assert_eq!(stack.state(), StackState::Empty);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert!(!stack.form(0).unwrap().is_modified());
}

#[tokio::test]
async fn test_self_referential_inner_create_fills_only_inner_origin() {
    let (mut stack, persistence) = setup();

    stack
        .relationships()
        .add_inline_created(0, "related", "posts")
        .expect("Failed to open outer drawer");
    stack
        .relationships()
        .add_inline_created(1, "related", "posts")
        .expect("Failed to open inner drawer");

    stack.form_mut(2).unwrap().set("title", "Inner").unwrap();
    let outcome = stack.save(2, &persistence).await.expect("Failed to save inner drawer");
    assert!(matches!(outcome, SaveOutcome::Committed(_)));
    assert_eq!(stack.state(), StackState::Open(1));

    let outer = stack.form(1).unwrap();
    let related: Vec<_> = outer
        .get("related")
        .and_then(Value::as_relationship)
        .map(|value| value.refs().cloned().collect())
        .unwrap_or_default();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].title.as_deref(), Some("Inner"));

    // The outer drawer's own required field was never written
    assert!(outer.get("title").is_none());
    assert_eq!(
        outer.tree().missing_required().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        vec!["title"]
    );
    assert!(!stack.form(0).unwrap().is_modified());

    let err = stack.save(1, &persistence).await.unwrap_err();
    assert!(err.is_validation_failed());
    assert_eq!(stack.depth(), 1);
    assert_eq!(persistence.count("posts").await, 1);
}

#[test]
fn test_computed_row_label_follows_live_input() {
    let schemas = SchemaSet::new(vec![posts_schema(), users_schema(), media_schema()])
        .expect("Failed to build schemas")
        .with_row_label(
            "posts",
            "layout",
            LabelSource::computed(|ctx| {
                ctx.data
                    .get("text")
                    .and_then(Value::as_text)
                    .map(|text| format!("\u{201c}{text}\u{201d}"))
            }),
        )
        .expect("Failed to attach row label");
    let mut stack = DrawerStack::new(Arc::new(schemas), "posts", EngineConfig::default())
        .expect("Failed to create stack");
    let registry = FieldRegistry::new(EngineConfig::default());

    let form = stack.form_mut(0).unwrap();
    let quote = form.add_row("layout", 0, Some("quote")).expect("Failed to add quote");
    assert_eq!(form.label_for(&registry, "layout", quote.id(), "en").unwrap(), "Quote 01");

    let mut typed = String::new();
    for c in "To be".chars() {
        typed.push(c);
        form.set("layout.0.text", typed.as_str()).expect("Failed to type");
        assert_eq!(
            form.label_for(&registry, "layout", quote.id(), "en").unwrap(),
            format!("\u{201c}{typed}\u{201d}")
        );
    }
    assert!(stack.root().document_id().is_none());
}

#[test]
fn test_localized_texts_with_missing_locale() {
    let texts = |en: &str| LabelSource::localized(BTreeMap::from([("en".to_string(), en.to_string())]));
    let schemas = SchemaSet::new(vec![posts_schema(), users_schema(), media_schema()])
        .expect("Failed to build schemas")
        .with_field("posts", "title", |field| {
            field.label = Some(texts("Title"));
            field.placeholder = Some(texts("Your title"));
            field.description = Some(texts("Shown in listings"));
        })
        .expect("Failed to edit title");
    let form = FormState::for_collection(schemas.collection("posts").unwrap());
    let registry = FieldRegistry::new(EngineConfig::default());

    assert_eq!(registry.label(&form, "title", "en").unwrap(), "Title");
    assert_eq!(registry.placeholder(&form, "title", "en").unwrap().as_deref(), Some("Your title"));
    assert_eq!(
        registry.description(&form, "title", "en").unwrap().as_deref(),
        Some("Shown in listings")
    );

    assert_eq!(registry.label(&form, "title", "fr").unwrap(), "No title fr");
    assert_eq!(registry.placeholder(&form, "title", "fr").unwrap().as_deref(), Some("No title fr"));
    assert_eq!(registry.description(&form, "title", "fr").unwrap().as_deref(), Some("No title fr"));
}

#[tokio::test]
async fn test_nested_upload_updates_parent_url_immediately() {
    let schemas = test_schemas();
    let persistence = InMemoryPersistence::new(Arc::clone(&schemas));
    let mut stack = DrawerStack::new(schemas, "posts", EngineConfig::default())
        .expect("Failed to create stack");

    stack
        .relationships()
        .add_inline_created(0, "related", "posts")
        .expect("Failed to open post drawer");
    stack.form_mut(1).unwrap().set("title", "With image").unwrap();

    stack
        .relationships()
        .add_inline_created(1, "hero", "media")
        .expect("Failed to open upload drawer");
    let media = stack.form_mut(2).unwrap();
    media.set("alt", "A cat").unwrap();
    media.attach_file(UploadFile::new("cat.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]));
    assert!(media.is_modified());

    let outcome = stack.save(2, &persistence).await.expect("Failed to save upload");
    assert!(matches!(outcome, SaveOutcome::Committed(_)));

    let hero = stack
        .form(1)
        .unwrap()
        .get("hero")
        .and_then(Value::as_relationship)
        .and_then(|value| value.refs().next().cloned())
        .expect("Hero should be set");
    assert_eq!(hero.url.as_deref(), Some("/media/file/cat.png"));
    assert_eq!(hero.title.as_deref(), Some("A cat"));
    assert_eq!(stack.depth(), 1);

    // The outer drawer saves with the reference and commits into the root
    stack.save(1, &persistence).await.expect("Failed to save post");
    assert_eq!(stack.depth(), 0);
    assert_eq!(persistence.count("media").await, 1);
    assert_eq!(persistence.count("posts").await, 1);
}
