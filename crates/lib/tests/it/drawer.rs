use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use formstack::{
    EngineConfig, FieldPath, FormState, Value,
    drawer::{DrawerError, DrawerMode, DrawerRequest, DrawerResult, SaveOutcome, StackState},
    path::RefSegment,
    persistence::Persistence,
};
use serde_json::json;

use crate::helpers::*;

/// A sink that stores the saved document's reference in the origin field.
fn ref_sink(form: &mut FormState, path: &FieldPath, result: DrawerResult) -> formstack::Result<()> {
    match result {
        DrawerResult::Saved(doc) => form.set(path, doc.to_ref()),
        DrawerResult::Selected(refs) => form.set(path, refs),
    }
}

fn drawer_error(err: formstack::Error) -> DrawerError {
    match err {
        formstack::Error::Drawer(drawer_err) => drawer_err,
        other => panic!("Expected a drawer error, got {other:?}"),
    }
}

fn author_title(form: &FormState) -> Option<String> {
    form.get("author")
        .and_then(Value::as_relationship)
        .and_then(|value| value.refs().next())
        .and_then(|reference| reference.title.clone())
}

// ===== PUSH =====

#[test]
fn test_push_opens_drawer_above_root() {
    let (mut stack, _) = setup();
    assert_eq!(stack.state(), StackState::Empty);
    assert!(stack.top().is_none());
    assert_eq!(stack.root().id().as_str(), "doc-drawer_posts_0_0");

    let id = stack
        .push(DrawerRequest::create("users", 0, "author"))
        .expect("Failed to push drawer");

    assert_eq!(id.as_str(), "doc-drawer_users_1_1");
    assert_eq!(stack.state(), StackState::Open(1));
    let top = stack.top().expect("Drawer should be open");
    assert_eq!(top.level(), 1);
    assert_eq!(top.mode(), DrawerMode::Create);
    assert_eq!(top.collection(), "users");
    assert_eq!(top.origin().map(|origin| origin.level), Some(0));
    assert!(top.form().is_some_and(|form| !form.is_modified()));
    assert_eq!(stack.find("users", 0).map(|context| context.id()), Some(&id));
    assert!(stack.find("users", 1).is_none());
}

#[test]
fn test_drawer_serials_are_unique() {
    let (mut stack, _) = setup();
    let first = stack
        .push(DrawerRequest::create("users", 0, "author"))
        .expect("Failed to push drawer");
    stack.cancel(1).expect("Failed to cancel drawer");

    let second = stack
        .push(DrawerRequest::create("users", 0, "author"))
        .expect("Failed to push drawer");
    assert_ne!(first, second);
    assert_eq!(second.as_str(), "doc-drawer_users_1_2");
}

#[test]
fn test_push_validates_origin() {
    let (mut stack, _) = setup();

    assert!(stack.push(DrawerRequest::create("users", 0, "missing")).is_err());
    assert!(stack.push(DrawerRequest::create("pages", 0, "author")).is_err());
    let err = drawer_error(stack.push(DrawerRequest::create("users", 3, "author")).unwrap_err());
    assert!(matches!(err, DrawerError::UnknownLevel { level: 3 }));
    assert_eq!(stack.depth(), 0);
}

#[test]
fn test_push_only_from_top() {
    let (mut stack, _) = setup();
    stack
        .push(DrawerRequest::create("posts", 0, "related"))
        .expect("Failed to push drawer");

    let err = drawer_error(stack.push(DrawerRequest::create("users", 0, "author")).unwrap_err());
    assert!(matches!(err, DrawerError::NotInteractive { level: 0, top: 1 }));

    stack
        .push(DrawerRequest::create("users", 1, "author"))
        .expect("Failed to push from the top drawer");
    assert_eq!(stack.depth(), 2);
}

#[test]
fn test_depth_limit() {
    let (mut stack, _) = setup_with_config(EngineConfig::default().with_max_drawer_depth(2));
    stack
        .push(DrawerRequest::create("posts", 0, "related"))
        .expect("Failed to push drawer");
    stack
        .push(DrawerRequest::create("posts", 1, "related"))
        .expect("Failed to push drawer");

    let err = stack
        .push(DrawerRequest::create("posts", 2, "related"))
        .unwrap_err();
    assert!(err.is_depth_exceeded());
    assert!(!err.is_programming_error());
    assert_eq!(stack.depth(), 2);
}

// ===== ISOLATION =====

#[test]
fn test_lower_levels_keep_unsaved_state() {
    let (mut stack, _) = setup();
    stack.form_mut(0).unwrap().set("title", "Draft").expect("Failed to set title");

    stack
        .push(DrawerRequest::create("posts", 0, "related"))
        .expect("Failed to push drawer");
    stack.form_mut(1).unwrap().set("title", "Inner").expect("Failed to set inner title");

    let err = stack.form_mut(0).unwrap_err();
    assert!(matches!(drawer_error(err), DrawerError::NotInteractive { .. }));

    assert!(*stack.form(0).unwrap().get("title").unwrap() == "Draft");
    assert!(stack.form(0).unwrap().is_dirty("title"));
    assert!(*stack.form(1).unwrap().get("title").unwrap() == "Inner");

    stack.cancel(1).expect("Failed to cancel drawer");
    assert!(*stack.form(0).unwrap().get("title").unwrap() == "Draft");
}

// ===== COMMIT / CANCEL / DISCARD =====

#[tokio::test]
async fn test_commit_runs_sink_on_origin_field() {
    let (mut stack, persistence) = setup();
    let user = persistence
        .save("users", None, json!({ "name": "Ada" }))
        .await
        .expect("Failed to create user");

    stack
        .push(DrawerRequest::create("users", 0, "author").with_sink(ref_sink))
        .expect("Failed to push drawer");
    stack
        .commit(1, DrawerResult::Saved(user))
        .expect("Failed to commit drawer");

    assert_eq!(stack.state(), StackState::Empty);
    let root = stack.form(0).unwrap();
    assert_eq!(author_title(root).as_deref(), Some("Ada"));
    assert!(root.is_dirty("author"));
}

#[tokio::test]
async fn test_commit_from_row_field_targets_origin_row() {
    let (mut stack, persistence) = setup();
    let root = stack.form_mut(0).unwrap();
    let first = root.add_row("items", 0, None).expect("Failed to add row");
    let second = root.add_row("items", 1, None).expect("Failed to add row");

    stack
        .push(
            DrawerRequest::create("users", 0, "items.1.link")
                .with_sink(ref_sink)
                .commit_on_save(true),
        )
        .expect("Failed to push drawer");

    // The origin names the row by id, not by index
    let origin = stack.top().and_then(|top| top.origin()).expect("Drawer should have an origin");
    assert_eq!(origin.level, 0);
    assert!(origin.field.segments().contains(&RefSegment::Row(second.id().clone())));
    assert_eq!(
        stack.relationships().origin_path(1).map(|path| path.to_string()),
        Some("items.1.link".to_string())
    );

    stack.form_mut(1).unwrap().set("name", "Grace").unwrap();
    let outcome = stack.save(1, &persistence).await.expect("Failed to save");
    assert!(matches!(outcome, SaveOutcome::Committed(_)));
    assert_eq!(stack.depth(), 0);

    let root = stack.form(0).unwrap();
    assert!(root.get("items.0.link").is_none());
    let title = root
        .get("items.1.link")
        .and_then(Value::as_relationship)
        .and_then(|value| value.refs().next())
        .and_then(|reference| reference.title.clone());
    assert_eq!(title.as_deref(), Some("Grace"));

    let rows = root.get("items").and_then(Value::as_rows).expect("Items should hold rows");
    assert_eq!(rows[0].id(), first.id());
    assert_eq!(rows[1].id(), second.id());
}

#[test]
fn test_commit_out_of_order_is_rejected() {
    let (mut stack, _) = setup();
    stack
        .push(DrawerRequest::create("posts", 0, "related"))
        .expect("Failed to push drawer");
    stack
        .push(DrawerRequest::create("posts", 1, "related"))
        .expect("Failed to push drawer");

    let err = stack.commit(1, DrawerResult::Selected(Vec::new())).unwrap_err();
    assert!(err.is_stack_order_violation());
    assert!(err.is_programming_error());
    assert!(stack.cancel(1).unwrap_err().is_stack_order_violation());
    assert_eq!(stack.depth(), 2);

    let err = drawer_error(stack.cancel(0).unwrap_err());
    assert!(matches!(err, DrawerError::RootLevel));

    // Levels above the top are order violations too
    let err = stack.cancel(5).unwrap_err();
    assert!(err.is_programming_error());
    let err = drawer_error(err);
    assert!(matches!(err, DrawerError::StackOrderViolation { level: 5, top: 2, .. }));
    assert!(stack.commit(3, DrawerResult::Selected(Vec::new())).unwrap_err().is_stack_order_violation());
    assert_eq!(stack.depth(), 2);
}

#[test]
fn test_cancel_runs_no_sink() {
    let (mut stack, _) = setup();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);

    stack
        .push(
            DrawerRequest::create("users", 0, "author").with_sink(move |_, _, _| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        )
        .expect("Failed to push drawer");
    stack.form_mut(1).unwrap().set("name", "Unsaved").expect("Failed to set name");
    stack.cancel(1).expect("Failed to cancel drawer");

    assert!(!ran.load(Ordering::SeqCst));
    assert!(!stack.form(0).unwrap().is_modified());
}

#[test]
fn test_discard_closes_level_and_above() {
    let (mut stack, _) = setup();
    let ran = Arc::new(AtomicBool::new(false));
    for level in 0..3 {
        let flag = Arc::clone(&ran);
        stack
            .push(
                DrawerRequest::create("posts", level, "related").with_sink(move |_, _, _| {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .expect("Failed to push drawer");
    }

    assert_eq!(stack.discard(2).expect("Failed to discard"), 2);
    assert_eq!(stack.depth(), 1);
    assert!(!ran.load(Ordering::SeqCst));

    assert!(matches!(drawer_error(stack.discard(0).unwrap_err()), DrawerError::RootLevel));
    assert_eq!(stack.close_all(), 1);
    assert_eq!(stack.close_all(), 0);
    assert_eq!(stack.state(), StackState::Empty);
}

// ===== SAVE =====

#[tokio::test]
async fn test_failed_save_keeps_drawer_open_with_field_errors() {
    let (mut stack, persistence) = setup();
    stack
        .push(DrawerRequest::create("users", 0, "author").with_sink(ref_sink))
        .expect("Failed to push drawer");
    stack.form_mut(1).unwrap().set("email", "ada@example.com").unwrap();

    let err = stack.save(1, &persistence).await.unwrap_err();
    assert!(err.is_validation_failed());
    assert_eq!(stack.depth(), 1);
    let errors = stack.field_errors(1).expect("Drawer should be open");
    assert_eq!(
        errors.get(FieldPath::new("name")).map(String::as_str),
        Some("This field is required.")
    );
    assert!(*stack.form(1).unwrap().get("email").unwrap() == "ada@example.com");

    stack.form_mut(1).unwrap().set("name", "Ada").unwrap();
    let outcome = stack.save(1, &persistence).await.expect("Retry should succeed");
    let doc = match outcome {
        SaveOutcome::Saved(doc) => doc,
        other => panic!("Expected a plain save, got {other:?}"),
    };

    let top = stack.top().expect("Drawer should stay open");
    assert!(top.field_errors().is_empty());
    assert_eq!(top.document_id(), Some(&doc.id));
    assert_eq!(top.mode(), DrawerMode::Update);
    assert!(!top.form().unwrap().is_modified());

    stack.commit(1, DrawerResult::Saved(doc)).expect("Failed to commit");
    assert_eq!(author_title(stack.form(0).unwrap()).as_deref(), Some("Ada"));
}

#[tokio::test]
async fn test_network_error_leaves_context_unchanged() {
    let (mut stack, persistence) = setup();
    stack.form_mut(0).unwrap().set("title", "Post").unwrap();
    persistence
        .fail_next_with(formstack::persistence::PersistenceError::NetworkError {
            reason: "timeout".to_string(),
        })
        .await;

    let err = stack.save(0, &persistence).await.unwrap_err();
    assert!(err.is_network_error());
    assert!(stack.field_errors(0).unwrap().is_empty());
    assert!(stack.form(0).unwrap().is_dirty("title"));
    assert!(stack.root().document_id().is_none());
    assert_eq!(persistence.count("posts").await, 0);

    stack.save(0, &persistence).await.expect("Retry should succeed");
    assert!(stack.root().document_id().is_some());
    assert!(!stack.form(0).unwrap().is_modified());
}

#[tokio::test]
async fn test_commit_on_save() {
    let (mut stack, persistence) = setup();
    stack
        .push(
            DrawerRequest::create("users", 0, "author")
                .with_sink(ref_sink)
                .commit_on_save(true),
        )
        .expect("Failed to push drawer");
    stack.form_mut(1).unwrap().set("name", "Grace").unwrap();

    let outcome = stack.save(1, &persistence).await.expect("Failed to save");
    assert!(matches!(outcome, SaveOutcome::Committed(_)));
    assert_eq!(stack.state(), StackState::Empty);
    assert_eq!(author_title(stack.form(0).unwrap()).as_deref(), Some("Grace"));
}

#[tokio::test]
async fn test_pending_context_is_not_interactive() {
    let (mut stack, persistence) = setup();
    stack.form_mut(0).unwrap().set("title", "Post").unwrap();

    let ticket = stack.begin_save(0).expect("Failed to begin save");
    assert!(stack.root().is_pending());
    assert!(stack.form_mut(0).unwrap_err().is_pending());
    assert!(stack.push(DrawerRequest::create("users", 0, "author")).unwrap_err().is_pending());

    let outcome = ticket.execute(&persistence).await;
    let outcome = stack.finish_save(ticket, outcome).expect("Failed to finish save");
    assert!(matches!(outcome, SaveOutcome::Saved(_)));
    assert!(!stack.root().is_pending());
    stack.form_mut(0).expect("Root should accept input again");
}

#[tokio::test]
async fn test_late_save_result_after_cancel_is_dropped() {
    let (mut stack, persistence) = setup();
    stack
        .push(
            DrawerRequest::create("users", 0, "author")
                .with_sink(ref_sink)
                .commit_on_save(true),
        )
        .expect("Failed to push drawer");
    stack.form_mut(1).unwrap().set("name", "Late").unwrap();

    let ticket = stack.begin_save(1).expect("Failed to begin save");
    stack.cancel(1).expect("Cancel is allowed while saving");

    // A new drawer at the same level must not receive the stale result
    stack
        .push(DrawerRequest::create("users", 0, "author").with_sink(ref_sink))
        .expect("Failed to push drawer");

    let outcome = ticket.execute(&persistence).await;
    let outcome = stack.finish_save(ticket, outcome).expect("Stale result is not an error");
    assert_eq!(outcome, SaveOutcome::Dropped);
    assert_eq!(stack.depth(), 1);
    assert!(stack.top().unwrap().document_id().is_none());
    assert!(stack.form(0).unwrap().get("author").is_none());
}

#[tokio::test]
async fn test_late_save_result_after_cascading_discard_is_dropped() {
    let (mut stack, persistence) = setup();
    stack
        .push(DrawerRequest::create("posts", 0, "related").with_sink(ref_sink))
        .expect("Failed to push drawer");
    stack
        .push(
            DrawerRequest::create("users", 1, "author")
                .with_sink(ref_sink)
                .commit_on_save(true),
        )
        .expect("Failed to push drawer");
    stack.form_mut(2).unwrap().set("name", "Orphan").unwrap();

    let ticket = stack.begin_save(2).expect("Failed to begin save");
    assert_eq!(stack.discard(1).expect("Discard is allowed while saving"), 2);

    let outcome = ticket.execute(&persistence).await;
    let outcome = stack.finish_save(ticket, outcome).expect("Stale result is not an error");
    assert_eq!(outcome, SaveOutcome::Dropped);
    assert_eq!(stack.depth(), 0);

    let root = stack.form(0).unwrap();
    assert!(root.get("related").is_none());
    assert!(!root.is_modified());
}

#[tokio::test]
async fn test_update_drawer_loads_document() {
    let (mut stack, persistence) = setup();
    let user = persistence
        .save("users", None, json!({ "name": "Ada", "email": "ada@example.com" }))
        .await
        .expect("Failed to create user");

    stack
        .push(DrawerRequest::update(user.clone(), 0, "author"))
        .expect("Failed to push drawer");

    let top = stack.top().unwrap();
    assert_eq!(top.mode(), DrawerMode::Update);
    assert_eq!(top.document_id(), Some(&user.id));
    let form = top.form().unwrap();
    assert!(*form.get("email").unwrap() == "ada@example.com");
    assert!(!form.is_modified());

    stack.form_mut(1).unwrap().set("name", "Ada L.").unwrap();
    let outcome = stack.save(1, &persistence).await.expect("Failed to save");
    let saved = match outcome {
        SaveOutcome::Saved(saved) => saved,
        other => panic!("Expected a plain save, got {other:?}"),
    };
    assert_eq!(saved.id, user.id);
    assert_eq!(persistence.count("users").await, 1);
}
