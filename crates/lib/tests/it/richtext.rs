use formstack::{
    FieldValueTree, Value,
    relationship::RelationshipRef,
    richtext::{LinkSpec, LinkTarget, RichText, RichTextError},
};

use crate::helpers::*;

fn rich_text_error(err: formstack::Error) -> RichTextError {
    match err {
        formstack::Error::RichText(richtext_err) => richtext_err,
        other => panic!("Expected a rich text error, got {other:?}"),
    }
}

#[test]
fn test_insert_link_replaces_range() {
    let mut text = RichText::plain("See the post for details");

    let id = text
        .insert_link(8..12, LinkSpec::new("article", LinkTarget::url("https://example.com")))
        .expect("Failed to insert link");

    assert_eq!(text.text(), "See the article for details");
    let link = text.link_at(8).expect("Link should cover its text");
    assert_eq!(link.id, id);
    assert_eq!(link.range(), 8..15);
    assert_eq!(text.link_text(link), "article");
    assert!(text.link_at(15).is_none());
}

#[test]
fn test_insert_link_at_empty_range() {
    let mut text = RichText::plain("Hello world");
    text.insert_link(5..5, LinkSpec::new(",", LinkTarget::url("/comma")))
        .expect("Failed to insert link");
    assert_eq!(text.text(), "Hello, world");
    assert_eq!(text.links().len(), 1);
}

#[test]
fn test_overlapping_and_out_of_bounds_links_are_rejected() {
    let mut text = RichText::plain("one two three");
    text.insert_link(4..7, LinkSpec::new("two", LinkTarget::url("/2")))
        .expect("Failed to insert link");

    let err = rich_text_error(
        text.insert_link(5..9, LinkSpec::new("x", LinkTarget::url("/x")))
            .unwrap_err(),
    );
    assert!(matches!(err, RichTextError::OverlappingLink { start: 5, end: 9 }));

    let err = rich_text_error(
        text.insert_link(10..40, LinkSpec::new("x", LinkTarget::url("/x")))
            .unwrap_err(),
    );
    assert!(matches!(err, RichTextError::RangeOutOfBounds { len: 13, .. }));

    // Adjacent links do not overlap
    text.insert_link(8..13, LinkSpec::new("three", LinkTarget::url("/3")))
        .expect("Adjacent link should be accepted");
    assert_eq!(text.text(), "one two three");
    assert_eq!(text.links().len(), 2);
}

#[test]
fn test_remove_link_keeps_text() {
    let mut text = RichText::plain("click here");
    let id = text
        .insert_link(6..10, LinkSpec::new("here", LinkTarget::url("/here")))
        .expect("Failed to insert link");

    let removed = text.remove_link(&id).expect("Failed to remove link");
    assert_eq!(removed.range(), 6..10);
    assert_eq!(text.text(), "click here");
    assert!(text.links().is_empty());

    let err = text.remove_link(&id).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_document_links_refresh_display() {
    let mut text = RichText::plain("Written by Ada");
    let author = RelationshipRef::new("users", "u1").with_title("Ada");
    text.insert_link(11..14, LinkSpec::new("Ada", LinkTarget::document(author)))
        .expect("Failed to insert link");

    let renamed = RelationshipRef::new("users", "u1").with_title("Ada Lovelace");
    assert_eq!(text.update_document_links(&renamed), 1);
    assert_eq!(text.update_document_links(&RelationshipRef::new("users", "u2")), 0);
    assert_eq!(
        text.links()[0].target,
        LinkTarget::document(RelationshipRef::new("users", "u1").with_title("Ada Lovelace"))
    );
}

#[test]
fn test_rich_text_field_in_tree() {
    let schema = test_schemas().collection("posts").expect("Failed to get posts schema");
    let mut tree = FieldValueTree::new(schema.clone());

    // Plain text is accepted and becomes an unannotated value
    tree.set("body", "Intro text").expect("Failed to set body");
    assert_eq!(
        tree.get("body").and_then(Value::as_rich_text).map(RichText::text),
        Some("Intro text")
    );

    let mut body = tree.get("body").and_then(Value::as_rich_text).cloned().unwrap();
    body.insert_link(0..5, LinkSpec::new("Intro", LinkTarget::url("/intro")))
        .expect("Failed to insert link");
    tree.set("body", body.clone()).expect("Failed to set body");

    let reloaded = FieldValueTree::from_json(schema, &tree.to_json()).expect("Failed to reload");
    assert_eq!(reloaded.get("body").and_then(Value::as_rich_text), Some(&body));
}
