use formstack::schema::{
    CollectionSchema, FieldKind, FieldSchema, SchemaError, SchemaSet,
};
use serde_json::json;

use crate::helpers::*;

fn schema_error(err: formstack::Error) -> SchemaError {
    match err {
        formstack::Error::Schema(schema_err) => schema_err,
        other => panic!("Expected a schema error, got {other:?}"),
    }
}

#[test]
fn test_load_schema_file() {
    let schemas = SchemaSet::from_json(
        &json!({
            "collections": [
                {
                    "slug": "posts",
                    "useAsTitle": "title",
                    "fields": [
                        { "type": "text", "name": "title", "required": true,
                          "label": { "en": "Title", "de": "Titel" } },
                        { "type": "select", "name": "status", "options": ["draft", "live"],
                          "defaultValue": "draft" },
                        { "type": "relationship", "name": "author", "relationTo": "users" },
                        { "type": "array", "name": "items", "maxRows": 5,
                          "fields": [{ "type": "text", "name": "caption" }] }
                    ]
                },
                { "slug": "users", "fields": [{ "type": "email", "name": "email" }] }
            ]
        })
        .to_string(),
    )
    .expect("Failed to load schema file");

    assert_eq!(schemas.slugs().collect::<Vec<_>>(), vec!["posts", "users"]);
    let posts = schemas.collection("posts").expect("Failed to get posts");
    assert_eq!(posts.use_as_title.as_deref(), Some("title"));
    assert_eq!(posts.fields[2].kind, FieldKind::Relationship);
    assert_eq!(posts.fields[2].relation_to, vec!["users".to_string()]);
    assert_eq!(posts.fields[3].max_rows, Some(5));

    // Declared defaults seed new documents
    let tree = formstack::FieldValueTree::new(posts);
    assert!(*tree.get("status").unwrap() == "draft");
    assert!(!tree.is_modified());
}

#[test]
fn test_load_unnamed_tabs_field() {
    let schemas = SchemaSet::from_json(
        &json!({
            "collections": [{
                "slug": "pages",
                "fields": [{
                    "type": "tabs",
                    "tabs": [
                        { "label": "Content", "fields": [{ "type": "text", "name": "heading" }] },
                        { "name": "seo", "fields": [{ "type": "text", "name": "slug" }] }
                    ]
                }]
            }]
        })
        .to_string(),
    )
    .expect("Failed to load schema file");

    let pages = schemas.collection("pages").expect("Failed to get pages");
    assert_eq!(pages.fields[0].kind, FieldKind::Tabs);
    assert!(pages.fields[0].name.is_none());

    let form = formstack::FormState::for_collection(pages);
    assert_eq!(form.active_tab("_tabs-0").expect("Failed to get active tab"), "tab-0");
}

#[test]
fn test_unknown_collection() {
    let err = schema_error(test_schemas().collection("pages").unwrap_err());
    assert!(err.is_not_found());
    assert_eq!(err.collection(), "pages");
}

#[test]
fn test_duplicate_fields_across_containers() {
    // A row container shares its parent's data level
    let err = SchemaSet::new(vec![CollectionSchema::new(
        "posts",
        vec![
            FieldSchema::text("title"),
            FieldSchema::row(vec![FieldSchema::text("title")]),
        ],
    )])
    .unwrap_err();
    assert!(matches!(schema_error(err), SchemaError::DuplicateField { .. }));

    // A group starts a new level
    SchemaSet::new(vec![CollectionSchema::new(
        "posts",
        vec![
            FieldSchema::text("title"),
            FieldSchema::group("meta", vec![FieldSchema::text("title")]),
        ],
    )])
    .expect("Nested names may repeat");
}

#[test]
fn test_invalid_schemas_are_rejected() {
    let cases = [
        (
            CollectionSchema::new("posts", vec![FieldSchema::text("a.b")]),
            "InvalidFieldName",
        ),
        (
            CollectionSchema::new("posts", vec![FieldSchema::array("items", Vec::new())]),
            "EmptyContainer",
        ),
        (
            CollectionSchema::new(
                "posts",
                vec![FieldSchema::relationship("author", ["people"])],
            ),
            "UnknownRelationTarget",
        ),
        (
            CollectionSchema::new(
                "posts",
                vec![FieldSchema::number("views").with_default(json!("many"))],
            ),
            "InvalidDefault",
        ),
        (
            CollectionSchema::new("posts", vec![FieldSchema::number("views")]).use_as_title("views"),
            "InvalidUseAsTitle",
        ),
    ];

    for (collection, expected) in cases {
        let err = schema_error(SchemaSet::new(vec![collection]).unwrap_err());
        assert!(
            format!("{err:?}").starts_with(expected),
            "Expected {expected}, got {err:?}"
        );
        assert_eq!(err.collection(), "posts");
    }
}

#[test]
fn test_duplicate_collection() {
    let err = SchemaSet::new(vec![users_schema(), users_schema()]).unwrap_err();
    assert!(matches!(
        schema_error(err),
        SchemaError::DuplicateCollection { .. }
    ));
}
