use formstack::{
    FieldPath, FormState,
    schema::{CollectionSchema, FieldSchema, SchemaSet, TabDefinition},
    tree::FieldError,
};

use crate::helpers::*;

#[test]
fn test_tab_keys_and_default_active_tab() {
    let form = posts_form();

    assert_eq!(
        form.tab_keys("content").expect("Failed to list tabs"),
        vec!["tab-0".to_string(), "seo".to_string()]
    );
    assert_eq!(form.active_tab("content").expect("Failed to get active tab"), "tab-0");
}

#[test]
fn test_set_active_tab() {
    let mut form = posts_form();

    form.set_active_tab("content", "seo").expect("Failed to switch tab");
    assert_eq!(form.active_tab("content").unwrap(), "seo");
    assert_eq!(form.presentation().selected_tab(FieldPath::new("content")), Some("seo"));

    let err = form.set_active_tab("content", "social").unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, formstack::Error::Field(FieldError::UnknownTab { .. })));
    assert_eq!(form.active_tab("content").unwrap(), "seo");
}

#[test]
fn test_tab_fields_follow_tab_naming() {
    let form = posts_form();

    let main = form.tab_fields("content", "tab-0").expect("Failed to list fields");
    assert_eq!(
        main.iter().map(|path| path.as_str()).collect::<Vec<_>>(),
        vec!["intro"]
    );

    let seo = form.tab_fields("content", "seo").expect("Failed to list fields");
    assert_eq!(
        seo.iter().map(|path| path.as_str()).collect::<Vec<_>>(),
        vec!["seo.slug", "seo.canonical"]
    );
}

#[test]
fn test_unnamed_tabs_fields_are_keyed_by_position() {
    let schemas = SchemaSet::new(vec![CollectionSchema::new(
        "pages",
        vec![
            FieldSchema::unnamed_tabs(vec![
                TabDefinition::unnamed("Content", vec![FieldSchema::text("heading")]),
                TabDefinition::named("meta", vec![FieldSchema::text("description")]),
            ]),
            FieldSchema::row(vec![FieldSchema::unnamed_tabs(vec![
                TabDefinition::unnamed("Left", vec![FieldSchema::text("left")]),
                TabDefinition::unnamed("Right", vec![FieldSchema::text("right")]),
            ])]),
        ],
    )])
    .expect("Unnamed tabs fields should load");
    let mut form = FormState::for_collection(schemas.collection("pages").expect("Failed to get pages"));

    assert_eq!(form.tab_keys("_tabs-0").unwrap(), vec!["tab-0".to_string(), "meta".to_string()]);
    assert_eq!(form.tab_keys("_tabs-1").unwrap(), vec!["tab-0".to_string(), "tab-1".to_string()]);
    assert!(form.tab_keys("_tabs-2").unwrap_err().is_schema_mismatch());

    form.set_active_tab("_tabs-1", "tab-1").expect("Failed to switch tab");
    assert_eq!(form.active_tab("_tabs-1").unwrap(), "tab-1");
    assert_eq!(form.active_tab("_tabs-0").unwrap(), "tab-0");

    let right = form.tab_fields("_tabs-1", "tab-1").expect("Failed to list fields");
    assert_eq!(right.iter().map(|path| path.as_str()).collect::<Vec<_>>(), vec!["right"]);
    let meta = form.tab_fields("_tabs-0", "meta").expect("Failed to list fields");
    assert_eq!(meta.iter().map(|path| path.as_str()).collect::<Vec<_>>(), vec!["meta.description"]);
    assert!(!form.is_modified());
}

#[test]
fn test_non_tabs_path_is_rejected() {
    let form = posts_form();

    assert!(form.tab_keys("meta").unwrap_err().is_schema_mismatch());
    assert!(form.active_tab("missing").unwrap_err().is_schema_mismatch());
}

#[test]
fn test_switching_tabs_keeps_values_clean() {
    let mut form = posts_form();
    form.set("seo.slug", "hello").expect("Failed to set slug");
    form.tree_mut().mark_saved();

    form.set_active_tab("content", "seo").expect("Failed to switch tab");
    form.set_active_tab("content", "tab-0").expect("Failed to switch tab");

    assert!(*form.get("seo.slug").unwrap() == "hello");
    assert!(!form.is_modified());
}
