use formstack::path::{Component, FieldPath, FieldPathBuf, normalize_path};

#[test]
fn test_normalize_drops_empty_components() {
    assert_eq!(normalize_path("items..0.title."), "items.0.title");
    assert_eq!(FieldPathBuf::normalize(".meta.keywords").as_str(), "meta.keywords");
    assert!(FieldPathBuf::normalize("...").is_empty());
}

#[test]
fn test_navigation() {
    let path = FieldPathBuf::from("items.2.tags.0.tag");

    assert_eq!(
        path.components().collect::<Vec<_>>(),
        vec!["items", "2", "tags", "0", "tag"]
    );
    assert_eq!(path.last(), Some("tag"));
    assert_eq!(path.parent().map(FieldPath::as_str), Some("items.2.tags.0"));
    assert_eq!(path.schema_path().as_str(), "items.tags.tag");
    assert_eq!(path.index_segments().collect::<Vec<_>>(), vec![2, 0]);
}

#[test]
fn test_parent_of_top_level_field_is_root() {
    let path = FieldPath::new("title");
    assert_eq!(path.parent().map(FieldPath::is_empty), Some(true));
    assert!(FieldPath::new("").parent().is_none());
}

#[test]
fn test_starts_with_matches_whole_components() {
    let path = FieldPath::new("items.0.caption");
    assert!(path.starts_with("items.0"));
    assert!(path.starts_with(""));
    assert!(!path.starts_with("item"));
    assert!(!path.starts_with("items.1"));
}

#[test]
fn test_join_and_push() {
    let path = FieldPathBuf::from("layout")
        .push_index(1)
        .join(FieldPath::new("text"));
    assert_eq!(path.as_str(), "layout.1.text");
    assert_eq!(path.to_string(), "layout.1.text");
}

#[test]
fn test_component_validation() {
    assert!(Component::new("caption").is_ok());
    assert!(Component::new("a.b").is_err());
    assert!(Component::new("42").is_err());
    assert!(Component::new("").is_err());
}
