//! Field schema definitions.
//!
//! A [`CollectionSchema`] describes the recursive shape of one collection's
//! documents: scalar fields, groups, arrays and block collections of nested
//! fields, tab partitions, and relationships to other collections. Schemas are
//! loaded once, wrapped in [`Arc`], and never mutated during an editing session.
//!
//! # Data levels
//!
//! Not every field adds a path segment. `row`, `collapsible` and `tabs` fields
//! only arrange their children visually, and unnamed tabs share the parent level.
//! [`level_nodes`] flattens those containers and yields the nodes that actually
//! store data at one level; named tabs appear as [`SchemaNode::Tab`] and behave
//! like groups.
//!
//! # Usage
//!
//! ```
//! use formstack::schema::{CollectionSchema, FieldSchema, SchemaSet};
//!
//! let posts = CollectionSchema::new(
//!     "posts",
//!     vec![
//!         FieldSchema::text("title").required(),
//!         FieldSchema::array("items", vec![FieldSchema::text("caption")]),
//!         FieldSchema::relationship("related", ["posts"]).has_many(),
//!     ],
//! )
//! .use_as_title("title");
//!
//! let schemas = SchemaSet::new(vec![posts]).unwrap();
//! assert!(schemas.get("posts").is_some());
//! ```

mod errors;
mod label;

use std::{collections::BTreeMap, collections::BTreeSet, fmt, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize};

pub use errors::SchemaError;
pub use label::{EmbeddedComponent, LabelContext, LabelFn, LabelSource};

use crate::{
    Result,
    constants::UNNAMED_TABS_PREFIX,
    path::{Component, FieldPath, FieldPathBuf, parse_index},
    tree::{Doc, Row, Value, value_from_json},
};

/// The declared kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Code,
    Number,
    Checkbox,
    Date,
    Json,
    Select,
    Radio,
    Point,
    Array,
    #[serde(alias = "block")]
    Blocks,
    Tabs,
    Group,
    Row,
    Collapsible,
    Relationship,
    RichText,
    Upload,
    Ui,
}

impl FieldKind {
    /// Returns the kind name as written in schema files
    pub fn type_name(&self) -> &'static str {
        match *self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Email => "email",
            FieldKind::Code => "code",
            FieldKind::Number => "number",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Date => "date",
            FieldKind::Json => "json",
            FieldKind::Select => "select",
            FieldKind::Radio => "radio",
            FieldKind::Point => "point",
            FieldKind::Array => "array",
            FieldKind::Blocks => "blocks",
            FieldKind::Tabs => "tabs",
            FieldKind::Group => "group",
            FieldKind::Row => "row",
            FieldKind::Collapsible => "collapsible",
            FieldKind::Relationship => "relationship",
            FieldKind::RichText => "richText",
            FieldKind::Upload => "upload",
            FieldKind::Ui => "ui",
        }
    }

    /// Returns true for kinds whose value is an ordered collection of rows
    pub fn has_rows(&self) -> bool {
        matches!(self, FieldKind::Array | FieldKind::Blocks)
    }

    /// Returns true for kinds whose value references other documents
    pub fn is_relationship(&self) -> bool {
        matches!(self, FieldKind::Relationship | FieldKind::Upload)
    }

    /// Returns true for kinds that arrange fields without storing data
    pub fn is_presentational(&self) -> bool {
        matches!(
            self,
            FieldKind::Row | FieldKind::Collapsible | FieldKind::Tabs | FieldKind::Ui
        )
    }

    /// Returns true for kinds edited as plain text
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Textarea | FieldKind::Email | FieldKind::Code
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Singular and plural labels for collections, arrays and blocks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Labels {
    #[serde(default)]
    pub singular: Option<LabelSource>,
    #[serde(default)]
    pub plural: Option<LabelSource>,
}

/// One node of a collection's field schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<LabelSource>,
    #[serde(default)]
    pub placeholder: Option<LabelSource>,
    #[serde(default)]
    pub description: Option<LabelSource>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    /// Children of groups, arrays, rows and collapsibles
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    /// Variants of a blocks field
    #[serde(default)]
    pub blocks: Vec<BlockDefinition>,
    /// Panes of a tabs field
    #[serde(default)]
    pub tabs: Vec<TabDefinition>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub relation_to: Vec<String>,
    #[serde(default)]
    pub has_many: bool,
    /// Row label of an array or blocks field
    #[serde(default)]
    pub row_label: Option<LabelSource>,
    /// Singular/plural labels of an array's rows
    #[serde(default)]
    pub labels: Option<Labels>,
    /// Allowed values of select and radio fields
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub min_rows: Option<usize>,
    #[serde(default)]
    pub max_rows: Option<usize>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(target) => vec![target],
        OneOrMany::Many(targets) => targets,
    })
}

impl FieldSchema {
    /// Creates a field of the given kind with every option unset.
    pub fn new(kind: FieldKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            label: None,
            placeholder: None,
            description: None,
            required: false,
            read_only: false,
            default_value: None,
            fields: Vec::new(),
            blocks: Vec::new(),
            tabs: Vec::new(),
            relation_to: Vec::new(),
            has_many: false,
            row_label: None,
            labels: None,
            options: Vec::new(),
            min_rows: None,
            max_rows: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(FieldKind::Text, name)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(FieldKind::Number, name)
    }

    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::new(FieldKind::Checkbox, name)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(FieldKind::Date, name)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(FieldKind::Json, name)
    }

    pub fn rich_text(name: impl Into<String>) -> Self {
        Self::new(FieldKind::RichText, name)
    }

    pub fn select<S: Into<String>>(name: impl Into<String>, options: impl IntoIterator<Item = S>) -> Self {
        let mut field = Self::new(FieldKind::Select, name);
        field.options = options.into_iter().map(Into::into).collect();
        field
    }

    pub fn group(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        let mut field = Self::new(FieldKind::Group, name);
        field.fields = fields;
        field
    }

    pub fn array(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        let mut field = Self::new(FieldKind::Array, name);
        field.fields = fields;
        field
    }

    pub fn blocks(name: impl Into<String>, blocks: Vec<BlockDefinition>) -> Self {
        let mut field = Self::new(FieldKind::Blocks, name);
        field.blocks = blocks;
        field
    }

    /// Creates a tabs field. The name keys the active tab and adds no path segment.
    pub fn tabs(name: impl Into<String>, tabs: Vec<TabDefinition>) -> Self {
        let mut field = Self::new(FieldKind::Tabs, name);
        field.tabs = tabs;
        field
    }

    /// Creates an unnamed tabs field, keyed by its position at the level.
    pub fn unnamed_tabs(tabs: Vec<TabDefinition>) -> Self {
        let mut field = Self::tabs("", tabs);
        field.name = None;
        field
    }

    /// Creates an unnamed row container.
    pub fn row(fields: Vec<FieldSchema>) -> Self {
        let mut field = Self::new(FieldKind::Row, "");
        field.name = None;
        field.fields = fields;
        field
    }

    pub fn collapsible(label: impl Into<LabelSource>, fields: Vec<FieldSchema>) -> Self {
        let mut field = Self::new(FieldKind::Collapsible, "");
        field.name = None;
        field.label = Some(label.into());
        field.fields = fields;
        field
    }

    pub fn relationship<S: Into<String>>(
        name: impl Into<String>,
        relation_to: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut field = Self::new(FieldKind::Relationship, name);
        field.relation_to = relation_to.into_iter().map(Into::into).collect();
        field
    }

    pub fn upload(name: impl Into<String>, collection: impl Into<String>) -> Self {
        let mut field = Self::new(FieldKind::Upload, name);
        field.relation_to = vec![collection.into()];
        field
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn has_many(mut self) -> Self {
        self.has_many = true;
        self
    }

    pub fn min_rows(mut self, min: usize) -> Self {
        self.min_rows = Some(min);
        self
    }

    pub fn max_rows(mut self, max: usize) -> Self {
        self.max_rows = Some(max);
        self
    }

    pub fn with_label(mut self, label: impl Into<LabelSource>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<LabelSource>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<LabelSource>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_row_label(mut self, label: impl Into<LabelSource>) -> Self {
        self.row_label = Some(label.into());
        self
    }

    pub fn with_labels(mut self, singular: impl Into<LabelSource>, plural: impl Into<LabelSource>) -> Self {
        self.labels = Some(Labels {
            singular: Some(singular.into()),
            plural: Some(plural.into()),
        });
        self
    }

    /// Returns the field's name, or an empty string for unnamed containers.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Looks up a block variant by slug.
    pub fn block(&self, slug: &str) -> Option<&BlockDefinition> {
        self.blocks.iter().find(|block| block.slug == slug)
    }
}

/// A named shape a blocks row may instantiate.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockDefinition {
    pub slug: String,
    #[serde(default)]
    pub labels: Option<Labels>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl BlockDefinition {
    pub fn new(slug: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            slug: slug.into(),
            labels: None,
            fields,
        }
    }

    pub fn with_labels(mut self, singular: impl Into<LabelSource>, plural: impl Into<LabelSource>) -> Self {
        self.labels = Some(Labels {
            singular: Some(singular.into()),
            plural: Some(plural.into()),
        });
        self
    }
}

/// One pane of a tabs field.
///
/// A named tab stores its fields under its name, like a group. An unnamed tab
/// stores them at the level of the tabs field itself.
#[derive(Debug, Clone, Deserialize)]
pub struct TabDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<LabelSource>,
    #[serde(default)]
    pub description: Option<LabelSource>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl TabDefinition {
    /// Creates a tab that shares the parent level.
    pub fn unnamed(label: impl Into<LabelSource>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: None,
            label: Some(label.into()),
            description: None,
            fields,
        }
    }

    /// Creates a tab that stores its fields under `name`.
    pub fn named(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: Some(name.into()),
            label: None,
            description: None,
            fields,
        }
    }

    /// Returns the key used to select this tab: its name, or `tab-{index}`.
    pub fn key(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("tab-{index}"),
        }
    }
}

/// The schema of one collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    pub slug: String,
    #[serde(default)]
    pub labels: Option<Labels>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    /// Top-level field whose value titles documents in relationship displays
    #[serde(default)]
    pub use_as_title: Option<String>,
    /// Documents of upload collections carry a stored file
    #[serde(default)]
    pub upload: bool,
}

/// A data-bearing schema node: a field, or a named tab acting as a group.
#[derive(Debug, Clone, Copy)]
pub enum SchemaNode<'a> {
    Field(&'a FieldSchema),
    Tab(&'a TabDefinition),
}

impl<'a> SchemaNode<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            SchemaNode::Field(field) => field.name(),
            SchemaNode::Tab(tab) => tab.name.as_deref().unwrap_or_default(),
        }
    }

    /// Returns the node's kind; named tabs report [`FieldKind::Group`].
    pub fn kind(&self) -> FieldKind {
        match *self {
            SchemaNode::Field(field) => field.kind,
            SchemaNode::Tab(_) => FieldKind::Group,
        }
    }

    pub fn field(&self) -> Option<&'a FieldSchema> {
        match *self {
            SchemaNode::Field(field) => Some(field),
            SchemaNode::Tab(_) => None,
        }
    }

    pub fn fields(&self) -> &'a [FieldSchema] {
        match *self {
            SchemaNode::Field(field) => &field.fields,
            SchemaNode::Tab(tab) => &tab.fields,
        }
    }

    pub fn label(&self) -> Option<&'a LabelSource> {
        match *self {
            SchemaNode::Field(field) => field.label.as_ref(),
            SchemaNode::Tab(tab) => tab.label.as_ref(),
        }
    }

    pub fn placeholder(&self) -> Option<&'a LabelSource> {
        self.field().and_then(|field| field.placeholder.as_ref())
    }

    pub fn description(&self) -> Option<&'a LabelSource> {
        match *self {
            SchemaNode::Field(field) => field.description.as_ref(),
            SchemaNode::Tab(tab) => tab.description.as_ref(),
        }
    }

    pub fn required(&self) -> bool {
        self.field().is_some_and(|field| field.required)
    }

    pub fn read_only(&self) -> bool {
        self.field().is_some_and(|field| field.read_only)
    }

    pub fn has_many(&self) -> bool {
        self.field().is_some_and(|field| field.has_many)
    }

    pub fn relation_to(&self) -> &'a [String] {
        self.field().map(|field| field.relation_to.as_slice()).unwrap_or_default()
    }

    pub fn options(&self) -> &'a [String] {
        self.field().map(|field| field.options.as_slice()).unwrap_or_default()
    }

    pub fn block(&self, slug: &str) -> Option<&'a BlockDefinition> {
        self.field().and_then(|field| field.block(slug))
    }
}

/// Returns the data-bearing nodes of one level, flattening presentational containers.
pub fn level_nodes(fields: &[FieldSchema]) -> Vec<SchemaNode<'_>> {
    let mut out = Vec::new();
    collect_level(fields, &mut out);
    out
}

fn collect_level<'a>(fields: &'a [FieldSchema], out: &mut Vec<SchemaNode<'a>>) {
    for field in fields {
        match field.kind {
            FieldKind::Row | FieldKind::Collapsible => collect_level(&field.fields, out),
            FieldKind::Tabs => {
                for tab in &field.tabs {
                    if tab.name.is_some() {
                        out.push(SchemaNode::Tab(tab));
                    } else {
                        collect_level(&tab.fields, out);
                    }
                }
            }
            FieldKind::Ui => {}
            _ => {
                if field.name.is_some() {
                    out.push(SchemaNode::Field(field));
                }
            }
        }
    }
}

/// Finds the node named `name` at one data level.
pub fn find_node<'a>(fields: &'a [FieldSchema], name: &str) -> Option<SchemaNode<'a>> {
    level_nodes(fields)
        .into_iter()
        .find(|node| node.name() == name)
}

/// Returns the tabs fields of one data level with the keys addressing them.
///
/// Named tabs fields are keyed by name. Unnamed ones are keyed by their position
/// among the level's unnamed tabs fields: `_tabs-0`, `_tabs-1`, ...
pub fn level_tabs(fields: &[FieldSchema]) -> Vec<(String, &FieldSchema)> {
    let mut out = Vec::new();
    let mut unnamed = 0;
    collect_tabs(fields, &mut unnamed, &mut out);
    out
}

fn collect_tabs<'a>(fields: &'a [FieldSchema], unnamed: &mut usize, out: &mut Vec<(String, &'a FieldSchema)>) {
    for field in fields {
        match field.kind {
            FieldKind::Tabs => {
                let key = match &field.name {
                    Some(name) => name.clone(),
                    None => {
                        let key = format!("{UNNAMED_TABS_PREFIX}{unnamed}");
                        *unnamed += 1;
                        key
                    }
                };
                out.push((key, field));
                for tab in field.tabs.iter().filter(|tab| tab.name.is_none()) {
                    collect_tabs(&tab.fields, unnamed, out);
                }
            }
            FieldKind::Row | FieldKind::Collapsible => collect_tabs(&field.fields, unnamed, out),
            _ => {}
        }
    }
}

/// Finds the tabs field keyed by `key` at one data level.
pub fn find_tabs<'a>(fields: &'a [FieldSchema], key: &str) -> Option<&'a FieldSchema> {
    level_tabs(fields)
        .into_iter()
        .find(|(tab_key, _)| tab_key == key)
        .map(|(_, field)| field)
}

/// What a path resolves to in a schema.
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    /// A field or named tab
    Node(SchemaNode<'a>),
    /// A row of an array or blocks field; `block` is set for blocks rows
    Row {
        field: &'a FieldSchema,
        block: Option<&'a BlockDefinition>,
    },
}

impl<'a> Resolved<'a> {
    /// Returns the fields stored one level below the resolved position.
    pub fn fields(&self) -> &'a [FieldSchema] {
        match *self {
            Resolved::Node(node) => node.fields(),
            Resolved::Row {
                block: Some(block), ..
            } => &block.fields,
            Resolved::Row { field, block: None } => &field.fields,
        }
    }
}

impl CollectionSchema {
    pub fn new(slug: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            slug: slug.into(),
            labels: None,
            fields,
            use_as_title: None,
            upload: false,
        }
    }

    pub fn use_as_title(mut self, field: impl Into<String>) -> Self {
        self.use_as_title = Some(field.into());
        self
    }

    pub fn upload(mut self) -> Self {
        self.upload = true;
        self
    }

    pub fn with_labels(mut self, singular: impl Into<LabelSource>, plural: impl Into<LabelSource>) -> Self {
        self.labels = Some(Labels {
            singular: Some(singular.into()),
            plural: Some(plural.into()),
        });
        self
    }

    /// Resolves a data path against the schema.
    ///
    /// Block rows fix their children's shape through the row's `block_type`, so
    /// `data` (the live document) is consulted whenever the path enters a blocks row.
    /// Returns `None` if any component has no schema counterpart.
    pub fn resolve<'a>(&'a self, path: &FieldPath, data: &Doc) -> Option<Resolved<'a>> {
        let components: Vec<&str> = path.components().collect();
        let mut fields: &'a [FieldSchema] = &self.fields;
        let mut level: Option<&Doc> = Some(data);
        let mut i = 0;

        while i < components.len() {
            let name = components[i];
            let node = find_node(fields, name)?;
            let value = level.and_then(|doc| doc.get_local(name));
            i += 1;
            if i == components.len() {
                return Some(Resolved::Node(node));
            }

            match node.kind() {
                FieldKind::Group => {
                    fields = node.fields();
                    level = value.and_then(Value::as_group);
                }
                FieldKind::Array | FieldKind::Blocks => {
                    let index = parse_index(components[i])?;
                    i += 1;
                    let field = node.field()?;
                    let row = value
                        .and_then(Value::as_rows)
                        .and_then(|rows| rows.get(index));
                    let block = match field.kind {
                        FieldKind::Blocks => Some(field.block(row?.block_type()?)?),
                        _ => None,
                    };
                    if i == components.len() {
                        return Some(Resolved::Row { field, block });
                    }
                    fields = match block {
                        Some(block) => &block.fields,
                        None => &field.fields,
                    };
                    level = row.map(Row::fields);
                }
                _ => return None,
            }
        }

        None
    }

    /// Returns the fields stored at `path`; the empty path is the document root.
    pub fn level_fields<'a>(&'a self, path: &FieldPath, data: &Doc) -> Option<&'a [FieldSchema]> {
        if path.is_empty() {
            return Some(&self.fields);
        }
        let resolved = self.resolve(path, data)?;
        match resolved {
            Resolved::Node(node) if node.kind() != FieldKind::Group => None,
            _ => Some(resolved.fields()),
        }
    }

    /// Finds the tabs field keyed by `group_path` (`parent.data.path.tabsKey`).
    pub fn tabs_at<'a>(&'a self, group_path: &FieldPath, data: &Doc) -> Option<&'a FieldSchema> {
        let name = group_path.last()?;
        let parent = group_path.parent()?;
        let fields = self.level_fields(parent, data)?;
        find_tabs(fields, name)
    }

    fn validate(&self, known: &BTreeSet<&str>) -> std::result::Result<(), SchemaError> {
        validate_level(&self.slug, &self.fields, &FieldPathBuf::new(), known)?;

        if let Some(title) = &self.use_as_title {
            let valid = find_node(&self.fields, title).is_some_and(|node| node.kind().is_text_like());
            if !valid {
                return Err(SchemaError::InvalidUseAsTitle {
                    collection: self.slug.clone(),
                    field: title.clone(),
                });
            }
        }
        Ok(())
    }

    fn field_mut(&mut self, path: &FieldPath) -> Option<&mut FieldSchema> {
        let names: Vec<&str> = path
            .components()
            .filter(|component| parse_index(component).is_none())
            .collect();
        let (last, parents) = names.split_last()?;
        let mut fields = &mut self.fields;
        for name in parents {
            fields = &mut find_field_mut(fields, name)?.fields;
        }
        find_field_mut(fields, last)
    }
}

fn contains_field(field: &FieldSchema, name: &str) -> bool {
    if field.name.as_deref() == Some(name) {
        return true;
    }
    match field.kind {
        FieldKind::Row | FieldKind::Collapsible => {
            field.fields.iter().any(|child| contains_field(child, name))
        }
        FieldKind::Tabs => field
            .tabs
            .iter()
            .filter(|tab| tab.name.is_none())
            .any(|tab| tab.fields.iter().any(|child| contains_field(child, name))),
        _ => false,
    }
}

fn find_field_mut<'a>(fields: &'a mut [FieldSchema], name: &str) -> Option<&'a mut FieldSchema> {
    let index = fields.iter().position(|field| contains_field(field, name))?;
    let field = &mut fields[index];
    match field.kind {
        _ if field.name.as_deref() == Some(name) => Some(field),
        FieldKind::Row | FieldKind::Collapsible => find_field_mut(&mut field.fields, name),
        FieldKind::Tabs => field
            .tabs
            .iter_mut()
            .filter(|tab| tab.name.is_none())
            .find_map(|tab| find_field_mut(&mut tab.fields, name)),
        _ => None,
    }
}

fn validate_level(
    collection: &str,
    fields: &[FieldSchema],
    prefix: &FieldPathBuf,
    known: &BTreeSet<&str>,
) -> std::result::Result<(), SchemaError> {
    let mut seen = BTreeSet::new();
    for node in level_nodes(fields) {
        let name = node.name();
        let path = prefix.clone().push(name);
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateField {
                collection: collection.to_string(),
                path: path.to_string(),
            });
        }
        Component::new(name).map_err(|err| SchemaError::InvalidFieldName {
            collection: collection.to_string(),
            name: name.to_string(),
            reason: err.to_string(),
        })?;
    }

    for field in fields {
        let path = prefix.clone().push(field.name());
        match field.kind {
            FieldKind::Row | FieldKind::Collapsible => {
                validate_level(collection, &field.fields, prefix, known)?;
            }
            FieldKind::Tabs => {
                for tab in &field.tabs {
                    let tab_prefix = match &tab.name {
                        Some(name) => prefix.clone().push(name),
                        None => prefix.clone(),
                    };
                    validate_level(collection, &tab.fields, &tab_prefix, known)?;
                }
            }
            FieldKind::Ui => {}
            kind => {
                if field.name.is_none() {
                    return Err(SchemaError::MissingName {
                        collection: collection.to_string(),
                        path: prefix.to_string(),
                        kind: kind.to_string(),
                    });
                }
                validate_field(collection, field, &path, known)?;
            }
        }
    }
    Ok(())
}

fn validate_field(
    collection: &str,
    field: &FieldSchema,
    path: &FieldPathBuf,
    known: &BTreeSet<&str>,
) -> std::result::Result<(), SchemaError> {
    match field.kind {
        FieldKind::Group => validate_level(collection, &field.fields, path, known)?,
        FieldKind::Array => {
            if field.fields.is_empty() {
                return Err(SchemaError::EmptyContainer {
                    collection: collection.to_string(),
                    path: path.to_string(),
                });
            }
            validate_level(collection, &field.fields, path, known)?;
        }
        FieldKind::Blocks => {
            if field.blocks.is_empty() {
                return Err(SchemaError::EmptyContainer {
                    collection: collection.to_string(),
                    path: path.to_string(),
                });
            }
            let mut slugs = BTreeSet::new();
            for block in &field.blocks {
                if !slugs.insert(block.slug.as_str()) {
                    return Err(SchemaError::DuplicateBlock {
                        collection: collection.to_string(),
                        path: path.to_string(),
                        block: block.slug.clone(),
                    });
                }
                validate_level(collection, &block.fields, path, known)?;
            }
        }
        FieldKind::Relationship | FieldKind::Upload => {
            if field.relation_to.is_empty() {
                return Err(SchemaError::UnknownRelationTarget {
                    collection: collection.to_string(),
                    path: path.to_string(),
                    target: String::new(),
                });
            }
            if let Some(target) = field
                .relation_to
                .iter()
                .find(|target| !known.contains(target.as_str()))
            {
                return Err(SchemaError::UnknownRelationTarget {
                    collection: collection.to_string(),
                    path: path.to_string(),
                    target: target.clone(),
                });
            }
        }
        _ => {}
    }

    if let Some(default) = &field.default_value {
        value_from_json(SchemaNode::Field(field), default, path).map_err(|err| {
            SchemaError::InvalidDefault {
                collection: collection.to_string(),
                path: path.to_string(),
                reason: err.to_string(),
            }
        })?;
    }
    Ok(())
}

#[derive(Deserialize)]
struct SchemaFile {
    collections: Vec<CollectionSchema>,
}

/// Every collection schema known to a session.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    collections: BTreeMap<String, Arc<CollectionSchema>>,
}

impl SchemaSet {
    /// Validates and indexes a list of collections.
    pub fn new(collections: Vec<CollectionSchema>) -> Result<Self> {
        let known: BTreeSet<&str> = collections.iter().map(|c| c.slug.as_str()).collect();
        let mut indexed = BTreeMap::new();
        for collection in &collections {
            collection.validate(&known)?;
        }
        for collection in collections {
            let slug = collection.slug.clone();
            if indexed.insert(slug.clone(), Arc::new(collection)).is_some() {
                return Err(SchemaError::DuplicateCollection { collection: slug }.into());
            }
        }
        tracing::debug!(collections = indexed.len(), "Loaded schema");
        Ok(Self {
            collections: indexed,
        })
    }

    /// Loads a schema file of the form `{ "collections": [...] }`.
    pub fn from_json(input: &str) -> Result<Self> {
        let file: SchemaFile = serde_json::from_str(input)?;
        Self::new(file.collections)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let file: SchemaFile = serde_json::from_value(value)?;
        Self::new(file.collections)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }

    pub fn get(&self, slug: &str) -> Option<&Arc<CollectionSchema>> {
        self.collections.get(slug)
    }

    /// Returns a collection or `SchemaError::UnknownCollection`.
    pub fn collection(&self, slug: &str) -> Result<Arc<CollectionSchema>> {
        self.collections
            .get(slug)
            .cloned()
            .ok_or_else(|| {
                SchemaError::UnknownCollection {
                    collection: slug.to_string(),
                }
                .into()
            })
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CollectionSchema>> {
        self.collections.values()
    }

    /// Edits one field before the schema is shared with a session.
    ///
    /// This is how computed labels and embedded components, which schema files
    /// cannot express, are attached.
    pub fn with_field(
        mut self,
        collection: &str,
        path: impl AsRef<FieldPath>,
        edit: impl FnOnce(&mut FieldSchema),
    ) -> Result<Self> {
        let path = path.as_ref();
        let schema = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| SchemaError::UnknownCollection {
                collection: collection.to_string(),
            })?;
        let field = Arc::make_mut(schema)
            .field_mut(path)
            .ok_or_else(|| SchemaError::UnknownField {
                collection: collection.to_string(),
                path: path.to_string(),
            })?;
        edit(field);
        Ok(self)
    }

    /// Attaches a row label to an array or blocks field.
    pub fn with_row_label(
        self,
        collection: &str,
        path: impl AsRef<FieldPath>,
        label: LabelSource,
    ) -> Result<Self> {
        self.with_field(collection, path, |field| field.row_label = Some(label))
    }
}
