//! Field dispatch registry.
//!
//! Maps each [`FieldKind`] to the controller that owns its value and resolves the
//! text shown around a field. Label, placeholder and description resolve in tiers:
//!
//! 1. an explicit per-field override registered with [`FieldRegistry::set_override`];
//! 2. the schema's own value, evaluated for the requested locale;
//! 3. the missing-translation template, when the schema has a locale map without the
//!    requested locale;
//! 4. the kind default: the humanized field name for labels, nothing otherwise.
//!
//! ```
//! use formstack::{EngineConfig, FormState};
//! use formstack::registry::FieldRegistry;
//! use formstack::schema::{CollectionSchema, FieldSchema, LabelSource};
//! use std::sync::Arc;
//!
//! let schema = CollectionSchema::new(
//!     "posts",
//!     vec![FieldSchema::text("title").with_label(LabelSource::localized([("en", "Title")]))],
//! );
//! let form = FormState::for_collection(Arc::new(schema));
//! let registry = FieldRegistry::new(EngineConfig::default());
//!
//! assert_eq!(registry.label(&form, "title", "en").unwrap(), "Title");
//! assert_eq!(registry.label(&form, "title", "fr").unwrap(), "No title fr");
//! ```

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    EngineConfig, Result,
    form::FormState,
    path::{FieldPath, FieldPathBuf},
    schema::{CollectionSchema, FieldKind, FieldSchema, LabelContext, LabelSource, Resolved, SchemaNode},
    tree::{Doc, Entry, FieldError, FieldValueTree, Value},
};

/// The controller responsible for a field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerKind {
    Scalar,
    Rows,
    Tabs,
    Group,
    Relationship,
    RichText,
    Presentational,
}

/// What a field kind can do when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub renders_value: bool,
    pub accepts_input: bool,
}

/// The three texts shown around a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextSlot {
    Label,
    Placeholder,
    Description,
}

/// Explicit texts for one field, taking precedence over the schema.
#[derive(Debug, Clone, Default)]
pub struct FieldOverride {
    pub label: Option<LabelSource>,
    pub placeholder: Option<LabelSource>,
    pub description: Option<LabelSource>,
}

impl FieldOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<LabelSource>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<LabelSource>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn description(mut self, description: impl Into<LabelSource>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn slot(&self, slot: TextSlot) -> Option<&LabelSource> {
        match slot {
            TextSlot::Label => self.label.as_ref(),
            TextSlot::Placeholder => self.placeholder.as_ref(),
            TextSlot::Description => self.description.as_ref(),
        }
    }
}

/// A flattened view of one schema node for tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Schema path without row indexes
    pub path: FieldPathBuf,
    pub kind: FieldKind,
    pub controller: ControllerKind,
    /// Block variant the field belongs to, for fields inside block rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    pub label: String,
    pub required: bool,
    pub read_only: bool,
    pub editable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relation_to: Vec<String>,
}

/// Resolves controllers and texts for fields.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    config: EngineConfig,
    overrides: HashMap<(String, FieldPathBuf), FieldOverride>,
}

impl FieldRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            overrides: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers explicit texts for the field at `path` (row indexes are ignored).
    pub fn set_override(
        &mut self,
        collection: impl Into<String>,
        path: impl AsRef<FieldPath>,
        field: FieldOverride,
    ) {
        self.overrides
            .insert((collection.into(), path.as_ref().schema_path()), field);
    }

    pub fn with_override(
        mut self,
        collection: impl Into<String>,
        path: impl AsRef<FieldPath>,
        field: FieldOverride,
    ) -> Self {
        self.set_override(collection, path, field);
        self
    }

    pub fn controller_for(&self, kind: FieldKind) -> ControllerKind {
        match kind {
            FieldKind::Array | FieldKind::Blocks => ControllerKind::Rows,
            FieldKind::Tabs => ControllerKind::Tabs,
            FieldKind::Group => ControllerKind::Group,
            FieldKind::Relationship | FieldKind::Upload => ControllerKind::Relationship,
            FieldKind::RichText => ControllerKind::RichText,
            FieldKind::Row | FieldKind::Collapsible | FieldKind::Ui => ControllerKind::Presentational,
            _ => ControllerKind::Scalar,
        }
    }

    pub fn capability(&self, kind: FieldKind) -> Capability {
        match self.controller_for(kind) {
            ControllerKind::Presentational | ControllerKind::Tabs => Capability {
                renders_value: false,
                accepts_input: false,
            },
            _ => Capability {
                renders_value: true,
                accepts_input: true,
            },
        }
    }

    /// Returns true if the field's mutation entry points are enabled.
    ///
    /// Read-only fields still render their value. `required` has no effect here.
    pub fn is_editable(&self, field: &FieldSchema) -> bool {
        !field.read_only && self.capability(field.kind).accepts_input
    }

    /// Evaluates a label source. Embedded components have no text.
    ///
    /// A locale map without `ctx.locale` yields the missing-translation text for `name`.
    pub fn evaluate(&self, source: &LabelSource, ctx: &LabelContext<'_>, name: &str) -> Option<String> {
        match source {
            LabelSource::Literal(text) => Some(text.clone()),
            LabelSource::Localized(map) => Some(
                map.get(ctx.locale)
                    .cloned()
                    .unwrap_or_else(|| self.config.missing_translation(name, ctx.locale)),
            ),
            LabelSource::Computed(f) => f(ctx),
            LabelSource::Embedded(_) => None,
        }
    }

    /// Resolves one text slot of a schema node through the override and schema tiers.
    pub fn resolve_text(
        &self,
        collection: &str,
        node: SchemaNode<'_>,
        slot: TextSlot,
        ctx: &LabelContext<'_>,
    ) -> Option<String> {
        let key = (collection.to_string(), ctx.path.schema_path());
        let overridden = self
            .overrides
            .get(&key)
            .and_then(|field| field.slot(slot))
            .and_then(|source| self.evaluate(source, ctx, node.name()));
        if overridden.is_some() {
            return overridden;
        }

        let source = match slot {
            TextSlot::Label => node.label(),
            TextSlot::Placeholder => node.placeholder(),
            TextSlot::Description => node.description(),
        };
        source.and_then(|source| self.evaluate(source, ctx, node.name()))
    }

    fn text(&self, form: &FormState, path: &FieldPath, slot: TextSlot, locale: &str) -> Result<Option<String>> {
        let tree = form.tree();
        let node = match tree.node(path) {
            Some(Resolved::Node(node)) => node,
            _ => return Err(FieldError::mismatch(path, "no schema node").into()),
        };
        let empty = Doc::new();
        let data = path
            .parent()
            .and_then(|parent| level_doc(tree, parent))
            .unwrap_or(&empty);
        let ctx = LabelContext {
            data,
            path,
            index: None,
            locale,
        };
        Ok(self.resolve_text(form.collection(), node, slot, &ctx))
    }

    /// The field's label; falls back to its humanized name.
    pub fn label(&self, form: &FormState, path: impl AsRef<FieldPath>, locale: &str) -> Result<String> {
        let path = path.as_ref();
        match self.text(form, path, TextSlot::Label, locale)? {
            Some(label) => Ok(label),
            None => Ok(humanize(path.last().unwrap_or_default())),
        }
    }

    pub fn placeholder(
        &self,
        form: &FormState,
        path: impl AsRef<FieldPath>,
        locale: &str,
    ) -> Result<Option<String>> {
        self.text(form, path.as_ref(), TextSlot::Placeholder, locale)
    }

    pub fn description(
        &self,
        form: &FormState,
        path: impl AsRef<FieldPath>,
        locale: &str,
    ) -> Result<Option<String>> {
        self.text(form, path.as_ref(), TextSlot::Description, locale)
    }

    /// Flattens a collection's schema into descriptors, in declaration order.
    ///
    /// Computed labels are evaluated against an empty document.
    pub fn describe(&self, collection: &CollectionSchema, locale: &str) -> Vec<FieldDescriptor> {
        let mut out = Vec::new();
        let walker = Describe {
            registry: self,
            collection: &collection.slug,
            locale,
            empty: Doc::new(),
        };
        walker.level(&collection.fields, &FieldPathBuf::new(), None, &mut out);
        out
    }
}

/// The document level a field at `parent` lives in.
fn level_doc<'t>(tree: &'t FieldValueTree, parent: &FieldPath) -> Option<&'t Doc> {
    if parent.is_empty() {
        return Some(tree.data());
    }
    match tree.entry(parent)? {
        Entry::Row(_, row) => Some(row.fields()),
        Entry::Value(Value::Group(doc)) => Some(doc),
        Entry::Value(_) => None,
    }
}

struct Describe<'r> {
    registry: &'r FieldRegistry,
    collection: &'r str,
    locale: &'r str,
    empty: Doc,
}

impl Describe<'_> {
    fn level(&self, fields: &[FieldSchema], prefix: &FieldPathBuf, block: Option<&str>, out: &mut Vec<FieldDescriptor>) {
        for field in fields {
            match field.kind {
                FieldKind::Row | FieldKind::Collapsible => self.level(&field.fields, prefix, block, out),
                FieldKind::Tabs => {
                    if field.name.is_some() {
                        self.push(SchemaNode::Field(field), prefix, block, out);
                    }
                    for tab in &field.tabs {
                        match tab.name.as_deref() {
                            Some(name) => {
                                let path = prefix.clone().push(name);
                                self.push(SchemaNode::Tab(tab), prefix, block, out);
                                self.level(&tab.fields, &path, block, out);
                            }
                            None => self.level(&tab.fields, prefix, block, out),
                        }
                    }
                }
                _ if field.name.is_none() => {}
                FieldKind::Blocks => {
                    self.push(SchemaNode::Field(field), prefix, block, out);
                    let path = prefix.clone().push(field.name());
                    for variant in &field.blocks {
                        self.level(&variant.fields, &path, Some(&variant.slug), out);
                    }
                }
                _ => {
                    self.push(SchemaNode::Field(field), prefix, block, out);
                    if matches!(field.kind, FieldKind::Group | FieldKind::Array) {
                        let path = prefix.clone().push(field.name());
                        self.level(&field.fields, &path, block, out);
                    }
                }
            }
        }
    }

    fn push(&self, node: SchemaNode<'_>, prefix: &FieldPathBuf, block: Option<&str>, out: &mut Vec<FieldDescriptor>) {
        let path = prefix.clone().push(node.name());
        let ctx = LabelContext {
            data: &self.empty,
            path: &path,
            index: None,
            locale: self.locale,
        };
        let label = self
            .registry
            .resolve_text(self.collection, node, TextSlot::Label, &ctx)
            .unwrap_or_else(|| humanize(node.name()));
        let kind = node.kind();
        out.push(FieldDescriptor {
            controller: self.registry.controller_for(kind),
            kind,
            block: block.map(str::to_string),
            label,
            required: node.required(),
            read_only: node.read_only(),
            editable: node.field().is_none_or(|field| self.registry.is_editable(field)),
            relation_to: node.relation_to().to_vec(),
            path,
        });
    }
}

/// Turns a field name into a label: `publishedAt` and `published_at` both become
/// `Published At`.
pub fn humanize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;
    for c in name.chars() {
        if c == '_' || c == '-' {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            previous = Some(' ');
            continue;
        }
        let word_start = match previous {
            None | Some(' ') => true,
            Some(p) => c.is_uppercase() && p.is_lowercase(),
        };
        if word_start {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        previous = Some(c);
    }
    out
}
