//! Label sources.
//!
//! Labels, placeholders, descriptions and row labels can be supplied by the schema
//! as a plain string, a locale map, a function of the live data, or an embeddable
//! component. [`LabelSource`] is the tagged variant over those four shapes.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Deserializer};

use crate::{path::FieldPath, tree::Doc};

/// Signature of a computed label.
pub type LabelFn = Arc<dyn Fn(&LabelContext<'_>) -> Option<String> + Send + Sync>;

/// Data a computed label is evaluated against.
///
/// For row labels `data` is the row's live subtree and `index` its position; for
/// field labels `data` is the document level the field lives in.
#[derive(Debug, Clone, Copy)]
pub struct LabelContext<'a> {
    pub data: &'a Doc,
    pub path: &'a FieldPath,
    pub index: Option<usize>,
    pub locale: &'a str,
}

/// An opaque renderable supplied by the schema in place of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedComponent {
    pub component: String,
}

/// Where a label's text comes from.
#[derive(Clone)]
pub enum LabelSource {
    /// Plain text used in every locale
    Literal(String),
    /// Text per locale
    Localized(BTreeMap<String, String>),
    /// Text computed from live data on every evaluation
    Computed(LabelFn),
    /// A component rendered by the presentation layer
    Embedded(EmbeddedComponent),
}

impl LabelSource {
    pub fn literal(text: impl Into<String>) -> Self {
        LabelSource::Literal(text.into())
    }

    /// Creates a locale map from `(locale, text)` pairs.
    pub fn localized<L, T>(entries: impl IntoIterator<Item = (L, T)>) -> Self
    where
        L: Into<String>,
        T: Into<String>,
    {
        LabelSource::Localized(
            entries
                .into_iter()
                .map(|(locale, text)| (locale.into(), text.into()))
                .collect(),
        )
    }

    pub fn computed(f: impl Fn(&LabelContext<'_>) -> Option<String> + Send + Sync + 'static) -> Self {
        LabelSource::Computed(Arc::new(f))
    }

    pub fn embedded(component: impl Into<String>) -> Self {
        LabelSource::Embedded(EmbeddedComponent {
            component: component.into(),
        })
    }

    /// Returns true if the text depends on live data.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, LabelSource::Computed(_))
    }
}

impl fmt::Debug for LabelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelSource::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            LabelSource::Localized(map) => f.debug_tuple("Localized").field(map).finish(),
            LabelSource::Computed(_) => f.write_str("Computed(<fn>)"),
            LabelSource::Embedded(component) => {
                f.debug_tuple("Embedded").field(component).finish()
            }
        }
    }
}

impl From<&str> for LabelSource {
    fn from(text: &str) -> Self {
        LabelSource::literal(text)
    }
}

impl From<String> for LabelSource {
    fn from(text: String) -> Self {
        LabelSource::Literal(text)
    }
}

// Schema files carry strings and locale maps only; the dynamic variants are
// attached in code.
impl<'de> Deserialize<'de> for LabelSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Literal(String),
            Localized(BTreeMap<String, String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Literal(text) => LabelSource::Literal(text),
            Raw::Localized(map) => LabelSource::Localized(map),
        })
    }
}
