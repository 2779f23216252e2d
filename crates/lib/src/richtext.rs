//! Rich text values with link annotations.
//!
//! The editor's document model is opaque to the engine except for links: a
//! [`RichText`] is plain text plus non-overlapping link spans measured in characters.
//! Links point at a URL or at another document; document links carry the same
//! denormalized [`RelationshipRef`] relationship fields use.

use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{Result, relationship::RelationshipRef};

/// Errors from rich text editing.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RichTextError {
    /// The range does not lie within the text
    #[error("Range {start}..{end} is out of bounds for text of length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    /// The range intersects an existing link
    #[error("Range {start}..{end} overlaps an existing link")]
    OverlappingLink { start: usize, end: usize },

    /// No link with this id exists
    #[error("Link not found: {id}")]
    LinkNotFound { id: LinkId },
}

impl RichTextError {
    /// Check if this error indicates a link was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, RichTextError::LinkNotFound { .. })
    }
}

impl From<RichTextError> for crate::Error {
    fn from(err: RichTextError) -> Self {
        crate::Error::RichText(err)
    }
}

/// Identifier of a link within one rich text value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "linkType", rename_all = "camelCase")]
pub enum LinkTarget {
    /// An external URL
    #[serde(rename = "custom", rename_all = "camelCase")]
    Url { url: String, new_tab: bool },
    /// Another document
    #[serde(rename = "internal")]
    Document { doc: RelationshipRef },
}

impl LinkTarget {
    pub fn url(url: impl Into<String>) -> Self {
        LinkTarget::Url {
            url: url.into(),
            new_tab: false,
        }
    }

    pub fn document(doc: RelationshipRef) -> Self {
        LinkTarget::Document { doc }
    }
}

/// A link span. `start` and `end` are character offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub start: usize,
    pub end: usize,
    pub target: LinkTarget,
}

impl Link {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// The text and target of a link to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub text: String,
    pub target: LinkTarget,
}

impl LinkSpec {
    pub fn new(text: impl Into<String>, target: LinkTarget) -> Self {
        Self {
            text: text.into(),
            target,
        }
    }
}

/// Text with link annotations.
///
/// ```
/// use formstack::richtext::{LinkSpec, LinkTarget, RichText};
///
/// let mut text = RichText::plain("Read the docs today");
/// let id = text.insert_link(9..13, LinkSpec::new("guide", LinkTarget::url("/guide"))).unwrap();
///
/// assert_eq!(text.text(), "Read the guide today");
/// assert_eq!(text.link_at(10).map(|link| &link.id), Some(&id));
/// assert!(text.link_at(3).is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    text: String,
    #[serde(default)]
    links: Vec<Link>,
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| offset)
}

impl RichText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a value without links.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            links: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Links ordered by start offset.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replaces the characters in `range` with the link's text and annotates them.
    ///
    /// An empty range inserts the link at that position. Links after the range
    /// shift by the change in length.
    pub fn insert_link(&mut self, range: Range<usize>, spec: LinkSpec) -> Result<LinkId> {
        let len = self.len();
        if range.start > range.end || range.end > len {
            return Err(RichTextError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                len,
            }
            .into());
        }

        let overlaps = self.links.iter().any(|link| {
            if range.is_empty() {
                link.start < range.start && range.start < link.end
            } else {
                link.start < range.end && range.start < link.end
            }
        });
        if overlaps {
            return Err(RichTextError::OverlappingLink {
                start: range.start,
                end: range.end,
            }
            .into());
        }

        let start_byte = byte_offset(&self.text, range.start);
        let end_byte = byte_offset(&self.text, range.end);
        self.text.replace_range(start_byte..end_byte, &spec.text);

        let inserted = spec.text.chars().count();
        for link in self.links.iter_mut().filter(|link| link.start >= range.end) {
            link.start = link.start + inserted - range.len();
            link.end = link.end + inserted - range.len();
        }

        let id = LinkId::generate();
        let position = self.links.partition_point(|link| link.start < range.start);
        self.links.insert(
            position,
            Link {
                id: id.clone(),
                start: range.start,
                end: range.start + inserted,
                target: spec.target,
            },
        );
        Ok(id)
    }

    /// Removes a link annotation. The linked text stays in place.
    pub fn remove_link(&mut self, id: &LinkId) -> Result<Link> {
        let position = self
            .links
            .iter()
            .position(|link| &link.id == id)
            .ok_or_else(|| RichTextError::LinkNotFound { id: id.clone() })?;
        Ok(self.links.remove(position))
    }

    /// Returns the link covering the character at `position`.
    pub fn link_at(&self, position: usize) -> Option<&Link> {
        self.links
            .iter()
            .find(|link| link.start <= position && position < link.end)
    }

    /// Returns the text a link spans.
    pub fn link_text(&self, link: &Link) -> &str {
        let start = byte_offset(&self.text, link.start);
        let end = byte_offset(&self.text, link.end);
        &self.text[start..end]
    }

    /// Refreshes the cached title and URL of links to `doc`.
    pub fn update_document_links(&mut self, doc: &RelationshipRef) -> usize {
        let mut updated = 0;
        for link in &mut self.links {
            if let LinkTarget::Document { doc: target } = &mut link.target
                && target.same_document(doc)
            {
                *target = doc.clone();
                updated += 1;
            }
        }
        updated
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        let mut text: RichText = serde_json::from_value(json.clone()).ok()?;
        let len = text.len();
        text.links.retain(|link| link.start <= link.end && link.end <= len);
        text.links.sort_by_key(|link| link.start);
        Some(text)
    }
}
