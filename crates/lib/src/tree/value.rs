//! Value types for form documents.
//!
//! [`Doc`] is one level of a document: field names mapped to [`Value`]s. Groups and
//! named tabs nest a `Doc`; array and blocks fields hold an ordered `Vec<Row>` whose
//! rows each carry their own `Doc`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use super::{FieldError, Row};
use crate::{
    constants::{BLOCK_TYPE_KEY, ROW_ID_KEY},
    path::{FieldPath, FieldPathBuf, parse_index},
    relationship::{RelationshipRef, RelationshipValue},
    richtext::RichText,
    tree::RowId,
};

/// Values that can be stored in a form document.
///
/// `Null` is an explicit empty value. For dirtiness it is equivalent to an absent
/// key, so clearing a field that was never set leaves it clean.
///
/// ```
/// # use formstack::Value;
/// let title = Value::from("Hello");
/// let count = Value::from(3.0);
///
/// assert!(title == "Hello");
/// assert!(count == 3.0);
/// assert!(!(title == 3.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Always finite
    Number(f64),
    Text(String),
    /// Normalized to UTC
    Date(DateTime<Utc>),
    /// Arbitrary JSON for `json` fields
    Json(serde_json::Value),
    /// `[longitude, latitude]`
    Point([f64; 2]),
    /// Rows of an array or blocks field
    Rows(Vec<Row>),
    /// Children of a group or named tab
    Group(Doc),
    Relationship(RelationshipValue),
    RichText(RichText),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Json(_) => "json",
            Value::Point(_) => "point",
            Value::Rows(_) => "rows",
            Value::Group(_) => "group",
            Value::Relationship(_) => "relationship",
            Value::RichText(_) => "richText",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(date) => Some(date),
            _ => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Value::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Doc> {
        match self {
            Value::Group(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&RelationshipValue> {
        match self {
            Value::Relationship(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_rich_text(&self) -> Option<&RichText> {
        match self {
            Value::RichText(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true for values equivalent to an absent key: `Null`, empty
    /// collections, and groups containing only blank values.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Rows(rows) => rows.is_empty(),
            Value::Group(doc) => doc.values().all(Value::is_blank),
            Value::Relationship(value) => value.is_empty(),
            _ => false,
        }
    }

    /// Compares two values, treating blank values as absent at every depth.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Group(a), Value::Group(b)) => a.equivalent(b),
            (Value::Rows(a), Value::Rows(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.equivalent(b))
            }
            (a, b) if a.is_blank() && b.is_blank() => true,
            (a, b) => a == b,
        }
    }

    /// Converts the value to its persistence payload shape.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Date(date) => {
                serde_json::Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Json(json) => json.clone(),
            Value::Point(point) => serde_json::json!(point),
            Value::Rows(rows) => serde_json::Value::Array(rows.iter().map(row_to_json).collect()),
            Value::Group(doc) => doc.to_json(),
            Value::Relationship(value) => value.to_json(),
            Value::RichText(text) => text.to_json(),
        }
    }
}

fn row_to_json(row: &Row) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    object.insert(
        ROW_ID_KEY.to_string(),
        serde_json::Value::String(row.id.to_string()),
    );
    if let Some(block_type) = &row.block_type {
        object.insert(
            BLOCK_TYPE_KEY.to_string(),
            serde_json::Value::String(block_type.clone()),
        );
    }
    for (name, value) in row.fields.iter() {
        object.insert(name.clone(), value.to_json());
    }
    serde_json::Value::Object(object)
}

/// Parses a date field input: RFC 3339 timestamps or `YYYY-MM-DD` calendar dates.
pub(crate) fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<Doc> for Value {
    fn from(value: Doc) -> Self {
        Value::Group(value)
    }
}

impl From<Vec<Row>> for Value {
    fn from(value: Vec<Row>) -> Self {
        Value::Rows(value)
    }
}

impl From<RelationshipValue> for Value {
    fn from(value: RelationshipValue) -> Self {
        Value::Relationship(value)
    }
}

impl From<RelationshipRef> for Value {
    fn from(value: RelationshipRef) -> Self {
        Value::Relationship(RelationshipValue::Single(Some(value)))
    }
}

impl From<Vec<RelationshipRef>> for Value {
    fn from(value: Vec<RelationshipRef>) -> Self {
        Value::Relationship(RelationshipValue::Many(value))
    }
}

impl From<RichText> for Value {
    fn from(value: RichText) -> Self {
        Value::RichText(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Value::Text(s) if s == other)
    }
}

impl PartialEq<f64> for Value {
    fn eq(&self, other: &f64) -> bool {
        matches!(self, Value::Number(n) if n == other)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        matches!(self, Value::Bool(b) if b == other)
    }
}

/// What a path points at: a stored value, or a row of an array or blocks field.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Value(&'a Value),
    Row(usize, &'a Row),
}

impl<'a> Entry<'a> {
    pub fn value(&self) -> Option<&'a Value> {
        match *self {
            Entry::Value(value) => Some(value),
            Entry::Row(..) => None,
        }
    }

    pub fn row(&self) -> Option<&'a Row> {
        match *self {
            Entry::Row(_, row) => Some(row),
            Entry::Value(_) => None,
        }
    }

    /// Returns the document level below this entry, if it has one.
    fn doc(&self) -> Option<&'a Doc> {
        match *self {
            Entry::Value(value) => value.as_group(),
            Entry::Row(_, row) => Some(&row.fields),
        }
    }

    fn equivalent(a: Option<Entry<'_>>, b: Option<Entry<'_>>) -> bool {
        match (a, b) {
            (Some(Entry::Row(_, a)), Some(Entry::Row(_, b))) => a.equivalent(b),
            (Some(Entry::Row(..)), _) | (_, Some(Entry::Row(..))) => false,
            (a, b) => values_equivalent(a.and_then(|e| e.value()), b.and_then(|e| e.value())),
        }
    }
}

pub(crate) fn values_equivalent(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.equivalent(b),
        (Some(v), None) | (None, Some(v)) => v.is_blank(),
        (None, None) => true,
    }
}

/// One level of a form document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Doc {
    children: BTreeMap<String, Value>,
}

impl Doc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Gets a direct child by field name.
    pub fn get_local(&self, name: &str) -> Option<&Value> {
        self.children.get(name)
    }

    pub(crate) fn get_local_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.children.get_mut(name)
    }

    /// Gets a value by index path. Paths ending at a row return `None`; use
    /// [`Doc::entry`] for those.
    pub fn get(&self, path: impl AsRef<FieldPath>) -> Option<&Value> {
        self.entry(path)?.value()
    }

    /// Resolves an index path to a value or a row.
    pub fn entry(&self, path: impl AsRef<FieldPath>) -> Option<Entry<'_>> {
        let mut components = path.as_ref().components();
        let mut current = Entry::Value(self.children.get(components.next()?)?);

        for component in components {
            current = match (current, parse_index(component)) {
                (Entry::Value(Value::Rows(rows)), Some(index)) => {
                    Entry::Row(index, rows.get(index)?)
                }
                (entry, None) => Entry::Value(entry.doc()?.children.get(component)?),
                _ => return None,
            };
        }
        Some(current)
    }

    /// Inserts a direct child, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.children.insert(name.into(), value.into())
    }

    /// Builder form of [`Doc::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.children.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.children.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.children.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.children.values()
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = (String, Value)> {
        self.children.into_iter()
    }

    /// Compares two levels, treating blank values as absent.
    pub fn equivalent(&self, other: &Doc) -> bool {
        self.children
            .keys()
            .chain(other.children.keys())
            .all(|key| values_equivalent(self.children.get(key), other.children.get(key)))
    }

    /// Converts the level to a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.children
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Returns the level at `path`, creating missing groups along the way.
    ///
    /// Index components must address existing rows.
    pub(crate) fn level_mut(&mut self, path: &FieldPath) -> Result<&mut Doc, FieldError> {
        let components: Vec<&str> = path.components().collect();
        let mut current = self;
        let mut walked = FieldPathBuf::new();
        let mut i = 0;

        while i < components.len() {
            let name = components[i];
            walked = walked.push(name);

            if let Some(index) = components.get(i + 1).and_then(|c| parse_index(c)) {
                let Some(Value::Rows(rows)) = current.children.get_mut(name) else {
                    return Err(FieldError::IndexOutOfRange {
                        path: walked,
                        index,
                        len: 0,
                    });
                };
                let len = rows.len();
                let Some(row) = rows.get_mut(index) else {
                    return Err(FieldError::IndexOutOfRange {
                        path: walked,
                        index,
                        len,
                    });
                };
                walked = walked.push_index(index);
                current = &mut row.fields;
                i += 2;
            } else {
                let slot = current.children.entry(name.to_string()).or_insert(Value::Null);
                if !matches!(slot, Value::Group(_)) {
                    *slot = Value::Group(Doc::new());
                }
                let Value::Group(doc) = slot else {
                    return Err(FieldError::mismatch(walked, "expected a group"));
                };
                current = doc;
                i += 1;
            }
        }
        Ok(current)
    }

    /// Gives every nested row a new id.
    pub(crate) fn refresh_row_ids(&mut self) {
        for value in self.children.values_mut() {
            match value {
                Value::Rows(rows) => {
                    for row in rows {
                        row.id = RowId::generate();
                        row.fields.refresh_row_ids();
                    }
                }
                Value::Group(doc) => doc.refresh_row_ids(),
                _ => {}
            }
        }
    }

    /// Collects the index paths whose values differ from `baseline`.
    pub(crate) fn diff(&self, baseline: &Doc, prefix: &FieldPathBuf, out: &mut Vec<FieldPathBuf>) {
        let keys: std::collections::BTreeSet<&String> = self
            .children
            .keys()
            .chain(baseline.children.keys())
            .collect();
        for key in keys {
            diff_values(
                self.children.get(key),
                baseline.children.get(key),
                &prefix.clone().push(key),
                out,
            );
        }
    }

    pub(crate) fn entries_equivalent(&self, other: &Doc, path: &FieldPath) -> bool {
        if path.is_empty() {
            return self.equivalent(other);
        }
        Entry::equivalent(self.entry(path), other.entry(path))
    }
}

fn diff_values(
    current: Option<&Value>,
    baseline: Option<&Value>,
    path: &FieldPathBuf,
    out: &mut Vec<FieldPathBuf>,
) {
    if values_equivalent(current, baseline) {
        return;
    }
    let empty = Doc::new();
    match (current, baseline) {
        (Some(Value::Rows(a)), Some(Value::Rows(b)))
            if a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.id == b.id) =>
        {
            for (index, (a, b)) in a.iter().zip(b).enumerate() {
                a.fields.diff(&b.fields, &path.clone().push_index(index), out);
            }
        }
        (Some(Value::Group(a)), Some(Value::Group(b))) => a.diff(b, path, out),
        (Some(Value::Group(a)), other) if other.is_none_or(Value::is_blank) => {
            a.diff(&empty, path, out)
        }
        (other, Some(Value::Group(b))) if other.is_none_or(Value::is_blank) => {
            empty.diff(b, path, out)
        }
        _ => out.push(path.clone()),
    }
}

impl<'a> IntoIterator for &'a Doc {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

impl FromIterator<(String, Value)> for Doc {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            children: iter.into_iter().collect(),
        }
    }
}
