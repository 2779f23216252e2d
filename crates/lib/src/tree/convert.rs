//! Conversion of inputs into schema-shaped values.
//!
//! Both entry points check a value against the schema node it is stored under:
//! [`value_from_json`] hydrates persistence payloads and declared defaults, and
//! [`normalize_value`] checks and normalizes values written through
//! [`FieldValueTree::set`](super::FieldValueTree::set).

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{Doc, FieldError, Row, RowId, Value, value::parse_date};
use crate::{
    constants::{BLOCK_TYPE_KEY, ROW_ID_KEY},
    path::{FieldPath, FieldPathBuf},
    relationship::{RelationshipRef, RelationshipValue},
    richtext::RichText,
    schema::{FieldKind, FieldSchema, SchemaNode, find_node, level_nodes},
};

fn expected(node: SchemaNode<'_>, path: &FieldPath, found: &str) -> FieldError {
    FieldError::mismatch(
        path,
        format!("expected a {} value, got {found}", node.kind()),
    )
}

fn json_type(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn parse_number(node: SchemaNode<'_>, path: &FieldPath, text: &str) -> Result<Value, FieldError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Null);
    }
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Value::Number(n)),
        _ => Err(expected(node, path, "non-numeric text")),
    }
}

fn parse_date_text(node: SchemaNode<'_>, path: &FieldPath, text: &str) -> Result<Value, FieldError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    parse_date(text)
        .map(Value::Date)
        .ok_or_else(|| expected(node, path, "an unparseable date"))
}

fn check_option(node: SchemaNode<'_>, path: &FieldPath, text: String) -> Result<Value, FieldError> {
    let options = node.options();
    if !text.is_empty() && !options.is_empty() && !options.contains(&text) {
        return Err(FieldError::mismatch(
            path,
            format!("'{text}' is not one of the field's options"),
        ));
    }
    Ok(Value::Text(text))
}

fn check_targets(node: SchemaNode<'_>, path: &FieldPath, value: &RelationshipValue) -> Result<(), FieldError> {
    let targets = node.relation_to();
    match value
        .refs()
        .find(|reference| !targets.contains(&reference.collection))
    {
        Some(reference) => Err(FieldError::mismatch(
            path,
            format!("'{}' is not a valid target", reference.collection),
        )),
        None => Ok(()),
    }
}

/// Checks a value against its schema node and returns the normalized value.
///
/// Numbers must be finite; numeric text is parsed and empty text becomes `Null`.
/// Dates are normalized to UTC and cleared dates become `Null`.
pub(crate) fn normalize_value(
    node: SchemaNode<'_>,
    value: Value,
    path: &FieldPath,
) -> Result<Value, FieldError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let kind = node.kind();
    match (kind, value) {
        (FieldKind::Text | FieldKind::Textarea | FieldKind::Email | FieldKind::Code, Value::Text(s)) => {
            Ok(Value::Text(s))
        }
        (FieldKind::Select | FieldKind::Radio, Value::Text(s)) => check_option(node, path, s),
        (FieldKind::Number, Value::Number(n)) if n.is_finite() => Ok(Value::Number(n)),
        (FieldKind::Number, Value::Number(_)) => Err(expected(node, path, "a non-finite number")),
        (FieldKind::Number, Value::Text(s)) => parse_number(node, path, &s),
        (FieldKind::Checkbox, Value::Bool(b)) => Ok(Value::Bool(b)),
        (FieldKind::Date, Value::Date(date)) => Ok(Value::Date(date)),
        (FieldKind::Date, Value::Text(s)) => parse_date_text(node, path, &s),
        (FieldKind::Json, Value::Json(json)) => Ok(Value::Json(json)),
        (FieldKind::Json, other) => Ok(Value::Json(other.to_json())),
        (FieldKind::Point, Value::Point(point)) if point.iter().all(|c| c.is_finite()) => {
            Ok(Value::Point(point))
        }
        (FieldKind::Array | FieldKind::Blocks, Value::Rows(rows)) => {
            let field = node
                .field()
                .ok_or_else(|| FieldError::mismatch(path, "rows outside a field"))?;
            let mut seen = HashSet::with_capacity(rows.len());
            let mut checked = Vec::with_capacity(rows.len());
            for (index, row) in rows.into_iter().enumerate() {
                let row_path = path.to_path_buf().push_index(index);
                if !seen.insert(row.id.clone()) {
                    return Err(FieldError::mismatch(
                        &row_path,
                        format!("row id '{}' is already used in this collection", row.id),
                    ));
                }
                checked.push(normalize_row(field, row, &row_path)?);
            }
            Ok(Value::Rows(checked))
        }
        (FieldKind::Group, Value::Group(doc)) => {
            Ok(Value::Group(normalize_doc(node.fields(), doc, path)?))
        }
        (FieldKind::Relationship | FieldKind::Upload, Value::Relationship(value)) => {
            let value = match (node.has_many(), value) {
                (true, RelationshipValue::Single(single)) => {
                    RelationshipValue::Many(single.into_iter().collect())
                }
                (false, RelationshipValue::Many(many)) if many.len() > 1 => {
                    return Err(FieldError::mismatch(
                        path,
                        "a single relationship cannot hold many documents",
                    ));
                }
                (false, RelationshipValue::Many(mut many)) => RelationshipValue::Single(many.pop()),
                (_, value) => value,
            };
            check_targets(node, path, &value)?;
            Ok(Value::Relationship(value))
        }
        (FieldKind::RichText, Value::RichText(text)) => Ok(Value::RichText(text)),
        (FieldKind::RichText, Value::Text(s)) => Ok(Value::RichText(RichText::plain(s))),
        (_, other) => Err(expected(node, path, other.type_name())),
    }
}

fn normalize_row(field: &FieldSchema, row: Row, path: &FieldPathBuf) -> Result<Row, FieldError> {
    let fields = match (field.kind, row.block_type.as_deref()) {
        (FieldKind::Blocks, Some(slug)) => {
            let block = field.block(slug).ok_or_else(|| FieldError::UnknownBlock {
                path: path.clone(),
                block: slug.to_string(),
            })?;
            &block.fields
        }
        (FieldKind::Blocks, None) => {
            return Err(FieldError::mismatch(path, "block rows need a block type"));
        }
        (_, Some(_)) => return Err(FieldError::mismatch(path, "array rows have no block type")),
        (_, None) => &field.fields,
    };
    Ok(Row {
        fields: normalize_doc(fields, row.fields, path)?,
        ..row
    })
}

/// Checks every value of a level against the level's schema.
pub(crate) fn normalize_doc(fields: &[FieldSchema], doc: Doc, prefix: &FieldPath) -> Result<Doc, FieldError> {
    let mut out = Doc::new();
    for (name, value) in doc.into_entries() {
        let path = prefix.to_path_buf().push(&name);
        let node = find_node(fields, &name)
            .ok_or_else(|| FieldError::mismatch(&path, "no schema node"))?;
        out.insert(name, normalize_value(node, value, &path)?);
    }
    Ok(out)
}

/// Converts a JSON payload value stored under `node`.
pub(crate) fn value_from_json(
    node: SchemaNode<'_>,
    json: &serde_json::Value,
    path: &FieldPath,
) -> Result<Value, FieldError> {
    use serde_json::Value as Json;

    if json.is_null() {
        return Ok(Value::Null);
    }
    let found = json_type(json);
    match (node.kind(), json) {
        (FieldKind::Text | FieldKind::Textarea | FieldKind::Email | FieldKind::Code, Json::String(s)) => {
            Ok(Value::Text(s.clone()))
        }
        (FieldKind::Select | FieldKind::Radio, Json::String(s)) => check_option(node, path, s.clone()),
        (FieldKind::Number, Json::Number(n)) => n
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Value::Number)
            .ok_or_else(|| expected(node, path, found)),
        (FieldKind::Number, Json::String(s)) => parse_number(node, path, s),
        (FieldKind::Checkbox, Json::Bool(b)) => Ok(Value::Bool(*b)),
        (FieldKind::Date, Json::String(s)) => parse_date_text(node, path, s),
        (FieldKind::Json, json) => Ok(Value::Json(json.clone())),
        (FieldKind::Point, Json::Array(items)) if items.len() == 2 => {
            match (items[0].as_f64(), items[1].as_f64()) {
                (Some(x), Some(y)) => Ok(Value::Point([x, y])),
                _ => Err(expected(node, path, found)),
            }
        }
        (FieldKind::Array | FieldKind::Blocks, Json::Array(items)) => {
            let field = node
                .field()
                .ok_or_else(|| FieldError::mismatch(path, "rows outside a field"))?;
            let mut seen = HashSet::with_capacity(items.len());
            let mut rows = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let row_path = path.to_path_buf().push_index(index);
                let mut row = row_from_json(field, item, &row_path)?;
                if !seen.insert(row.id.clone()) {
                    let fresh = RowId::generate();
                    warn!(path = %row_path, duplicate = %row.id, id = %fresh, "Replacing duplicate row id");
                    row.id = fresh.clone();
                    seen.insert(fresh);
                }
                rows.push(row);
            }
            Ok(Value::Rows(rows))
        }
        (FieldKind::Group, Json::Object(_)) => {
            Ok(Value::Group(doc_from_json(node.fields(), json, path)?))
        }
        (FieldKind::Relationship | FieldKind::Upload, json) => {
            let default_collection = node.relation_to().first().map(String::as_str);
            let parse = |item: &Json| {
                RelationshipRef::from_json(item, default_collection)
                    .ok_or_else(|| expected(node, path, json_type(item)))
            };
            let value = match json {
                Json::Array(items) => RelationshipValue::Many(
                    items.iter().map(parse).collect::<Result<Vec<_>, _>>()?,
                ),
                item => RelationshipValue::Single(Some(parse(item)?)),
            };
            normalize_value(node, Value::Relationship(value), path)
        }
        (FieldKind::RichText, Json::String(s)) => Ok(Value::RichText(RichText::plain(s.clone()))),
        (FieldKind::RichText, json @ Json::Object(_)) => RichText::from_json(json)
            .map(Value::RichText)
            .ok_or_else(|| expected(node, path, found)),
        _ => Err(expected(node, path, found)),
    }
}

fn row_from_json(field: &FieldSchema, json: &serde_json::Value, path: &FieldPathBuf) -> Result<Row, FieldError> {
    let object = json
        .as_object()
        .ok_or_else(|| FieldError::mismatch(path, "expected a row object"))?;
    let id = object
        .get(ROW_ID_KEY)
        .and_then(|id| id.as_str())
        .map(RowId::new)
        .unwrap_or_else(RowId::generate);
    let block_type = object
        .get(BLOCK_TYPE_KEY)
        .and_then(|slug| slug.as_str())
        .map(str::to_string);

    let fields = match field.kind {
        FieldKind::Blocks => {
            let slug = block_type
                .as_deref()
                .ok_or_else(|| FieldError::mismatch(path, "block rows need a block type"))?;
            let block = field.block(slug).ok_or_else(|| FieldError::UnknownBlock {
                path: path.clone(),
                block: slug.to_string(),
            })?;
            &block.fields
        }
        _ => &field.fields,
    };

    Ok(Row {
        id,
        block_type: block_type.filter(|_| field.kind == FieldKind::Blocks),
        fields: doc_from_json(fields, json, path)?,
    })
}

/// Converts a JSON object into one document level.
///
/// Keys without a schema node (`id`, `createdAt`, backend bookkeeping) are skipped.
pub(crate) fn doc_from_json(
    fields: &[FieldSchema],
    json: &serde_json::Value,
    prefix: &FieldPath,
) -> Result<Doc, FieldError> {
    let object = json
        .as_object()
        .ok_or_else(|| FieldError::mismatch(prefix, "expected an object"))?;
    let mut doc = Doc::new();
    for (name, value) in object {
        let path = prefix.to_path_buf().push(name);
        match find_node(fields, name) {
            Some(node) => {
                doc.insert(name.clone(), value_from_json(node, value, &path)?);
            }
            None => debug!(path = %path, "Skipping key without schema node"),
        }
    }
    Ok(doc)
}

/// Builds a level holding the declared defaults of `fields`.
///
/// Groups and named tabs recurse; their level is kept only when a child declares
/// a default.
pub(crate) fn defaults_for(fields: &[FieldSchema], prefix: &FieldPath) -> Doc {
    let mut doc = Doc::new();
    for node in level_nodes(fields) {
        let path = prefix.to_path_buf().push(node.name());
        let default = node.field().and_then(|field| field.default_value.as_ref());
        if let Some(default) = default {
            match value_from_json(node, default, &path) {
                Ok(value) => {
                    doc.insert(node.name(), value);
                }
                Err(err) => debug!(path = %path, error = %err, "Ignoring invalid default"),
            }
        } else if node.kind() == FieldKind::Group {
            let nested = defaults_for(node.fields(), &path);
            if !nested.is_empty() {
                doc.insert(node.name(), nested);
            }
        }
    }
    doc
}
