//! Row collection controller for array and blocks fields.
//!
//! Rows are addressed by [`RowId`] everywhere except [`FormState::move_row`], whose
//! arguments are positions. Ids travel with their subtree, so a drawer opened from a
//! row keeps delivering to that row after the collection is reordered.

use std::sync::Arc;

use tracing::debug;

use crate::{
    Result,
    constants::DEFAULT_ROW_NOUN,
    form::FormState,
    path::FieldPath,
    registry::{FieldRegistry, humanize},
    schema::{CollectionSchema, FieldKind, FieldSchema, LabelContext, Resolved, SchemaNode},
    tree::{Doc, FieldError, Row, RowAddress, RowId, defaults_for},
};

fn rows_field<'a>(
    schema: &'a CollectionSchema,
    path: &FieldPath,
    data: &Doc,
) -> std::result::Result<&'a FieldSchema, FieldError> {
    match schema.resolve(path, data) {
        Some(Resolved::Node(SchemaNode::Field(field))) if field.kind.has_rows() => Ok(field),
        _ => Err(FieldError::mismatch(path, "not an array or blocks field")),
    }
}

impl FormState {
    fn row_schema(&self, path: &FieldPath) -> std::result::Result<Arc<CollectionSchema>, FieldError> {
        let schema = Arc::clone(self.tree.schema());
        rows_field(&schema, path, self.tree.data())?;
        Ok(schema)
    }

    fn row_index(&self, path: &FieldPath, id: &RowId) -> std::result::Result<usize, FieldError> {
        self.tree
            .row(path, id)
            .map(|(index, _)| index)
            .ok_or_else(|| FieldError::RowNotFound {
                path: path.to_path_buf(),
                id: id.clone(),
            })
    }

    /// Inserts a new row at `at_index`, appending when the index is past the end.
    ///
    /// The row gets a fresh id and its sub-fields' declared defaults. Blocks fields
    /// require the slug of one of their variants; array fields take no block type.
    pub fn add_row(
        &mut self,
        path: impl AsRef<FieldPath>,
        at_index: usize,
        block_type: Option<&str>,
    ) -> Result<Row> {
        let path = path.as_ref();
        self.tree.check_writable(path)?;
        let schema = self.row_schema(path)?;
        let field = rows_field(&schema, path, self.tree.data())?;

        let (block_type, fields) = match (field.kind, block_type) {
            (FieldKind::Blocks, Some(slug)) => {
                let block = field.block(slug).ok_or_else(|| FieldError::UnknownBlock {
                    path: path.to_path_buf(),
                    block: slug.to_string(),
                })?;
                (Some(slug.to_string()), block.fields.as_slice())
            }
            (FieldKind::Blocks, None) => {
                return Err(FieldError::mismatch(path, "blocks rows need a block type").into());
            }
            (_, Some(slug)) => {
                return Err(FieldError::UnknownBlock {
                    path: path.to_path_buf(),
                    block: slug.to_string(),
                }
                .into());
            }
            (_, None) => (None, field.fields.as_slice()),
        };

        let row = Row::new(block_type, defaults_for(fields, path));
        let max_rows = field.max_rows;
        let rows = self.tree.rows_mut(path)?;
        if let Some(max) = max_rows
            && rows.len() >= max
        {
            return Err(FieldError::RowLimit {
                path: path.to_path_buf(),
                max,
            }
            .into());
        }
        let index = at_index.min(rows.len());
        rows.insert(index, row.clone());
        debug!(path = %path, index, id = %row.id(), block = row.block_type(), "Added row");
        Ok(row)
    }

    /// Removes the row with `id` and returns it.
    pub fn remove_row(&mut self, path: impl AsRef<FieldPath>, id: &RowId) -> Result<Row> {
        let path = path.as_ref();
        self.tree.check_writable(path)?;
        let schema = self.row_schema(path)?;
        let min_rows = rows_field(&schema, path, self.tree.data())?.min_rows;
        let index = self.row_index(path, id)?;

        let rows = self.tree.rows_mut(path)?;
        if let Some(min) = min_rows
            && rows.len() <= min
        {
            return Err(FieldError::MinRows {
                path: path.to_path_buf(),
                min,
            }
            .into());
        }
        let row = rows.remove(index);
        self.presentation.collapsed.remove(id);
        debug!(path = %path, index, id = %id, "Removed row");
        Ok(row)
    }

    /// Moves the row at `from` to position `to`.
    pub fn move_row(&mut self, path: impl AsRef<FieldPath>, from: usize, to: usize) -> Result<()> {
        let path = path.as_ref();
        self.tree.check_writable(path)?;
        self.row_schema(path)?;
        let len = self.tree.rows(path).map_or(0, <[Row]>::len);
        for index in [from, to] {
            if index >= len {
                return Err(FieldError::IndexOutOfRange {
                    path: path.to_path_buf(),
                    index,
                    len,
                }
                .into());
            }
        }
        if from == to {
            return Ok(());
        }

        let rows = self.tree.rows_mut(path)?;
        let row = rows.remove(from);
        debug!(path = %path, from, to, id = %row.id(), "Moved row");
        rows.insert(to, row);
        Ok(())
    }

    /// Inserts a deep copy of the row right after it. The copy and every row
    /// nested in it get fresh ids.
    pub fn duplicate_row(&mut self, path: impl AsRef<FieldPath>, id: &RowId) -> Result<Row> {
        let path = path.as_ref();
        self.tree.check_writable(path)?;
        let schema = self.row_schema(path)?;
        let max_rows = rows_field(&schema, path, self.tree.data())?.max_rows;
        let index = self.row_index(path, id)?;

        let rows = self.tree.rows_mut(path)?;
        if let Some(max) = max_rows
            && rows.len() >= max
        {
            return Err(FieldError::RowLimit {
                path: path.to_path_buf(),
                max,
            }
            .into());
        }
        let copy = rows[index].with_fresh_ids();
        rows.insert(index + 1, copy.clone());
        debug!(path = %path, source = %id, id = %copy.id(), "Duplicated row");
        Ok(copy)
    }

    /// Sets the collapsed flag of a row. Values are not touched.
    pub fn collapse(&mut self, path: impl AsRef<FieldPath>, id: &RowId, collapsed: bool) -> Result<()> {
        let path = path.as_ref();
        self.row_schema(path)?;
        self.row_index(path, id)?;
        if collapsed {
            self.presentation.collapsed.insert(id.clone());
        } else {
            self.presentation.collapsed.remove(id);
        }
        Ok(())
    }

    pub fn is_collapsed(&self, id: &RowId) -> bool {
        self.presentation.is_collapsed(id)
    }

    /// Collapses or expands every row of the collection. Returns the row count.
    pub fn set_all_collapsed(&mut self, path: impl AsRef<FieldPath>, collapsed: bool) -> Result<usize> {
        let path = path.as_ref();
        self.row_schema(path)?;
        let ids: Vec<RowId> = self
            .tree
            .rows(path)
            .unwrap_or_default()
            .iter()
            .map(|row| row.id().clone())
            .collect();
        for id in &ids {
            if collapsed {
                self.presentation.collapsed.insert(id.clone());
            } else {
                self.presentation.collapsed.remove(id);
            }
        }
        Ok(ids.len())
    }

    /// The header label of a row, evaluated against its live values.
    ///
    /// Uses the field's row label when it yields text; otherwise
    /// `"{noun} {nn}"` where the noun is the block variant's or the field's singular
    /// label, and `nn` the 1-based position.
    pub fn label_for(
        &self,
        registry: &FieldRegistry,
        path: impl AsRef<FieldPath>,
        id: &RowId,
        locale: &str,
    ) -> Result<String> {
        let path = path.as_ref();
        let field = rows_field(self.tree.schema(), path, self.tree.data())?;
        let (index, row) = self.tree.row(path, id).ok_or_else(|| FieldError::RowNotFound {
            path: path.to_path_buf(),
            id: id.clone(),
        })?;

        let row_path = path.to_path_buf().push_index(index);
        let ctx = LabelContext {
            data: row.fields(),
            path: &row_path,
            index: Some(index),
            locale,
        };
        if let Some(label) = field
            .row_label
            .as_ref()
            .and_then(|source| registry.evaluate(source, &ctx, field.name()))
            .filter(|label| !label.trim().is_empty())
        {
            return Ok(label);
        }

        let block = row.block_type().and_then(|slug| field.block(slug));
        let singular = match block {
            Some(block) => block.labels.as_ref(),
            None => field.labels.as_ref(),
        }
        .and_then(|labels| labels.singular.as_ref());
        let noun = singular
            .and_then(|source| registry.evaluate(source, &ctx, field.name()))
            .or_else(|| block.map(|block| humanize(&block.slug)))
            .unwrap_or_else(|| DEFAULT_ROW_NOUN.to_string());
        Ok(format!("{noun} {}", registry.config().row_number(index)))
    }

    /// The automation address of a row.
    pub fn row_address(&self, path: impl AsRef<FieldPath>, id: &RowId) -> Result<RowAddress> {
        let path = path.as_ref();
        let index = self.row_index(path, id)?;
        Ok(RowAddress {
            path: path.to_path_buf(),
            index,
            id: id.clone(),
        })
    }
}
