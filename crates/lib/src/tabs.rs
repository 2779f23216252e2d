//! Tab partition controller.
//!
//! A tabs field splits its children into panes for rendering only. Every pane reads
//! and writes the same value tree, so switching tabs never changes a value or its
//! dirtiness. A tabs field is addressed by its group path: the data level it lives
//! in followed by its name, e.g. `content` or `items.0.layout`. Unnamed tabs fields
//! use their position at the level instead, e.g. `_tabs-0`.

use tracing::debug;

use crate::{
    Result,
    form::FormState,
    path::{FieldPath, FieldPathBuf},
    schema::{FieldSchema, TabDefinition, level_nodes},
    tree::FieldError,
};

impl FormState {
    fn tabs_field(&self, group_path: &FieldPath) -> std::result::Result<&FieldSchema, FieldError> {
        self.tree
            .schema()
            .tabs_at(group_path, self.tree.data())
            .ok_or_else(|| FieldError::mismatch(group_path, "not a tabs field"))
    }

    fn find_tab<'s>(
        field: &'s FieldSchema,
        group_path: &FieldPath,
        key: &str,
    ) -> std::result::Result<&'s TabDefinition, FieldError> {
        field
            .tabs
            .iter()
            .enumerate()
            .find(|(index, tab)| tab.key(*index) == key)
            .map(|(_, tab)| tab)
            .ok_or_else(|| FieldError::UnknownTab {
                path: group_path.to_path_buf(),
                tab: key.to_string(),
            })
    }

    /// The keys of the tabs field's panes, in declaration order.
    pub fn tab_keys(&self, group_path: impl AsRef<FieldPath>) -> Result<Vec<String>> {
        let field = self.tabs_field(group_path.as_ref())?;
        Ok(field
            .tabs
            .iter()
            .enumerate()
            .map(|(index, tab)| tab.key(index))
            .collect())
    }

    /// The selected pane; the first one until another is chosen.
    pub fn active_tab(&self, group_path: impl AsRef<FieldPath>) -> Result<String> {
        let group_path = group_path.as_ref();
        let field = self.tabs_field(group_path)?;
        if let Some(selected) = self.presentation.selected_tab(group_path) {
            return Ok(selected.to_string());
        }
        field
            .tabs
            .first()
            .map(|tab| tab.key(0))
            .ok_or_else(|| FieldError::mismatch(group_path, "tabs field without tabs").into())
    }

    pub fn set_active_tab(&mut self, group_path: impl AsRef<FieldPath>, key: &str) -> Result<()> {
        let group_path = group_path.as_ref();
        let field = self.tabs_field(group_path)?;
        Self::find_tab(field, group_path, key)?;
        debug!(path = %group_path, tab = key, "Switched tab");
        self.presentation
            .active_tabs
            .insert(group_path.to_path_buf(), key.to_string());
        Ok(())
    }

    /// The paths of the data fields a pane renders.
    ///
    /// Fields of a named tab live under the tab's name; fields of an unnamed tab
    /// live next to the tabs field.
    pub fn tab_fields(&self, group_path: impl AsRef<FieldPath>, key: &str) -> Result<Vec<FieldPathBuf>> {
        let group_path = group_path.as_ref();
        let field = self.tabs_field(group_path)?;
        let tab = Self::find_tab(field, group_path, key)?;

        let level = group_path.parent().unwrap_or(group_path).to_path_buf();
        let prefix = match &tab.name {
            Some(name) => level.push(name),
            None => level,
        };
        Ok(level_nodes(&tab.fields)
            .into_iter()
            .map(|node| prefix.clone().push(node.name()))
            .collect())
    }
}
