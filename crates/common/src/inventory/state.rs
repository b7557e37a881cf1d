// Inventory view state: active tab, per-tab lists, selection and draft.
//
// Invariants:
// - switching tabs always leaves nothing selected and the view in Viewing;
// - the draft is the only thing edits touch; the listed item changes only in
//   `commit_save`, and then only in its editable fields.

use serde_json::{Map, Value};

use super::fields::{set_field, FieldPath};
use super::policy::{is_editable, merge_editable, save_payload, tab_is_editable};
use super::{EditError, InventoryItem, InventoryTab};
use crate::listing::matches_search;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabData {
    pub items: Vec<InventoryItem>,
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Viewing,
    Editing { draft: InventoryItem },
}

/// PUT request produced from a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub tab: InventoryTab,
    pub item_id: String,
    pub payload: Map<String, Value>,
}

impl SaveRequest {
    pub fn path(&self, project_id: &str) -> String {
        self.tab.update_path(project_id, &self.item_id)
    }
}

#[derive(Debug, Clone)]
pub struct InventoryState {
    active_tab: InventoryTab,
    tabs: [TabData; 4],
    selected: Option<String>,
    mode: Mode,
    search: String,
    last_error: Option<String>,
}

impl Default for InventoryState {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryState {
    pub fn new() -> Self {
        Self {
            active_tab: InventoryTab::DbFiles,
            tabs: Default::default(),
            selected: None,
            mode: Mode::Viewing,
            search: String::new(),
            last_error: None,
        }
    }

    pub fn active_tab(&self) -> InventoryTab {
        self.active_tab
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, Mode::Editing { .. })
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn tab_data(&self, tab: InventoryTab) -> &TabData {
        &self.tabs[tab.index()]
    }

    pub fn items(&self, tab: InventoryTab) -> &[InventoryItem] {
        &self.tabs[tab.index()].items
    }

    /// Switch tabs. Returns true when the tab has not been fetched yet.
    pub fn select_tab(&mut self, tab: InventoryTab) -> bool {
        self.active_tab = tab;
        self.selected = None;
        self.mode = Mode::Viewing;
        self.search.clear();
        self.last_error = None;
        !self.tabs[tab.index()].loaded
    }

    /// Store a fetched list and reconcile the selection against it.
    pub fn load_tab(&mut self, tab: InventoryTab, items: Vec<InventoryItem>) {
        let data = &mut self.tabs[tab.index()];
        data.items = items;
        data.loaded = true;

        if tab != self.active_tab {
            return;
        }
        let still_present = self
            .selected
            .as_deref()
            .is_some_and(|key| self.tabs[tab.index()].items.iter().any(|item| item.key() == key));
        if !still_present {
            if let Some(key) = self.selected.as_deref() {
                tracing::debug!(tab = %tab, key, "selected item vanished on reload");
            }
            self.selected = None;
            self.mode = Mode::Viewing;
        }
    }

    /// Force a refetch of `tab` on next use.
    pub fn invalidate(&mut self, tab: InventoryTab) {
        self.tabs[tab.index()].loaded = false;
    }

    pub fn select_item(&mut self, key: &str) -> Result<(), EditError> {
        if self.is_editing() {
            return Err(EditError::EditInProgress);
        }
        if self.find(key).is_none() {
            return Err(EditError::UnknownItem(key.to_string()));
        }
        self.selected = Some(key.to_string());
        Ok(())
    }

    pub fn selected_item(&self) -> Option<&InventoryItem> {
        self.selected.as_deref().and_then(|key| self.find(key))
    }

    /// The draft while editing, otherwise the selected item.
    pub fn displayed_item(&self) -> Option<&InventoryItem> {
        match &self.mode {
            Mode::Editing { draft } => Some(draft),
            Mode::Viewing => self.selected_item(),
        }
    }

    pub fn begin_edit(&mut self) -> Result<(), EditError> {
        if self.is_editing() {
            return Err(EditError::EditInProgress);
        }
        if !tab_is_editable(self.active_tab) {
            return Err(EditError::NotEditable(self.active_tab));
        }
        let draft = self.selected_item().cloned().ok_or(EditError::NoSelection)?;
        self.mode = Mode::Editing { draft };
        self.last_error = None;
        Ok(())
    }

    pub fn edit_field(&mut self, field: &str, raw: &str) -> Result<(), EditError> {
        let tab = self.active_tab;
        if !is_editable(tab, field, false) {
            return Err(EditError::ReadOnly { tab, field: field.to_string() });
        }
        set_field(self.draft_mut()?, FieldPath::TopLevel(field), raw)
    }

    pub fn edit_nested_field(&mut self, index: usize, field: &str, raw: &str) -> Result<(), EditError> {
        let tab = self.active_tab;
        if tab.nested_collection().is_none() {
            return Err(EditError::NoNestedCollection(tab));
        }
        if !is_editable(tab, field, true) {
            return Err(EditError::ReadOnly { tab, field: field.to_string() });
        }
        set_field(self.draft_mut()?, FieldPath::Nested { index, field }, raw)
    }

    /// Build the request for the current draft without touching the list.
    pub fn prepare_save(&self) -> Result<SaveRequest, EditError> {
        let Mode::Editing { draft } = &self.mode else {
            return Err(EditError::NotEditing);
        };
        Ok(SaveRequest {
            tab: self.active_tab,
            item_id: draft.key().to_string(),
            payload: save_payload(draft)?,
        })
    }

    /// Apply a successful save.
    ///
    /// `updated` is the backend's copy of the item when it sent one;
    /// otherwise the draft's editable fields are merged onto the original.
    pub fn commit_save(&mut self, updated: Option<InventoryItem>) -> Result<&InventoryItem, EditError> {
        let Mode::Editing { draft } = &self.mode else {
            return Err(EditError::NotEditing);
        };
        let key = self.selected.clone().ok_or(EditError::NoSelection)?;
        let tab = self.active_tab.index();
        let position = self.tabs[tab]
            .items
            .iter()
            .position(|item| item.key() == key)
            .ok_or_else(|| EditError::UnknownItem(key.clone()))?;

        let replacement = match updated {
            Some(item) => item,
            None => merge_editable(&self.tabs[tab].items[position], draft)?,
        };
        self.selected = Some(replacement.key().to_string());
        self.tabs[tab].items[position] = replacement;
        self.mode = Mode::Viewing;
        self.last_error = None;
        Ok(&self.tabs[tab].items[position])
    }

    /// Record a failed save; the draft stays for another attempt.
    pub fn fail_save(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn cancel(&mut self) {
        self.mode = Mode::Viewing;
        self.last_error = None;
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.selected = None;
        self.mode = Mode::Viewing;
    }

    /// Active tab's items matching the search term.
    pub fn visible_items(&self) -> Vec<&InventoryItem> {
        self.items(self.active_tab)
            .iter()
            .filter(|item| matches_search(&self.search, &item.search_fields()))
            .collect()
    }

    fn find(&self, key: &str) -> Option<&InventoryItem> {
        self.items(self.active_tab).iter().find(|item| item.key() == key)
    }

    fn draft_mut(&mut self) -> Result<&mut InventoryItem, EditError> {
        match &mut self.mode {
            Mode::Editing { draft } => Ok(draft),
            Mode::Viewing => Err(EditError::NotEditing),
        }
    }
}
