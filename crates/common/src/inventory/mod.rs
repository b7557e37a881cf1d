// Inventory of extracted M204 metadata: item shapes, edit policy, and the
// tab/selection/draft state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::endpoints;

pub mod fields;
pub mod item;
pub mod policy;
pub mod state;

pub use item::{
    DbFile, ImageField, InventoryItem, OtherFile, ParsedParameters, Procedure, ProcedureParameter,
    StructureField, Variable,
};
pub use policy::{editable_fields, is_editable, save_payload};
pub use state::{InventoryState, Mode, SaveRequest};

/// One inventory category, shown as a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InventoryTab {
    DbFiles,
    Procedures,
    Variables,
    OtherFiles,
}

impl InventoryTab {
    pub const ALL: [InventoryTab; 4] = [Self::DbFiles, Self::Procedures, Self::Variables, Self::OtherFiles];

    pub const fn index(self) -> usize {
        match self {
            Self::DbFiles => 0,
            Self::Procedures => 1,
            Self::Variables => 2,
            Self::OtherFiles => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DbFiles => "dbFiles",
            Self::Procedures => "procedures",
            Self::Variables => "variables",
            Self::OtherFiles => "otherFiles",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::DbFiles => "M204 DB Files",
            Self::Procedures => "Procedures",
            Self::Variables => "Variables",
            Self::OtherFiles => "Other M204 Files",
        }
    }

    /// Field searched and shown next to the item name in lists.
    pub const fn sub_display_field(self) -> &'static str {
        match self {
            Self::DbFiles | Self::OtherFiles => "m204Attributes",
            Self::Procedures => "procedureType",
            Self::Variables => "scope",
        }
    }

    /// Name of the nested per-field collection, when the tab has one.
    pub const fn nested_collection(self) -> Option<&'static str> {
        match self {
            Self::DbFiles => Some("structure"),
            Self::OtherFiles => Some("parsedImageFields"),
            Self::Procedures | Self::Variables => None,
        }
    }

    pub fn list_path(self, project_id: &str) -> String {
        let template = match self {
            Self::DbFiles => endpoints::METADATA_DB_FILES,
            Self::Procedures => endpoints::METADATA_PROCEDURES,
            Self::Variables => endpoints::METADATA_VARIABLES,
            Self::OtherFiles => endpoints::METADATA_OTHER_FILES,
        };
        endpoints::fill(template, &[("project_id", project_id)])
    }

    pub fn update_path(self, project_id: &str, item_id: &str) -> String {
        let template = match self {
            Self::DbFiles | Self::OtherFiles => endpoints::METADATA_M204_FILE_UPDATE,
            Self::Procedures => endpoints::METADATA_PROCEDURE_UPDATE,
            Self::Variables => endpoints::METADATA_VARIABLE_UPDATE,
        };
        endpoints::fill(template, &[("project_id", project_id), ("item_id", item_id)])
    }
}

impl fmt::Display for InventoryTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String =
            s.chars().filter(|ch| ch.is_ascii_alphanumeric()).collect::<String>().to_ascii_lowercase();
        match normalized.as_str() {
            "dbfiles" | "db" | "databases" => Ok(Self::DbFiles),
            "procedures" | "procs" => Ok(Self::Procedures),
            "variables" | "vars" => Ok(Self::Variables),
            "otherfiles" | "other" => Ok(Self::OtherFiles),
            _ => Err(format!(
                "unknown inventory tab `{s}` (expected db-files, procedures, variables or other-files)"
            )),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("field `{field}` is read-only on the {tab} tab")]
    ReadOnly { tab: InventoryTab, field: String },

    #[error("item has no field `{0}`")]
    UnknownField(String),

    #[error("`{value}` is not a valid value for `{field}`")]
    InvalidValue { field: String, value: String },

    #[error("the {0} tab has no nested fields")]
    NoNestedCollection(InventoryTab),

    #[error("nested field index {index} is out of range ({len} entries)")]
    NestedIndexOutOfRange { index: usize, len: usize },

    #[error("no item is selected")]
    NoSelection,

    #[error("item `{0}` is not in the current list")]
    UnknownItem(String),

    #[error("an edit is already in progress; save or cancel it first")]
    EditInProgress,

    #[error("no edit is in progress")]
    NotEditing,

    #[error("the {0} tab does not support editing")]
    NotEditable(InventoryTab),

    #[error("inventory item could not be encoded: {0}")]
    Encoding(String),
}
