// Inventory item shapes, one variant per tab.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{EditError, InventoryTab};
use crate::types::{null_as_default, optional_id_string};

/// A field of an M204 database file's record structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructureField {
    #[serde(deserialize_with = "null_as_default")]
    pub field_name: String,
    pub m204_attributes: Option<String>,
    pub length: Option<u32>,
    pub cobol_picture: Option<String>,
    pub suggested_cobol_name: Option<String>,
    pub key_order: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_key_component: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbFile {
    #[serde(deserialize_with = "optional_id_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    pub m204_attributes: Option<String>,
    pub target_vsam_dataset_name: Option<String>,
    pub target_vsam_type: Option<String>,
    pub primary_key_field: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub structure: Vec<StructureField>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcedureParameter {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub data_type: Option<String>,
    pub direction: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedParameters {
    #[serde(deserialize_with = "null_as_default")]
    pub parameters: Vec<ProcedureParameter>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Procedure {
    #[serde(deserialize_with = "optional_id_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    pub procedure_type: Option<String>,
    pub parameters: Option<String>,
    pub parsed_parameters: Option<ParsedParameters>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub target_cobol_function_name: Option<String>,
    pub complexity: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_runnable_main: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Procedure {
    /// Number of source lines covered, when both ends are known.
    pub fn line_count(&self) -> Option<u32> {
        match (self.start_line, self.end_line) {
            (Some(start), Some(end)) if end >= start => Some(end - start + 1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Variable {
    #[serde(deserialize_with = "optional_id_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    pub scope: Option<String>,
    pub declared_type: Option<String>,
    pub source_line: Option<u32>,
    pub attributes: Option<Value>,
    pub cobol_mapped_name: Option<String>,
    pub cobol_mapped_type: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub array_dimensions: Vec<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A field of an IMAGE definition in a non-database M204 file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageField {
    #[serde(deserialize_with = "null_as_default")]
    pub field_name: String,
    pub m204_type: Option<String>,
    pub length: Option<u32>,
    pub position: Option<u32>,
    pub cobol_picture: Option<String>,
    pub suggested_cobol_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OtherFile {
    #[serde(deserialize_with = "optional_id_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    pub m204_attributes: Option<String>,
    pub target_vsam_dataset_name: Option<String>,
    pub target_vsam_type: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub image_statements: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub parsed_image_fields: Vec<ImageField>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OtherFile {
    /// IMAGE definition text, synthesized from the parsed fields when the
    /// backend sent none.
    pub fn image_statement_text(&self) -> Vec<String> {
        if !self.image_statements.is_empty() || self.parsed_image_fields.is_empty() {
            return self.image_statements.clone();
        }

        let mut block = vec![format!("IMAGE {}", self.name)];
        for field in &self.parsed_image_fields {
            let mut line = format!("  {}", field.field_name);
            if let Some(ty) = &field.m204_type {
                line.push_str(&format!(" IS {ty}"));
            }
            if let Some(len) = field.length {
                line.push_str(&format!(" LEN {len}"));
            }
            block.push(line);
        }
        block.push("END IMAGE".to_string());
        vec![block.join("\n")]
    }
}

/// An inventory entry; the variant always matches the tab it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InventoryItem {
    DbFile(DbFile),
    Procedure(Procedure),
    Variable(Variable),
    OtherFile(OtherFile),
}

impl InventoryItem {
    /// Decode a backend record for `tab`.
    pub fn from_value(tab: InventoryTab, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match tab {
            InventoryTab::DbFiles => Self::DbFile(serde_json::from_value(value)?),
            InventoryTab::Procedures => Self::Procedure(serde_json::from_value(value)?),
            InventoryTab::Variables => Self::Variable(serde_json::from_value(value)?),
            InventoryTab::OtherFiles => Self::OtherFile(serde_json::from_value(value)?),
        })
    }

    pub fn tab(&self) -> InventoryTab {
        match self {
            Self::DbFile(_) => InventoryTab::DbFiles,
            Self::Procedure(_) => InventoryTab::Procedures,
            Self::Variable(_) => InventoryTab::Variables,
            Self::OtherFile(_) => InventoryTab::OtherFiles,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::DbFile(item) => item.id.as_deref(),
            Self::Procedure(item) => item.id.as_deref(),
            Self::Variable(item) => item.id.as_deref(),
            Self::OtherFile(item) => item.id.as_deref(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::DbFile(item) => &item.name,
            Self::Procedure(item) => &item.name,
            Self::Variable(item) => &item.name,
            Self::OtherFile(item) => &item.name,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::DbFile(item) => &item.kind,
            Self::Procedure(item) => &item.kind,
            Self::Variable(item) => &item.kind,
            Self::OtherFile(item) => &item.kind,
        }
    }

    /// Identity used for selection and reconciliation: the id, else the name.
    pub fn key(&self) -> &str {
        self.id().filter(|id| !id.is_empty()).unwrap_or_else(|| self.name())
    }

    /// Value of the tab's sub-display field, if it is set.
    pub fn sub_display(&self) -> Option<&str> {
        let value = match self {
            Self::DbFile(item) => item.m204_attributes.as_deref(),
            Self::Procedure(item) => item.procedure_type.as_deref(),
            Self::Variable(item) => item.scope.as_deref(),
            Self::OtherFile(item) => item.m204_attributes.as_deref(),
        };
        value.filter(|text| !text.is_empty() && *text != "N/A")
    }

    /// Text matched by inventory search.
    pub fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name()];
        fields.extend(self.sub_display());
        fields
    }

    /// Length of the nested per-field collection (0 when the tab has none).
    pub fn nested_len(&self) -> usize {
        match self {
            Self::DbFile(item) => item.structure.len(),
            Self::OtherFile(item) => item.parsed_image_fields.len(),
            Self::Procedure(_) | Self::Variable(_) => 0,
        }
    }

    pub(crate) fn to_json(&self) -> Result<Value, EditError> {
        serde_json::to_value(self).map_err(|error| EditError::Encoding(error.to_string()))
    }

    pub(crate) fn from_json(tab: InventoryTab, value: Value) -> Result<Self, EditError> {
        Self::from_value(tab, value).map_err(|error| EditError::Encoding(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer_file() -> Value {
        json!({
            "id": 11,
            "name": "CUSTOMER.FILE",
            "type": "M204 File",
            "m204Attributes": "SIZE 10000, PAGESIZE 4096",
            "targetVsamDatasetName": "PROJ.APP.CUST.KSDS",
            "targetVsamType": "KSDS",
            "primaryKeyField": "CUST_ID",
            "structure": [
                { "fieldName": "CUST_ID", "length": 10, "cobolPicture": "PIC X(10)", "isKeyComponent": true, "keyOrder": 1 },
                { "fieldName": "CUST_NAME", "length": 50, "m204Attributes": "ORDERED" }
            ],
            "mappingStatus": "Confirmed"
        })
    }

    #[test]
    fn decodes_db_file_with_numeric_id_and_extra_fields() {
        let item = InventoryItem::from_value(InventoryTab::DbFiles, customer_file()).unwrap();
        assert_eq!(item.key(), "11");
        assert_eq!(item.tab(), InventoryTab::DbFiles);
        assert_eq!(item.nested_len(), 2);
        let InventoryItem::DbFile(file) = &item else { panic!("expected db file") };
        assert_eq!(file.structure[0].key_order, Some(1));
        assert!(file.structure[0].is_key_component);
        assert_eq!(file.extra.get("mappingStatus"), Some(&json!("Confirmed")));
    }

    #[test]
    fn extra_fields_survive_reencoding() {
        let item = InventoryItem::from_value(InventoryTab::DbFiles, customer_file()).unwrap();
        let encoded = item.to_json().unwrap();
        assert_eq!(encoded["mappingStatus"], "Confirmed");
        assert_eq!(encoded["structure"][1]["m204Attributes"], "ORDERED");
        let again = InventoryItem::from_json(InventoryTab::DbFiles, encoded).unwrap();
        assert_eq!(again, item);
    }

    #[test]
    fn key_falls_back_to_name() {
        let item = InventoryItem::from_value(
            InventoryTab::Variables,
            json!({ "name": "%CUSTOMER_ID", "scope": "GLOBAL" }),
        )
        .unwrap();
        assert_eq!(item.key(), "%CUSTOMER_ID");
        assert_eq!(item.sub_display(), Some("GLOBAL"));
    }

    #[test]
    fn placeholder_sub_display_is_hidden() {
        let item = InventoryItem::from_value(
            InventoryTab::Procedures,
            json!({ "name": "MAIN", "procedureType": "N/A" }),
        )
        .unwrap();
        assert_eq!(item.sub_display(), None);
        assert_eq!(item.search_fields(), vec!["MAIN"]);
    }

    #[test]
    fn explicit_nulls_decode_as_empty_on_every_tab() {
        let db = InventoryItem::from_value(
            InventoryTab::DbFiles,
            json!({ "id": 1, "name": "CUST", "type": null, "structure": null }),
        )
        .unwrap();
        assert_eq!(db.nested_len(), 0);
        assert_eq!(db.kind(), "");

        let procedure = InventoryItem::from_value(
            InventoryTab::Procedures,
            json!({ "id": 2, "name": "CALCPAY", "isRunnableMain": null, "parsedParameters": { "parameters": null } }),
        )
        .unwrap();
        let InventoryItem::Procedure(procedure) = procedure else { panic!("expected procedure") };
        assert!(!procedure.is_runnable_main);
        assert!(procedure.parsed_parameters.unwrap().parameters.is_empty());

        let variable = InventoryItem::from_value(
            InventoryTab::Variables,
            json!({ "id": 3, "name": "%X", "arrayDimensions": null, "keywords": null }),
        )
        .unwrap();
        let InventoryItem::Variable(variable) = variable else { panic!("expected variable") };
        assert!(variable.array_dimensions.is_empty());
        assert!(variable.keywords.is_empty());

        let other = InventoryItem::from_value(
            InventoryTab::OtherFiles,
            json!({ "id": 4, "name": "REPORT.IMG", "imageStatements": null, "parsedImageFields": null }),
        )
        .unwrap();
        assert_eq!(other.key(), "4");
        assert_eq!(other.nested_len(), 0);
    }

    #[test]
    fn procedure_line_count() {
        let proc = Procedure { start_line: Some(15), end_line: Some(150), ..Procedure::default() };
        assert_eq!(proc.line_count(), Some(136));
        let proc = Procedure { start_line: Some(15), ..Procedure::default() };
        assert_eq!(proc.line_count(), None);
    }

    #[test]
    fn image_statements_are_synthesized_from_fields() {
        let file = OtherFile {
            name: "REPORT.IMG".into(),
            parsed_image_fields: vec![
                ImageField {
                    field_name: "RPT_ID".into(),
                    m204_type: Some("STRING".into()),
                    length: Some(8),
                    ..ImageField::default()
                },
                ImageField { field_name: "RPT_FLAG".into(), ..ImageField::default() },
            ],
            ..OtherFile::default()
        };
        assert_eq!(
            file.image_statement_text(),
            vec!["IMAGE REPORT.IMG\n  RPT_ID IS STRING LEN 8\n  RPT_FLAG\nEND IMAGE".to_string()]
        );
    }

    #[test]
    fn raw_image_statements_win() {
        let file = OtherFile {
            image_statements: vec!["IMAGE X\nEND IMAGE".into()],
            parsed_image_fields: vec![ImageField::default()],
            ..OtherFile::default()
        };
        assert_eq!(file.image_statement_text(), vec!["IMAGE X\nEND IMAGE".to_string()]);
    }
}
