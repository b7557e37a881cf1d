// Field editability: which inventory fields a user may change.
//
// The table below is the only authority. Anything it does not list is
// read-only, including every M204-native descriptor.

use serde_json::{Map, Value};

use super::{EditError, InventoryItem, InventoryTab};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    TopLevel,
    Nested,
}

pub const EDITABILITY: &[(InventoryTab, FieldScope, &[&str])] = &[
    (
        InventoryTab::DbFiles,
        FieldScope::TopLevel,
        &["targetVsamDatasetName", "targetVsamType", "primaryKeyField"],
    ),
    (
        InventoryTab::DbFiles,
        FieldScope::Nested,
        &["suggestedCobolName", "cobolPicture", "keyOrder", "isKeyComponent"],
    ),
    (
        InventoryTab::Procedures,
        FieldScope::TopLevel,
        &["targetCobolFunctionName", "isRunnableMain", "summary"],
    ),
    (InventoryTab::Variables, FieldScope::TopLevel, &["cobolMappedName", "cobolMappedType"]),
    (InventoryTab::OtherFiles, FieldScope::TopLevel, &["targetVsamDatasetName", "targetVsamType"]),
    (InventoryTab::OtherFiles, FieldScope::Nested, &["suggestedCobolName", "cobolPicture"]),
];

fn scope(nested: bool) -> FieldScope {
    if nested { FieldScope::Nested } else { FieldScope::TopLevel }
}

pub fn editable_fields(tab: InventoryTab, nested: bool) -> &'static [&'static str] {
    let wanted = scope(nested);
    EDITABILITY
        .iter()
        .find(|(t, s, _)| *t == tab && *s == wanted)
        .map(|(_, _, fields)| *fields)
        .unwrap_or(&[])
}

pub fn is_editable(tab: InventoryTab, field: &str, nested: bool) -> bool {
    editable_fields(tab, nested).contains(&field)
}

/// Whether the tab allows entering edit mode at all.
pub fn tab_is_editable(tab: InventoryTab) -> bool {
    !editable_fields(tab, false).is_empty() || !editable_fields(tab, true).is_empty()
}

/// Build the PUT body for `draft`: editable top-level fields, plus the
/// nested collection reduced to its editable fields in original order.
pub fn save_payload(draft: &InventoryItem) -> Result<Map<String, Value>, EditError> {
    let tab = draft.tab();
    let encoded = draft.to_json()?;
    let mut payload = Map::new();

    for field in editable_fields(tab, false) {
        if let Some(value) = encoded.get(*field) {
            payload.insert((*field).to_string(), value.clone());
        }
    }

    if let Some(collection) = tab.nested_collection() {
        let nested_fields = editable_fields(tab, true);
        let entries = encoded
            .get(collection)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        let reduced: Map<String, Value> = nested_fields
                            .iter()
                            .filter_map(|field| {
                                entry.get(*field).map(|value| ((*field).to_string(), value.clone()))
                            })
                            .collect();
                        Value::Object(reduced)
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        payload.insert(collection.to_string(), Value::Array(entries));
    }

    Ok(payload)
}

/// Copy the editable fields of `draft` onto `original`, leaving every
/// read-only field as `original` had it.
pub fn merge_editable(original: &InventoryItem, draft: &InventoryItem) -> Result<InventoryItem, EditError> {
    let tab = original.tab();
    let mut merged = original.to_json()?;
    let payload = save_payload(draft)?;
    let collection = tab.nested_collection();

    let Some(target) = merged.as_object_mut() else {
        return Err(EditError::Encoding("item is not a JSON object".into()));
    };
    for (field, value) in payload {
        if Some(field.as_str()) == collection {
            let Value::Array(patches) = value else { continue };
            if let Some(Value::Array(entries)) = target.get_mut(&field) {
                for (entry, patch) in entries.iter_mut().zip(patches) {
                    if let (Some(entry), Value::Object(patch)) = (entry.as_object_mut(), patch) {
                        entry.extend(patch);
                    }
                }
            }
        } else {
            target.insert(field, value);
        }
    }

    InventoryItem::from_json(tab, merged)
}

/// Human labels for the detail view, in display order.
pub fn detail_fields(tab: InventoryTab) -> &'static [(&'static str, &'static str)] {
    match tab {
        InventoryTab::DbFiles => &[
            ("name", "Name"),
            ("type", "Type"),
            ("m204Attributes", "M204 Attributes"),
            ("targetVsamDatasetName", "Target VSAM Dataset"),
            ("targetVsamType", "Target VSAM Type"),
            ("primaryKeyField", "Primary Key Field"),
        ],
        InventoryTab::Procedures => &[
            ("name", "Name"),
            ("type", "Type"),
            ("procedureType", "Procedure Type"),
            ("parameters", "Parameters"),
            ("startLine", "Start Line"),
            ("endLine", "End Line"),
            ("complexity", "Complexity"),
            ("targetCobolFunctionName", "Target COBOL Function"),
            ("isRunnableMain", "Runnable Main"),
            ("summary", "Summary"),
        ],
        InventoryTab::Variables => &[
            ("name", "Name"),
            ("type", "Type"),
            ("scope", "Scope"),
            ("declaredType", "Declared Type"),
            ("sourceLine", "Source Line"),
            ("cobolMappedName", "COBOL Name"),
            ("cobolMappedType", "COBOL Type"),
            ("arrayDimensions", "Array Dimensions"),
            ("keywords", "Keywords"),
            ("attributes", "Attributes"),
        ],
        InventoryTab::OtherFiles => &[
            ("name", "Name"),
            ("type", "Type"),
            ("m204Attributes", "M204 Attributes"),
            ("targetVsamDatasetName", "Target VSAM Dataset"),
            ("targetVsamType", "Target VSAM Type"),
        ],
    }
}

/// Column labels for the nested collection table.
pub fn nested_columns(tab: InventoryTab) -> &'static [(&'static str, &'static str)] {
    match tab {
        InventoryTab::DbFiles => &[
            ("fieldName", "Field"),
            ("m204Attributes", "M204 Attributes"),
            ("length", "Length"),
            ("suggestedCobolName", "COBOL Name"),
            ("cobolPicture", "PIC"),
            ("keyOrder", "Key Order"),
            ("isKeyComponent", "Key"),
        ],
        InventoryTab::OtherFiles => &[
            ("fieldName", "Field"),
            ("m204Type", "M204 Type"),
            ("length", "Length"),
            ("position", "Position"),
            ("suggestedCobolName", "COBOL Name"),
            ("cobolPicture", "PIC"),
        ],
        InventoryTab::Procedures | InventoryTab::Variables => &[],
    }
}
