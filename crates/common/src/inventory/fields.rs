// Field access and input coercion on inventory items.
//
// Items are edited through their JSON form so one code path serves every
// variant; decoding back into the typed variant is the final type check.

use serde_json::{Map, Number, Value};

use super::{EditError, InventoryItem};

/// Where an edit lands inside an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPath<'a> {
    TopLevel(&'a str),
    Nested { index: usize, field: &'a str },
}

impl FieldPath<'_> {
    pub fn field(&self) -> &str {
        match self {
            Self::TopLevel(field) | Self::Nested { field, .. } => field,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Nested { .. })
    }
}

/// Read a top-level field by its wire name.
pub fn get_field(item: &InventoryItem, field: &str) -> Option<Value> {
    item.to_json().ok()?.get(field).cloned()
}

/// Read a field of the `index`-th nested entry.
pub fn get_nested_field(item: &InventoryItem, index: usize, field: &str) -> Option<Value> {
    let collection = item.tab().nested_collection()?;
    item.to_json().ok()?.get(collection)?.get(index)?.get(field).cloned()
}

/// Candidate JSON values for `raw`, judged against the field's current value.
///
/// Numbers stay numbers and flags stay flags; an unparseable number yields
/// no candidate at all.
pub fn coerce(original: &Value, raw: &str) -> Vec<Value> {
    let trimmed = raw.trim();
    match original {
        Value::Number(_) => {
            if trimmed.is_empty() {
                vec![Value::Null]
            } else {
                parse_number(trimmed).into_iter().collect()
            }
        }
        Value::Bool(_) => parse_bool(trimmed).map(Value::Bool).into_iter().collect(),
        Value::String(_) => vec![Value::String(raw.to_string())],
        Value::Array(_) | Value::Object(_) => {
            serde_json::from_str(trimmed).map(|parsed| vec![parsed]).unwrap_or_default()
        }
        Value::Null => {
            if trimmed.is_empty() {
                return vec![Value::Null];
            }
            let mut candidates = vec![Value::String(raw.to_string())];
            candidates.extend(parse_number(trimmed));
            candidates.extend(parse_bool(trimmed).map(Value::Bool));
            candidates
        }
    }
}

/// Write `raw` into `item` at `path`, coercing it to the field's type.
///
/// On failure the item is left untouched.
pub fn set_field(item: &mut InventoryItem, path: FieldPath<'_>, raw: &str) -> Result<(), EditError> {
    let tab = item.tab();
    let mut root = item.to_json()?;
    let field = path.field();
    let original = locate(&mut root, tab.nested_collection(), path)?
        .get(field)
        .cloned()
        .ok_or_else(|| EditError::UnknownField(field.to_string()))?;

    for candidate in coerce(&original, raw) {
        locate(&mut root, tab.nested_collection(), path)?.insert(field.to_string(), candidate);
        if let Ok(updated) = InventoryItem::from_value(tab, root.clone()) {
            *item = updated;
            return Ok(());
        }
    }

    Err(EditError::InvalidValue { field: field.to_string(), value: raw.to_string() })
}

fn locate<'v>(
    root: &'v mut Value,
    collection: Option<&str>,
    path: FieldPath<'_>,
) -> Result<&'v mut Map<String, Value>, EditError> {
    let encoding_error = || EditError::Encoding("item is not a JSON object".into());
    match path {
        FieldPath::TopLevel(_) => root.as_object_mut().ok_or_else(encoding_error),
        FieldPath::Nested { index, .. } => {
            let tab_error = || EditError::Encoding("nested collection is missing".into());
            let collection = collection.ok_or_else(tab_error)?;
            let entries = root
                .get_mut(collection)
                .and_then(Value::as_array_mut)
                .ok_or_else(tab_error)?;
            let len = entries.len();
            entries
                .get_mut(index)
                .ok_or(EditError::NestedIndexOutOfRange { index, len })?
                .as_object_mut()
                .ok_or_else(encoding_error)
        }
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    let float = raw.parse::<f64>().ok()?;
    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        return Some(Value::Number((float as i64).into()));
    }
    Number::from_f64(float).map(Value::Number)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}
