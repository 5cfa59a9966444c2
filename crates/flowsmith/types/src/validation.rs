//! Validator error reports and their shape normalization.
//!
//! The remote validator reports errors either as a flat list of objects or
//! as `[nodeIdentifier, [[category, field, message], ...]]` pairs. Both are
//! normalized into [`ValidationError`] values here.

use crate::error::ValidationShapeError;
use crate::node::NodeId;
use crate::schema::Column;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// One validator-reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Row the error addresses; `None` for out-of-band errors such as a
    /// locked version.
    #[serde(
        default,
        alias = "node_identifier",
        alias = "node_id",
        alias = "nodeId",
        alias = "node_number",
        alias = "nodeNumber",
        alias = "node",
        deserialize_with = "lenient_node_id"
    )]
    pub node_identifier: Option<NodeId>,
    #[serde(default, alias = "type", alias = "error_type")]
    pub category: String,
    #[serde(default, alias = "column", alias = "field_name", alias = "fieldName")]
    pub field: String,
    #[serde(default, alias = "error", alias = "description", alias = "detail")]
    pub message: String,
}

fn lenient_node_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NodeId>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(node_id_from_value))
}

fn node_id_from_value(value: &Value) -> Option<NodeId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(NodeId::new),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl ValidationError {
    pub fn new(
        node_identifier: Option<NodeId>,
        category: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            node_identifier,
            category: category.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// An error addressing row `id`.
    pub fn for_node(
        id: u32,
        category: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Some(NodeId::new(id)), category, field, message)
    }

    /// An error not tied to any row.
    pub fn general(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(None, category, "", message)
    }

    pub fn is_row_addressed(&self) -> bool {
        self.node_identifier.is_some()
    }

    /// Schema column named by `field`, when it names one.
    pub fn column(&self) -> Option<Column> {
        Column::from_field_name(&self.field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.node_identifier {
            write!(f, "Node {}: ", id)?;
        }
        if !self.category.is_empty() {
            write!(f, "[{}] ", self.category)?;
        }
        if !self.field.is_empty() {
            write!(f, "{}: ", self.field)?;
        }
        f.write_str(&self.message)
    }
}

/// Normalize any supported error shape into the flat form.
///
/// Accepted shapes: a flat array of objects, an array of nested pairs, a
/// single nested pair, a single object, an object wrapping any of these
/// under `errors`, and `null` (no errors).
pub fn normalize_errors(value: &Value) -> Result<Vec<ValidationError>, ValidationShapeError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => match map.get("errors") {
            Some(inner) => normalize_errors(inner),
            None => parse_object(value).map(|error| vec![error]),
        },
        Value::Array(items) if is_nested_pair(items) => nested_pair(items),
        Value::Array(items) => {
            let mut errors = Vec::new();
            for item in items {
                match item {
                    Value::Object(_) => errors.push(parse_object(item)?),
                    Value::Array(pair) if is_nested_pair(pair) => errors.extend(nested_pair(pair)?),
                    Value::String(message) => errors.push(ValidationError::general("", message.clone())),
                    other => return Err(unrecognized(other)),
                }
            }
            Ok(errors)
        }
        Value::String(message) => Ok(vec![ValidationError::general("", message.clone())]),
        other => Err(unrecognized(other)),
    }
}

fn parse_object(value: &Value) -> Result<ValidationError, ValidationShapeError> {
    serde_json::from_value(value.clone()).map_err(|_| unrecognized(value))
}

fn is_nested_pair(items: &[Value]) -> bool {
    items.len() == 2
        && matches!(items[0], Value::Number(_) | Value::String(_) | Value::Null)
        && matches!(&items[1], Value::Array(inner) if inner.iter().all(Value::is_array))
}

fn nested_pair(items: &[Value]) -> Result<Vec<ValidationError>, ValidationShapeError> {
    let id = node_id_from_value(&items[0]);
    let entries = items[1].as_array().map(Vec::as_slice).unwrap_or_default();
    entries
        .iter()
        .map(|entry| {
            let parts: Vec<String> = entry
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .map(|part| match part {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect();
            match parts.as_slice() {
                [category, field, message, ..] => {
                    Ok(ValidationError::new(id, category.as_str(), field.as_str(), message.as_str()))
                }
                [category, message] => Ok(ValidationError::new(id, category.as_str(), "", message.as_str())),
                [message] => Ok(ValidationError::new(id, "", "", message.as_str())),
                [] => Err(unrecognized(entry)),
            }
        })
        .collect()
}

fn unrecognized(value: &Value) -> ValidationShapeError {
    let mut found = value.to_string();
    if found.len() > 120 {
        let cut = (0..=120).rev().find(|i| found.is_char_boundary(*i)).unwrap_or(0);
        found.truncate(cut);
        found.push_str("...");
    }
    ValidationShapeError::Unrecognized { found }
}

/// Numbered, human-readable error list used in repair requests.
pub fn format_error_list(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, error)| format!("{}. {}", i + 1, error))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Distinct row identifiers addressed by `errors`.
pub fn referenced_ids(errors: &[ValidationError]) -> BTreeSet<NodeId> {
    errors.iter().filter_map(|error| error.node_identifier).collect()
}
