//! Typed views over realtime payload elements.
//!
//! Payload elements arrive as raw JSON values. Each state family reads only
//! the fields it owns; anything else is ignored or stored verbatim.

use canopy_core::component::ComponentNode;
use canopy_core::error::CoreError;
use serde::Deserialize;
use serde_json::Value;

/// One key-value entry. Non-string values are stored as their JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
}

impl KvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Read `{key, value}`. A missing value is stored as an empty string.
    pub fn from_payload(element: &Value) -> Result<Self, CoreError> {
        let key = element
            .get("key")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CoreError::Validation("Key-value payload requires a 'key'".into()))?;
        let value = match element.get("value") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        Ok(Self::new(key, value))
    }
}

/// Decode a stored key-value string back into JSON for export.
///
/// Values that are not JSON text come back as JSON strings.
pub fn decode_kv_value(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

/// Read a set member: either a bare string or `{value}`.
pub fn set_value_from_payload(element: &Value) -> Result<String, CoreError> {
    let value = match element {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("value").and_then(Value::as_str),
        _ => None,
    };
    value
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Validation("Set payload requires a non-empty value".into()))
}

/// A set member rename: `{before, after}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetUpdate {
    pub before: String,
    pub after: String,
}

impl SetUpdate {
    pub fn from_payload(element: &Value) -> Result<Self, CoreError> {
        let read = |field: &str| {
            element
                .get(field)
                .ok_or_else(|| {
                    CoreError::Validation(format!("Set update payload requires '{field}'"))
                })
                .and_then(set_value_from_payload)
        };
        Ok(Self {
            before: read("before")?,
            after: read("after")?,
        })
    }
}

/// Read a component node element.
pub fn component_from_payload(element: &Value) -> Result<ComponentNode, CoreError> {
    let node = ComponentNode::deserialize(element)
        .map_err(|e| CoreError::Validation(format!("Invalid component payload: {e}")))?;
    if node.display_name.is_empty() {
        return Err(CoreError::Validation(
            "Component payload requires a displayName".into(),
        ));
    }
    Ok(node)
}

/// Read a display name: a bare string or an object with `displayName`.
pub fn display_name_from_payload(element: &Value) -> Option<String> {
    match element {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("displayName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// The name a payload element touches, for the modify-history log.
///
/// Components report their display name, key-value entries their key, and
/// set members their value.
pub fn history_target_name(element: &Value) -> String {
    if let Some(name) = display_name_from_payload(element) {
        return name;
    }
    for field in ["key", "value", "after"] {
        if let Some(v) = element.get(field) {
            if let Some(s) = v.as_str() {
                return s.to_string();
            }
            if let Some(s) = v.get("value").and_then(Value::as_str) {
                return s.to_string();
            }
        }
    }
    String::new()
}
