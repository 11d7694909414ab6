// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed reads from the generic field tree.
//!
//! Persisted documents are trees of named fields. These helpers pull typed
//! values out of an object and report the field path on failure.

use ordoplay_editor_graph::Guid;
use serde_json::{Map, Value};

/// A persisted field is missing or has the wrong shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Field '{path}': {reason}")]
pub struct FieldError {
    /// Field path, e.g. `variables/typeInfo`
    pub path: String,
    /// What went wrong
    pub reason: FieldErrorReason,
}

/// Why a field could not be read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldErrorReason {
    /// Required field absent
    #[error("missing")]
    Missing,
    /// Field present with an unexpected JSON type
    #[error("expected {0}")]
    WrongType(&'static str),
    /// Field is a string but not a GUID
    #[error("invalid GUID '{0}'")]
    InvalidGuid(String),
}

impl FieldError {
    /// Required field absent
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: FieldErrorReason::Missing,
        }
    }

    /// Field has the wrong JSON type
    pub fn wrong_type(path: impl Into<String>, expected: &'static str) -> Self {
        Self {
            path: path.into(),
            reason: FieldErrorReason::WrongType(expected),
        }
    }
}

/// View `value` as an object
pub fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, FieldError> {
    value
        .as_object()
        .ok_or_else(|| FieldError::wrong_type(path, "object"))
}

/// View `value` as a mutable object
pub fn as_object_mut<'a>(
    value: &'a mut Value,
    path: &str,
) -> Result<&'a mut Map<String, Value>, FieldError> {
    value
        .as_object_mut()
        .ok_or_else(|| FieldError::wrong_type(path, "object"))
}

fn parse_guid(value: &Value, key: &str) -> Result<Option<Guid>, FieldError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => s
            .parse::<Guid>()
            .map(Guid::non_nil)
            .map_err(|_| FieldError {
                path: key.to_string(),
                reason: FieldErrorReason::InvalidGuid(s.clone()),
            }),
        _ => Err(FieldError::wrong_type(key, "GUID string")),
    }
}

/// Read a required, non-nil GUID
pub fn read_guid(obj: &Map<String, Value>, key: &str) -> Result<Guid, FieldError> {
    let value = obj.get(key).ok_or_else(|| FieldError::missing(key))?;
    parse_guid(value, key)?.ok_or_else(|| FieldError::missing(key))
}

/// Read an optional GUID; absent, null and nil all read as `None`
pub fn read_opt_guid(obj: &Map<String, Value>, key: &str) -> Result<Option<Guid>, FieldError> {
    match obj.get(key) {
        Some(value) => parse_guid(value, key),
        None => Ok(None),
    }
}

/// Read a string, defaulting to empty when absent
pub fn read_string(obj: &Map<String, Value>, key: &str) -> Result<String, FieldError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(FieldError::wrong_type(key, "string")),
    }
}

/// Read an unsigned integer
pub fn read_u32(obj: &Map<String, Value>, key: &str) -> Result<u32, FieldError> {
    let value = obj.get(key).ok_or_else(|| FieldError::missing(key))?;
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| FieldError::wrong_type(key, "unsigned integer"))
}

/// Read a `[x, y]` position, defaulting to the origin when absent
pub fn read_pos(obj: &Map<String, Value>, key: &str) -> Result<[f32; 2], FieldError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok([0.0, 0.0]),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| FieldError::wrong_type(key, "[x, y]")),
    }
}

/// Serialize an optional GUID the way documents store it
pub fn guid_value(guid: Option<Guid>) -> Value {
    match guid {
        Some(guid) => Value::String(guid.to_string()),
        None => Value::Null,
    }
}

/// Copy of `obj` without the listed keys
pub fn without_keys(obj: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
