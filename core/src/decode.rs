//! Path-tracking decoder from `serde_json::Value` into typed records.
//!
//! # Design
//! The API omits keys and sends `null` freely, so records are not derived
//! with `Deserialize`. Each record reads its object through [`Record`],
//! which distinguishes required keys (absent or null is an error naming the
//! record and the full path) from optional ones (absent or null becomes
//! `None`). Sequences are decoded element-wise and `Option<T>` elements keep
//! their slot, so positions stay aligned with sibling sequences.
//!
//! Only integer-to-float widening is performed. A string field holding a
//! number is an error, never stringified.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::DecodeError;

/// An arbitrary JSON object, kept as-is.
pub type JsonObject = Map<String, Value>;

/// A JSON object whose values must all be strings.
pub type StringMap = BTreeMap<String, String>;

/// A value that can be built from a JSON value found at `path`.
pub trait FromJson: Sized {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError>;
}

/// Parse `body` and decode the root value as `T`.
pub fn decode<T: FromJson>(body: &str) -> Result<T, DecodeError> {
    let value: Value = serde_json::from_str(body).map_err(|e| DecodeError::Syntax(e.to_string()))?;
    T::from_json(&value, "")
}

/// Decode an already-parsed root value as `T`.
pub fn from_value<T: FromJson>(value: &Value) -> Result<T, DecodeError> {
    T::from_json(value, "")
}

pub(crate) fn field_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid(path: &str, expected: &'static str, value: &Value) -> DecodeError {
    DecodeError::InvalidType {
        path: path.to_string(),
        expected,
        found: kind(value),
    }
}

/// Field reader over one JSON object belonging to a named record.
pub struct Record<'a> {
    name: &'static str,
    path: &'a str,
    fields: &'a JsonObject,
}

impl<'a> Record<'a> {
    pub fn new(name: &'static str, value: &'a Value, path: &'a str) -> Result<Self, DecodeError> {
        match value {
            Value::Object(fields) => Ok(Self { name, path, fields }),
            other => Err(invalid(path, "object", other)),
        }
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn required<T: FromJson>(&self, key: &str) -> Result<T, DecodeError> {
        let path = field_path(self.path, key);
        match self.present(key) {
            Some(value) => T::from_json(value, &path),
            None => Err(DecodeError::MissingField {
                record: self.name,
                path,
            }),
        }
    }

    pub fn optional<T: FromJson>(&self, key: &str) -> Result<Option<T>, DecodeError> {
        self.present(key)
            .map(|value| T::from_json(value, &field_path(self.path, key)))
            .transpose()
    }

    /// An optional sequence; absent or null reads as empty.
    pub fn sequence<T: FromJson>(&self, key: &str) -> Result<Vec<T>, DecodeError> {
        Ok(self.optional(key)?.unwrap_or_default())
    }
}

impl FromJson for String {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| invalid(path, "string", value))
    }
}

impl FromJson for bool {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        value.as_bool().ok_or_else(|| invalid(path, "boolean", value))
    }
}

impl FromJson for f64 {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        value.as_f64().ok_or_else(|| invalid(path, "number", value))
    }
}

impl FromJson for u64 {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        value
            .as_u64()
            .ok_or_else(|| invalid(path, "non-negative integer", value))
    }
}

impl FromJson for Value {
    fn from_json(value: &Value, _path: &str) -> Result<Self, DecodeError> {
        Ok(value.clone())
    }
}

impl FromJson for JsonObject {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        value
            .as_object()
            .cloned()
            .ok_or_else(|| invalid(path, "object", value))
    }
}

impl FromJson for StringMap {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let fields = value.as_object().ok_or_else(|| invalid(path, "object", value))?;
        fields
            .iter()
            .map(|(key, v)| -> Result<(String, String), DecodeError> {
                Ok((key.clone(), String::from_json(v, &field_path(path, key))?))
            })
            .collect()
    }
}

impl<T: FromJson> FromJson for Option<T> {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_json(other, path).map(Some),
        }
    }
}

impl<T: FromJson> FromJson for Vec<T> {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let items = value.as_array().ok_or_else(|| invalid(path, "array", value))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_json(item, &index_path(path, i)))
            .collect()
    }
}
