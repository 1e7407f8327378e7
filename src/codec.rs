//! Typed value codec
//!
//! Translates between native JSON-shaped values and the `(DataType, raw)`
//! pair persisted on every attribute row. Type is inferred structurally at
//! write time; the raw form is always a string except for `null`, which is
//! stored as its own [`DataType::Null`] tag with no raw value.

use crate::error::AppError;
use crate::models::DataType;
use serde_json::{Number, Value};

/// A stored raw value that cannot be rendered under its declared type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot render {raw:?} as {data_type}: {reason}")]
pub struct DecodeError {
    pub data_type: DataType,
    pub raw: Option<String>,
    pub reason: String,
}

impl DecodeError {
    fn new(data_type: DataType, raw: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            data_type,
            raw: raw.map(str::to_string),
            reason: reason.into(),
        }
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::Decode(err.to_string())
    }
}

/// Infer the data type of a native value and encode it
pub fn classify(value: &Value) -> (DataType, Option<String>) {
    match value {
        Value::Null => (DataType::Null, None),
        Value::Bool(b) => (DataType::Boolean, Some(b.to_string())),
        Value::Number(n) if n.is_i64() || n.is_u64() => (DataType::Integer, Some(n.to_string())),
        Value::Number(n) => (DataType::Double, Some(n.to_string())),
        Value::String(s) => (DataType::String, Some(s.clone())),
        Value::Object(_) => (DataType::JsonObject, Some(value.to_string())),
        Value::Array(_) => (DataType::JsonArray, Some(value.to_string())),
    }
}

/// Encode only the raw form, as a search probe would need it
pub fn encode(value: &Value) -> Option<String> {
    classify(value).1
}

/// Render a stored raw value back into its native shape
pub fn render(data_type: DataType, raw: Option<&str>) -> Result<Value, DecodeError> {
    if data_type == DataType::Null {
        return Ok(Value::Null);
    }

    let Some(raw) = raw else {
        return Ok(Value::Null);
    };

    match data_type {
        DataType::String => Ok(Value::String(raw.to_string())),
        DataType::Boolean => raw
            .trim()
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|e| DecodeError::new(data_type, Some(raw), e.to_string())),
        DataType::Integer => render_integer(raw)
            .ok_or_else(|| DecodeError::new(data_type, Some(raw), "not an integer")),
        DataType::Double => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| DecodeError::new(data_type, Some(raw), "not a finite number")),
        DataType::JsonObject => render_json(data_type, raw, Value::is_object),
        DataType::JsonArray => render_json(data_type, raw, Value::is_array),
        DataType::Null => Ok(Value::Null),
    }
}

/// Render, falling back to the raw string when it cannot be decoded
pub fn render_lossy(data_type: DataType, raw: Option<&str>) -> (Value, Option<DecodeError>) {
    match render(data_type, raw) {
        Ok(value) => (value, None),
        Err(err) => {
            let fallback = raw.map_or(Value::Null, |r| Value::String(r.to_string()));
            (fallback, Some(err))
        }
    }
}

fn render_integer(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    raw.parse::<u64>().ok().map(Value::from)
}

fn render_json(data_type: DataType, raw: &str, shape: fn(&Value) -> bool) -> Result<Value, DecodeError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| DecodeError::new(data_type, Some(raw), e.to_string()))?;

    if shape(&value) {
        Ok(value)
    } else {
        Err(DecodeError::new(data_type, Some(raw), "unexpected JSON shape"))
    }
}
