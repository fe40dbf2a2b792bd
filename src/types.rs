use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

use crate::error::PartiqlDbError;

/// A single record returned by the backend, keyed by attribute name.
pub type Item = HashMap<String, AttributeValue>;

/// Values that can be stored in a database row or used as query parameters.
///
/// ```rust
/// use partiql_middleware::prelude::*;
///
/// let params = vec![
///     Param::from(1_i64),
///     Param::from("alice"),
///     Param::from(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value (lists, maps and sets decode to this)
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Numbers come back from the backend as `Int` when integral, so this accepts both.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let RowValues::JSON(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    // Try "YYYY-MM-DD HH:MM:SS" with optional fraction
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
}

/// The backend's typed attribute union.
///
/// Numbers travel as strings so no precision is lost between the caller and the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Binary
    B(Vec<u8>),
    /// Boolean
    Bool(bool),
    /// Binary set
    Bs(Vec<Vec<u8>>),
    /// List
    L(Vec<AttributeValue>),
    /// Map
    M(HashMap<String, AttributeValue>),
    /// Number
    N(String),
    /// Number set
    Ns(Vec<String>),
    /// Null
    Null(bool),
    /// String
    S(String),
    /// String set
    Ss(Vec<String>),
}

impl AttributeValue {
    /// Convert a structural JSON value into an attribute value.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> AttributeValue {
        match value {
            JsonValue::Null => AttributeValue::Null(true),
            JsonValue::Bool(b) => AttributeValue::Bool(*b),
            JsonValue::Number(n) => AttributeValue::N(n.to_string()),
            JsonValue::String(s) => AttributeValue::S(s.clone()),
            JsonValue::Array(items) => {
                AttributeValue::L(items.iter().map(AttributeValue::from_json).collect())
            }
            JsonValue::Object(map) => AttributeValue::M(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Structural JSON rendering, used when a list, map or set is decoded into a row.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            AttributeValue::B(bytes) => bytes_to_json(bytes),
            AttributeValue::Bool(b) => JsonValue::Bool(*b),
            AttributeValue::Bs(sets) => JsonValue::Array(sets.iter().map(|b| bytes_to_json(b)).collect()),
            AttributeValue::L(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            AttributeValue::M(map) => {
                // sorted keys keep the rendering stable
                let sorted: BTreeMap<_, _> = map.iter().collect();
                JsonValue::Object(
                    sorted
                        .into_iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                )
            }
            AttributeValue::N(n) => number_to_json(n),
            AttributeValue::Ns(ns) => JsonValue::Array(ns.iter().map(|n| number_to_json(n)).collect()),
            AttributeValue::Null(_) => JsonValue::Null,
            AttributeValue::S(s) => JsonValue::String(s.clone()),
            AttributeValue::Ss(ss) => {
                JsonValue::Array(ss.iter().map(|s| JsonValue::String(s.clone())).collect())
            }
        }
    }

    /// Decode into the driver's native value.
    #[must_use]
    pub fn to_row_value(&self) -> RowValues {
        match self {
            AttributeValue::S(s) => RowValues::Text(s.clone()),
            AttributeValue::N(n) => decode_number(n),
            AttributeValue::Bool(b) => RowValues::Bool(*b),
            AttributeValue::Null(_) => RowValues::Null,
            AttributeValue::B(bytes) => RowValues::Blob(bytes.clone()),
            AttributeValue::L(_)
            | AttributeValue::M(_)
            | AttributeValue::Ss(_)
            | AttributeValue::Ns(_)
            | AttributeValue::Bs(_) => RowValues::JSON(self.to_json()),
        }
    }
}

fn bytes_to_json(bytes: &[u8]) -> JsonValue {
    JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
}

fn number_to_json(n: &str) -> JsonValue {
    if let Ok(i) = n.parse::<i64>() {
        return JsonValue::from(i);
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| JsonValue::String(n.to_owned()), JsonValue::Number)
}

fn decode_number(n: &str) -> RowValues {
    if let Ok(i) = n.parse::<i64>() {
        return RowValues::Int(i);
    }
    match n.parse::<f64>() {
        Ok(f) => RowValues::Float(f),
        Err(_) => RowValues::Text(n.to_owned()),
    }
}

/// Marshal a native value into the backend's typed union.
///
/// # Errors
/// Returns a message describing why the value cannot be represented (non-finite floats).
pub(crate) fn marshal_row_value(value: &RowValues) -> Result<AttributeValue, String> {
    match value {
        RowValues::Int(i) => Ok(AttributeValue::N(i.to_string())),
        RowValues::Float(f) => {
            if f.is_finite() {
                Ok(AttributeValue::N(f.to_string()))
            } else {
                Err(format!("non-finite number {f} cannot be stored"))
            }
        }
        RowValues::Text(s) => Ok(AttributeValue::S(s.clone())),
        RowValues::Bool(b) => Ok(AttributeValue::Bool(*b)),
        RowValues::Timestamp(dt) => Ok(AttributeValue::S(
            dt.and_utc()
                .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
        )),
        RowValues::Null => Ok(AttributeValue::Null(true)),
        RowValues::JSON(json) => Ok(AttributeValue::from_json(json)),
        RowValues::Blob(bytes) => Ok(AttributeValue::B(bytes.clone())),
    }
}

/// Convert any serializable value into an [`Item`], e.g. to build expected records in tests
/// or pseudo-table rows.
///
/// # Errors
/// Returns `PartiqlDbError::NotSupported` if the value does not serialize to a JSON object.
pub fn to_item<T: Serialize>(value: &T) -> Result<Item, PartiqlDbError> {
    let json = serde_json::to_value(value)
        .map_err(|e| PartiqlDbError::NotSupported(format!("item serialization failed: {e}")))?;
    match AttributeValue::from_json(&json) {
        AttributeValue::M(map) => Ok(map),
        _ => Err(PartiqlDbError::NotSupported(
            "item must serialize to an object".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_decode_to_int_or_float() {
        assert_eq!(AttributeValue::N("42".into()).to_row_value(), RowValues::Int(42));
        assert_eq!(AttributeValue::N("10.5".into()).to_row_value(), RowValues::Float(10.5));
    }

    #[test]
    fn collections_decode_to_json() {
        let value = AttributeValue::M(HashMap::from([
            ("b".to_string(), AttributeValue::Ss(vec!["x".into()])),
            ("a".to_string(), AttributeValue::N("1".into())),
        ]));
        assert_eq!(value.to_row_value(), RowValues::JSON(json!({"a": 1, "b": ["x"]})));
    }

    #[test]
    fn marshal_rejects_non_finite_floats() {
        assert!(marshal_row_value(&RowValues::Float(f64::NAN)).is_err());
        assert_eq!(
            marshal_row_value(&RowValues::Float(1.5)),
            Ok(AttributeValue::N("1.5".into()))
        );
    }

    #[test]
    fn marshal_json_is_structural() {
        let got = marshal_row_value(&RowValues::JSON(json!({"tags": ["a", null]}))).unwrap();
        assert_eq!(
            got,
            AttributeValue::M(HashMap::from([(
                "tags".to_string(),
                AttributeValue::L(vec![AttributeValue::S("a".into()), AttributeValue::Null(true)])
            )]))
        );
    }

    #[test]
    fn text_timestamps_parse() {
        let v = RowValues::Text("2024-05-01 10:11:12".into());
        assert!(v.as_timestamp().is_some());
    }
}
