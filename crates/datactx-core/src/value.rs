//! Dynamically typed values exchanged between entities, commands and backends.
//!
//! Conversions out of a [`Value`] are strict: [`FromValue`] accepts exactly the
//! variant that corresponds to the target type. An `Int` is never widened into an
//! `i64` field and a `BigInt` is never narrowed into an `i32` one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field, column or parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    /// SQL NULL / absent document property.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    BigInt(i64),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Arbitrary JSON.
    Json(serde_json::Value),
}

/// The declared kind of a field, used for strict type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int,
    BigInt,
    Double,
    Text,
    Bytes,
    Json,
}

impl ValueKind {
    /// Human-readable name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::BigInt => "bigint",
            ValueKind::Double => "double",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Json => "json",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// The kind of this value, or `None` for `Null`.
    pub const fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Int(_) => Some(ValueKind::Int),
            Value::BigInt(_) => Some(ValueKind::BigInt),
            Value::Double(_) => Some(ValueKind::Double),
            Value::Text(_) => Some(ValueKind::Text),
            Value::Bytes(_) => Some(ValueKind::Bytes),
            Value::Json(_) => Some(ValueKind::Json),
        }
    }

    /// Name of the value's kind, `"null"` for `Null`.
    pub fn kind_name(&self) -> &'static str {
        self.kind().map_or("null", ValueKind::name)
    }

    /// True for `Value::Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the text content, if this is a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert into a JSON value for document backends.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::BigInt(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Value::from(*d),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::from(b.clone()),
            Value::Json(j) => j.clone(),
        }
    }

    /// Convert a JSON property back into a value of the declared kind.
    ///
    /// Returns `None` when the JSON shape cannot represent `kind`.
    pub fn from_json(json: &serde_json::Value, kind: ValueKind) -> Option<Value> {
        if json.is_null() {
            return Some(Value::Null);
        }
        match kind {
            ValueKind::Bool => json.as_bool().map(Value::Bool),
            ValueKind::Int => json
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Int),
            ValueKind::BigInt => json.as_i64().map(Value::BigInt),
            ValueKind::Double => json.as_f64().map(Value::Double),
            ValueKind::Text => json.as_str().map(|s| Value::Text(s.to_string())),
            ValueKind::Bytes => json.as_array().and_then(|items| {
                items
                    .iter()
                    .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .map(Value::Bytes)
            }),
            ValueKind::Json => Some(Value::Json(json.clone())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Json(j) => write!(f, "{}", j),
        }
    }
}

/// Strict conversion from a [`Value`] into a concrete field type.
///
/// On mismatch the original value is handed back so the caller can report
/// what was supplied.
pub trait FromValue: Sized {
    /// Declared kind of the field type.
    const KIND: ValueKind;
    /// Whether the field type accepts `Value::Null`.
    const NULLABLE: bool = false;

    fn from_value(value: Value) -> Result<Self, Value>;
}

macro_rules! impl_value_conversions {
    ($ty:ty, $variant:ident, $kind:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }

        impl FromValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }
        }
    };
}

impl_value_conversions!(bool, Bool, Bool);
impl_value_conversions!(i32, Int, Int);
impl_value_conversions!(i64, BigInt, BigInt);
impl_value_conversions!(f64, Double, Double);
impl_value_conversions!(String, Text, Text);
impl_value_conversions!(Vec<u8>, Bytes, Bytes);
impl_value_conversions!(serde_json::Value, Json, Json);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_integer_conversion() {
        assert_eq!(i64::from_value(Value::BigInt(7)), Ok(7));
        assert_eq!(i64::from_value(Value::Int(7)), Err(Value::Int(7)));
        assert_eq!(i32::from_value(Value::BigInt(7)), Err(Value::BigInt(7)));
    }

    #[test]
    fn test_option_accepts_null() {
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_value(Value::Text("a".into())),
            Ok(Some("a".to_string()))
        );
        assert!(String::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Null.kind_name(), "null");
        assert_eq!(Value::Text("x".into()).kind_name(), "text");
        assert_eq!(Value::from(3_i64).kind(), Some(ValueKind::BigInt));
    }

    #[test]
    fn test_json_round_trip_by_kind() {
        let original = Value::Bytes(vec![1, 2, 255]);
        let json = original.to_json();
        assert_eq!(Value::from_json(&json, ValueKind::Bytes), Some(original));

        let big = serde_json::json!(5_000_000_000_i64);
        assert_eq!(Value::from_json(&big, ValueKind::Int), None);
        assert_eq!(
            Value::from_json(&big, ValueKind::BigInt),
            Some(Value::BigInt(5_000_000_000))
        );
    }
}
