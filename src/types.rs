use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Values that can be stored in a row cell or bound as statement parameters.
///
/// One enum serves both directions so helpers never branch on driver types:
/// ```rust
/// use mysql_fluent::prelude::*;
///
/// let params = vec![
///     Value::Int(1),
///     Value::Text("alice".into()),
///     Value::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Signed integer value (64-bit)
    Int(i64),
    /// Unsigned integer value (64-bit, for MySQL UNSIGNED columns)
    UInt(u64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Datetime value (no timezone, like MySQL DATETIME)
    Timestamp(NaiveDateTime),
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl Value {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(value) => Some(*value),
            Value::Int(value) => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(value) = self {
            return Some(*value);
        }
        match self.as_int() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let Value::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Same with a fractional-seconds tail of any precision
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// The kind tag of this value, used when reporting conversion errors.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Int(_) => ValueKind::Int,
            Value::UInt(_) => ValueKind::UInt,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Bool(_) => ValueKind::Bool,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Json(_) => ValueKind::Json,
            Value::Blob(_) => ValueKind::Blob,
        }
    }
}

/// Serializes to the natural JSON shape rather than an enum tag, so rows
/// can be handed straight to `serde_json` consumers. Timestamps render in
/// MySQL datetime text form; blobs become byte arrays.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::UInt(n) => serializer.serialize_u64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Timestamp(t) => serializer.collect_str(&t.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Json(j) => j.serialize(serializer),
            Value::Blob(b) => serializer.serialize_bytes(b),
        }
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt(u64::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt(u64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(u64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// The kind of a [`Value`], also used to tag columns with the type the
/// driver reported for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Int,
    UInt,
    Float,
    Text,
    Bool,
    Timestamp,
    Json,
    Blob,
}

impl ValueKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Bool => "bool",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Json => "json",
            ValueKind::Blob => "blob",
        }
    }
}

/// Bridge between Rust enums and their database representation.
///
/// Read side: a text cell resolves by `from_name`, a numeric cell by
/// `from_ordinal`. Write side: [`crate::Statement::enum_value`] binds
/// `ordinal() + 1`, matching MySQL's 1-based `ENUM` column indexes.
pub trait DbEnum: Sized {
    /// Resolve a member from its stored textual name.
    fn from_name(name: &str) -> Option<Self>;

    /// Resolve a member from its stored ordinal.
    fn from_ordinal(ordinal: i64) -> Option<Self>;

    /// The member's ordinal as written to numeric columns.
    fn ordinal(&self) -> i64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_coerces_zero_and_one() {
        assert_eq!(Value::Int(1).as_bool(), Some(true));
        assert_eq!(Value::Int(0).as_bool(), Some(false));
        assert_eq!(Value::Int(7).as_bool(), None);
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
    }

    #[test]
    fn timestamp_parses_from_text() {
        let ts = Value::Text("2024-03-01 10:30:00".into()).as_timestamp();
        assert_eq!(
            ts,
            Some(
                chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(10, 30, 0)
                    .unwrap()
            )
        );
        let ts = Value::Text("2024-03-01 10:30:00.250".into()).as_timestamp();
        assert!(ts.is_some());
    }

    #[test]
    fn option_binds_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
    }

    #[test]
    fn signed_unsigned_crossover() {
        assert_eq!(Value::UInt(5).as_int(), Some(5));
        assert_eq!(Value::UInt(u64::MAX).as_int(), None);
        assert_eq!(Value::Int(-1).as_uint(), None);
    }

    #[test]
    fn values_serialize_to_plain_json() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let row = vec![
            Value::Int(5),
            Value::Text("alice".into()),
            Value::Null,
            Value::Bool(true),
            Value::Timestamp(ts),
            Value::Json(serde_json::json!({"a": 1})),
            Value::Blob(vec![1, 2]),
        ];
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!([5, "alice", null, true, "2024-03-01 10:30:00", {"a": 1}, [1, 2]])
        );
    }
}
