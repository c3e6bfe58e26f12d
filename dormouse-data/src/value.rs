use std::fmt;

use serde::{Deserialize, Serialize};

/// A type-erased column value.
///
/// Entities are converted to and from `Value`s at the boundary between
/// typed Rust structs and the SQL engine, and predicate maps carry them as
/// the right-hand side of equality constraints. Serialized untagged, so
/// it reads and writes plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value, used as an identity, means "not persisted yet".
    ///
    /// `Null`, `0` and the empty string are all treated as unset.
    pub fn is_unset_identity(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int(0) => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Short name of the variant, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
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

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

/// Failure to turn a [`Value`] back into a typed field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("column `{column}`: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("column `{column}` is NULL but the field is not optional")]
    UnexpectedNull { column: String },
    #[error("column `{column}` is missing from the row")]
    MissingColumn { column: String },
}

impl ValueError {
    fn mismatch(column: &str, expected: &'static str, found: &Value) -> Self {
        match found {
            Value::Null => ValueError::UnexpectedNull {
                column: column.to_string(),
            },
            other => ValueError::TypeMismatch {
                column: column.to_string(),
                expected,
                found: other.kind(),
            },
        }
    }
}

/// Trait for types that can be decoded from a [`Value`].
///
/// `column` is only used to build error messages.
pub trait FromValue: Sized {
    fn from_value(value: Value, column: &str) -> Result<Self, ValueError>;
}

impl FromValue for Value {
    fn from_value(value: Value, _column: &str) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value, column: &str) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            // SQLite and MySQL hand booleans back as integers.
            Value::Int(i) => Ok(i != 0),
            other => Err(ValueError::mismatch(column, "bool", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value, column: &str) -> Result<Self, ValueError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(ValueError::mismatch(column, "integer", &other)),
        }
    }
}

macro_rules! impl_from_value_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value, column: &str) -> Result<Self, ValueError> {
                    let wide = i64::from_value(value, column)?;
                    <$t>::try_from(wide).map_err(|_| ValueError::TypeMismatch {
                        column: column.to_string(),
                        expected: stringify!($t),
                        found: "out-of-range integer",
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, u8, u16, u32);

impl FromValue for f64 {
    fn from_value(value: Value, column: &str) -> Result<Self, ValueError> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            other => Err(ValueError::mismatch(column, "float", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value, column: &str) -> Result<Self, ValueError> {
        f64::from_value(value, column).map(|x| x as f32)
    }
}

impl FromValue for String {
    fn from_value(value: Value, column: &str) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ValueError::mismatch(column, "text", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value, column: &str) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(ValueError::mismatch(column, "bytes", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value, column: &str) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}

/// Storage class of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Integer,
    Real,
    Text,
    Blob,
}

/// A Rust type that can be stored in a mapped column.
///
/// Implemented for the primitive types the derive macros accept as fields.
pub trait FieldType: FromValue + Into<Value> + Clone {
    const COLUMN_TYPE: ColumnType;
    const NULLABLE: bool = false;
}

macro_rules! impl_field_type {
    ($ct:ident => $($t:ty),*) => {
        $(
            impl FieldType for $t {
                const COLUMN_TYPE: ColumnType = ColumnType::$ct;
            }
        )*
    };
}

impl_field_type!(Boolean => bool);
impl_field_type!(Integer => i8, i16, i32, i64, u8, u16, u32);
impl_field_type!(Real => f32, f64);
impl_field_type!(Text => String);
impl_field_type!(Blob => Vec<u8>);

impl<T: FieldType> FieldType for Option<T> {
    const COLUMN_TYPE: ColumnType = T::COLUMN_TYPE;
    const NULLABLE: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_identity() {
        assert!(Value::Null.is_unset_identity());
        assert!(Value::Int(0).is_unset_identity());
        assert!(Value::from("").is_unset_identity());
        assert!(!Value::Int(7).is_unset_identity());
        assert!(!Value::from("abc").is_unset_identity());
    }

    #[test]
    fn option_none_becomes_null() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some(3i32)), Value::Int(3));
    }

    #[test]
    fn decode_bool_from_integer() {
        assert!(bool::from_value(Value::Int(1), "active").unwrap());
        assert!(!bool::from_value(Value::Int(0), "active").unwrap());
    }

    #[test]
    fn decode_null_into_required_field() {
        let err = String::from_value(Value::Null, "name").unwrap_err();
        assert_eq!(
            err,
            ValueError::UnexpectedNull {
                column: "name".into()
            }
        );
        assert_eq!(Option::<String>::from_value(Value::Null, "name").unwrap(), None);
    }

    #[test]
    fn decode_out_of_range_integer() {
        let err = u8::from_value(Value::Int(300), "age").unwrap_err();
        assert!(matches!(err, ValueError::TypeMismatch { expected: "u8", .. }));
    }

    #[test]
    fn decode_text_as_integer_fails() {
        let err = i64::from_value(Value::from("ten"), "age").unwrap_err();
        assert!(matches!(
            err,
            ValueError::TypeMismatch {
                expected: "integer",
                found: "text",
                ..
            }
        ));
    }

    #[test]
    fn from_json() {
        assert_eq!(Value::from(serde_json::json!(null)), Value::Null);
        assert_eq!(Value::from(serde_json::json!(42)), Value::Int(42));
        assert_eq!(Value::from(serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(serde_json::json!("a")), Value::from("a"));
        assert_eq!(
            Value::from(serde_json::json!([1, 2])),
            Value::from("[1,2]")
        );
    }

    #[test]
    fn field_type_metadata() {
        assert_eq!(<i64 as FieldType>::COLUMN_TYPE, ColumnType::Integer);
        assert!(!<i64 as FieldType>::NULLABLE);
        assert_eq!(<Option<String> as FieldType>::COLUMN_TYPE, ColumnType::Text);
        assert!(<Option<String> as FieldType>::NULLABLE);
    }

    #[test]
    fn serializes_as_plain_json() {
        assert_eq!(serde_json::to_value(Value::Int(3)).unwrap(), serde_json::json!(3));
        assert_eq!(serde_json::to_value(Value::Null).unwrap(), serde_json::json!(null));
        let back: Value = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, Value::from("abc"));
        let back: Value = serde_json::from_str("true").unwrap();
        assert_eq!(back, Value::Bool(true));
    }
}
