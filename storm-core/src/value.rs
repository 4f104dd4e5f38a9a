//! The dynamic value type carried through the parameter binding pipeline
//! (spec.md §4.6): `domain value -> converter.toDatabase -> dialect
//! temporal normalisation -> driver bind`.

use chrono::{DateTime, Utc};

/// A database-bound value, typed loosely enough to cover the column types
/// Storm's `Model` recognises without committing to one driver's wire
/// representation. `Driver` implementations translate `Value` into their
/// native bind type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A typed NULL. The column type travels separately so drivers can bind
    /// a typed null rather than an untyped one (spec.md §4.6).
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
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

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T> From<Option<T>> for Value
where
    Value: From<T>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Value::from(v),
            None => Value::Null,
        }
    }
}

/// Error converting between a domain value and its database [`Value`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("value conversion failed: {0}")]
pub struct ConvertError(pub String);

/// Converts between a domain-level column type `D` and the driver-facing
/// [`Value`] (spec.md §3's `Model::converters`).
///
/// A `Converter` is registered per column in a `Model`; the template engine
/// and execution engine invoke it on the way in (`to_database`) and the way
/// out (`from_database`) of the driver boundary.
pub trait Converter<D>: Send + Sync {
    /// Domain value to database value, the first step of the binding
    /// pipeline in spec.md §4.6.
    fn to_database(&self, domain: &D) -> Value;

    /// Database value back to the domain type, used when materialising rows.
    fn from_database(&self, value: &Value) -> Result<D, ConvertError>;
}

/// The identity converter: `D` and [`Value`] coincide via `Into`/`TryFrom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl Converter<String> for IdentityConverter {
    fn to_database(&self, domain: &String) -> Value {
        Value::Text(domain.clone())
    }

    fn from_database(&self, value: &Value) -> Result<String, ConvertError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(ConvertError(format!("expected Text, got {other:?}"))),
        }
    }
}

impl Converter<i64> for IdentityConverter {
    fn to_database(&self, domain: &i64) -> Value {
        Value::I64(*domain)
    }

    fn from_database(&self, value: &Value) -> Result<i64, ConvertError> {
        match value {
            Value::I64(v) => Ok(*v),
            Value::I32(v) => Ok(*v as i64),
            other => Err(ConvertError(format!("expected I64, got {other:?}"))),
        }
    }
}

impl Converter<i32> for IdentityConverter {
    fn to_database(&self, domain: &i32) -> Value {
        Value::I32(*domain)
    }

    fn from_database(&self, value: &Value) -> Result<i32, ConvertError> {
        match value {
            Value::I32(v) => Ok(*v),
            other => Err(ConvertError(format!("expected I32, got {other:?}"))),
        }
    }
}

impl Converter<bool> for IdentityConverter {
    fn to_database(&self, domain: &bool) -> Value {
        Value::Bool(*domain)
    }

    fn from_database(&self, value: &Value) -> Result<bool, ConvertError> {
        match value {
            Value::Bool(v) => Ok(*v),
            other => Err(ConvertError(format!("expected Bool, got {other:?}"))),
        }
    }
}

impl Converter<DateTime<Utc>> for IdentityConverter {
    fn to_database(&self, domain: &DateTime<Utc>) -> Value {
        Value::Timestamp(*domain)
    }

    fn from_database(&self, value: &Value) -> Result<DateTime<Utc>, ConvertError> {
        match value {
            Value::Timestamp(v) => Ok(*v),
            other => Err(ConvertError(format!("expected Timestamp, got {other:?}"))),
        }
    }
}
