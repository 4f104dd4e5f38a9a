//! Bridges `storm_core::Value` to `tokio_postgres`'s `ToSql`/row-extraction
//! types (spec.md §4.6's binding pipeline: the final "driver bind" step).

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use storm_core::{ConvertError, Value};

/// Borrows a `Value` as a `tokio_postgres` bind parameter.
///
/// `Value` can't implement `ToSql` directly (both are foreign to this
/// crate), so this newtype carries the borrow across the trait-object bind
/// call in [`crate::statement::PgStatement`]. `accepts` is permissive: the
/// concrete variant, not the dialect's declared column type, decides the
/// wire representation; callers are trusted to have already coerced each
/// argument to the column's domain type during conversion.
pub struct PgValue<'a>(pub &'a Value);

impl std::fmt::Debug for PgValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::I32(v) => v.to_sql(ty, out),
            Value::I64(v) => v.to_sql(ty, out),
            Value::F64(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Extract column `index` of `row` into a [`Value`], dispatching on the
/// column's Postgres type (the inverse of [`PgValue`]).
pub fn value_from_row(row: &tokio_postgres::Row, index: usize) -> Result<Value, ConvertError> {
    let column_type = row.columns()[index].type_();
    let name = row.columns()[index].name().to_string();
    let err = |e: tokio_postgres::Error| ConvertError(format!("column {name}: {e}"));

    match *column_type {
        Type::BOOL => row.try_get::<_, Option<bool>>(index).map(to_value).map_err(err),
        Type::INT2 => row.try_get::<_, Option<i16>>(index).map(|v| to_value(v.map(i32::from))).map_err(err),
        Type::INT4 => row.try_get::<_, Option<i32>>(index).map(to_value).map_err(err),
        Type::INT8 => row.try_get::<_, Option<i64>>(index).map(to_value).map_err(err),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(index).map(|v| to_value(v.map(f64::from))).map_err(err),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index).map(to_value).map_err(err),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(index).map(to_value).map_err(err)
        }
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(index).map(to_value).map_err(err),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)
            .map(to_value)
            .map_err(err),
        Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(index)
            .map(|v| to_value(v.map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))))
            .map_err(err),
        other => Err(ConvertError(format!(
            "column {name}: unsupported postgres type {other} (no Value variant maps to it)"
        ))),
    }
}

fn to_value<T>(v: Option<T>) -> Value
where
    Value: From<T>,
{
    match v {
        Some(v) => Value::from(v),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_value_reports_is_null() {
        let v = Value::Null;
        let wrapped = PgValue(&v);
        let mut buf = BytesMut::new();
        let result = wrapped.to_sql(&Type::INT4, &mut buf).unwrap();
        assert!(matches!(result, IsNull::Yes));
    }
}
