//! Conversions between `dormouse_data::Value` and the `Any` driver.

use dormouse_data::{Bind, ColumnType, DataError, Entity, EntityDescriptor, Record, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row};

use crate::error::SqlxErrorExt;

pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Bind one value. A `NULL` is typed after its column so strict engines
/// accept it; untyped nulls go out as text.
fn bind_one<'q>(query: AnyQuery<'q>, bind: Bind) -> AnyQuery<'q> {
    match bind.value {
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
        Value::Null => match bind.column_type {
            Some(ColumnType::Boolean) => query.bind(None::<bool>),
            Some(ColumnType::Integer) => query.bind(None::<i64>),
            Some(ColumnType::Real) => query.bind(None::<f64>),
            Some(ColumnType::Blob) => query.bind(None::<Vec<u8>>),
            Some(ColumnType::Text) | None => query.bind(None::<String>),
        },
    }
}

pub(crate) fn bind_all<'q>(mut query: AnyQuery<'q>, binds: Vec<Bind>) -> AnyQuery<'q> {
    for bind in binds {
        query = bind_one(query, bind);
    }
    query
}

/// Order in which decoders are tried for a column. Drivers report
/// booleans as integers and small integers as floats often enough that a
/// single guess is not enough.
fn decode_order(preferred: Option<ColumnType>) -> &'static [ColumnType] {
    use ColumnType::*;
    match preferred {
        Some(Boolean) => &[Boolean, Integer, Text, Real, Blob],
        Some(Integer) => &[Integer, Real, Text, Boolean, Blob],
        Some(Real) => &[Real, Integer, Text, Blob, Boolean],
        Some(Text) => &[Text, Blob, Integer, Real, Boolean],
        Some(Blob) => &[Blob, Text, Integer, Real, Boolean],
        None => &[Integer, Real, Text, Blob, Boolean],
    }
}

fn try_decode(row: &AnyRow, index: usize, column_type: ColumnType) -> Result<Value, sqlx::Error> {
    let value = match column_type {
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        ColumnType::Integer => row.try_get::<Option<i64>, _>(index)?.map(Value::Int),
        ColumnType::Real => row.try_get::<Option<f64>, _>(index)?.map(Value::Float),
        ColumnType::Text => row.try_get::<Option<String>, _>(index)?.map(Value::Text),
        ColumnType::Blob => row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Bytes),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decode one column, trying the preferred type first.
fn decode_value(
    row: &AnyRow,
    index: usize,
    preferred: Option<ColumnType>,
) -> Result<Value, DataError> {
    let mut last = None;
    for column_type in decode_order(preferred) {
        match try_decode(row, index, *column_type) {
            Ok(value) => return Ok(value),
            Err(err) => last = Some(err),
        }
    }
    Err(match last {
        Some(err) => err.into_data_error(),
        None => DataError::configuration("no decoder for column"),
    })
}

/// Decode a whole row into a [`Record`]. Column types come from
/// `descriptor` where the column is mapped.
pub(crate) fn decode_record(
    row: &AnyRow,
    descriptor: &EntityDescriptor,
) -> Result<Record, DataError> {
    let columns = row.columns();
    let mut record = Record::with_capacity(columns.len());
    for column in columns {
        let name = column.name();
        let preferred = descriptor
            .columns()
            .iter()
            .find(|c| c.column.eq_ignore_ascii_case(name))
            .map(|c| c.column_type);
        let value = decode_value(row, column.ordinal(), preferred)?;
        record.push(name, value);
    }
    Ok(record)
}

pub(crate) fn decode_entity<T: Entity>(row: &AnyRow) -> Result<T, DataError> {
    let mut record = decode_record(row, T::descriptor())?;
    Ok(T::from_record(&mut record)?)
}

/// Decode a single-column row (generated identities, counts, catalog
/// queries).
pub(crate) fn decode_scalar(row: &AnyRow, preferred: ColumnType) -> Result<Value, DataError> {
    decode_value(row, 0, Some(preferred))
}

/// Text from a catalog query. Some servers report identifiers as binary.
pub(crate) fn decode_name(row: &AnyRow) -> Result<String, DataError> {
    match decode_scalar(row, ColumnType::Text)? {
        Value::Text(s) => Ok(s),
        Value::Bytes(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_type_is_tried_first() {
        for ct in [
            ColumnType::Boolean,
            ColumnType::Integer,
            ColumnType::Real,
            ColumnType::Text,
            ColumnType::Blob,
        ] {
            let order = decode_order(Some(ct));
            assert_eq!(order[0], ct);
            assert_eq!(order.len(), 5);
        }
    }

    #[test]
    fn booleans_fall_back_to_integers() {
        assert_eq!(decode_order(Some(ColumnType::Boolean))[1], ColumnType::Integer);
    }
}
