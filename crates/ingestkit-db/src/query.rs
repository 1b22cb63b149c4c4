use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use ingestkit_core::{Column, Dataset, IngestError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgColumn, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, Executor, PgPool, Postgres, Row, Statement, TypeInfo};
use uuid::Uuid;

/// Run a parameterized query and materialise the rows as a dataset.
///
/// Every failure, from the driver or from decoding, comes back as `Query`.
/// Column types are checked whether or not the query returns rows.
pub async fn fetch_dataset(pool: &PgPool, sql: &str, params: &[Value]) -> Result<Dataset> {
    tracing::debug!(sql, params = params.len(), "running query");

    let query = bind_params(sqlx::query(sql), params);
    let mut stream = query.fetch(pool);

    let mut names: Vec<String> = Vec::new();
    let mut kinds: Vec<ColumnKind> = Vec::new();
    let mut columns: Vec<Vec<Value>> = Vec::new();
    let mut seen_row = false;
    while let Some(row) = stream.try_next().await.map_err(query_error)? {
        if !seen_row {
            seen_row = true;
            names = column_names(row.columns());
            kinds = column_kinds(row.columns())?;
            columns = vec![Vec::new(); names.len()];
        }
        for (i, kind) in kinds.iter().enumerate() {
            columns[i].push(decode(&row, i, *kind).map_err(query_error)?);
        }
    }
    drop(stream);

    // No rows means no column metadata from the result, ask the statement instead
    if !seen_row {
        let statement = pool.prepare(sql).await.map_err(query_error)?;
        column_kinds(statement.columns())?;
        names = column_names(statement.columns());
        columns = vec![Vec::new(); names.len()];
    }

    let dataset = Dataset::new(
        names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Column::new(name, values))
            .collect(),
    )
    .map_err(query_error)?;

    tracing::debug!(rows = dataset.len(), columns = dataset.width(), "query finished");
    Ok(dataset)
}

fn query_error(err: impl std::fmt::Display) -> IngestError {
    IngestError::Query {
        message: err.to_string(),
    }
}

/// Bind JSON values as query parameters
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            Value::String(s) => query.bind(s.as_str()),
            other => query.bind(sqlx::types::Json(other)),
        };
    }
    query
}

/// How a Postgres column is turned into JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Json,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
}

fn column_kind(column: &str, type_name: &str) -> Result<ColumnKind> {
    let kind = match type_name {
        "BOOL" => ColumnKind::Bool,
        "INT2" => ColumnKind::Int2,
        "INT4" => ColumnKind::Int4,
        "INT8" => ColumnKind::Int8,
        "FLOAT4" => ColumnKind::Float4,
        "FLOAT8" => ColumnKind::Float8,
        "NUMERIC" => ColumnKind::Numeric,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => ColumnKind::Text,
        "JSON" | "JSONB" => ColumnKind::Json,
        "DATE" => ColumnKind::Date,
        "TIME" => ColumnKind::Time,
        "TIMESTAMP" => ColumnKind::Timestamp,
        "TIMESTAMPTZ" => ColumnKind::TimestampTz,
        "UUID" => ColumnKind::Uuid,
        other => {
            return Err(IngestError::Query {
                message: format!(
                    "column '{}' has unsupported type {}, cast it in the query",
                    column, other
                ),
            });
        }
    };
    Ok(kind)
}

fn column_kinds(columns: &[PgColumn]) -> Result<Vec<ColumnKind>> {
    columns
        .iter()
        .map(|c| column_kind(c.name(), c.type_info().name()))
        .collect()
}

fn column_names(columns: &[PgColumn]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Decode one cell. SQL NULL becomes JSON null.
///
/// Dates and times come out as ISO 8601 strings, UUIDs hyphenated.
fn decode(row: &PgRow, i: usize, kind: ColumnKind) -> Result<Value, sqlx::Error> {
    let value = match kind {
        ColumnKind::Bool => row.try_get::<Option<bool>, _>(i)?.map(Value::from),
        ColumnKind::Int2 => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
        ColumnKind::Int4 => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
        ColumnKind::Int8 => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
        ColumnKind::Float4 => row
            .try_get::<Option<f32>, _>(i)?
            .map(|n| Value::from(n as f64)),
        ColumnKind::Float8 => row.try_get::<Option<f64>, _>(i)?.map(Value::from),
        ColumnKind::Numeric => row.try_get::<Option<Decimal>, _>(i)?.map(numeric_to_json),
        ColumnKind::Text => row.try_get::<Option<String>, _>(i)?.map(Value::from),
        ColumnKind::Json => row.try_get::<Option<Value>, _>(i)?,
        ColumnKind::Date => row
            .try_get::<Option<NaiveDate>, _>(i)?
            .map(|d| Value::from(d.to_string())),
        ColumnKind::Time => row
            .try_get::<Option<NaiveTime>, _>(i)?
            .map(|t| Value::from(t.to_string())),
        ColumnKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(i)?
            .map(|ts| Value::from(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        ColumnKind::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(i)?
            .map(|ts| Value::from(ts.to_rfc3339())),
        ColumnKind::Uuid => row
            .try_get::<Option<Uuid>, _>(i)?
            .map(|id| Value::from(id.to_string())),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Whole numbers that fit in i64 stay integers, the rest become floats.
/// Values no f64 can hold are kept as their decimal text.
fn numeric_to_json(d: Decimal) -> Value {
    if d.scale() == 0
        && let Some(i) = d.to_i64()
    {
        return Value::from(i);
    }
    match d.to_f64().and_then(serde_json::Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(d.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_kind_covers_common_types() {
        for (type_name, kind) in [
            ("INT4", ColumnKind::Int4),
            ("NUMERIC", ColumnKind::Numeric),
            ("VARCHAR", ColumnKind::Text),
            ("DATE", ColumnKind::Date),
            ("TIMESTAMP", ColumnKind::Timestamp),
            ("TIMESTAMPTZ", ColumnKind::TimestampTz),
            ("UUID", ColumnKind::Uuid),
            ("JSONB", ColumnKind::Json),
        ] {
            assert_eq!(column_kind("c", type_name).unwrap(), kind, "{type_name}");
        }
    }

    #[test]
    fn test_unsupported_type_names_column() {
        let err = column_kind("location", "POINT").unwrap_err();
        assert_eq!(
            err.to_string(),
            "query failed: column 'location' has unsupported type POINT, cast it in the query"
        );
    }

    #[test]
    fn test_numeric_to_json() {
        assert_eq!(numeric_to_json(Decimal::new(42, 0)), json!(42));
        assert_eq!(numeric_to_json(Decimal::new(15, 1)), json!(1.5));
        assert_eq!(numeric_to_json(Decimal::new(10001, 2)), json!(100.01));
        assert_eq!(numeric_to_json(Decimal::new(-7, 0)), json!(-7));
    }
}
