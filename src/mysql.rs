//! Boundary to the `mysql_async` driver: value conversion in both
//! directions, column-kind mapping from driver metadata, and the execution
//! helpers the statement terminals run on. Everything driver-shaped stays
//! in this module; the rest of the crate deals in [`Value`] only.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::prelude::Queryable;
use mysql_async::consts::ColumnType;
use mysql_async::{Conn, Params, Row};

use crate::clock::ClockOffset;
use crate::error::DbError;
use crate::results::{Column, ResultTable};
use crate::types::{Value, ValueKind};

/// The `character_set` id MySQL uses for binary (non-textual) payloads.
/// Textual columns with a `_bin` collation still carry their real charset,
/// so this distinguishes BLOB/VARBINARY from TEXT/VARCHAR reliably where
/// the BINARY flag alone does not.
const BINARY_CHARSET: u16 = 63;

/// Affected-row count and generated identifier of one executed statement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DmlOutcome {
    pub affected: u64,
    pub last_id: Option<u64>,
}

pub(crate) async fn exec_select(
    conn: &mut Conn,
    sql: &str,
    params: Params,
    table_name: &str,
    clock: &ClockOffset,
) -> Result<ResultTable, DbError> {
    let rows: Vec<Row> = conn.exec(sql, params).await?;
    build_result_table(rows, table_name, clock)
}

pub(crate) async fn exec_dml(
    conn: &mut Conn,
    sql: &str,
    params: Params,
) -> Result<DmlOutcome, DbError> {
    conn.exec_drop(sql, params).await?;
    Ok(DmlOutcome {
        affected: conn.affected_rows(),
        last_id: conn.last_insert_id(),
    })
}

pub(crate) async fn exec_scalar(
    conn: &mut Conn,
    sql: &str,
    params: Params,
    clock: Option<&ClockOffset>,
) -> Result<Option<Value>, DbError> {
    let row: Option<Row> = conn.exec_first(sql, params).await?;
    match row {
        None => Ok(None),
        Some(row) => {
            let kind = row
                .columns_ref()
                .first()
                .map(column_kind)
                .unwrap_or(ValueKind::Text);
            let raw = row
                .get::<mysql_async::Value, _>(0)
                .unwrap_or(mysql_async::Value::NULL);
            Ok(Some(from_driver_value(raw, kind, clock)))
        }
    }
}

/// One round trip for the server's current time, used to seed the clock
/// offset cache.
pub(crate) async fn server_now(conn: &mut Conn) -> Result<NaiveDateTime, DbError> {
    let row: Option<Row> = conn.exec_first("SELECT NOW()", Params::Empty).await?;
    let raw = row.and_then(|r| r.get::<mysql_async::Value, _>(0));
    raw.as_ref().and_then(datetime_from_driver).ok_or_else(|| {
        DbError::ConnectionError("server clock probe returned no datetime".to_string())
    })
}

/// Materialize driver rows into a [`ResultTable`].
///
/// Column metadata comes from the first row; duplicate source names get an
/// incrementing numeric suffix (`id`, `id1`, `id2`). Datetime cells are
/// shifted to local time through the clock offset. A rowless result
/// produces an empty named table.
pub(crate) fn build_result_table(
    rows: Vec<Row>,
    name: &str,
    clock: &ClockOffset,
) -> Result<ResultTable, DbError> {
    let Some(first) = rows.first() else {
        return Ok(ResultTable::new(name));
    };

    let kinds: Vec<ValueKind> = first.columns_ref().iter().map(column_kind).collect();
    let names = dedup_names(first.columns_ref().iter().map(|c| c.name_str().to_string()));
    let columns: Vec<Column> = names
        .into_iter()
        .zip(kinds.iter().copied())
        .map(|(name, kind)| Column::new(name, kind))
        .collect();

    let mut table = ResultTable::with_columns(name, columns);
    for row in rows {
        let width = row.len();
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            let raw = row
                .get::<mysql_async::Value, _>(i)
                .unwrap_or(mysql_async::Value::NULL);
            let kind = kinds.get(i).copied().unwrap_or(ValueKind::Text);
            cells.push(from_driver_value(raw, kind, Some(clock)));
        }
        table.push_row(cells)?;
    }
    Ok(table)
}

/// Disambiguate duplicate column names the way the result table promises:
/// first occurrence keeps the bare name, later ones get `name1`, `name2`.
pub(crate) fn dedup_names<I>(names: I) -> Vec<String>
where
    I: Iterator<Item = String>,
{
    let mut counters: HashMap<String, u32> = HashMap::new();
    let mut out = Vec::new();
    for base in names {
        match counters.get_mut(&base) {
            Some(count) => {
                *count += 1;
                out.push(format!("{base}{count}"));
            }
            None => {
                counters.insert(base.clone(), 0);
                out.push(base);
            }
        }
    }
    out
}

/// Map driver column metadata onto the kind a cell of that column will
/// carry.
pub(crate) fn column_kind(col: &mysql_async::Column) -> ValueKind {
    let unsigned = col
        .flags()
        .contains(mysql_async::consts::ColumnFlags::UNSIGNED_FLAG);
    match col.column_type() {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => {
            if unsigned {
                ValueKind::UInt
            } else {
                ValueKind::Int
            }
        }
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => ValueKind::Float,
        ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_DATE
        | ColumnType::MYSQL_TYPE_NEWDATE
        | ColumnType::MYSQL_TYPE_TIMESTAMP2
        | ColumnType::MYSQL_TYPE_DATETIME2 => ValueKind::Timestamp,
        ColumnType::MYSQL_TYPE_JSON => ValueKind::Json,
        ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING => {
            if col.character_set() == BINARY_CHARSET {
                ValueKind::Blob
            } else {
                ValueKind::Text
            }
        }
        ColumnType::MYSQL_TYPE_BIT | ColumnType::MYSQL_TYPE_GEOMETRY => ValueKind::Blob,
        ColumnType::MYSQL_TYPE_NULL => ValueKind::Null,
        // DECIMAL/NEWDECIMAL arrive as textual bytes; TIME is rendered as
        // text; ENUM/SET come through as strings.
        _ => ValueKind::Text,
    }
}

/// Convert a bound [`Value`] into its driver form. Datetime parameters are
/// shifted toward server time when a clock offset is available.
pub(crate) fn to_driver_value(value: &Value, clock: Option<&ClockOffset>) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Int(n) => mysql_async::Value::from(*n),
        Value::UInt(n) => mysql_async::Value::from(*n),
        Value::Float(f) => mysql_async::Value::from(*f),
        Value::Bool(b) => mysql_async::Value::from(*b),
        Value::Text(s) => mysql_async::Value::from(s.clone()),
        Value::Json(j) => mysql_async::Value::from(j.to_string()),
        Value::Blob(b) => mysql_async::Value::from(b.clone()),
        Value::Timestamp(t) => {
            let t = match clock {
                Some(c) => c.to_server(*t),
                None => *t,
            };
            let (date, time) = (t.date(), t.time());
            mysql_async::Value::Date(
                date.year() as u16,
                date.month() as u8,
                date.day() as u8,
                time.hour() as u8,
                time.minute() as u8,
                time.second() as u8,
                time.nanosecond() / 1000,
            )
        }
    }
}

/// Convert one execution's bindings. No bindings becomes `Params::Empty`
/// (the driver rejects a named map against a placeholder-free statement).
pub(crate) fn to_driver_params(bindings: &[(&str, &Value)], clock: Option<&ClockOffset>) -> Params {
    if bindings.is_empty() {
        return Params::Empty;
    }
    let pairs: Vec<(String, mysql_async::Value)> = bindings
        .iter()
        .map(|(name, value)| ((*name).to_string(), to_driver_value(value, clock)))
        .collect();
    Params::from(pairs)
}

/// Convert one driver cell into a [`Value`], consulting the column kind
/// for byte payloads (text vs blob vs json vs textual datetimes).
pub(crate) fn from_driver_value(
    raw: mysql_async::Value,
    kind: ValueKind,
    clock: Option<&ClockOffset>,
) -> Value {
    match raw {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Int(n) => Value::Int(n),
        mysql_async::Value::UInt(n) => Value::UInt(n),
        mysql_async::Value::Float(f) => Value::Float(f64::from(f)),
        mysql_async::Value::Double(d) => Value::Float(d),
        date @ mysql_async::Value::Date(..) => match datetime_from_driver(&date) {
            Some(t) => Value::Timestamp(shift_to_local(t, clock)),
            // zero dates ('0000-00-00') have no chrono representation
            None => Value::Null,
        },
        time @ mysql_async::Value::Time(..) => Value::Text(render_time(&time)),
        mysql_async::Value::Bytes(bytes) => match kind {
            ValueKind::Blob => Value::Blob(bytes),
            ValueKind::Json => match serde_json::from_slice(&bytes) {
                Ok(json) => Value::Json(json),
                Err(_) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
            },
            ValueKind::Timestamp => match parse_datetime_text(&bytes) {
                Some(t) => Value::Timestamp(shift_to_local(t, clock)),
                None => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
            },
            _ => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
        },
    }
}

fn shift_to_local(t: NaiveDateTime, clock: Option<&ClockOffset>) -> NaiveDateTime {
    match clock {
        Some(c) => c.to_local(t),
        None => t,
    }
}

fn datetime_from_driver(raw: &mysql_async::Value) -> Option<NaiveDateTime> {
    match raw {
        mysql_async::Value::Date(y, mo, d, h, mi, s, us) => {
            let date = NaiveDate::from_ymd_opt(i32::from(*y), u32::from(*mo), u32::from(*d))?;
            let time =
                NaiveTime::from_hms_micro_opt(u32::from(*h), u32::from(*mi), u32::from(*s), *us)?;
            Some(NaiveDateTime::new(date, time))
        }
        mysql_async::Value::Bytes(bytes) => parse_datetime_text(bytes),
        _ => None,
    }
}

fn parse_datetime_text(bytes: &[u8]) -> Option<NaiveDateTime> {
    let text = std::str::from_utf8(bytes).ok()?;
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// MySQL TIME values render as text; hours may exceed 24 and the value may
/// be negative, neither of which a clock time can carry.
fn render_time(raw: &mysql_async::Value) -> String {
    match raw {
        mysql_async::Value::Time(neg, days, hours, minutes, seconds, micros) => {
            let total_hours = days * 24 + u32::from(*hours);
            let sign = if *neg { "-" } else { "" };
            if *micros > 0 {
                format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
            } else {
                format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}")
            }
        }
        _ => String::new(),
    }
}
