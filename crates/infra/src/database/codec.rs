//! Column encoders shared by the SQLite repositories.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use serde_json::Value;
use storesync_domain::{Result, StoreSyncError};

pub(crate) fn ts_to_sql(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn opt_ts_to_sql(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(ts_to_sql)
}

pub(crate) fn ts_from_sql(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

pub(crate) fn opt_ts_from_sql(
    column: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|raw| ts_from_sql(column, &raw)).transpose()
}

pub(crate) fn json_to_sql(value: &Value) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|err| StoreSyncError::Internal(format!("failed to encode json column: {err}")))
}

pub(crate) fn opt_json_to_sql(value: Option<&Value>) -> Result<Option<String>> {
    value.map(json_to_sql).transpose()
}

pub(crate) fn json_from_sql(column: usize, raw: &str) -> rusqlite::Result<Value> {
    serde_json::from_str(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

pub(crate) fn opt_json_from_sql(column: usize, raw: Option<String>) -> rusqlite::Result<Option<Value>> {
    raw.map(|raw| json_from_sql(column, &raw)).transpose()
}

/// Parse one of the closed wire enums stored as text.
pub(crate) fn enum_from_sql<T>(column: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|message| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
    })
}

pub(crate) fn u32_from_sql(column: usize, value: i64) -> rusqlite::Result<u32> {
    u32::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(column, value))
}

pub(crate) fn opt_u32_from_sql(column: usize, value: Option<i64>) -> rusqlite::Result<Option<u32>> {
    value.map(|value| u32_from_sql(column, value)).transpose()
}

pub(crate) fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn u64_from_i64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
