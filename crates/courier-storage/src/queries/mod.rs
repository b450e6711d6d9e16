// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod activity;
pub mod directory;
pub mod integrations;
pub mod message_logs;
pub mod schedules;

/// Parse a text column into an enum (or any `FromStr` type), surfacing
/// failures as rusqlite conversion errors with the column index.
pub(crate) fn parse_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a JSON text column.
pub(crate) fn parse_json(idx: usize, value: String) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
