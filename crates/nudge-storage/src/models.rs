// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column encoding shared by the query modules.
//!
//! Timestamps are stored as fixed-width UTC text (`2026-03-01T10:00:00.000Z`)
//! so string comparison in SQL matches chronological order. Millisecond
//! precision is kept; anything finer is truncated on write.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use nudge_core::types::Params;
use rusqlite::types::Type;

/// Format a timestamp for storage.
pub fn ts(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse a stored timestamp in column `idx`.
pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a timestamp column.
pub(crate) fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

/// Read a nullable timestamp column.
pub(crate) fn get_opt_ts(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

/// Read a text column holding a strum-encoded enum.
pub(crate) fn get_enum<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a JSON object column into string parameters.
pub(crate) fn get_params(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Params> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Encode string parameters as a JSON object.
pub(crate) fn params_json(params: &Params) -> rusqlite::Result<String> {
    serde_json::to_string(params).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(ts(&early) < ts(&late));
        assert_eq!(ts(&late), "2026-01-10T00:00:00.000Z");
    }

    #[test]
    fn stored_timestamps_parse_back() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_ts(0, &ts(&at)).unwrap(), at);
        // SQLite's own strftime('%Y-%m-%dT%H:%M:%fZ') output.
        assert!(parse_ts(0, "2026-03-01T10:30:00.123Z").is_ok());
        assert!(parse_ts(0, "yesterday").is_err());
    }
}
