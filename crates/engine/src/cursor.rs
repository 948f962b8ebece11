//! Pagination cursor codec.
//!
//! A cursor is the `created_at` of the last item on a page, rendered as
//! `YYYY-MM-DDTHH:MM:SS.ffffff` in UTC. Only that exact rendering is accepted.

use chrono::{DateTime, NaiveDateTime, Utc};

use walwal_common::error::AppError;

const CURSOR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const CURSOR_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn encode_cursor(created_at: DateTime<Utc>) -> String {
    created_at.format(CURSOR_FORMAT).to_string()
}

pub fn decode_cursor(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let invalid = || AppError::InvalidCursor(format!("Cursor '{raw}' is not a valid date-time"));

    let naive = NaiveDateTime::parse_from_str(raw, CURSOR_PARSE_FORMAT).map_err(|_| invalid())?;
    let parsed = naive.and_utc();

    // Reject anything that does not round-trip exactly (missing or extra
    // fractional digits, trailing offsets).
    if encode_cursor(parsed) != raw {
        return Err(invalid());
    }

    Ok(parsed)
}

/// Truncate to the precision a cursor can carry.
pub fn truncate_to_cursor_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    let micros = at.timestamp_micros();
    DateTime::from_timestamp_micros(micros).unwrap_or(at)
}
