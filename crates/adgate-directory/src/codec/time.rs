//! Timestamp codecs: FILETIME tick counts and generalized time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::error::{DirectoryError, DirectoryResult};

/// Sentinel stored by the directory for "never" (e.g. `accountExpires`).
pub const FILETIME_NEVER: i64 = i64::MAX;

/// 100ns ticks per nanosecond-representable chunk. A single `TimeDelta` of
/// nanoseconds holds at most `i64::MAX` ns, so larger offsets are added in steps.
const MAX_CHUNK_TICKS: i64 = i64::MAX / 100;

fn filetime_epoch() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1601, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Decode a decimal FILETIME tick count (100ns units since 1601-01-01 UTC).
///
/// Returns `None` for "never": the `i64::MAX` sentinel, zero and one.
pub fn parse_file_time(value: &str) -> DirectoryResult<Option<DateTime<Utc>>> {
    let ticks: i64 = value
        .trim()
        .parse()
        .map_err(|_| DirectoryError::invalid_format("file time", value))?;
    if ticks == FILETIME_NEVER || ticks <= 1 {
        return Ok(None);
    }

    let mut at = filetime_epoch();
    let mut remaining = ticks;
    while remaining > 0 {
        let chunk = remaining.min(MAX_CHUNK_TICKS);
        at = at
            .checked_add_signed(TimeDelta::nanoseconds(chunk * 100))
            .ok_or_else(|| DirectoryError::invalid_format("file time", value))?;
        remaining -= chunk;
    }
    Ok(Some(at))
}

/// Decode a generalized time string such as `20240115093000.0Z`.
pub fn parse_generalized_time(value: &str) -> DirectoryResult<Option<DateTime<Utc>>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Some(utc) = trimmed.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%d%H%M%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(|_| DirectoryError::invalid_format("generalized time", value));
    }

    DateTime::parse_from_str(trimmed, "%Y%m%d%H%M%S%.f%z")
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| DirectoryError::invalid_format("generalized time", value))
}
