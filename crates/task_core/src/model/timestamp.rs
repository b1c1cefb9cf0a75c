use crate::error::AppError;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const COMPACT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]Z");
const NAIVE: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const NAIVE_SPACED: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATE_ONLY: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parses a caller supplied timestamp.
///
/// Accepts RFC 3339, a bare `YYYY-MM-DDTHH:MM:SS` (or space separated) which is
/// taken as UTC, and `YYYY-MM-DD` which means UTC midnight.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("timestamp is required"));
    }

    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(parsed);
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(trimmed, NAIVE) {
        return Ok(parsed.assume_utc());
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(trimmed, NAIVE_SPACED) {
        return Ok(parsed.assume_utc());
    }
    if let Ok(date) = Date::parse(trimmed, DATE_ONLY) {
        return Ok(date.midnight().assume_utc());
    }

    Err(AppError::invalid_input(format!(
        "'{trimmed}' is not a valid timestamp"
    )))
}

/// Formats as RFC 3339 in UTC, truncated to whole seconds.
pub fn format_timestamp(value: OffsetDateTime) -> Result<String, AppError> {
    value
        .to_offset(UtcOffset::UTC)
        .replace_nanosecond(0)
        .map_err(|err| AppError::invalid_data(err.to_string()))?
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Normalises any accepted timestamp form into RFC 3339 UTC.
pub fn normalize_timestamp(value: &str) -> Result<String, AppError> {
    format_timestamp(parse_timestamp(value)?)
}

/// Parses TaskWarrior's `20251221T090000Z` form.
pub fn parse_compact(value: &str) -> Result<OffsetDateTime, AppError> {
    PrimitiveDateTime::parse(value.trim(), COMPACT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| AppError::invalid_data(format!("'{value}' is not a TaskWarrior timestamp")))
}

pub fn format_compact(value: OffsetDateTime) -> Result<String, AppError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(COMPACT)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}
