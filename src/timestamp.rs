use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Completes a shortened ISO-8601 timestamp, assuming UTC.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DDTHH:MM:SS.mmm`.
/// The form is chosen by length alone; anything else is returned untouched.
pub fn complete_partial_iso(partial: &str) -> String {
    match partial.len() {
        10 => format!("{partial}T00:00:00.000+00:00"),
        19 => format!("{partial}.000+00:00"),
        23 => format!("{partial}+00:00"),
        _ => partial.to_string(),
    }
}

pub fn parse_partial_iso(input: &str) -> Result<DateTime<Utc>, AppError> {
    let full = complete_partial_iso(input);
    DateTime::parse_from_rfc3339(&full)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| AppError::InvalidTimeFormat {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

pub fn parse_date(input: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|e| AppError::InvalidDateFormat {
        input: input.to_string(),
        reason: e.to_string(),
    })
}
