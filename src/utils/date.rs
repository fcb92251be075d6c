//! Date parsing for front matter and property values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Formats tried after the caller's own format, most specific first.
const BUILTIN_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const BUILTIN_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a date string as UTC.
///
/// `format` (chrono syntax) is tried first, both as a datetime and as a
/// date-only format. Then RFC 3339, then the built-in formats above.
pub fn parse_date(s: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(format) = format
        && let Some(date) = parse_with(s, format)
    {
        return Some(date);
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }

    BUILTIN_DATETIME_FORMATS
        .iter()
        .chain(BUILTIN_DATE_FORMATS)
        .find_map(|format| parse_with(s, format))
}

fn parse_with(s: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
        return Some(datetime.and_utc());
    }
    NaiveDate::parse_from_str(s, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// RFC 2822 form used by RSS, e.g. `Mon, 15 Jan 2024 10:30:45 +0000`.
pub fn to_rfc2822(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}
