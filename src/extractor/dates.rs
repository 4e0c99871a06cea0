//! Lenient parsing of the date formats found in meta tags, JSON-LD and HTTP headers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Fractional seconds without offset, e.g. 2024-03-01T10:00:00.000
    let without_fraction = raw.split('.').next().unwrap_or(raw);
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(without_fraction, format) {
            return Some(dt.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Newest of the parseable candidates, as RFC 3339.
pub fn newest_rfc3339<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter_map(parse_date)
        .max()
        .map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_common_formats() {
        assert!(parse_date("2024-03-01T10:00:00Z").is_some());
        assert!(parse_date("2024-03-01T10:00:00+02:00").is_some());
        assert!(parse_date("Fri, 01 Mar 2024 10:00:00 GMT").is_some());
        assert!(parse_date("2024-03-01T10:00:00.123").is_some());
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024/03/01").is_some());
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let dt = parse_date("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.day(), 1);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_date("last tuesday").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn newest_picks_latest() {
        let newest = newest_rfc3339(["2023-01-01", "not a date", "2024-06-01"]).unwrap();
        assert!(newest.starts_with("2024-06-01"));
    }
}
