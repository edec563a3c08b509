//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use chrono::{DateTime, NaiveDate};

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the content hash for main.css, computed at build time.
///
/// Usage in templates: `<link href="/static/css/main.css?v={{ ""|css_hash }}">`
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

/// Formats a backend timestamp as `March 5, 2024`.
///
/// Usage in templates: `{{ user.join_date.as_deref().unwrap_or("")|long_date }}`
#[askama::filter_fn]
pub fn long_date(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_long_date(&value.to_string()))
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates. Anything else is
/// returned unchanged; an empty value becomes `-`.
fn format_long_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "-".to_string();
    }

    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d"));

    date.map_or_else(|_| raw.to_string(), |d| d.format("%B %-d, %Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_long_date() {
        assert_eq!(format_long_date("2024-03-05T10:20:00Z"), "March 5, 2024");
        assert_eq!(format_long_date("2024-12-25"), "December 25, 2024");
        assert_eq!(format_long_date("2024-12-25 08:00:00"), "December 25, 2024");
        assert_eq!(format_long_date("  "), "-");
        assert_eq!(format_long_date("last week"), "last week");
    }
}
