//! Timestamp helpers
//!
//! Every instant handed to templates or written to env files uses RFC3339 in UTC
//! with seconds precision and a `Z` suffix, e.g. `2020-11-11T00:00:00Z`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Layout used by the `ToDate` filter
pub const DATE_LAYOUT: &str = "%Y-%m-%d";

/// Formats an instant as `YYYY-MM-DDTHH:MM:SSZ`
pub fn format_rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses an RFC3339 timestamp with any offset and normalizes it to UTC
pub fn parse_rfc3339(input: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(input.trim()).map(|t| t.with_timezone(&Utc))
}

/// Converts an RFC3339 timestamp into a `YYYY-MM-DD` date
pub fn to_date(input: &str) -> Result<String, chrono::ParseError> {
    parse_rfc3339(input).map(|t| t.date_naive().format(DATE_LAYOUT).to_string())
}

/// Midnight UTC of the given date
pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_uses_z_suffix() {
        let t = Utc.with_ymd_and_hms(2020, 11, 11, 0, 0, 0).unwrap();
        assert_eq!(format_rfc3339(t), "2020-11-11T00:00:00Z");
    }

    #[test]
    fn test_parse_normalizes_offset() {
        let t = parse_rfc3339("2021-01-14T02:00:00+02:00").unwrap();
        assert_eq!(format_rfc3339(t), "2021-01-14T00:00:00Z");
    }

    #[test]
    fn test_to_date() {
        assert_eq!(to_date("2021-02-10T10:00:00+00:00").unwrap(), "2021-02-10");
        assert!(to_date("yesterday").is_err());
    }
}
