//! Version 2 windows
//!
//! Unlike version 1, the scheduled instant is rounded *down* and sizes and
//! offsets may carry a leading month component (`1M`, `2M24h`, `-1M12h`).
//! Month arithmetic clamps to the last day of a shorter month.

use chrono::{DateTime, Datelike, Months, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Truncation, format_duration, parse_duration};
use crate::error::{CoreError, Result};
use crate::time::midnight;

/// Duration with an optional calendar month component
///
/// The month part is applied after the fixed part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDuration {
    pub months: i32,
    pub delta: TimeDelta,
}

impl Default for CalendarDuration {
    fn default() -> Self {
        Self::new(0, TimeDelta::zero())
    }
}

impl CalendarDuration {
    pub fn new(months: i32, delta: TimeDelta) -> Self {
        Self { months, delta }
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.delta.is_zero()
    }

    fn is_negative(&self) -> bool {
        self.months < 0 || self.delta < TimeDelta::zero()
    }

    /// Moves `t` forward by this duration, fixed part first
    pub fn add_to(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        add_months(t.checked_add_signed(self.delta)?, self.months)
    }

    /// Moves `t` backward by this duration, fixed part first
    pub fn sub_from(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        add_months(t.checked_sub_signed(self.delta)?, self.months.checked_neg()?)
    }
}

impl FromStr for CalendarDuration {
    type Err = CoreError;

    /// A negative month count makes the fixed remainder negative as well,
    /// so `-1M24h` is one month and one day backward.
    fn from_str(input: &str) -> Result<Self> {
        let s = input.trim();
        let Some((months, rest)) = s.split_once('M') else {
            return Ok(Self::new(0, parse_duration(s)?));
        };

        let months: i32 = months.parse().map_err(|_| {
            CoreError::InvalidWindow(format!("invalid month count in '{}'", input))
        })?;
        let delta = match rest {
            "" => TimeDelta::zero(),
            rest if months < 0 && rest.starts_with(['-', '+']) => {
                return Err(CoreError::InvalidWindow(format!(
                    "invalid duration '{}', a negative month count already signs the rest",
                    input
                )));
            }
            rest if months < 0 => -parse_duration(rest)?,
            rest => parse_duration(rest)?,
        };
        Ok(Self::new(months, delta))
    }
}

impl fmt::Display for CalendarDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.months, self.delta.is_zero()) {
            (0, _) => f.write_str(&format_duration(self.delta)),
            (months, true) => write!(f, "{}M", months),
            (months, false) if months < 0 => {
                write!(f, "{}M{}", months, format_duration(-self.delta))
            }
            (months, false) => write!(f, "{}M{}", months, format_duration(self.delta)),
        }
    }
}

impl TryFrom<String> for CalendarDuration {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CalendarDuration> for String {
    fn from(value: CalendarDuration) -> Self {
        value.to_string()
    }
}

/// Version 2 task window
///
/// `dend = floor(scheduled_at) + offset` and `dstart = dend - size`. A
/// positive offset moves the window later. With no truncation the
/// scheduled instant is used as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarWindow {
    #[serde(default)]
    pub size: CalendarDuration,
    #[serde(default)]
    pub offset: CalendarDuration,
    #[serde(default)]
    pub truncate_to: Option<Truncation>,
}

impl CalendarWindow {
    pub fn new(size: CalendarDuration, offset: CalendarDuration, truncate_to: Option<Truncation>) -> Self {
        Self {
            size,
            offset,
            truncate_to,
        }
    }

    /// Parses a window from its spec-file representation
    ///
    /// Empty strings mean a zero size, a zero offset and no truncation.
    pub fn parse(size: &str, offset: &str, truncate_to: &str) -> Result<Self> {
        let mut window = CalendarWindow::default();
        if !size.trim().is_empty() {
            window.size = size.parse()?;
        }
        if !offset.trim().is_empty() {
            window.offset = offset.parse()?;
        }
        if !truncate_to.trim().is_empty() {
            window.truncate_to = Some(truncate_to.trim().parse()?);
        }
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size.is_negative() {
            return Err(CoreError::InvalidWindow(format!(
                "size cannot be negative, got {}",
                self.size
            )));
        }
        Ok(())
    }

    /// Returns `(dstart, dend)` for the given scheduled instant
    ///
    /// # Errors
    /// Returns `CoreError::InvalidWindow` when the result leaves the
    /// representable date range.
    pub fn range(&self, scheduled_at: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let out_of_range = || {
            CoreError::InvalidWindow(format!(
                "window of size {} and offset {} is out of range",
                self.size, self.offset
            ))
        };

        let floor = match self.truncate_to {
            Some(to) => truncate_down(scheduled_at, to),
            None => scheduled_at,
        };
        let end = self.offset.add_to(floor).ok_or_else(out_of_range)?;
        let start = self.size.sub_from(end).ok_or_else(out_of_range)?;
        Ok((start, end))
    }
}

/// Rounds an instant down to the start of its hour, day, week or month
///
/// Weeks start on Monday.
pub fn truncate_down(t: DateTime<Utc>, to: Truncation) -> DateTime<Utc> {
    let day = t.date_naive();
    match to {
        Truncation::Hour => t
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(t),
        Truncation::Day => midnight(day),
        Truncation::Week => {
            midnight(day) - TimeDelta::days(i64::from(day.weekday().num_days_from_monday()))
        }
        Truncation::Month => day.with_day(1).map_or_else(|| midnight(day), midnight),
    }
}

fn add_months(t: DateTime<Utc>, months: i32) -> Option<DateTime<Utc>> {
    let step = Months::new(months.unsigned_abs());
    if months >= 0 {
        t.checked_add_months(step)
    } else {
        t.checked_sub_months(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::format_rfc3339;
    use chrono::TimeZone;

    fn scheduled() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 7, 5, 2, 10, 10).unwrap() + TimeDelta::nanoseconds(10)
    }

    fn range(size: &str, offset: &str, truncate_to: &str, at: DateTime<Utc>) -> (String, String) {
        let (start, end) = CalendarWindow::parse(size, offset, truncate_to)
            .unwrap()
            .range(at)
            .unwrap();
        (format_rfc3339(start), format_rfc3339(end))
    }

    fn pair(start: &str, end: &str) -> (String, String) {
        (start.to_string(), end.to_string())
    }

    #[test]
    fn test_truncates_down() {
        let at = scheduled();
        assert_eq!(
            range("24h", "0", "h", at),
            pair("2022-07-04T02:00:00Z", "2022-07-05T02:00:00Z")
        );
        assert_eq!(
            range("24h", "0", "d", at),
            pair("2022-07-04T00:00:00Z", "2022-07-05T00:00:00Z")
        );
        assert_eq!(
            range("24h", "0", "w", at),
            pair("2022-07-03T00:00:00Z", "2022-07-04T00:00:00Z")
        );
        assert_eq!(
            range("24h", "0", "M", at),
            pair("2022-06-30T00:00:00Z", "2022-07-01T00:00:00Z")
        );
    }

    #[test]
    fn test_aligned_instants_stay() {
        let monday = Utc.with_ymd_and_hms(2022, 7, 4, 0, 0, 0).unwrap();
        assert_eq!(
            range("24h", "0", "w", monday),
            pair("2022-07-03T00:00:00Z", "2022-07-04T00:00:00Z")
        );

        let first = Utc.with_ymd_and_hms(2022, 7, 1, 0, 0, 0).unwrap();
        assert_eq!(
            range("24h", "0", "M", first),
            pair("2022-06-30T00:00:00Z", "2022-07-01T00:00:00Z")
        );
    }

    #[test]
    fn test_sunday_truncates_to_previous_monday() {
        let sunday = Utc.with_ymd_and_hms(2022, 7, 10, 18, 0, 0).unwrap();
        assert_eq!(
            format_rfc3339(truncate_down(sunday, Truncation::Week)),
            "2022-07-04T00:00:00Z"
        );
    }

    #[test]
    fn test_no_truncation_keeps_instant() {
        let at = scheduled();
        let (start, end) = CalendarWindow::parse("24h", "0", "")
            .unwrap()
            .range(at)
            .unwrap();
        assert_eq!(end, at);
        assert_eq!(end - start, TimeDelta::hours(24));
    }

    #[test]
    fn test_month_sizes() {
        let at = scheduled();
        assert_eq!(
            range("2M", "0", "M", at),
            pair("2022-05-01T00:00:00Z", "2022-07-01T00:00:00Z")
        );
        assert_eq!(
            range("1M24h", "0", "M", at),
            pair("2022-05-30T00:00:00Z", "2022-07-01T00:00:00Z")
        );
        assert_eq!(
            range("24h30m", "0", "d", at),
            pair("2022-07-03T23:30:00Z", "2022-07-05T00:00:00Z")
        );
    }

    #[test]
    fn test_empty_size_is_an_empty_window() {
        assert_eq!(
            range("", "0", "d", scheduled()),
            pair("2022-07-05T00:00:00Z", "2022-07-05T00:00:00Z")
        );
    }

    #[test]
    fn test_offsets() {
        let at = scheduled();
        assert_eq!(
            range("24h", "24h", "d", at),
            pair("2022-07-05T00:00:00Z", "2022-07-06T00:00:00Z")
        );
        assert_eq!(
            range("24h", "-24h", "d", at),
            pair("2022-07-03T00:00:00Z", "2022-07-04T00:00:00Z")
        );
        assert_eq!(
            range("1M", "-1M", "M", at),
            pair("2022-05-01T00:00:00Z", "2022-06-01T00:00:00Z")
        );
        assert_eq!(
            range("1M", "-1M24h", "M", at),
            pair("2022-04-30T00:00:00Z", "2022-05-30T00:00:00Z")
        );
        assert_eq!(
            range("24h", "", "d", at),
            pair("2022-07-04T00:00:00Z", "2022-07-05T00:00:00Z")
        );
    }

    #[test]
    fn test_month_arithmetic_clamps() {
        let at = Utc.with_ymd_and_hms(2022, 3, 31, 0, 0, 0).unwrap();
        assert_eq!(
            range("1M", "0", "d", at),
            pair("2022-02-28T00:00:00Z", "2022-03-31T00:00:00Z")
        );
    }

    #[test]
    fn test_valid_and_invalid_sizes() {
        for size in ["24h", "2h45m", "60s", "45m24h", "", "0", "2M", "45M24h", "45M24h30m"] {
            assert!(CalendarWindow::parse(size, "", "").is_ok(), "rejected {:?}", size);
        }
        for size in ["60S", "60", "2d", "-24h", "-45M24h30m", "xM"] {
            let err = CalendarWindow::parse(size, "", "").unwrap_err();
            assert_eq!(err.kind(), "InvalidWindow", "accepted {:?}", size);
        }
    }

    #[test]
    fn test_valid_and_invalid_offsets() {
        for offset in ["24h", "2h45m", "60s", "45m24h", "0", "", "2M", "45M24h", "45M24h30m", "-45M24h30m"] {
            assert!(CalendarWindow::parse("", offset, "").is_ok(), "rejected {:?}", offset);
        }
        for offset in ["60S", "60", "-1M-2h"] {
            assert!(CalendarWindow::parse("", offset, "").is_err(), "accepted {:?}", offset);
        }
    }

    #[test]
    fn test_truncation_options() {
        for to in ["h", "d", "w", "M", ""] {
            assert!(CalendarWindow::parse("", "", to).is_ok());
        }
        for to in ["s", "a", "ms", "m", "H", "D", "W"] {
            assert!(CalendarWindow::parse("", "", to).is_err(), "accepted {:?}", to);
        }
    }

    #[test]
    fn test_negative_month_offset_parses_as_one_direction() {
        let offset: CalendarDuration = "-1M24h".parse().unwrap();
        assert_eq!(offset, CalendarDuration::new(-1, -TimeDelta::hours(24)));
        assert_eq!(offset.to_string(), "-1M24h");
        assert_eq!("2M".parse::<CalendarDuration>().unwrap().to_string(), "2M");
        assert_eq!("90m".parse::<CalendarDuration>().unwrap().to_string(), "1h30m");

        let mixed: CalendarDuration = "1M-2h".parse().unwrap();
        assert_eq!(mixed, CalendarDuration::new(1, -TimeDelta::hours(2)));
        assert_eq!(mixed.to_string(), "1M-2h");
    }

    #[test]
    fn test_serde_uses_strings() {
        let window = CalendarWindow::parse("1M24h", "-1M", "M").unwrap();
        let json = serde_json::to_string(&window).unwrap();
        assert!(json.contains("\"size\":\"1M24h\""));
        assert!(json.contains("\"offset\":\"-1M\""));

        let back: CalendarWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, window);
    }
}
