//! Window engine
//!
//! Maps a scheduled wall-clock instant onto the half-open data interval
//! `[dstart, dend)` the run is responsible for.
//!
//! The end of the window is found by rounding the scheduled instant *forward*:
//! first to the next hour, then to the next midnight, then (for weekly windows)
//! to the next Monday or (for monthly windows) to the first of the next month.
//! The offset is then subtracted and the size walked back from the end.
//!
//! Boundary behaviour is asymmetric on purpose:
//! - an instant already on an hour or day boundary stays there
//! - an instant already on Monday 00:00 moves a full week forward
//! - an instant already on the 1st of a month at 00:00 stays there
//!
//! Version 2 jobs use [`CalendarWindow`] instead, which rounds down and
//! understands month units.

mod calendar;

pub use calendar::{CalendarDuration, CalendarWindow, truncate_down};

use chrono::{DateTime, Datelike, Months, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::time::midnight;

/// Granularity the window end is rounded to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Truncation {
    #[serde(rename = "h")]
    Hour,
    #[serde(rename = "d")]
    Day,
    #[serde(rename = "w")]
    Week,
    #[serde(rename = "M")]
    Month,
}

impl Truncation {
    /// Short code used in spec files
    pub fn as_str(&self) -> &'static str {
        match self {
            Truncation::Hour => "h",
            Truncation::Day => "d",
            Truncation::Week => "w",
            Truncation::Month => "M",
        }
    }
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Truncation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "h" => Ok(Truncation::Hour),
            "d" => Ok(Truncation::Day),
            "w" => Ok(Truncation::Week),
            "M" => Ok(Truncation::Month),
            other => Err(CoreError::InvalidWindow(format!(
                "unsupported truncate_to '{}', provide one of: h, d, w, M",
                other
            ))),
        }
    }
}

/// Task window configuration
///
/// `offset` is signed: a positive offset moves the window end earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWindow {
    #[serde(with = "duration_str")]
    pub size: TimeDelta,
    #[serde(with = "duration_str", default)]
    pub offset: TimeDelta,
    pub truncate_to: Truncation,
}

impl Default for TaskWindow {
    fn default() -> Self {
        Self {
            size: TimeDelta::hours(24),
            offset: TimeDelta::zero(),
            truncate_to: Truncation::Day,
        }
    }
}

impl TaskWindow {
    /// Creates a window from already parsed parts
    pub fn new(size: TimeDelta, offset: TimeDelta, truncate_to: Truncation) -> Self {
        Self {
            size,
            offset,
            truncate_to,
        }
    }

    /// Parses a window from its spec-file representation
    ///
    /// Empty strings fall back to the defaults `size=24h`, `offset=0`, `truncate_to=d`.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidWindow` for unparsable durations, an unknown
    /// truncation or a non-positive size.
    pub fn parse(size: &str, offset: &str, truncate_to: &str) -> Result<Self> {
        let mut window = TaskWindow::default();
        if !size.trim().is_empty() {
            window.size = parse_duration(size)?;
        }
        if !offset.trim().is_empty() {
            window.offset = parse_duration(offset)?;
        }
        if !truncate_to.trim().is_empty() {
            window.truncate_to = truncate_to.trim().parse()?;
        }
        window.validate()?;
        Ok(window)
    }

    /// Validates the window
    pub fn validate(&self) -> Result<()> {
        if self.size <= TimeDelta::zero() {
            return Err(CoreError::InvalidWindow(format!(
                "size must be positive, got {}",
                format_duration(self.size)
            )));
        }
        Ok(())
    }

    /// Returns `(dstart, dend)` for the given scheduled instant
    pub fn range(&self, scheduled_at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        compute(scheduled_at, self)
    }

    /// Inclusive start of the window
    pub fn start(&self, scheduled_at: DateTime<Utc>) -> DateTime<Utc> {
        self.range(scheduled_at).0
    }

    /// Exclusive end of the window
    pub fn end(&self, scheduled_at: DateTime<Utc>) -> DateTime<Utc> {
        self.range(scheduled_at).1
    }
}

/// Task window of either job spec version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    V1(TaskWindow),
    V2(CalendarWindow),
}

impl Default for Window {
    fn default() -> Self {
        Window::V1(TaskWindow::default())
    }
}

impl From<TaskWindow> for Window {
    fn from(window: TaskWindow) -> Self {
        Window::V1(window)
    }
}

impl From<CalendarWindow> for Window {
    fn from(window: CalendarWindow) -> Self {
        Window::V2(window)
    }
}

impl Window {
    /// Parses the window of a job spec with the given version
    ///
    /// # Errors
    /// Returns `CoreError::InvalidWindow` for a version other than 1 or 2, or
    /// when the parts do not parse under that version's rules.
    pub fn parse(version: u32, size: &str, offset: &str, truncate_to: &str) -> Result<Self> {
        match version {
            1 => TaskWindow::parse(size, offset, truncate_to).map(Window::V1),
            2 => CalendarWindow::parse(size, offset, truncate_to).map(Window::V2),
            other => Err(CoreError::InvalidWindow(format!(
                "unsupported window version {}, expected 1 or 2",
                other
            ))),
        }
    }

    /// Job spec version this window belongs to
    pub fn version(&self) -> u32 {
        match self {
            Window::V1(_) => 1,
            Window::V2(_) => 2,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Window::V1(w) => w.validate(),
            Window::V2(w) => w.validate(),
        }
    }

    /// Returns `(dstart, dend)` for the given scheduled instant
    pub fn range(&self, scheduled_at: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            Window::V1(w) => Ok(w.range(scheduled_at)),
            Window::V2(w) => w.range(scheduled_at),
        }
    }

    /// Size in spec-file form
    pub fn size(&self) -> String {
        match self {
            Window::V1(w) => format_duration(w.size),
            Window::V2(w) => w.size.to_string(),
        }
    }

    /// Offset in spec-file form
    pub fn offset(&self) -> String {
        match self {
            Window::V1(w) => format_duration(w.offset),
            Window::V2(w) => w.offset.to_string(),
        }
    }

    /// Truncation code, empty when a version 2 window does not truncate
    pub fn truncate_to(&self) -> &'static str {
        match self {
            Window::V1(w) => w.truncate_to.as_str(),
            Window::V2(w) => w.truncate_to.map_or("", |t| t.as_str()),
        }
    }
}

/// Computes `(dstart, dend)` for a scheduled instant
///
/// `dend - dstart` always equals `window.size`.
pub fn compute(scheduled_at: DateTime<Utc>, window: &TaskWindow) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = truncate(scheduled_at, window.truncate_to) - window.offset;
    (end - window.size, end)
}

/// Rounds an instant forward to the next boundary of the given granularity
pub fn truncate(t: DateTime<Utc>, to: Truncation) -> DateTime<Utc> {
    let t = ceil_hour(t);
    if to == Truncation::Hour {
        return t;
    }

    let t = ceil_day(t);
    match to {
        Truncation::Hour | Truncation::Day => t,
        Truncation::Week => {
            // Monday itself moves a full week
            let days = 7 - i64::from(t.weekday().num_days_from_monday());
            t + TimeDelta::days(days)
        }
        Truncation::Month => {
            if t.day() == 1 {
                return t;
            }
            t.date_naive()
                .with_day(1)
                .and_then(|first| first.checked_add_months(Months::new(1)))
                .map_or(t, midnight)
        }
    }
}

fn ceil_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let floor = t
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t);
    if floor == t {
        t
    } else {
        floor + TimeDelta::hours(1)
    }
}

fn ceil_day(t: DateTime<Utc>) -> DateTime<Utc> {
    let floor = midnight(t.date_naive());
    if floor == t {
        t
    } else {
        floor + TimeDelta::days(1)
    }
}

// =============================================================================
// Durations
// =============================================================================

/// Parses a Go-style duration string such as `24h`, `-1h30m` or `1.5h`
///
/// Supported units: `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<TimeDelta> {
    let invalid = || CoreError::InvalidWindow(format!("invalid duration '{}'", input));

    let s = input.trim();
    let (negative, mut rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if rest == "0" {
        return Ok(TimeDelta::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);

        let scale: i128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            _ => return Err(invalid()),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        let whole: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut value = whole.checked_mul(scale).ok_or_else(invalid)?;
        if !fraction.is_empty() {
            if fraction.len() > 18 {
                return Err(invalid());
            }
            let digits: i128 = fraction.parse().map_err(|_| invalid())?;
            let part = digits.checked_mul(scale).ok_or_else(invalid)? / 10i128.pow(fraction.len() as u32);
            value = value.checked_add(part).ok_or_else(invalid)?;
        }

        total = total.checked_add(value).ok_or_else(invalid)?;
        rest = next;
    }

    let nanos = if negative { -total } else { total };
    i64::try_from(nanos)
        .map(TimeDelta::nanoseconds)
        .map_err(|_| invalid())
}

/// Formats a duration in the compact form accepted by [`parse_duration`]
pub fn format_duration(d: TimeDelta) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }

    let mut out = String::new();
    if d < TimeDelta::zero() {
        out.push('-');
    }
    let d = d.abs();

    let hours = d.num_hours();
    let minutes = d.num_minutes() % 60;
    let seconds = d.num_seconds() % 60;
    let sub_nanos = d.subsec_nanos();

    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}s", seconds));
    }
    if sub_nanos > 0 {
        out.push_str(&format!("{}ns", sub_nanos));
    }
    out
}

pub(crate) mod duration_str {
    use super::{format_duration, parse_duration};
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::format_rfc3339;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn window(size: &str, offset: &str, truncate_to: &str) -> TaskWindow {
        TaskWindow::parse(size, offset, truncate_to).unwrap()
    }

    fn formatted(range: (DateTime<Utc>, DateTime<Utc>)) -> (String, String) {
        (format_rfc3339(range.0), format_rfc3339(range.1))
    }

    #[test]
    fn test_daily_window_mid_day() {
        let range = window("24h", "0", "d").range(at(2020, 11, 11, 6, 30));
        assert_eq!(
            formatted(range),
            (
                "2020-11-11T00:00:00Z".to_string(),
                "2020-11-12T00:00:00Z".to_string()
            )
        );
    }

    #[test]
    fn test_weekly_window_on_monday_moves_a_week() {
        let range = window("168h", "0", "w").range(at(2002, 9, 23, 0, 0));
        assert_eq!(
            formatted(range),
            (
                "2002-09-23T00:00:00Z".to_string(),
                "2002-09-30T00:00:00Z".to_string()
            )
        );
    }

    #[test]
    fn test_weekly_window_mid_week() {
        let end = window("168h", "0", "w").end(at(2002, 10, 1, 0, 0));
        assert_eq!(format_rfc3339(end), "2002-10-07T00:00:00Z");
    }

    #[test]
    fn test_monthly_window_on_month_start_stays() {
        let range = window("720h", "0", "M").range(at(2002, 10, 1, 0, 0));
        assert_eq!(
            formatted(range),
            (
                "2002-09-01T00:00:00Z".to_string(),
                "2002-10-01T00:00:00Z".to_string()
            )
        );
    }

    #[test]
    fn test_monthly_window_mid_month() {
        let end = window("720h", "0", "M").end(at(2002, 10, 15, 13, 0));
        assert_eq!(format_rfc3339(end), "2002-11-01T00:00:00Z");

        let end = window("720h", "0", "M").end(at(2002, 12, 31, 23, 30));
        assert_eq!(format_rfc3339(end), "2003-01-01T00:00:00Z");
    }

    #[test]
    fn test_aligned_day_does_not_move() {
        let range = window("1h", "0", "d").range(at(2020, 11, 11, 0, 0));
        assert_eq!(
            formatted(range),
            (
                "2020-11-10T23:00:00Z".to_string(),
                "2020-11-11T00:00:00Z".to_string()
            )
        );
    }

    #[test]
    fn test_hourly_rounds_up() {
        let end = window("1h", "0", "h").end(at(2020, 11, 11, 6, 1));
        assert_eq!(format_rfc3339(end), "2020-11-11T07:00:00Z");

        let seconds_only = Utc.with_ymd_and_hms(2020, 11, 11, 6, 0, 30).unwrap();
        let end = window("1h", "0", "h").end(seconds_only);
        assert_eq!(format_rfc3339(end), "2020-11-11T07:00:00Z");
    }

    #[test]
    fn test_positive_offset_moves_end_earlier() {
        let range = window("24h", "2h", "d").range(at(2020, 11, 11, 6, 30));
        assert_eq!(
            formatted(range),
            (
                "2020-11-10T22:00:00Z".to_string(),
                "2020-11-11T22:00:00Z".to_string()
            )
        );

        let end = window("24h", "-6h", "d").end(at(2020, 11, 11, 6, 30));
        assert_eq!(format_rfc3339(end), "2020-11-12T06:00:00Z");
    }

    #[test]
    fn test_offset_larger_than_size() {
        let range = window("1h", "48h", "h").range(at(2020, 11, 11, 6, 0));
        assert_eq!(range.1 - range.0, TimeDelta::hours(1));
        assert_eq!(format_rfc3339(range.1), "2020-11-09T06:00:00Z");
    }

    #[test]
    fn test_end_after_scheduled_for_unaligned_input() {
        let inputs = [
            at(2021, 1, 1, 0, 15),
            at(2021, 2, 28, 23, 59),
            at(2024, 2, 29, 12, 30),
            at(2022, 6, 6, 0, 1),
        ];
        for t in inputs {
            for to in ["h", "d", "w", "M"] {
                let (start, end) = window("24h", "0", to).range(t);
                assert!(end > t, "{} {} -> {}", t, to, end);
                assert_eq!(end - start, TimeDelta::hours(24));
            }
        }
    }

    #[test]
    fn test_truncation_is_idempotent_for_hour_day_month() {
        let t = at(2021, 3, 17, 9, 45);
        for to in [Truncation::Hour, Truncation::Day, Truncation::Month] {
            let once = truncate(t, to);
            assert_eq!(truncate(once, to), once);
        }
    }

    #[test]
    fn test_size_must_be_positive() {
        assert!(TaskWindow::parse("0", "", "d").is_err());
        assert!(TaskWindow::parse("-1h", "", "d").is_err());
    }

    #[test]
    fn test_unknown_truncation_rejected() {
        let err = TaskWindow::parse("24h", "", "y").unwrap_err();
        assert_eq!(err.kind(), "InvalidWindow");
        assert!(TaskWindow::parse("24h", "", "m").is_err());
    }

    #[test]
    fn test_parse_defaults() {
        let w = TaskWindow::parse("", "", "").unwrap();
        assert_eq!(w, TaskWindow::default());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("24h").unwrap(), TimeDelta::hours(24));
        assert_eq!(parse_duration("-1h30m").unwrap(), -TimeDelta::minutes(90));
        assert_eq!(parse_duration("1.5h").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_duration("500ms").unwrap(), TimeDelta::milliseconds(500));
        assert_eq!(parse_duration("0").unwrap(), TimeDelta::zero());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("12").is_err());
        assert!(parse_duration("3y").is_err());
    }

    #[test]
    fn test_parse_duration_overflow_is_an_error() {
        for input in [
            "99999999999999999999999999999h",
            "-99999999999999999999999999999h",
            "9999999999999999999999999999.5h",
            "3000000h",
            "1h99999999999999999999999999999m",
        ] {
            let err = parse_duration(input).unwrap_err();
            assert_eq!(err.kind(), "InvalidWindow", "{}", input);
        }
        assert!(TaskWindow::parse("99999999999999999999999999999h", "", "d").is_err());
    }

    #[test]
    fn test_version_selects_window() {
        let scheduled_at = at(2022, 7, 5, 2, 10);

        let v1 = Window::parse(1, "24h", "0", "d").unwrap();
        assert_eq!(v1.version(), 1);
        assert_eq!(
            formatted(v1.range(scheduled_at).unwrap()),
            (
                "2022-07-05T00:00:00Z".to_string(),
                "2022-07-06T00:00:00Z".to_string()
            )
        );

        let v2 = Window::parse(2, "24h", "0", "d").unwrap();
        assert_eq!(v2.version(), 2);
        assert_eq!(
            formatted(v2.range(scheduled_at).unwrap()),
            (
                "2022-07-04T00:00:00Z".to_string(),
                "2022-07-05T00:00:00Z".to_string()
            )
        );
    }

    #[test]
    fn test_month_units_need_version_two() {
        assert!(Window::parse(1, "1M", "0", "M").is_err());
        let w = Window::parse(2, "1M", "-1M", "M").unwrap();
        assert_eq!((w.size(), w.offset(), w.truncate_to()), ("1M".to_string(), "-1M".to_string(), "M"));

        let err = Window::parse(3, "24h", "", "").unwrap_err();
        assert_eq!(err.kind(), "InvalidWindow");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::hours(24)), "24h");
        assert_eq!(format_duration(-TimeDelta::minutes(90)), "-1h30m");
        assert_eq!(format_duration(TimeDelta::zero()), "0s");
    }

    #[test]
    fn test_window_serde_uses_strings() {
        let w = window("168h", "-2h", "w");
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"size\":\"168h\""));
        assert!(json.contains("\"truncate_to\":\"w\""));

        let back: TaskWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}
