//! Period identifiers: rolling-window generation and decoding to UTC timestamps.
//!
//! Two canonical forms are supported:
//! - monthly `YYYYMM` (e.g. `202401`)
//! - weekly `YYYYWww`, ISO-8601 week numbering (e.g. `2024W01`)
//!
//! Decoding yields the UTC start of the period: day 1 of the month, or the Monday of
//! the ISO week. Encoding a decoded period reproduces the identifier for every period
//! [`generate_periods`] can emit.

use ahash::AHashSet;
use chrono::{Datelike, Months, NaiveDate, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{Result, VizError};
use crate::models::PeriodType;

static MONTHLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})$").expect("monthly period regex"));
static WEEKLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})W(\d{1,2})$").expect("weekly period regex"));

/// A decoded period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePoint {
    pub period_type: PeriodType,
    pub year: i32,
    /// Month (1-12) or ISO week (1-53).
    pub index: u32,
    /// UTC start of the period in milliseconds.
    pub timestamp: i64,
}

impl TimePoint {
    /// Identifier of the period that starts at this point's timestamp.
    pub fn encode(&self) -> String {
        encode_timestamp(self.timestamp, self.period_type)
    }
}

/// Today's date in UTC, the default anchor for query windows.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Period identifiers for a rolling window around `anchor`.
///
/// Monthly windows contain exactly `before + after + 1` consecutive months with the
/// anchor's month at index `before`. Weekly windows step by exactly 7 days from the
/// anchor and label each stepped date with its ISO week; duplicates are removed while
/// keeping first-seen order, so callers must use the returned length.
pub fn generate_periods(
    period_type: PeriodType,
    anchor: NaiveDate,
    before: u32,
    after: u32,
) -> Vec<String> {
    let (before, after) = clamp_window(period_type, before, after);
    let mut seen: AHashSet<String> = AHashSet::new();
    let capacity = before.saturating_add(after).saturating_add(1).min(1024);
    let mut out = Vec::with_capacity(capacity as usize);
    let offsets = -before..=after;

    match period_type {
        PeriodType::Monthly => {
            let first = anchor.with_day(1).unwrap_or(anchor);
            for i in offsets {
                let stepped = if i < 0 {
                    first.checked_sub_months(Months::new(i.unsigned_abs() as u32))
                } else {
                    first.checked_add_months(Months::new(i as u32))
                };
                if let Some(d) = stepped {
                    let id = format_monthly(d.year(), d.month());
                    if seen.insert(id.clone()) {
                        out.push(id);
                    }
                }
            }
        }
        PeriodType::Weekly => {
            for i in offsets {
                if let Some(d) = anchor.checked_add_signed(TimeDelta::days(7 * i)) {
                    let (year, week) = iso_week_of(d);
                    let id = format_weekly(year, week);
                    if seen.insert(id.clone()) {
                        out.push(id);
                    }
                }
            }
        }
    }
    out
}

/// Steps past these counts leave chrono's representable date range.
const MAX_MONTH_STEPS: i64 = 3_200_000;
const MAX_WEEK_STEPS: i64 = 14_000_000;

/// Window sides as signed step counts, limited to what can still produce a date.
fn clamp_window(period_type: PeriodType, before: u32, after: u32) -> (i64, i64) {
    let limit = match period_type {
        PeriodType::Monthly => MAX_MONTH_STEPS,
        PeriodType::Weekly => MAX_WEEK_STEPS,
    };
    ((before as i64).min(limit), (after as i64).min(limit))
}

/// Decode a period identifier into its UTC start.
pub fn decode(period: &str) -> Result<TimePoint> {
    let p = period.trim();
    if let Some(caps) = MONTHLY_RE.captures(p) {
        let year: i32 = caps[1].parse().map_err(|_| malformed(period))?;
        let month: u32 = caps[2].parse().map_err(|_| malformed(period))?;
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| malformed(period))?;
        return Ok(TimePoint {
            period_type: PeriodType::Monthly,
            year,
            index: month,
            timestamp: start_of_day_ms(start),
        });
    }
    if let Some(caps) = WEEKLY_RE.captures(p) {
        let year: i32 = caps[1].parse().map_err(|_| malformed(period))?;
        let week: u32 = caps[2].parse().map_err(|_| malformed(period))?;
        if week == 0 || week > iso_weeks_in_year(year).ok_or_else(|| malformed(period))? {
            return Err(malformed(period));
        }
        let monday = monday_of_iso_week(year, week).ok_or_else(|| malformed(period))?;
        return Ok(TimePoint {
            period_type: PeriodType::Weekly,
            year,
            index: week,
            timestamp: start_of_day_ms(monday),
        });
    }
    Err(malformed(period))
}

/// Identifier of the `period_type` period containing the UTC instant `timestamp`.
pub fn encode_timestamp(timestamp: i64, period_type: PeriodType) -> String {
    let date = chrono::DateTime::from_timestamp_millis(timestamp)
        .map(|dt| dt.date_naive())
        .unwrap_or_default();
    match period_type {
        PeriodType::Monthly => format_monthly(date.year(), date.month()),
        PeriodType::Weekly => {
            let (year, week) = iso_week_of(date);
            format_weekly(year, week)
        }
    }
}

/// ISO-8601 week-numbering year and week of `date`.
///
/// The week belongs to the year of its Thursday; week 1 is the week containing Jan 4.
pub fn iso_week_of(date: NaiveDate) -> (i32, u32) {
    let w = date.iso_week();
    (w.year(), w.week())
}

/// Number of ISO weeks (52 or 53) in ISO year `year`; Dec 28 always falls in the last one.
fn iso_weeks_in_year(year: i32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, 12, 28).map(|d| iso_week_of(d).1)
}

/// Monday of ISO week `week` in `year`: `Jan4 - weekday_offset(Jan4) + (week - 1) * 7` days.
fn monday_of_iso_week(year: i32, week: u32) -> Option<NaiveDate> {
    let jan4 = NaiveDate::from_ymd_opt(year, 1, 4)?;
    let offset = jan4.weekday().num_days_from_monday() as i64;
    jan4.checked_add_signed(TimeDelta::days(-offset + (week as i64 - 1) * 7))
}

fn start_of_day_ms(d: NaiveDate) -> i64 {
    d.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

fn format_monthly(year: i32, month: u32) -> String {
    format!("{year:04}{month:02}")
}

fn format_weekly(year: i32, week: u32) -> String {
    format!("{year:04}W{week:02}")
}

fn malformed(period: &str) -> VizError {
    VizError::MalformedPeriod(period.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_window_is_centered_on_anchor() {
        let got = generate_periods(PeriodType::Monthly, ymd(2024, 2, 15), 2, 1);
        assert_eq!(got, vec!["202312", "202401", "202402", "202403"]);
    }

    #[test]
    fn monthly_window_anchored_on_month_end() {
        // Stepping from the 31st must not skip short months.
        let got = generate_periods(PeriodType::Monthly, ymd(2024, 1, 31), 0, 2);
        assert_eq!(got, vec!["202401", "202402", "202403"]);
    }

    #[test]
    fn weekly_window_crosses_year_boundary() {
        let got = generate_periods(PeriodType::Weekly, ymd(2024, 1, 3), 1, 1);
        assert_eq!(got, vec!["2023W52", "2024W01", "2024W02"]);
    }

    #[test]
    fn weekly_uses_iso_year_of_thursday() {
        // 2020-12-31 is a Thursday in ISO week 53 of 2020; 2021-01-03 still belongs to it.
        assert_eq!(iso_week_of(ymd(2021, 1, 3)), (2020, 53));
        // 2024-12-30 (Monday) belongs to 2025W01.
        assert_eq!(iso_week_of(ymd(2024, 12, 30)), (2025, 1));
    }

    #[test]
    fn iso_week_matches_thursday_rule() {
        let mut d = ymd(2019, 12, 1);
        while d < ymd(2026, 2, 1) {
            let thursday = d + TimeDelta::days(3 - d.weekday().num_days_from_monday() as i64);
            let jan4 = ymd(thursday.year(), 1, 4);
            let jan4_thursday =
                jan4 + TimeDelta::days(3 - jan4.weekday().num_days_from_monday() as i64);
            let week = 1 + (thursday - jan4_thursday).num_days().div_euclid(7) as u32;
            assert_eq!(iso_week_of(d), (thursday.year(), week), "date {d}");
            d += TimeDelta::days(1);
        }
    }

    #[test]
    fn decode_weekly_returns_monday() {
        let tp = decode("2024W01").unwrap();
        let date = chrono::DateTime::from_timestamp_millis(tp.timestamp)
            .unwrap()
            .date_naive();
        assert_eq!(date, ymd(2024, 1, 1));
        assert_eq!(date.weekday(), Weekday::Mon);

        let tp = decode("2021W01").unwrap();
        let date = chrono::DateTime::from_timestamp_millis(tp.timestamp)
            .unwrap()
            .date_naive();
        assert_eq!(date, ymd(2021, 1, 4));
    }

    #[test]
    fn decode_rejects_malformed() {
        for bad in [
            "", "2024", "202413", "202400", "2024W00", "2024W54", "2021W53", "2022W53", "24W01",
            "2024-01", "abcdef",
        ] {
            assert!(
                matches!(decode(bad), Err(VizError::MalformedPeriod(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn week_53_only_in_long_years() {
        let tp = decode("2020W53").unwrap();
        assert_eq!(tp.encode(), "2020W53");
        assert_ne!(tp.timestamp, decode("2021W01").unwrap().timestamp);
        assert!(decode("2026W53").is_ok());
    }

    #[test]
    fn huge_windows_are_clamped() {
        assert_eq!(
            clamp_window(PeriodType::Monthly, u32::MAX, u32::MAX),
            (MAX_MONTH_STEPS, MAX_MONTH_STEPS)
        );
        assert_eq!(clamp_window(PeriodType::Weekly, 3, u32::MAX), (3, MAX_WEEK_STEPS));
    }

    #[test]
    fn single_digit_week_is_accepted() {
        assert_eq!(decode("2024W1").unwrap(), decode("2024W01").unwrap());
    }
}
