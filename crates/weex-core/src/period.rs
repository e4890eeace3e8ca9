//! Calendar-aware period resolution
//!
//! Periods are measured in the station's local time: "one day" ending at a
//! given moment starts at the same wall-clock time on the previous day, so it
//! spans 23 or 25 hours across a daylight saving change. Month and year
//! periods start at local midnight, clamped to the last day of the target
//! month when the day-of-month does not exist there.

use chrono::{Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;

use crate::types::{TimeSpan, Timestamp};

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 604_800;
/// Nominal month used for aggregation thresholds
pub const SECONDS_PER_NOMINAL_MONTH: i64 = 2_678_400;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Timestamp out of range: {0}")]
    OutOfRange(Timestamp),

    #[error("Period 'all' needs at least one archive record")]
    NoArchiveData,
}

pub type PeriodResult<T> = Result<T, PeriodError>;

/// A symbolic or explicit chart period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    AllTime,
    Seconds(i64),
}

impl Period {
    /// Parse a period name. Unrecognised names fall back to a day.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "day" => Period::Day,
            "week" => Period::Week,
            "month" => Period::Month,
            "year" => Period::Year,
            "all" | "alltime" => Period::AllTime,
            other => other.parse().map(Period::Seconds).unwrap_or(Period::Day),
        }
    }
}

/// A period resolved against a stop time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub start: Timestamp,
    pub seconds: i64,
}

/// Key suffix for a period: the name when it is a known one, else the seconds
pub fn period_label(name: &str, seconds: i64) -> String {
    let name = name.trim().to_ascii_lowercase();
    match name.as_str() {
        "day" | "week" | "month" | "year" | "all" | "alltime" => name,
        _ => seconds.to_string(),
    }
}

/// Resolve `period` ending at `stop`
pub fn resolve_period(
    period: Period,
    stop: Timestamp,
    tz: &Tz,
    first_good: Option<Timestamp>,
) -> PeriodResult<ResolvedPeriod> {
    let start = match period {
        Period::Day => wall_clock_days_ago(stop, 1, tz)?,
        Period::Week => wall_clock_days_ago(stop, 7, tz)?,
        Period::Month => {
            let date = local_date(stop, tz)?;
            let ago = date_ago(date, 0, -1).ok_or(PeriodError::OutOfRange(stop))?;
            local_midnight(ago, tz)?
        }
        Period::Year => {
            let date = local_date(stop, tz)?;
            let ago = date_ago(date, -1, 0).ok_or(PeriodError::OutOfRange(stop))?;
            local_midnight(ago, tz)?
        }
        Period::AllTime => {
            let first = first_good.ok_or(PeriodError::NoArchiveData)?;
            start_of_day(first, tz)?
        }
        Period::Seconds(n) => stop - n,
    };
    Ok(ResolvedPeriod {
        start,
        seconds: stop - start,
    })
}

/// The date `d_years` and `d_months` away from `date`, clamped to month end
pub fn date_ago(date: NaiveDate, d_years: i32, d_months: i32) -> Option<NaiveDate> {
    let month0 = date.month0() as i32 + d_months;
    let year = date.year() + d_years + month0.div_euclid(12);
    let month = month0.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(next.signed_duration_since(first).num_days() as u32)
}

fn local_date(ts: Timestamp, tz: &Tz) -> PeriodResult<NaiveDate> {
    tz.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or(PeriodError::OutOfRange(ts))
}

/// Epoch time of a local wall-clock time.
///
/// Ambiguous times resolve to the earlier instant; times inside a DST gap
/// move forward by an hour.
pub fn local_to_timestamp(naive: NaiveDateTime, tz: &Tz) -> Option<Timestamp> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.timestamp()),
        LocalResult::Ambiguous(early, _) => Some(early.timestamp()),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.timestamp()),
    }
}

fn local_midnight(date: NaiveDate, tz: &Tz) -> PeriodResult<Timestamp> {
    let naive = date.and_hms_opt(0, 0, 0).ok_or(PeriodError::OutOfRange(0))?;
    local_to_timestamp(naive, tz).ok_or(PeriodError::OutOfRange(naive.and_utc().timestamp()))
}

fn wall_clock_days_ago(stop: Timestamp, days: i64, tz: &Tz) -> PeriodResult<Timestamp> {
    let local = tz
        .timestamp_opt(stop, 0)
        .single()
        .ok_or(PeriodError::OutOfRange(stop))?
        .naive_local();
    local_to_timestamp(local - Duration::days(days), tz).ok_or(PeriodError::OutOfRange(stop))
}

/// Local midnight at the start of the day containing `ts`
pub fn start_of_day(ts: Timestamp, tz: &Tz) -> PeriodResult<Timestamp> {
    local_midnight(local_date(ts, tz)?, tz)
}

/// Start of the interval containing `ts`, aligned on local time
pub fn start_of_interval(ts: Timestamp, interval: i64, tz: &Tz) -> Timestamp {
    if interval <= 0 {
        return ts;
    }
    let offset = utc_offset_seconds(ts, tz);
    ts - (ts + offset).rem_euclid(interval)
}

fn utc_offset_seconds(ts: Timestamp, tz: &Tz) -> i64 {
    tz.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.offset().fix().local_minus_utc() as i64)
        .unwrap_or(0)
}

/// Offset of local time from UTC in minutes
pub fn utc_offset_minutes(ts: Timestamp, tz: &Tz) -> i64 {
    utc_offset_seconds(ts, tz) / 60
}

/// Seven days back from local midnight today, up to `stop`
pub fn week_span(stop: Timestamp, tz: &Tz) -> PeriodResult<TimeSpan> {
    let today = local_date(stop, tz)?;
    let start_date = today - Duration::days(7);
    Ok(TimeSpan::new(local_midnight(start_date, tz)?, stop))
}

/// One year back from local midnight today, up to `stop`
pub fn year_span(stop: Timestamp, tz: &Tz) -> PeriodResult<TimeSpan> {
    let today = local_date(stop, tz)?;
    let start_date = date_ago(today, -1, 0).ok_or(PeriodError::OutOfRange(stop))?;
    Ok(TimeSpan::new(local_midnight(start_date, tz)?, stop))
}
