//! Calendar-aware bar frequencies.
//!
//! - Fixed units (second/minute/hour) use plain millisecond arithmetic.
//! - Day/week/month/year buckets are computed on the local calendar of a
//!   [`Calendar`] (IANA zone + first day of week), so local midnight, week
//!   start and the 1st of the month stay stable across DST and month length.
//!
//! Every calendar unit has a linear bucket ordinal (`Unit::index_of`), which
//! makes bar counting and bar stepping exact inverses of each other.

use core::fmt;
use std::str::FromStr;

use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
pub const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;

/// Time zone and week convention used for calendar bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calendar {
    #[serde(alias = "time_zone")]
    pub tz: Tz,
    pub first_day_of_week: Weekday,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            tz: chrono_tz::UTC,
            first_day_of_week: Weekday::Mon,
        }
    }
}

impl Calendar {
    pub fn new(tz: Tz, first_day_of_week: Weekday) -> Self {
        Self {
            tz,
            first_day_of_week,
        }
    }

    pub fn utc() -> Self {
        Self::default()
    }

    /// Local wall-clock time of `time_ms` in this calendar's zone.
    pub fn local(&self, time_ms: i64) -> NaiveDateTime {
        let utc = DateTime::<Utc>::from_timestamp_millis(time_ms).unwrap_or(DateTime::<Utc>::MIN_UTC);
        utc.with_timezone(&self.tz).naive_local()
    }

    /// Maps a local wall-clock time back to ms since epoch.
    ///
    /// Ambiguous times (fall-back) resolve to the earliest instant; times in a
    /// spring-forward gap shift forward minute by minute (capped at 2 hours).
    pub fn to_utc_ms(&self, local: NaiveDateTime) -> i64 {
        let mut t = local;
        for _ in 0..=120 {
            match self.tz.from_local_datetime(&t) {
                LocalResult::Single(dt) => return dt.timestamp_millis(),
                LocalResult::Ambiguous(earliest, _) => return earliest.timestamp_millis(),
                LocalResult::None => t += Duration::minutes(1),
            }
        }
        Utc.from_utc_datetime(&local).timestamp_millis()
    }

    fn midnight(&self, date: NaiveDate) -> i64 {
        self.to_utc_ms(date.and_time(NaiveTime::MIN))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    /// Nominal interval length. Month and year are approximations and are only
    /// used for ordering/sizing, never for bucket math.
    pub const fn interval_ms(self) -> i64 {
        match self {
            Unit::Second => MS_PER_SECOND,
            Unit::Minute => MS_PER_MINUTE,
            Unit::Hour => MS_PER_HOUR,
            Unit::Day => MS_PER_DAY,
            Unit::Week => MS_PER_WEEK,
            Unit::Month => 30 * MS_PER_DAY,
            Unit::Year => 365 * MS_PER_DAY,
        }
    }

    pub const fn is_calendar(self) -> bool {
        matches!(self, Unit::Day | Unit::Week | Unit::Month | Unit::Year)
    }

    pub const fn short_name(self) -> &'static str {
        match self {
            Unit::Second => "s",
            Unit::Minute => "m",
            Unit::Hour => "h",
            Unit::Day => "D",
            Unit::Week => "W",
            Unit::Month => "M",
            Unit::Year => "Y",
        }
    }

    /// Floors `time` to a multiple of the nominal interval.
    #[inline]
    pub fn round(self, time: i64) -> i64 {
        let iv = self.interval_ms();
        time.div_euclid(iv) * iv
    }

    /// Linear ordinal of the bucket containing `time`.
    pub fn index_of(self, time: i64, cal: &Calendar) -> i64 {
        if !self.is_calendar() {
            return time.div_euclid(self.interval_ms());
        }
        let date = cal.local(time).date();
        match self {
            Unit::Day => date.num_days_from_ce() as i64,
            Unit::Week => {
                let back = (7 + date.weekday().num_days_from_monday()
                    - cal.first_day_of_week.num_days_from_monday())
                    % 7;
                let start = date.num_days_from_ce() as i64 - back as i64;
                start.div_euclid(7)
            }
            Unit::Month => date.year() as i64 * 12 + date.month0() as i64,
            Unit::Year => date.year() as i64,
            _ => unreachable!("fixed units handled above"),
        }
    }

    /// Start time (ms) of the bucket with ordinal `index`.
    pub fn start_of_index(self, index: i64, cal: &Calendar) -> i64 {
        let date = match self {
            Unit::Second | Unit::Minute | Unit::Hour => return index * self.interval_ms(),
            Unit::Day => NaiveDate::from_num_days_from_ce_opt(index as i32),
            Unit::Week => {
                // 0001-01-01 (day 1 from CE) is a Monday.
                let residue = (1 + cal.first_day_of_week.num_days_from_monday() as i64) % 7;
                NaiveDate::from_num_days_from_ce_opt((index * 7 + residue) as i32)
            }
            Unit::Month => NaiveDate::from_ymd_opt(
                index.div_euclid(12) as i32,
                index.rem_euclid(12) as u32 + 1,
                1,
            ),
            Unit::Year => NaiveDate::from_ymd_opt(index as i32, 1, 1),
        };
        match date {
            Some(d) => cal.midnight(d),
            None => index * self.interval_ms(),
        }
    }

    pub fn begin_time_of_unit_that_include(self, time: i64, cal: &Calendar) -> i64 {
        if self.is_calendar() {
            self.start_of_index(self.index_of(time, cal), cal)
        } else {
            self.round(time)
        }
    }

    /// Number of unit boundaries crossed going from `from` to `to`.
    ///
    /// Calendar units count literal calendar distance (Dec 31 -> Jan 1 is one
    /// month), fixed units divide the elapsed time.
    pub fn n_units_between(self, from: i64, to: i64, cal: &Calendar) -> i64 {
        if self.is_calendar() {
            self.index_of(to, cal) - self.index_of(from, cal)
        } else {
            (to - from) / self.interval_ms()
        }
    }

    /// Inverse of [`Unit::n_units_between`].
    ///
    /// Week/month/year snap `from` to its bucket start before stepping; day
    /// steps keep the local time of day.
    pub fn time_after_n_units(self, from: i64, n: i64, cal: &Calendar) -> i64 {
        match self {
            Unit::Second | Unit::Minute | Unit::Hour => from + n * self.interval_ms(),
            Unit::Day => {
                let local = cal.local(from);
                cal.to_utc_ms(local + Duration::days(n))
            }
            Unit::Week | Unit::Month | Unit::Year => {
                self.start_of_index(self.index_of(from, cal) + n, cal)
            }
        }
    }
}

/// A bar frequency: `n_units` x [`Unit`] (e.g. 15 minutes, 1 day, 3 months).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    unit: Unit,
    n_units: u32,
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({self})")
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.n_units, self.unit.short_name())
    }
}

impl Frequency {
    pub const ONE_SEC: Frequency = Frequency::of(Unit::Second, 1);
    pub const ONE_MIN: Frequency = Frequency::of(Unit::Minute, 1);
    pub const FIVE_MIN: Frequency = Frequency::of(Unit::Minute, 5);
    pub const FIFTEEN_MIN: Frequency = Frequency::of(Unit::Minute, 15);
    pub const ONE_HOUR: Frequency = Frequency::of(Unit::Hour, 1);
    pub const DAILY: Frequency = Frequency::of(Unit::Day, 1);
    pub const WEEKLY: Frequency = Frequency::of(Unit::Week, 1);
    pub const MONTHLY: Frequency = Frequency::of(Unit::Month, 1);
    pub const YEARLY: Frequency = Frequency::of(Unit::Year, 1);

    const fn of(unit: Unit, n_units: u32) -> Self {
        Self { unit, n_units }
    }

    pub fn new(unit: Unit, n_units: u32) -> Result<Self> {
        if n_units == 0 {
            return Err(Error::InvalidFrequency("n_units must be > 0".into()));
        }
        Ok(Self { unit, n_units })
    }

    pub const fn unit(&self) -> Unit {
        self.unit
    }

    pub const fn n_units(&self) -> u32 {
        self.n_units
    }

    pub const fn interval_ms(&self) -> i64 {
        self.unit.interval_ms() * self.n_units as i64
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidFrequency("empty frequency".into()));
        }
        let digits_end = s
            .char_indices()
            .find(|(_, ch)| !ch.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        let n: u32 = if digits_end == 0 {
            1
        } else {
            s[..digits_end]
                .parse()
                .map_err(|_| Error::InvalidFrequency(format!("invalid number in {s:?}")))?
        };
        let unit = match s[digits_end..].trim() {
            "s" | "sec" | "second" => Unit::Second,
            "m" | "min" | "minute" => Unit::Minute,
            "h" | "H" | "hour" => Unit::Hour,
            "d" | "D" | "day" => Unit::Day,
            "w" | "W" | "week" => Unit::Week,
            "M" | "mo" | "month" => Unit::Month,
            "y" | "Y" | "year" => Unit::Year,
            other => {
                return Err(Error::InvalidFrequency(format!(
                    "unsupported unit {other:?} (use s/m/h/D/W/M/Y)"
                )))
            }
        };
        Self::new(unit, n)
    }

    /// Floors to a multiple of the frequency interval (UTC arithmetic).
    #[inline]
    pub fn round(&self, time: i64) -> i64 {
        let iv = self.interval_ms();
        time.div_euclid(iv) * iv
    }

    /// Start of the bar containing `time`. Multi-unit calendar frequencies
    /// align on multiples of `n_units` counted from the unit's ordinal zero.
    pub fn begin_time_of_freq_that_include(&self, time: i64, cal: &Calendar) -> i64 {
        if !self.unit.is_calendar() {
            return self.round(time);
        }
        let n = self.n_units as i64;
        let idx = self.unit.index_of(time, cal).div_euclid(n) * n;
        self.unit.start_of_index(idx, cal)
    }

    pub fn n_freqs_between(&self, from: i64, to: i64, cal: &Calendar) -> i64 {
        if !self.unit.is_calendar() {
            return (to - from) / self.interval_ms();
        }
        let n = self.n_units as i64;
        self.unit.index_of(to, cal).div_euclid(n) - self.unit.index_of(from, cal).div_euclid(n)
    }

    pub fn time_after_n_freqs(&self, from: i64, n_freqs: i64, cal: &Calendar) -> i64 {
        self.unit
            .time_after_n_units(from, n_freqs * self.n_units as i64, cal)
    }

    pub fn next_time(&self, time: i64, cal: &Calendar) -> i64 {
        self.time_after_n_freqs(time, 1, cal)
    }

    pub fn prev_time(&self, time: i64, cal: &Calendar) -> i64 {
        self.time_after_n_freqs(time, -1, cal)
    }

    pub fn same_interval(&self, t1: i64, t2: i64, cal: &Calendar) -> bool {
        self.begin_time_of_freq_that_include(t1, cal) == self.begin_time_of_freq_that_include(t2, cal)
    }

    pub fn is_coarser_than(&self, other: &Frequency) -> bool {
        self.interval_ms() > other.interval_ms()
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Frequency {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Frequency> for String {
    fn from(f: Frequency) -> Self {
        f.to_string()
    }
}
