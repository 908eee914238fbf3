// src/data/datetime.rs

//! Datetime value types shared by the grammar engines and the event
//! records, and the year-inference helper for log formats that omit the
//! year in-band (classic syslog).

use ::chrono::{
    DateTime,
    Datelike,
    FixedOffset,
    LocalResult,
    TimeZone,
};
#[doc(hidden)]
pub use ::chrono::{
    Duration,
    Utc,
};
use ::lazy_static::lazy_static;

lazy_static! {
    /// The UTC fixed offset, used when the evidence source declares no
    /// timezone.
    pub static ref FIXEDOFFSET0: FixedOffset = FixedOffset::east_opt(0).unwrap();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DateTime typing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A _L_ocalized `DateTime`; the one concrete datetime type used for all
/// parsed timestamps.
pub type DateTimeL = DateTime<FixedOffset>;
pub type DateTimeLOpt = Option<DateTimeL>;

/// A year, e.g. `2012`.
pub type Year = i32;

/// A month ordinal, `1` (January) through `12` (December).
pub type Month = u32;

/// Microseconds since the Unix epoch; the normalized timestamp
/// representation carried on event records.
pub type EpochMicros = i64;

/// Convert a [`DateTimeL`] to [`EpochMicros`].
pub fn datetime_to_micros(dt: &DateTimeL) -> EpochMicros {
    dt.timestamp_micros()
}

/// Build a [`DateTimeL`] from broken-down date and time elements in
/// timezone `tz_offset`. Returns `None` for out-of-range elements or a
/// nonexistent local time.
pub fn datetime_from_ymd_hms(
    tz_offset: &FixedOffset,
    year: Year,
    month: Month,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> DateTimeLOpt {
    match tz_offset.with_ymd_and_hms(year, month, day, hour, minute, second) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(dt, _) => Some(dt),
        LocalResult::None => None,
    }
}

/// Map an English month name or abbreviation to a [`Month`] ordinal.
/// Case-insensitive. Returns `None` for unrecognized names.
pub fn month_from_name(name: &str) -> Option<Month> {
    let lower: String = name.to_lowercase();
    let prefix: &str = match lower.len() >= 3 {
        true => &lower[..3],
        false => return None,
    };
    match prefix {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// YearTracker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Year-inference state for log files whose timestamps omit the year.
///
/// The tracker is seeded with an initial estimate (commonly the file's
/// modification-time year, or a year parsed from an in-band record) and
/// then consulted once per parsed record, in file order. A month that
/// decreases relative to the previously seen month (e.g. December followed
/// by January) is a year rollover and advances the tracked year by one.
/// The inferred year never decreases across a file.
///
/// This is an explicit value threaded through parse calls; one tracker
/// belongs to exactly one file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct YearTracker {
    year: Year,
    month_last: Option<Month>,
}

impl YearTracker {
    /// Create a new `YearTracker` starting at `year`.
    pub const fn new(year: Year) -> YearTracker {
        YearTracker {
            year,
            month_last: None,
        }
    }

    /// Create a new `YearTracker` seeded from a fully-qualified datetime,
    /// e.g. the file modification time.
    pub fn from_datetime(dt: &DateTimeL) -> YearTracker {
        YearTracker {
            year: dt.date_naive().year() as Year,
            month_last: Some(dt.date_naive().month()),
        }
    }

    /// The year currently tracked.
    pub const fn year(&self) -> Year {
        self.year
    }

    /// Infer the year of a yearless record stamped with `month`,
    /// updating the tracked state. Records must be presented in file order.
    pub fn year_for_month(
        &mut self,
        month: Month,
    ) -> Year {
        if let Some(month_last) = self.month_last {
            // a backwards month is a Dec→Jan style wrap into the next year
            if month < month_last {
                self.year += 1;
            }
        }
        self.month_last = Some(month);
        self.year
    }

    /// Record an in-band fully-qualified year observation (some formats
    /// interleave dated header lines among yearless records). Never moves
    /// the tracked year backwards.
    pub fn observe_year(
        &mut self,
        year: Year,
        month: Month,
    ) {
        if year >= self.year {
            self.year = year;
            self.month_last = Some(month);
        }
    }
}
