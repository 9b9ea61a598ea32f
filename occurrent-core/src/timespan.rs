//! Start/end date pairs with optional times of day.
//!
//! A [`TimeSpan`] is the unit of timing for both generators (their first
//! occurrence) and occurrences (unvaried and varied timing). Times are
//! optional: a missing time means "no explicit time of day", and arithmetic
//! treats it as midnight while the span remembers the difference.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{OccurrentError, OccurrentResult};

/// An immutable start/end pair of dates with optional times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TimeSpanFields")]
pub struct TimeSpan {
    start_date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_date: NaiveDate,
    end_time: Option<NaiveTime>,
}

/// Unvalidated field set, used when deserializing.
#[derive(Deserialize)]
struct TimeSpanFields {
    start_date: NaiveDate,
    #[serde(default)]
    start_time: Option<NaiveTime>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    end_time: Option<NaiveTime>,
}

impl TryFrom<TimeSpanFields> for TimeSpan {
    type Error = OccurrentError;

    fn try_from(f: TimeSpanFields) -> Result<Self, Self::Error> {
        TimeSpan::new(f.start_date, f.start_time, f.end_date, f.end_time)
    }
}

impl TimeSpan {
    /// Build a span from explicit fields. `end_date` defaults to `start_date`.
    pub fn new(
        start_date: NaiveDate,
        start_time: Option<NaiveTime>,
        end_date: Option<NaiveDate>,
        end_time: Option<NaiveTime>,
    ) -> OccurrentResult<Self> {
        let end_date = end_date.unwrap_or(start_date);

        if end_time.is_some() && start_time.is_none() {
            return Err(OccurrentError::InvalidSpan(
                "an end time requires a start time".into(),
            ));
        }
        if end_date < start_date {
            return Err(OccurrentError::InvalidSpan(format!(
                "end date {} precedes start date {}",
                end_date, start_date
            )));
        }
        if let (Some(st), Some(et)) = (start_time, end_time) {
            if end_date == start_date && et < st {
                return Err(OccurrentError::InvalidSpan(format!(
                    "end time {} precedes start time {} on {}",
                    et, st, start_date
                )));
            }
        }

        Ok(TimeSpan {
            start_date,
            start_time,
            end_date,
            end_time,
        })
    }

    /// For spans derived from an already valid span's shape.
    pub(crate) fn from_valid_parts(
        start_date: NaiveDate,
        start_time: Option<NaiveTime>,
        end_date: NaiveDate,
        end_time: Option<NaiveTime>,
    ) -> Self {
        debug_assert!(end_date >= start_date);
        TimeSpan {
            start_date,
            start_time,
            end_date,
            end_time,
        }
    }

    /// A date-only span covering a single day.
    pub fn on_date(date: NaiveDate) -> Self {
        TimeSpan {
            start_date: date,
            start_time: None,
            end_date: date,
            end_time: None,
        }
    }

    /// Build a span from a pair of instants, keeping the time of day only where requested.
    pub fn from_datetimes(
        start: NaiveDateTime,
        end: NaiveDateTime,
        use_start_time: bool,
        use_end_time: bool,
    ) -> OccurrentResult<Self> {
        Self::new(
            start.date(),
            use_start_time.then(|| start.time()),
            Some(end.date()),
            use_end_time.then(|| end.time()),
        )
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn start_time(&self) -> Option<NaiveTime> {
        self.start_time
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn end_time(&self) -> Option<NaiveTime> {
        self.end_time
    }

    pub fn has_start_time(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn has_end_time(&self) -> bool {
        self.end_time.is_some()
    }

    /// Start instant; a missing time counts as midnight.
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start_date
            .and_time(self.start_time.unwrap_or(NaiveTime::MIN))
    }

    /// End instant; a missing time counts as midnight.
    pub fn end_datetime(&self) -> NaiveDateTime {
        self.end_date.and_time(self.end_time.unwrap_or(NaiveTime::MIN))
    }

    /// `end_datetime - start_datetime`. Negative for a timed start with a
    /// date-only end on the same day, which keeps `start + duration` on that
    /// end date's midnight.
    pub fn duration(&self) -> Duration {
        self.end_datetime() - self.start_datetime()
    }

    /// Human-readable description, e.g. `Tue 2 January 2024, 10:00-11:30`.
    pub fn description(&self) -> String {
        let start_day = format_date(self.start_date);

        if self.start_date == self.end_date {
            return match (self.start_time, self.end_time) {
                (Some(st), Some(et)) if st != et => {
                    format!("{}, {}-{}", start_day, format_time(st), format_time(et))
                }
                (Some(st), _) => format!("{}, {}", start_day, format_time(st)),
                (None, _) => start_day,
            };
        }

        let start = match self.start_time {
            Some(st) => format!("{}, {}", start_day, format_time(st)),
            None => start_day,
        };
        let end = match self.end_time {
            Some(et) => format!("{}, {}", format_date(self.end_date), format_time(et)),
            None => format_date(self.end_date),
        };
        format!("{} - {}", start, end)
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%a %-d %B %Y").to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}
