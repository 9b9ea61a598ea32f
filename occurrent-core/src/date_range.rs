//! Query windows and calendar date-range helpers.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{OccurrentError, OccurrentResult};

/// Last representable instant of a day, used to clamp bare end dates.
fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN),
    )
}

/// One side of a query window: either a bare date or an exact instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBound {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl From<NaiveDate> for WindowBound {
    fn from(d: NaiveDate) -> Self {
        WindowBound::Date(d)
    }
}

impl From<NaiveDateTime> for WindowBound {
    fn from(dt: NaiveDateTime) -> Self {
        WindowBound::DateTime(dt)
    }
}

/// An inclusive `[start, end]` window of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl QueryWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> OccurrentResult<Self> {
        if end < start {
            return Err(OccurrentError::InvalidSpan(format!(
                "window end {} precedes start {}",
                end, start
            )));
        }
        Ok(QueryWindow { start, end })
    }

    /// Build a window, clamping a bare start date to the start of its day and
    /// a bare end date to the end of its day.
    pub fn between(
        start: impl Into<WindowBound>,
        end: impl Into<WindowBound>,
    ) -> OccurrentResult<Self> {
        let start = match start.into() {
            WindowBound::Date(d) => d.and_time(NaiveTime::MIN),
            WindowBound::DateTime(dt) => dt,
        };
        let end = match end.into() {
            WindowBound::Date(d) => end_of_day(d),
            WindowBound::DateTime(dt) => dt,
        };
        Self::new(start, end)
    }

    /// The whole of a single day.
    pub fn for_date(date: NaiveDate) -> Self {
        QueryWindow {
            start: date.and_time(NaiveTime::MIN),
            end: end_of_day(date),
        }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, dt: NaiveDateTime) -> bool {
        self.start <= dt && dt <= self.end
    }
}

/// Date range parsing for command-line arguments.
pub struct DateRange;

impl DateRange {
    /// Parse `YYYY-MM-DD` bounds into a window.
    /// - `from` defaults to `today`
    /// - `to` defaults to `default_days` after `from`
    pub fn from_args(
        from: Option<&str>,
        to: Option<&str>,
        today: NaiveDate,
        default_days: u64,
    ) -> OccurrentResult<QueryWindow> {
        let from_date = match from {
            Some(s) => parse_date(s)?,
            None => today,
        };
        let to_date = match to {
            Some(s) => parse_date(s)?,
            None => from_date
                .checked_add_days(Days::new(default_days))
                .ok_or_else(|| OccurrentError::Parse("window end out of range".into()))?,
        };
        QueryWindow::between(from_date, to_date)
    }
}

/// Parse YYYY-MM-DD
pub fn parse_date(s: &str) -> OccurrentResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        OccurrentError::Parse(format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))
    })
}

/// Which weekdays start the week and bound the weekend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekConfig {
    pub first_day_of_week: Weekday,
    pub first_day_of_weekend: Weekday,
    pub last_day_of_weekend: Weekday,
}

impl Default for WeekConfig {
    fn default() -> Self {
        WeekConfig {
            first_day_of_week: Weekday::Mon,
            first_day_of_weekend: Weekday::Sat,
            last_day_of_weekend: Weekday::Sun,
        }
    }
}

/// The nearest `weekday` on or before `d`.
fn previous_or_same(d: NaiveDate, weekday: Weekday) -> NaiveDate {
    let back = (7 + d.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    d - Days::new(u64::from(back))
}

/// The nearest `weekday` on or after `d`.
fn next_or_same(d: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - d.weekday().num_days_from_monday()) % 7;
    d + Days::new(u64::from(ahead))
}

impl WeekConfig {
    /// First and last day of the week containing `d`.
    pub fn dates_for_week_of(&self, d: NaiveDate) -> (NaiveDate, NaiveDate) {
        let first = previous_or_same(d, self.first_day_of_week);
        (first, first + Days::new(6))
    }

    /// Two weeks starting at the week containing `d`. Fortnights overlap.
    pub fn dates_for_fortnight_of(&self, d: NaiveDate) -> (NaiveDate, NaiveDate) {
        let first = previous_or_same(d, self.first_day_of_week);
        (first, first + Days::new(13))
    }

    /// The weekend on or after `d`.
    pub fn dates_for_weekend_of(&self, d: NaiveDate) -> (NaiveDate, NaiveDate) {
        let first = next_or_same(d, self.first_day_of_weekend);
        (first, next_or_same(first, self.last_day_of_weekend))
    }

    pub fn is_weekend(&self, weekday: Weekday) -> bool {
        let day = weekday.num_days_from_monday();
        let first = self.first_day_of_weekend.num_days_from_monday();
        let last = self.last_day_of_weekend.num_days_from_monday();
        if first <= last {
            first <= day && day <= last
        } else {
            day >= first || day <= last
        }
    }

    pub fn is_weekday(&self, weekday: Weekday) -> bool {
        !self.is_weekend(weekday)
    }
}

/// First and last day of the month containing `d`.
pub fn dates_for_month_of(d: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = d.with_day(1).unwrap_or(d);
    let last = (first + Months::new(1)) - Days::new(1);
    (first, last)
}

/// First and last day of the year containing `d`.
pub fn dates_for_year_of(d: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = d.with_ordinal(1).unwrap_or(d);
    let last = NaiveDate::from_ymd_opt(d.year(), 12, 31).unwrap_or(d);
    (first, last)
}

/// Every date from `first` to `last`, both included.
pub fn dates_in(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first.iter_days().take_while(move |d| *d <= last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_between_clamps_bare_dates() {
        let window = QueryWindow::between(date(2024, 1, 8), date(2024, 1, 22)).unwrap();
        assert_eq!(window.start, date(2024, 1, 8).and_hms_opt(0, 0, 0).unwrap());
        assert!(window.contains(date(2024, 1, 22).and_hms_opt(23, 59, 59).unwrap()));
        assert!(!window.contains(date(2024, 1, 23).and_hms_opt(0, 0, 0).unwrap()));
    }

    #[test]
    fn test_between_rejects_reversed_window() {
        assert!(QueryWindow::between(date(2024, 1, 9), date(2024, 1, 8)).is_err());
    }

    #[test]
    fn test_single_date_window_is_valid() {
        let window = QueryWindow::between(date(2024, 1, 10), date(2024, 1, 10)).unwrap();
        assert_eq!(window, QueryWindow::for_date(date(2024, 1, 10)));
    }

    #[test]
    fn test_from_args_defaults() {
        let today = date(2024, 3, 1);
        let window = DateRange::from_args(None, None, today, 14).unwrap();
        assert_eq!(window.start.date(), today);
        assert_eq!(window.end.date(), date(2024, 3, 15));

        let window = DateRange::from_args(Some("2024-01-08"), Some("2024-01-22"), today, 14).unwrap();
        assert_eq!(window.start.date(), date(2024, 1, 8));
        assert_eq!(window.end.date(), date(2024, 1, 22));

        assert!(DateRange::from_args(Some("08/01/2024"), None, today, 14).is_err());
    }

    #[test]
    fn test_week_and_fortnight() {
        let weeks = WeekConfig::default();
        // Wednesday 2024-01-10
        assert_eq!(
            weeks.dates_for_week_of(date(2024, 1, 10)),
            (date(2024, 1, 8), date(2024, 1, 14))
        );
        assert_eq!(
            weeks.dates_for_week_of(date(2024, 1, 8)),
            (date(2024, 1, 8), date(2024, 1, 14))
        );
        assert_eq!(
            weeks.dates_for_fortnight_of(date(2024, 1, 10)),
            (date(2024, 1, 8), date(2024, 1, 21))
        );

        let sunday_weeks = WeekConfig {
            first_day_of_week: Weekday::Sun,
            ..WeekConfig::default()
        };
        assert_eq!(
            sunday_weeks.dates_for_week_of(date(2024, 1, 10)),
            (date(2024, 1, 7), date(2024, 1, 13))
        );
    }

    #[test]
    fn test_weekend() {
        let weeks = WeekConfig::default();
        assert_eq!(
            weeks.dates_for_weekend_of(date(2024, 1, 10)),
            (date(2024, 1, 13), date(2024, 1, 14))
        );
        assert!(weeks.is_weekend(Weekday::Sat));
        assert!(weeks.is_weekday(Weekday::Fri));

        let wrapping = WeekConfig {
            first_day_of_week: Weekday::Sun,
            first_day_of_weekend: Weekday::Fri,
            last_day_of_weekend: Weekday::Mon,
        };
        assert!(wrapping.is_weekend(Weekday::Sun));
        assert!(wrapping.is_weekend(Weekday::Mon));
        assert!(!wrapping.is_weekend(Weekday::Wed));
    }

    #[test]
    fn test_month_and_year() {
        assert_eq!(
            dates_for_month_of(date(2024, 2, 14)),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
        assert_eq!(
            dates_for_year_of(date(2024, 6, 1)),
            (date(2024, 1, 1), date(2024, 12, 31))
        );
        assert_eq!(dates_in(date(2024, 2, 27), date(2024, 3, 1)).count(), 4);
    }
}
