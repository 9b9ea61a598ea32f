//! Occurrence generators.
//!
//! A [`Generator`] describes the first occurrence of an event and, optionally,
//! a [`Rule`] that repeats it until `repeat_until`. It produces the raw,
//! *unexceptional* occurrence sequence; exceptions are overlaid by
//! [`crate::reconcile`].

use std::collections::VecDeque;
use std::fmt;

use chrono::{Days, Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::date_range::QueryWindow;
use crate::error::{OccurrentError, OccurrentResult};
use crate::occurrence::Occurrence;
use crate::rule::{RecurrenceOracle, Rule};
use crate::timespan::{TimeSpan, format_date};

/// How many start instants to fetch from the oracle per page when walking an
/// open-ended series.
const PAGE_SIZE: u16 = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratorId(String);

impl From<&str> for GeneratorId {
    fn from(s: &str) -> Self {
        GeneratorId(s.to_string())
    }
}

impl From<String> for GeneratorId {
    fn from(s: String) -> Self {
        GeneratorId(s)
    }
}

impl GeneratorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the event a generator belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        EventId(s)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Defines the repetition sequence of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
    pub id: GeneratorId,
    pub event: EventId,
    /// Timing of the first occurrence.
    pub timespan: TimeSpan,
    pub rule: Option<Rule>,
    /// Ignored when there is no rule.
    pub repeat_until: Option<NaiveDateTime>,
    pub description_override: Option<String>,
}

impl Generator {
    /// A one-off generator.
    pub fn new(id: impl Into<GeneratorId>, event: impl Into<EventId>, timespan: TimeSpan) -> Self {
        Generator {
            id: id.into(),
            event: event.into(),
            timespan,
            rule: None,
            repeat_until: None,
            description_override: None,
        }
    }

    pub fn repeating(mut self, rule: Rule, repeat_until: Option<NaiveDateTime>) -> Self {
        self.rule = Some(rule);
        self.repeat_until = repeat_until;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description_override = Some(description.into());
        self
    }

    /// The horizon, if it applies (only repeating generators have one).
    pub fn horizon(&self) -> Option<NaiveDateTime> {
        self.rule.as_ref().and(self.repeat_until)
    }

    /// Build the recurrence oracle, or `None` for a one-off generator.
    pub fn oracle(&self) -> OccurrentResult<Option<Box<dyn RecurrenceOracle>>> {
        match &self.rule {
            Some(rule) => {
                let oracle = rule.oracle(self.timespan.start_datetime())?;
                Ok(Some(Box::new(oracle)))
            }
            None => Ok(None),
        }
    }

    /// Whether this generator could produce anything in `window`. Never a
    /// false negative; the per-occurrence filtering is exact.
    pub fn may_occur_in(&self, window: &QueryWindow) -> bool {
        self.timespan.start_date() <= window.end.date()
            && self.horizon().is_none_or(|until| until >= window.start)
    }

    /// Unexceptional occurrences starting in `window`.
    ///
    /// A one-off occurrence is included when it starts in `[start, end)` and
    /// ends no earlier than `start`. Repeating occurrences are included when
    /// they start in `[start, min(end, repeat_until)]`.
    pub fn raw_occurrences_in(&self, window: &QueryWindow) -> OccurrentResult<RawOccurrences> {
        let starts = match self.oracle()? {
            None => {
                let start = self.timespan.start_datetime();
                let end = self.timespan.end_datetime();
                if start >= window.start && start < window.end && end >= window.start {
                    vec![start]
                } else {
                    Vec::new()
                }
            }
            Some(oracle) => {
                let end = match self.repeat_until {
                    Some(until) if until < window.end => until,
                    _ => window.end,
                };
                if end < window.start {
                    Vec::new()
                } else {
                    oracle.between(window.start, end, true)
                }
            }
        };

        tracing::debug!(
            generator = %self.id,
            count = starts.len(),
            "Generated raw occurrences"
        );

        Ok(RawOccurrences {
            generator: self.id.clone(),
            shape: SpanShape::of(&self.timespan),
            starts: starts.into_iter(),
        })
    }

    /// Unexceptional occurrences ending after `after`, walked lazily.
    ///
    /// Fails with [`OccurrentError::Unbounded`] when neither the generator's
    /// horizon nor `bound` would ever stop the sequence.
    pub fn raw_occurrences_after(
        &self,
        after: NaiveDateTime,
        bound: ConsumptionBound,
    ) -> OccurrentResult<OccurrencesAfter> {
        let shape = SpanShape::of(&self.timespan);

        let source = match self.oracle()? {
            None => Source::Single(Some(self.timespan.start_datetime())),
            Some(oracle) => {
                if self.repeat_until.is_none() && bound.is_unbounded() {
                    return Err(OccurrentError::Unbounded);
                }
                Source::Series {
                    oracle,
                    cursor: shape.earliest_start_ending_after(after),
                    buffer: VecDeque::new(),
                    exhausted: false,
                }
            }
        };

        Ok(OccurrencesAfter {
            generator: self.id.clone(),
            shape,
            source,
            after,
            repeat_until: self.horizon(),
            bound,
            yielded: 0,
            done: false,
        })
    }

    /// The override if set, otherwise a generated description.
    pub fn date_description(&self) -> String {
        match &self.description_override {
            Some(d) if !d.trim().is_empty() => d.clone(),
            _ => self.robot_description(),
        }
    }

    pub fn robot_description(&self) -> String {
        match (&self.rule, self.repeat_until) {
            (Some(rule), Some(until)) => format!(
                "{}, repeating {} until {}",
                self.timespan,
                rule,
                format_date(until.date())
            ),
            (Some(rule), None) => format!("{}, repeating {}", self.timespan, rule),
            (None, _) => self.timespan.description(),
        }
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.date_description())
    }
}

/// Shape of a generated occurrence relative to its start instant.
#[derive(Debug, Clone, Copy)]
struct SpanShape {
    duration: Duration,
    days: u64,
    use_start_time: bool,
    use_end_time: bool,
}

impl SpanShape {
    fn of(timespan: &TimeSpan) -> Self {
        let days = (timespan.end_date() - timespan.start_date()).num_days();
        SpanShape {
            duration: timespan.duration(),
            days: u64::try_from(days).unwrap_or(0),
            use_start_time: timespan.has_start_time(),
            use_end_time: timespan.has_end_time(),
        }
    }

    /// The occurrence starting at `start`. A date-only end keeps the same
    /// number of days after the start date as the first occurrence.
    fn at(&self, start: NaiveDateTime) -> TimeSpan {
        let start_date = start.date();
        let (end_date, end_time) = if self.use_end_time {
            let end = start + self.duration;
            (end.date(), Some(end.time()))
        } else {
            (start_date + Days::new(self.days), None)
        };
        TimeSpan::from_valid_parts(
            start_date,
            self.use_start_time.then(|| start.time()),
            end_date,
            end_time,
        )
    }

    /// A cursor strictly before every start whose occurrence ends after `after`.
    fn earliest_start_ending_after(&self, after: NaiveDateTime) -> NaiveDateTime {
        let by_duration = after - self.duration;
        let by_days = (after.date() - Days::new(self.days)).and_time(NaiveTime::MIN);
        by_duration.min(by_days) - Duration::seconds(1)
    }
}

/// Unexceptional occurrences for a window. Finite; clone it before
/// consuming to walk it again.
#[derive(Debug, Clone)]
pub struct RawOccurrences {
    generator: GeneratorId,
    shape: SpanShape,
    starts: std::vec::IntoIter<NaiveDateTime>,
}

impl Iterator for RawOccurrences {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        let start = self.starts.next()?;
        Some(Occurrence::generated(
            self.generator.clone(),
            self.shape.at(start),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.starts.size_hint()
    }
}

/// Caller-supplied limit on how much of an open-ended sequence to walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumptionBound {
    pub max_count: Option<usize>,
    pub until: Option<NaiveDateTime>,
}

impl ConsumptionBound {
    pub fn count(n: usize) -> Self {
        ConsumptionBound {
            max_count: Some(n),
            until: None,
        }
    }

    /// Stop once a start passes `until`.
    pub fn until(until: NaiveDateTime) -> Self {
        ConsumptionBound {
            max_count: None,
            until: Some(until),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_count.is_none() && self.until.is_none()
    }
}

enum Source {
    Single(Option<NaiveDateTime>),
    Series {
        oracle: Box<dyn RecurrenceOracle>,
        cursor: NaiveDateTime,
        buffer: VecDeque<NaiveDateTime>,
        exhausted: bool,
    },
}

impl Source {
    fn next_start(&mut self) -> Option<NaiveDateTime> {
        match self {
            Source::Single(start) => start.take(),
            Source::Series {
                oracle,
                cursor,
                buffer,
                exhausted,
            } => {
                if buffer.is_empty() && !*exhausted {
                    let page = oracle.following(*cursor, PAGE_SIZE);
                    *exhausted = page.len() < usize::from(PAGE_SIZE);
                    if let Some(last) = page.last() {
                        *cursor = *last;
                    }
                    buffer.extend(page);
                }
                buffer.pop_front()
            }
        }
    }
}

/// Lazy sequence of unexceptional occurrences ending after an instant.
/// Stops at the generator's horizon or the caller's [`ConsumptionBound`],
/// whichever comes first; dropping it early is always fine.
pub struct OccurrencesAfter {
    generator: GeneratorId,
    shape: SpanShape,
    source: Source,
    after: NaiveDateTime,
    repeat_until: Option<NaiveDateTime>,
    bound: ConsumptionBound,
    yielded: usize,
    done: bool,
}

impl Iterator for OccurrencesAfter {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        while !self.done {
            if self.bound.max_count.is_some_and(|max| self.yielded >= max) {
                break;
            }

            let Some(start) = self.source.next_start() else {
                break;
            };
            if self.repeat_until.is_some_and(|until| start > until)
                || self.bound.until.is_some_and(|until| start > until)
            {
                break;
            }

            let span = self.shape.at(start);
            if span.end_datetime() <= self.after {
                continue;
            }

            self.yielded += 1;
            return Some(Occurrence::generated(self.generator.clone(), span));
        }

        self.done = true;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Frequency;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, 0, 0).unwrap()
    }

    fn time(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn weekly_from_jan_2() -> Generator {
        Generator::new("weekly", "club", TimeSpan::on_date(date(2024, 1, 2))).repeating(
            Rule::new("weekly", Frequency::Weekly),
            Some(at(2024, 1, 30, 0)),
        )
    }

    fn one_off(start: NaiveDateTime, end: NaiveDateTime) -> Generator {
        let span = TimeSpan::from_datetimes(start, end, true, true).unwrap();
        Generator::new("once", "talk", span)
    }

    #[test]
    fn test_weekly_window() {
        let window = QueryWindow::between(date(2024, 1, 8), date(2024, 1, 22)).unwrap();
        let starts: Vec<_> = weekly_from_jan_2()
            .raw_occurrences_in(&window)
            .unwrap()
            .map(|o| o.unvaried.start_date())
            .collect();
        assert_eq!(starts, vec![date(2024, 1, 9), date(2024, 1, 16)]);
    }

    #[test]
    fn test_window_is_clamped_to_horizon() {
        let window = QueryWindow::between(date(2024, 1, 20), date(2024, 3, 1)).unwrap();
        let starts: Vec<_> = weekly_from_jan_2()
            .raw_occurrences_in(&window)
            .unwrap()
            .map(|o| o.unvaried.start_date())
            .collect();
        assert_eq!(starts, vec![date(2024, 1, 23), date(2024, 1, 30)]);

        let after_horizon = QueryWindow::between(date(2024, 2, 1), date(2024, 3, 1)).unwrap();
        assert_eq!(
            weekly_from_jan_2().raw_occurrences_in(&after_horizon).unwrap().count(),
            0
        );
    }

    #[test]
    fn test_raw_sequence_is_sorted_and_inside_window() {
        let generator = Generator::new(
            "daily",
            "gym",
            TimeSpan::new(date(2024, 1, 1), Some(time(7)), None, Some(time(8))).unwrap(),
        )
        .repeating(
            Rule::new("mwf", Frequency::Weekly).with_params("BYDAY=MO,WE,FR"),
            Some(at(2024, 2, 15, 0)),
        );
        let window = QueryWindow::new(at(2024, 1, 10, 12), at(2024, 3, 1, 0)).unwrap();
        let occurrences: Vec<_> = generator.raw_occurrences_in(&window).unwrap().collect();

        assert!(!occurrences.is_empty());
        assert!(occurrences.windows(2).all(|w| w[0].unvaried.start_datetime()
            <= w[1].unvaried.start_datetime()));
        for occ in &occurrences {
            let start = occ.unvaried.start_datetime();
            assert!(start >= window.start && start <= at(2024, 2, 15, 0));
            assert_eq!(occ.unvaried.duration(), Duration::hours(1));
            assert!(occ.unvaried.has_start_time() && occ.unvaried.has_end_time());
        }
    }

    #[test]
    fn test_raw_occurrences_are_restartable() {
        let window = QueryWindow::between(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        let raw = weekly_from_jan_2().raw_occurrences_in(&window).unwrap();
        let again = raw.clone();
        assert_eq!(raw.collect::<Vec<_>>(), again.collect::<Vec<_>>());
    }

    #[test]
    fn test_one_off_window_membership() {
        let generator = one_off(at(2024, 1, 10, 9), at(2024, 1, 10, 10));

        let inside = QueryWindow::new(at(2024, 1, 10, 9), at(2024, 1, 10, 12)).unwrap();
        assert_eq!(generator.raw_occurrences_in(&inside).unwrap().count(), 1);

        // the start must be strictly before the window end
        let ends_at_start = QueryWindow::new(at(2024, 1, 10, 0), at(2024, 1, 10, 9)).unwrap();
        assert_eq!(generator.raw_occurrences_in(&ends_at_start).unwrap().count(), 0);

        let later = QueryWindow::new(at(2024, 1, 11, 0), at(2024, 1, 12, 0)).unwrap();
        assert_eq!(generator.raw_occurrences_in(&later).unwrap().count(), 0);
    }

    #[test]
    fn test_one_off_ignores_repeat_until() {
        let mut generator = one_off(at(2024, 5, 1, 9), at(2024, 5, 1, 10));
        generator.repeat_until = Some(at(2024, 1, 1, 0));
        assert_eq!(generator.horizon(), None);

        let window = QueryWindow::between(date(2024, 5, 1), date(2024, 5, 1)).unwrap();
        let occ: Vec<_> = generator.raw_occurrences_in(&window).unwrap().collect();
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].unvaried, generator.timespan);
    }

    #[test]
    fn test_multi_day_date_only_span_is_preserved() {
        let camp = Generator::new(
            "camp",
            "summer-camp",
            TimeSpan::new(date(2024, 7, 1), None, Some(date(2024, 7, 5)), None).unwrap(),
        )
        .repeating(Rule::new("yearly", Frequency::Yearly), None);

        let window = QueryWindow::between(date(2025, 1, 1), date(2025, 12, 31)).unwrap();
        let occ: Vec<_> = camp.raw_occurrences_in(&window).unwrap().collect();
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].unvaried.start_date(), date(2025, 7, 1));
        assert_eq!(occ[0].unvaried.end_date(), date(2025, 7, 5));
        assert!(!occ[0].unvaried.has_start_time());
    }

    #[test]
    fn test_occurrences_after_requires_a_bound() {
        let open_ended = Generator::new("daily", "walk", TimeSpan::on_date(date(2024, 1, 1)))
            .repeating(Rule::new("daily", Frequency::Daily), None);

        assert!(matches!(
            open_ended.raw_occurrences_after(at(2024, 1, 1, 0), ConsumptionBound::default()),
            Err(OccurrentError::Unbounded)
        ));

        let first_five: Vec<_> = open_ended
            .raw_occurrences_after(at(2024, 3, 1, 12), ConsumptionBound::count(5))
            .unwrap()
            .map(|o| o.unvaried.start_date())
            .collect();
        assert_eq!(first_five.len(), 5);
        // 2024-03-01 ends at midnight of that day, which is not after noon
        assert_eq!(first_five[0], date(2024, 3, 2));
    }

    #[test]
    fn test_occurrences_after_walks_past_page_boundaries() {
        let hourly = Generator::new(
            "hourly",
            "ping",
            TimeSpan::new(date(2024, 1, 1), Some(time(0)), None, Some(time(0))).unwrap(),
        )
        .repeating(Rule::new("hourly", Frequency::Hourly), None);

        let occ: Vec<_> = hourly
            .raw_occurrences_after(at(2024, 1, 1, 0), ConsumptionBound::count(200))
            .unwrap()
            .collect();
        assert_eq!(occ.len(), 200);
        assert_eq!(occ[0].unvaried.start_datetime(), at(2024, 1, 1, 1));
        assert!(occ.windows(2).all(|w| {
            w[1].unvaried.start_datetime() - w[0].unvaried.start_datetime() == Duration::hours(1)
        }));
    }

    #[test]
    fn test_occurrences_after_stops_at_horizon() {
        let starts: Vec<_> = weekly_from_jan_2()
            .raw_occurrences_after(at(2024, 1, 10, 0), ConsumptionBound::default())
            .unwrap()
            .map(|o| o.unvaried.start_date())
            .collect();
        assert_eq!(
            starts,
            vec![date(2024, 1, 16), date(2024, 1, 23), date(2024, 1, 30)]
        );
    }

    #[test]
    fn test_occurrences_after_includes_ongoing() {
        let generator = Generator::new(
            "workshop",
            "ws",
            TimeSpan::new(date(2024, 1, 1), Some(time(9)), None, Some(time(17))).unwrap(),
        )
        .repeating(Rule::new("daily", Frequency::Daily), Some(at(2024, 1, 3, 9)));

        let starts: Vec<_> = generator
            .raw_occurrences_after(at(2024, 1, 2, 12), ConsumptionBound::default())
            .unwrap()
            .map(|o| o.unvaried.start_datetime())
            .collect();
        assert_eq!(starts, vec![at(2024, 1, 2, 9), at(2024, 1, 3, 9)]);
    }

    #[test]
    fn test_one_off_after() {
        let generator = one_off(at(2024, 1, 10, 9), at(2024, 1, 10, 10));
        let bound = ConsumptionBound::default();
        assert_eq!(
            generator
                .raw_occurrences_after(at(2024, 1, 10, 9), bound)
                .unwrap()
                .count(),
            1
        );
        assert_eq!(
            generator
                .raw_occurrences_after(at(2024, 1, 10, 10), bound)
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            weekly_from_jan_2().date_description(),
            "Tue 2 January 2024, repeating weekly until Tue 30 January 2024"
        );
        let open = Generator::new("g", "e", TimeSpan::on_date(date(2024, 1, 2)))
            .repeating(Rule::new("daily", Frequency::Daily), None);
        assert_eq!(open.robot_description(), "Tue 2 January 2024, repeating daily");

        let described = open.with_description("Every day in January");
        assert_eq!(described.to_string(), "Every day in January");
    }

    #[test]
    fn test_may_occur_in() {
        let generator = weekly_from_jan_2();
        assert!(generator.may_occur_in(&QueryWindow::for_date(date(2024, 1, 2))));
        assert!(generator.may_occur_in(&QueryWindow::for_date(date(2024, 1, 30))));
        assert!(!generator.may_occur_in(&QueryWindow::for_date(date(2024, 1, 1))));
        assert!(!generator.may_occur_in(&QueryWindow::for_date(date(2024, 1, 31))));
    }
}
