//! Repetition rules and the recurrence oracle.
//!
//! A [`Rule`] is a named, reusable repetition pattern. Given the start of a
//! generator's first occurrence it builds a [`RecurrenceOracle`], which
//! answers "which start instants fall in this range" without ever
//! materializing the whole (possibly infinite) series.

use std::fmt;

use chrono::{Duration, NaiveDateTime, Utc};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::{OccurrentError, OccurrentResult};

/// Upper bound on the dates a single oracle call may return.
pub const ORACLE_LIMIT: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    fn as_rrule(&self) -> &'static str {
        match self {
            Frequency::Yearly => "YEARLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Daily => "DAILY",
            Frequency::Hourly => "HOURLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Secondly => "SECONDLY",
        }
    }
}

/// A repetition rule, e.g. "every Tuesday" or "every other month".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub frequency: Frequency,
    /// Extra parameters, `;`-separated. Accepts both RRULE syntax
    /// (`INTERVAL=2;BYDAY=TU`) and keyword syntax (`interval:2;byweekday:TU`).
    #[serde(default)]
    pub params: Option<String>,
    /// A full RRULE / RDATE / EXDATE body. Tried first; the structured
    /// frequency and params are the fallback.
    #[serde(default)]
    pub complex_rule: Option<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>, frequency: Frequency) -> Self {
        Rule {
            name: name.into(),
            description: None,
            frequency,
            params: None,
            complex_rule: None,
        }
    }

    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.params = Some(params.into());
        self
    }

    pub fn with_complex_rule(mut self, rule: impl Into<String>) -> Self {
        self.complex_rule = Some(rule.into());
        self
    }

    /// Build the oracle for a series whose first occurrence starts at `dtstart`.
    pub fn oracle(&self, dtstart: NaiveDateTime) -> OccurrentResult<RRuleOracle> {
        if let Some(complex) = &self.complex_rule {
            match parse_rule_set(&complex_rule_string(dtstart, complex)) {
                Ok(set) => return Ok(RRuleOracle { set }),
                Err(e) => {
                    tracing::warn!(
                        rule = %self.name,
                        error = %e,
                        "Complex rule did not parse, falling back to structured parameters"
                    );
                }
            }
        }

        let rrule = self.structured_rrule()?;
        let set = parse_rule_set(&format!("{}\nRRULE:{}", dtstart_line(dtstart), rrule))
            .map_err(|e| {
                OccurrentError::InvalidRule(format!("rule '{}': {}", self.name, e))
            })?;
        Ok(RRuleOracle { set })
    }

    /// `FREQ=...` followed by the normalized params.
    fn structured_rrule(&self) -> OccurrentResult<String> {
        let mut parts = vec![format!("FREQ={}", self.frequency.as_rrule())];

        for param in self
            .params
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            let (key, value) = param
                .split_once('=')
                .or_else(|| param.split_once(':'))
                .ok_or_else(|| {
                    OccurrentError::InvalidRule(format!(
                        "rule '{}': malformed parameter '{}'",
                        self.name, param
                    ))
                })?;
            let key = rrule_key(key.trim()).ok_or_else(|| {
                OccurrentError::InvalidRule(format!(
                    "rule '{}': unknown parameter '{}'",
                    self.name, key
                ))
            })?;
            let value = value.trim().to_uppercase();
            parts.push(format!("{}={}", key, value));
        }

        Ok(parts.join(";"))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Map a parameter name in either syntax onto its RRULE part name.
fn rrule_key(key: &str) -> Option<&'static str> {
    let key = match key.to_lowercase().as_str() {
        "interval" => "INTERVAL",
        "count" => "COUNT",
        "until" => "UNTIL",
        "wkst" => "WKST",
        "bysetpos" => "BYSETPOS",
        "bymonth" => "BYMONTH",
        "bymonthday" => "BYMONTHDAY",
        "byyearday" => "BYYEARDAY",
        "byweekno" => "BYWEEKNO",
        "byweekday" | "byday" => "BYDAY",
        "byhour" => "BYHOUR",
        "byminute" => "BYMINUTE",
        "bysecond" => "BYSECOND",
        _ => return None,
    };
    Some(key)
}

/// Floating times are carried through the rrule crate as UTC.
fn dtstart_line(dtstart: NaiveDateTime) -> String {
    format!("DTSTART:{}Z", dtstart.format("%Y%m%dT%H%M%S"))
}

/// A bare `FREQ=...` body gets an `RRULE:` prefix; a multi-line body is used as is.
fn complex_rule_string(dtstart: NaiveDateTime, complex: &str) -> String {
    let body = complex.trim();
    if body.contains(':') {
        format!("{}\n{}", dtstart_line(dtstart), body)
    } else {
        format!("{}\nRRULE:{}", dtstart_line(dtstart), body)
    }
}

fn parse_rule_set(s: &str) -> Result<RRuleSet, rrule::RRuleError> {
    s.parse::<RRuleSet>()
}

/// Produces the ordered start instants of a recurring series.
pub trait RecurrenceOracle {
    /// All start instants between `start` and `end`, ascending. Both ends are
    /// included when `inclusive` is set.
    fn between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        inclusive: bool,
    ) -> Vec<NaiveDateTime>;

    /// At most `limit` start instants strictly after `after`, ascending.
    fn following(&self, after: NaiveDateTime, limit: u16) -> Vec<NaiveDateTime>;
}

/// [`RecurrenceOracle`] backed by an `rrule` rule set.
#[derive(Debug, Clone)]
pub struct RRuleOracle {
    set: RRuleSet,
}

impl RecurrenceOracle for RRuleOracle {
    fn between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        inclusive: bool,
    ) -> Vec<NaiveDateTime> {
        let tz: rrule::Tz = Utc.into();
        // Widen by a second so either bound convention of the crate works,
        // then filter exactly.
        let before = (end + Duration::seconds(1)).and_utc().with_timezone(&tz);
        let mut cursor = start - Duration::seconds(1);
        let mut dates: Vec<NaiveDateTime> = Vec::new();

        // Dense series span several pages; resume from the last date seen.
        loop {
            let result = self
                .set
                .clone()
                .after(cursor.and_utc().with_timezone(&tz))
                .before(before)
                .all(ORACLE_LIMIT);

            let last = dates.last().copied();
            dates.extend(
                result
                    .dates
                    .iter()
                    .map(|d| d.naive_utc())
                    .filter(|d| last.is_none_or(|last| *d > last)),
            );

            match dates.last().copied() {
                Some(newest) if result.limited && Some(newest) != last => {
                    tracing::debug!(%newest, "Recurrence page full, continuing");
                    cursor = newest;
                }
                _ => break,
            }
        }

        dates
            .into_iter()
            .filter(|d| {
                if inclusive {
                    start <= *d && *d <= end
                } else {
                    start < *d && *d < end
                }
            })
            .collect()
    }

    fn following(&self, after: NaiveDateTime, limit: u16) -> Vec<NaiveDateTime> {
        let tz: rrule::Tz = Utc.into();
        let result = self
            .set
            .clone()
            .after(after.and_utc().with_timezone(&tz))
            .all(limit.saturating_add(1));

        result
            .dates
            .iter()
            .map(|d| d.naive_utc())
            .filter(|d| *d > after)
            .take(usize::from(limit))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_weekly_between_is_inclusive() {
        let oracle = Rule::new("weekly", Frequency::Weekly)
            .oracle(dt(2024, 1, 2, 0))
            .unwrap();

        let starts = oracle.between(dt(2024, 1, 9, 0), dt(2024, 1, 23, 0), true);
        assert_eq!(
            starts,
            vec![dt(2024, 1, 9, 0), dt(2024, 1, 16, 0), dt(2024, 1, 23, 0)]
        );

        let starts = oracle.between(dt(2024, 1, 9, 0), dt(2024, 1, 23, 0), false);
        assert_eq!(starts, vec![dt(2024, 1, 16, 0)]);
    }

    #[test]
    fn test_following_is_strictly_after() {
        let oracle = Rule::new("daily", Frequency::Daily)
            .oracle(dt(2024, 1, 1, 9))
            .unwrap();

        let starts = oracle.following(dt(2024, 1, 3, 9), 2);
        assert_eq!(starts, vec![dt(2024, 1, 4, 9), dt(2024, 1, 5, 9)]);
    }

    #[test]
    fn test_dense_series_is_not_truncated() {
        let oracle = Rule::new("every minute", Frequency::Minutely)
            .oracle(dt(2024, 1, 1, 0))
            .unwrap();

        // 50 days of minutes is more than one page
        let starts = oracle.between(dt(2024, 1, 1, 0), dt(2024, 2, 20, 0), false);
        assert_eq!(starts.len(), 50 * 24 * 60 - 1);
        assert!(starts.len() > usize::from(ORACLE_LIMIT));
        assert!(starts.windows(2).all(|w| w[1] - w[0] == Duration::minutes(1)));
    }

    #[test]
    fn test_keyword_params_are_normalized() {
        let rule = Rule::new("tue-thu", Frequency::Weekly).with_params("interval:1; byweekday:tu,th");
        assert_eq!(
            rule.structured_rrule().unwrap(),
            "FREQ=WEEKLY;INTERVAL=1;BYDAY=TU,TH"
        );

        let oracle = rule.oracle(dt(2024, 1, 2, 10)).unwrap();
        let starts = oracle.between(dt(2024, 1, 1, 0), dt(2024, 1, 7, 0), true);
        assert_eq!(starts, vec![dt(2024, 1, 2, 10), dt(2024, 1, 4, 10)]);
    }

    #[test]
    fn test_count_param_limits_series() {
        let oracle = Rule::new("three times", Frequency::Daily)
            .with_params("COUNT=3")
            .oracle(dt(2024, 1, 1, 0))
            .unwrap();
        assert_eq!(oracle.following(dt(2023, 12, 31, 0), 10).len(), 3);
    }

    #[test]
    fn test_complex_rule_takes_precedence() {
        let rule = Rule::new("monthly", Frequency::Daily)
            .with_complex_rule("FREQ=MONTHLY;BYMONTHDAY=2");
        let oracle = rule.oracle(dt(2024, 1, 2, 0)).unwrap();
        let starts = oracle.between(dt(2024, 1, 1, 0), dt(2024, 3, 31, 0), true);
        assert_eq!(
            starts,
            vec![dt(2024, 1, 2, 0), dt(2024, 2, 2, 0), dt(2024, 3, 2, 0)]
        );
    }

    #[test]
    fn test_broken_complex_rule_falls_back_to_structured() {
        let rule = Rule::new("weekly", Frequency::Weekly).with_complex_rule("FREQ=SOMETIMES");
        let oracle = rule.oracle(dt(2024, 1, 2, 0)).unwrap();
        let starts = oracle.between(dt(2024, 1, 1, 0), dt(2024, 1, 10, 0), true);
        assert_eq!(starts, vec![dt(2024, 1, 2, 0), dt(2024, 1, 9, 0)]);
    }

    #[test]
    fn test_unusable_rule_is_an_error() {
        let rule = Rule::new("broken", Frequency::Weekly)
            .with_complex_rule("garbage")
            .with_params("everyother:yes");
        assert!(matches!(
            rule.oracle(dt(2024, 1, 2, 0)),
            Err(OccurrentError::InvalidRule(_))
        ));

        let rule = Rule::new("broken", Frequency::Weekly).with_params("interval");
        assert!(matches!(
            rule.oracle(dt(2024, 1, 2, 0)),
            Err(OccurrentError::InvalidRule(_))
        ));
    }
}
