//! TOML calendar definition file.
//!
//! ```toml
//! [[rule]]
//! name = "weekly"
//! frequency = "weekly"
//!
//! [[generator]]
//! id = "book-club"
//! start_date = "2024-01-02"
//! start_time = "19:00"
//! end_time = "21:00"
//! rule = "weekly"
//! repeat_until = "2024-06-25"
//!
//! [[exception]]
//! generator = "book-club"
//! unvaried = { start_date = "2024-01-09", start_time = "19:00", end_time = "21:00" }
//! varied = { start_date = "2024-01-10", start_time = "19:00", end_time = "21:00" }
//! ```

use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::date_range::parse_date;
use crate::error::{OccurrentError, OccurrentResult};
use crate::generator::{Generator, GeneratorId};
use crate::occurrence::{ExceptionId, Occurrence, Variation};
use crate::rule::Rule;
use crate::store::{ExceptionStore, GeneratorStore, MemoryStore};
use crate::timespan::TimeSpan;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarFile {
    #[serde(default, rename = "rule")]
    pub rules: Vec<Rule>,
    #[serde(default, rename = "generator")]
    pub generators: Vec<GeneratorEntry>,
    #[serde(default, rename = "exception")]
    pub exceptions: Vec<ExceptionEntry>,
}

/// Date and times as written in the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpanEntry {
    pub start_date: String,
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorEntry {
    pub id: String,
    /// Defaults to the generator id.
    pub event: Option<String>,
    #[serde(flatten)]
    pub span: SpanEntry,
    /// Name of a `[[rule]]`.
    pub rule: Option<String>,
    /// `YYYY-MM-DD` (end of that day) or `YYYY-MM-DDTHH:MM[:SS]`.
    pub repeat_until: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExceptionEntry {
    pub id: Option<ExceptionId>,
    pub generator: String,
    pub unvaried: SpanEntry,
    /// Defaults to `unvaried`.
    pub varied: Option<SpanEntry>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub hidden: bool,
    pub title: Option<String>,
    pub notes: Option<String>,
}

impl CalendarFile {
    pub fn load(path: &Path) -> OccurrentResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            OccurrentError::Parse(msg) => {
                OccurrentError::Parse(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> OccurrentResult<Self> {
        toml::from_str(content).map_err(|e| OccurrentError::Parse(e.to_string()))
    }

    /// Build a store holding every generator and exception in the file.
    pub fn into_store(self) -> OccurrentResult<MemoryStore> {
        let mut rules: HashMap<String, Rule> = HashMap::with_capacity(self.rules.len());
        for rule in self.rules {
            if rules.contains_key(&rule.name) {
                return Err(OccurrentError::Parse(format!(
                    "rule '{}' is defined twice",
                    rule.name
                )));
            }
            rules.insert(rule.name.clone(), rule);
        }

        let mut store = MemoryStore::new();

        for entry in self.generators {
            let generator = entry.into_generator(&rules)?;
            if store.generator(&generator.id)?.is_some() {
                return Err(OccurrentError::Parse(format!(
                    "generator '{}' is defined twice",
                    generator.id
                )));
            }
            store.save_generator(generator)?;
        }

        for entry in self.exceptions {
            store.insert_exception(entry.into_occurrence()?)?;
        }

        tracing::debug!(
            generators = store.len(),
            exceptions = store.exception_count(),
            "Loaded calendar file"
        );
        Ok(store)
    }
}

impl GeneratorEntry {
    fn into_generator(self, rules: &HashMap<String, Rule>) -> OccurrentResult<Generator> {
        let event = self.event.unwrap_or_else(|| self.id.clone());
        let mut generator = Generator::new(self.id, event, self.span.to_timespan()?);

        if let Some(name) = &self.rule {
            let rule = rules.get(name).cloned().ok_or_else(|| {
                OccurrentError::InvalidRule(format!(
                    "generator '{}' refers to unknown rule '{}'",
                    generator.id, name
                ))
            })?;
            let until = self.repeat_until.as_deref().map(parse_until).transpose()?;
            generator = generator.repeating(rule, until);
        }
        if let Some(description) = self.description {
            generator = generator.with_description(description);
        }

        Ok(generator)
    }
}

impl ExceptionEntry {
    fn into_occurrence(self) -> OccurrentResult<Occurrence> {
        let unvaried = self.unvaried.to_timespan()?;
        let varied = match &self.varied {
            Some(span) => span.to_timespan()?,
            None => unvaried,
        };

        let mut occurrence =
            Occurrence::generated(GeneratorId::from(self.generator), unvaried).moved_to(varied);
        occurrence.id = self.id;
        occurrence.cancelled = self.cancelled;
        occurrence.hidden_from_lists = self.hidden;
        if self.title.is_some() || self.notes.is_some() {
            occurrence = occurrence.with_variation(Variation {
                title: self.title,
                notes: self.notes,
            });
        }
        Ok(occurrence)
    }
}

impl SpanEntry {
    pub fn to_timespan(&self) -> OccurrentResult<TimeSpan> {
        TimeSpan::new(
            parse_date(&self.start_date)?,
            self.start_time.as_deref().map(parse_time).transpose()?,
            self.end_date.as_deref().map(parse_date).transpose()?,
            self.end_time.as_deref().map(parse_time).transpose()?,
        )
    }
}

/// Parse HH:MM or HH:MM:SS
fn parse_time(s: &str) -> OccurrentResult<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| {
            OccurrentError::Parse(format!("Invalid time format '{}'. Expected HH:MM", s))
        })
}

/// A bare date means the end of that day.
fn parse_until(s: &str) -> OccurrentResult<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Ok(dt);
    }
    let date: NaiveDate = parse_date(s)?;
    Ok(date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_range::QueryWindow;
    use crate::query::occurrences_between;
    use std::io::Write;

    const SAMPLE: &str = r#"
[[rule]]
name = "weekly"
frequency = "weekly"

[[generator]]
id = "book-club"
start_date = "2024-01-02"
start_time = "19:00"
end_time = "21:00"
rule = "weekly"
repeat_until = "2024-01-30"

[[generator]]
id = "launch"
event = "product"
start_date = "2024-01-17"
description = "Launch day"

[[exception]]
generator = "book-club"
unvaried = { start_date = "2024-01-09", start_time = "19:00", end_time = "21:00" }
varied = { start_date = "2024-01-10", start_time = "19:00", end_time = "21:00" }

[[exception]]
generator = "book-club"
unvaried = { start_date = "2024-01-16", start_time = "19:00", end_time = "21:00" }
cancelled = true
title = "No meeting, venue closed"
"#;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_load_into_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let store = CalendarFile::load(file.path()).unwrap().into_store().unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.exception_count(), 2);

        let launch = store.generator(&GeneratorId::from("launch")).unwrap().unwrap();
        assert_eq!(launch.to_string(), "Launch day");

        let window = QueryWindow::between(date(1, 8), date(1, 21)).unwrap();
        let occurrences = occurrences_between(&store, &window, true).unwrap();
        let summary: Vec<_> = occurrences
            .iter()
            .map(|o| (o.generator.as_str(), o.varied.start_date(), o.cancelled))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("book-club", date(1, 10), false),
                ("book-club", date(1, 16), true),
                ("launch", date(1, 17), false),
            ]
        );
        assert_eq!(
            occurrences[1].variation.as_ref().and_then(|v| v.title.as_deref()),
            Some("No meeting, venue closed")
        );
    }

    #[test]
    fn test_repeat_until_date_covers_the_whole_day() {
        let store = CalendarFile::parse(SAMPLE).unwrap().into_store().unwrap();
        let club = store.generator(&GeneratorId::from("book-club")).unwrap().unwrap();
        assert_eq!(
            club.repeat_until,
            Some(date(1, 30).and_hms_opt(23, 59, 59).unwrap())
        );
    }

    #[test]
    fn test_unknown_rule_is_rejected() {
        let content = r#"
[[generator]]
id = "g"
start_date = "2024-01-02"
rule = "fortnightly"
"#;
        let err = CalendarFile::parse(content).unwrap().into_store().unwrap_err();
        assert!(matches!(err, OccurrentError::InvalidRule(_)));
    }

    #[test]
    fn test_colliding_exceptions_are_rejected() {
        let content = r#"
[[rule]]
name = "daily"
frequency = "daily"

[[generator]]
id = "g"
start_date = "2024-01-02"
rule = "daily"

[[exception]]
generator = "g"
unvaried = { start_date = "2024-01-03" }
cancelled = true

[[exception]]
generator = "g"
unvaried = { start_date = "2024-01-03" }
hidden = true
"#;
        let err = CalendarFile::parse(content).unwrap().into_store().unwrap_err();
        assert!(matches!(err, OccurrentError::AmbiguousException { .. }));
    }

    #[test]
    fn test_invalid_span_is_rejected() {
        let content = r#"
[[generator]]
id = "g"
start_date = "2024-01-02"
end_date = "2024-01-01"
"#;
        let err = CalendarFile::parse(content).unwrap().into_store().unwrap_err();
        assert!(matches!(err, OccurrentError::InvalidSpan(_)));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            CalendarFile::parse("[[generator]\nid ="),
            Err(OccurrentError::Parse(_))
        ));
    }
}
