//! Occurrences and the exception records that override them.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generator::GeneratorId;
use crate::timespan::TimeSpan;

/// Identity of a persisted exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExceptionId(Uuid);

impl ExceptionId {
    pub fn new() -> Self {
        ExceptionId(Uuid::new_v4())
    }
}

impl Default for ExceptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExceptionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content that differs from the parent event for a single occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Variation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One concrete instance of an event.
///
/// Generated occurrences have no `id`; exceptions loaded from a store do.
/// `unvaried` is the timing the rule would give this occurrence and is the
/// key used to match it against freshly generated output. `varied` is the
/// effective timing shown to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ExceptionId>,
    pub generator: GeneratorId,
    pub unvaried: TimeSpan,
    pub varied: TimeSpan,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub hidden_from_lists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<Variation>,
}

impl Occurrence {
    /// An unexceptional occurrence, as produced by a generator.
    pub fn generated(generator: GeneratorId, timespan: TimeSpan) -> Self {
        Occurrence {
            id: None,
            generator,
            unvaried: timespan,
            varied: timespan,
            cancelled: false,
            hidden_from_lists: false,
            variation: None,
        }
    }

    /// Move this occurrence to a new effective timing.
    pub fn moved_to(mut self, varied: TimeSpan) -> Self {
        self.varied = varied;
        self
    }

    pub fn cancel(mut self) -> Self {
        self.cancelled = true;
        self
    }

    pub fn hide(mut self) -> Self {
        self.hidden_from_lists = true;
        self
    }

    pub fn with_variation(mut self, variation: Variation) -> Self {
        self.variation = Some(variation);
        self
    }

    /// The effective timing.
    pub fn timespan(&self) -> &TimeSpan {
        &self.varied
    }

    pub fn is_moved(&self) -> bool {
        self.varied != self.unvaried
    }

    pub fn is_exception(&self) -> bool {
        self.id.is_some()
    }

    /// Whether this occurrence differs from generated output at all, and so
    /// is worth persisting.
    pub fn is_exceptional(&self) -> bool {
        self.is_moved() || self.cancelled || self.hidden_from_lists || self.variation.is_some()
    }

    /// Sort key: effective start, then generator, then exception identity.
    fn sort_key(&self) -> (NaiveDateTime, &GeneratorId, NaiveDateTime, Option<ExceptionId>) {
        (
            self.varied.start_datetime(),
            &self.generator,
            self.unvaried.start_datetime(),
            self.id,
        )
    }
}

impl PartialOrd for Occurrence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Occurrence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.varied.end_datetime().cmp(&other.varied.end_datetime()))
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.varied)?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
