//! Keeping exceptions attached to their occurrence when a generator's
//! timing is edited.
//!
//! Exceptions are keyed by their unvaried timing, which is derived from the
//! generator's first occurrence. When that changes, every persisted exception
//! must move with it or it would stop matching the occurrence it overrides.
//! [`RetimePlan`] computes the new exceptions without touching any store; the
//! store commits the plan as one unit.

use std::collections::HashSet;

use chrono::Duration;

use crate::error::{OccurrentError, OccurrentResult};
use crate::generator::GeneratorId;
use crate::occurrence::Occurrence;
use crate::timespan::TimeSpan;

/// The difference between a generator's old and new first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeShift {
    pub start_shift: Duration,
    pub end_shift: Duration,
    pub added_start_time: bool,
    pub removed_start_time: bool,
    pub added_end_time: bool,
    pub removed_end_time: bool,
}

impl TimeShift {
    pub fn between(old: &TimeSpan, new: &TimeSpan) -> Self {
        TimeShift {
            start_shift: new.start_datetime() - old.start_datetime(),
            end_shift: new.end_datetime() - old.end_datetime(),
            added_start_time: !old.has_start_time() && new.has_start_time(),
            removed_start_time: old.has_start_time() && !new.has_start_time(),
            added_end_time: !old.has_end_time() && new.has_end_time(),
            removed_end_time: old.has_end_time() && !new.has_end_time(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.start_shift.is_zero()
            && self.end_shift.is_zero()
            && !self.added_start_time
            && !self.removed_start_time
            && !self.added_end_time
            && !self.removed_end_time
    }

    /// Shift an exception's unvaried span.
    pub fn apply(&self, unvaried: &TimeSpan) -> OccurrentResult<TimeSpan> {
        let start = unvaried.start_datetime() + self.start_shift;
        let end = unvaried.end_datetime() + self.end_shift;

        let keep_start_time = keeps_time(
            unvaried.has_start_time(),
            self.added_start_time,
            self.removed_start_time,
        );
        let keep_end_time = keeps_time(
            unvaried.has_end_time(),
            self.added_end_time,
            self.removed_end_time,
        );

        TimeSpan::new(
            start.date(),
            keep_start_time.then(|| start.time()),
            Some(end.date()),
            keep_end_time.then(|| end.time()),
        )
    }
}

/// A time is dropped when it was absent and not added, or removed generator-wide.
fn keeps_time(had_time: bool, added: bool, removed: bool) -> bool {
    !((!had_time && !added) || removed)
}

/// One exception before and after retiming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetimedException {
    pub before: Occurrence,
    pub after: Occurrence,
}

/// Retimed copies of a generator's exceptions, validated and ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetimePlan {
    pub generator: GeneratorId,
    pub shift: TimeShift,
    pub exceptions: Vec<RetimedException>,
    /// Exceptions that match generated output once retimed. A store deletes
    /// these in the same commit.
    pub dropped: Vec<RetimedException>,
}

impl RetimePlan {
    /// Compute the retimed exceptions for a change from `old` to `new`.
    ///
    /// Fails if any shifted span is invalid or if two exceptions would end
    /// up with the same unvaried span. Nothing is modified either way.
    pub fn compute(
        generator: &GeneratorId,
        old: &TimeSpan,
        new: &TimeSpan,
        exceptions: &[Occurrence],
    ) -> OccurrentResult<Self> {
        let shift = TimeShift::between(old, new);
        let mut seen = HashSet::with_capacity(exceptions.len());
        let mut retimed = Vec::with_capacity(exceptions.len());
        let mut dropped = Vec::new();

        for occ in exceptions {
            let copy_to_varied = !occ.is_moved();
            let unvaried = shift.apply(&occ.unvaried)?;

            let mut after = occ.clone();
            after.unvaried = unvaried;
            if copy_to_varied {
                after.varied = unvaried;
            }

            // A moved exception can land exactly on its new generated timing.
            if !after.is_exceptional() {
                dropped.push(RetimedException {
                    before: occ.clone(),
                    after,
                });
                continue;
            }

            if !seen.insert(unvaried) {
                return Err(OccurrentError::AmbiguousException {
                    generator: generator.to_string(),
                    timespan: unvaried,
                });
            }

            retimed.push(RetimedException {
                before: occ.clone(),
                after,
            });
        }

        Ok(RetimePlan {
            generator: generator.clone(),
            shift,
            exceptions: retimed,
            dropped,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.exceptions.is_empty() && self.dropped.is_empty()
    }

    /// Number of exceptions touched, kept or dropped.
    pub fn len(&self) -> usize {
        self.exceptions.len() + self.dropped.len()
    }

    /// The retimed exceptions that are kept, in input order.
    pub fn into_exceptions(self) -> Vec<Occurrence> {
        self.exceptions.into_iter().map(|r| r.after).collect()
    }
}
