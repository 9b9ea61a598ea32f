//! Overlaying persisted exceptions on generated occurrences.
//!
//! Exceptions are matched to generated occurrences by their *unvaried*
//! timespan. Matched occurrences are replaced by the exception; exceptions
//! that were moved into a window from outside it are added on top.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::date_range::QueryWindow;
use crate::error::{OccurrentError, OccurrentResult};
use crate::generator::{ConsumptionBound, Generator, GeneratorId, OccurrencesAfter};
use crate::occurrence::Occurrence;
use crate::timespan::TimeSpan;

/// Filters applied to reconciled occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Drop occurrences flagged `hidden_from_lists`.
    pub hide_hidden: bool,
    /// Drop cancelled occurrences. Off by default: cancellation is usually
    /// shown, not filtered.
    pub exclude_cancelled: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            hide_hidden: true,
            exclude_cancelled: false,
        }
    }
}

impl ReconcileOptions {
    pub fn with_hidden(hide_hidden: bool) -> Self {
        ReconcileOptions {
            hide_hidden,
            ..Self::default()
        }
    }

    /// Whether `occ` survives these filters.
    pub fn admits(&self, occ: &Occurrence) -> bool {
        !(self.hide_hidden && occ.hidden_from_lists) && !(self.exclude_cancelled && occ.cancelled)
    }
}

/// Lookup from unvaried timespan to the exception that overrides it.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceReplacer {
    lookup: HashMap<TimeSpan, Occurrence>,
}

impl OccurrenceReplacer {
    /// Fails if two exceptions share an unvaried timespan, or if an exception
    /// belongs to another generator.
    pub fn new(
        generator: &GeneratorId,
        exceptions: impl IntoIterator<Item = Occurrence>,
    ) -> OccurrentResult<Self> {
        let mut lookup = HashMap::new();

        for occ in exceptions {
            if &occ.generator != generator {
                return Err(OccurrentError::ExceptionOwnership {
                    exception: occ.id.unwrap_or_default(),
                    generator: generator.to_string(),
                });
            }
            let key = occ.unvaried;
            if lookup.insert(key, occ).is_some() {
                return Err(OccurrentError::AmbiguousException {
                    generator: generator.to_string(),
                    timespan: key,
                });
            }
        }

        Ok(OccurrenceReplacer { lookup })
    }

    /// The exception for this occurrence's unvaried timing, or the occurrence itself.
    pub fn get_occurrence(&self, occ: Occurrence) -> Occurrence {
        match self.lookup.get(&occ.unvaried) {
            Some(exception) => exception.clone(),
            None => occ,
        }
    }

    pub fn has_occurrence(&self, unvaried: &TimeSpan) -> bool {
        self.lookup.contains_key(unvaried)
    }

    /// Exceptions not matched by generation (`matched` holds the unvaried
    /// keys that were) whose varied start lies inside `window`.
    pub fn moved_into<'a>(
        &'a self,
        window: &'a QueryWindow,
        matched: &'a HashSet<TimeSpan>,
    ) -> impl Iterator<Item = &'a Occurrence> + 'a {
        self.lookup.values().filter(move |occ| {
            !matched.contains(&occ.unvaried) && window.contains(occ.varied.start_datetime())
        })
    }

    /// All exceptions, sorted.
    pub fn exceptions(&self) -> Vec<&Occurrence> {
        let mut all: Vec<_> = self.lookup.values().collect();
        all.sort();
        all
    }
}

/// Produces the effective occurrences of one generator.
pub struct OccurrenceReconciler<'a> {
    generator: &'a Generator,
    replacer: OccurrenceReplacer,
}

impl<'a> OccurrenceReconciler<'a> {
    pub fn new(
        generator: &'a Generator,
        exceptions: impl IntoIterator<Item = Occurrence>,
    ) -> OccurrentResult<Self> {
        let replacer = OccurrenceReplacer::new(&generator.id, exceptions)?;
        Ok(OccurrenceReconciler {
            generator,
            replacer,
        })
    }

    /// Effective occurrences whose varied start lies in `window`, sorted.
    pub fn between(
        &self,
        window: &QueryWindow,
        options: ReconcileOptions,
    ) -> OccurrentResult<Vec<Occurrence>> {
        let mut matched: HashSet<TimeSpan> = HashSet::new();
        let mut occurrences = Vec::new();

        for raw in self.generator.raw_occurrences_in(window)? {
            if self.replacer.has_occurrence(&raw.unvaried) {
                matched.insert(raw.unvaried);
            }
            let occ = self.replacer.get_occurrence(raw);
            if window.contains(occ.varied.start_datetime()) && options.admits(&occ) {
                occurrences.push(occ);
            }
        }

        let before = occurrences.len();
        occurrences.extend(
            self.replacer
                .moved_into(window, &matched)
                .filter(|occ| options.admits(occ))
                .cloned(),
        );

        tracing::debug!(
            generator = %self.generator.id,
            total = occurrences.len(),
            moved_in = occurrences.len() - before,
            "Reconciled occurrences"
        );

        occurrences.sort();
        Ok(occurrences)
    }

    /// Effective occurrences ending after `after`, replaced lazily.
    ///
    /// Only replacement is applied here: exceptions moved in from before
    /// `after` are not added.
    pub fn into_after(
        self,
        after: NaiveDateTime,
        bound: ConsumptionBound,
    ) -> OccurrentResult<ReconciledAfter> {
        Ok(ReconciledAfter {
            raw: self.generator.raw_occurrences_after(after, bound)?,
            replacer: self.replacer,
        })
    }

    /// The first occurrence, with its exception applied if one exists.
    pub fn first_occurrence(&self) -> Occurrence {
        self.replacer.get_occurrence(Occurrence::generated(
            self.generator.id.clone(),
            self.generator.timespan,
        ))
    }

    /// Persisted exceptions only.
    pub fn exceptional_occurrences(&self, exclude_hidden: bool) -> Vec<&Occurrence> {
        self.replacer
            .exceptions()
            .into_iter()
            .filter(|occ| !(exclude_hidden && occ.hidden_from_lists))
            .collect()
    }
}

/// Lazy reconciled counterpart of [`OccurrencesAfter`].
pub struct ReconciledAfter {
    raw: OccurrencesAfter,
    replacer: OccurrenceReplacer,
}

impl Iterator for ReconciledAfter {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        let occ = self.raw.next()?;
        Some(self.replacer.get_occurrence(occ))
    }
}
