//! Reconciled queries against a store.

use chrono::NaiveDateTime;

use crate::date_range::QueryWindow;
use crate::error::OccurrentResult;
use crate::generator::{ConsumptionBound, Generator};
use crate::occurrence::Occurrence;
use crate::reconcile::{OccurrenceReconciler, ReconcileOptions, ReconciledAfter};
use crate::store::{ExceptionStore, GeneratorStore};

impl Generator {
    fn reconciler<S: ExceptionStore + ?Sized>(
        &self,
        store: &S,
    ) -> OccurrentResult<OccurrenceReconciler<'_>> {
        OccurrenceReconciler::new(self, store.exceptions_for(&self.id)?)
    }

    /// Effective occurrences of this generator in `window`, sorted.
    pub fn occurrences_between<S: ExceptionStore + ?Sized>(
        &self,
        store: &S,
        window: &QueryWindow,
        options: ReconcileOptions,
    ) -> OccurrentResult<Vec<Occurrence>> {
        self.reconciler(store)?.between(window, options)
    }

    /// Effective occurrences ending after `after`, walked lazily.
    pub fn occurrences_after<S: ExceptionStore + ?Sized>(
        &self,
        store: &S,
        after: NaiveDateTime,
        bound: ConsumptionBound,
    ) -> OccurrentResult<ReconciledAfter> {
        self.reconciler(store)?.into_after(after, bound)
    }

    pub fn first_occurrence<S: ExceptionStore + ?Sized>(
        &self,
        store: &S,
    ) -> OccurrentResult<Occurrence> {
        Ok(self.reconciler(store)?.first_occurrence())
    }

    pub fn exceptional_occurrences<S: ExceptionStore + ?Sized>(
        &self,
        store: &S,
        exclude_hidden: bool,
    ) -> OccurrentResult<Vec<Occurrence>> {
        Ok(self
            .reconciler(store)?
            .exceptional_occurrences(exclude_hidden)
            .into_iter()
            .cloned()
            .collect())
    }
}

/// Every effective occurrence in `window` across all generators, sorted.
pub fn occurrences_between<S: GeneratorStore + ?Sized>(
    store: &S,
    window: &QueryWindow,
    hide_hidden: bool,
) -> OccurrentResult<Vec<Occurrence>> {
    occurrences_between_with(store, window, ReconcileOptions::with_hidden(hide_hidden))
}

pub fn occurrences_between_with<S: GeneratorStore + ?Sized>(
    store: &S,
    window: &QueryWindow,
    options: ReconcileOptions,
) -> OccurrentResult<Vec<Occurrence>> {
    let candidates = store.candidates(window)?;
    tracing::debug!(
        start = %window.start,
        end = %window.end,
        candidates = candidates.len(),
        "Selected candidate generators"
    );

    let mut occurrences = Vec::new();
    for generator in &candidates {
        occurrences.extend(generator.occurrences_between(store, window, options)?);
    }

    occurrences.sort();
    Ok(occurrences)
}

/// The next `count` effective occurrences ending after `after`, across all
/// generators, sorted.
pub fn upcoming<S: GeneratorStore + ?Sized>(
    store: &S,
    after: NaiveDateTime,
    count: usize,
    options: ReconcileOptions,
) -> OccurrentResult<Vec<Occurrence>> {
    let mut occurrences = Vec::new();

    for generator in store.generators()? {
        occurrences.extend(upcoming_for(store, &generator, after, count, options)?);
    }

    occurrences.sort();
    occurrences.truncate(count);
    Ok(occurrences)
}

/// The next `count` effective occurrences of one generator.
pub fn upcoming_for<S: ExceptionStore + ?Sized>(
    store: &S,
    generator: &Generator,
    after: NaiveDateTime,
    count: usize,
    options: ReconcileOptions,
) -> OccurrentResult<Vec<Occurrence>> {
    // Filtered exceptions must not eat into the count.
    let slack = store.exceptions_for(&generator.id)?.len();
    let bound = ConsumptionBound::count(count.saturating_add(slack));

    let mut occurrences: Vec<_> = generator
        .occurrences_after(store, after, bound)?
        .filter(|occ| options.admits(occ))
        .take(count)
        .collect();
    occurrences.sort();
    Ok(occurrences)
}
