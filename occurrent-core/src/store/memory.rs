//! [`MemoryStore`], the in-process store behind the CLI and the tests.

use std::collections::BTreeMap;

use crate::error::{OccurrentError, OccurrentResult};
use crate::generator::{Generator, GeneratorId};
use crate::occurrence::{ExceptionId, Occurrence};
use crate::retime::RetimePlan;
use crate::store::{ExceptionStore, GeneratorStore};
use crate::timespan::TimeSpan;

/// In-memory store. Every write validates fully before it changes anything.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    generators: BTreeMap<GeneratorId, Generator>,
    exceptions: BTreeMap<ExceptionId, Occurrence>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    fn owned_by<'a>(&'a self, generator: &'a GeneratorId) -> impl Iterator<Item = &'a Occurrence> {
        self.exceptions
            .values()
            .filter(move |occ| &occ.generator == generator)
    }

    /// The id of another exception already keyed on `(generator, unvaried)`.
    fn key_holder(
        &self,
        generator: &GeneratorId,
        unvaried: &TimeSpan,
        except: Option<ExceptionId>,
    ) -> Option<ExceptionId> {
        self.owned_by(generator)
            .filter(|occ| &occ.unvaried == unvaried && occ.id != except)
            .find_map(|occ| occ.id)
    }

    fn ensure_unique_key(
        &self,
        occurrence: &Occurrence,
        except: Option<ExceptionId>,
    ) -> OccurrentResult<()> {
        match self.key_holder(&occurrence.generator, &occurrence.unvaried, except) {
            Some(_) => Err(OccurrentError::AmbiguousException {
                generator: occurrence.generator.to_string(),
                timespan: occurrence.unvaried,
            }),
            None => Ok(()),
        }
    }
}

impl ExceptionStore for MemoryStore {
    fn exceptions_for(&self, generator: &GeneratorId) -> OccurrentResult<Vec<Occurrence>> {
        let mut exceptions: Vec<_> = self.owned_by(generator).cloned().collect();
        exceptions.sort();
        Ok(exceptions)
    }

    fn find_exception(
        &self,
        generator: &GeneratorId,
        unvaried: &TimeSpan,
    ) -> OccurrentResult<Option<Occurrence>> {
        Ok(self
            .owned_by(generator)
            .find(|occ| &occ.unvaried == unvaried)
            .cloned())
    }

    fn insert_exception(&mut self, mut occurrence: Occurrence) -> OccurrentResult<ExceptionId> {
        if !self.generators.contains_key(&occurrence.generator) {
            return Err(OccurrentError::GeneratorNotFound(
                occurrence.generator.to_string(),
            ));
        }
        if !occurrence.is_exceptional() {
            return Err(OccurrentError::NotExceptional(occurrence.unvaried));
        }

        let id = occurrence.id.unwrap_or_default();
        if self.exceptions.contains_key(&id) {
            return Err(OccurrentError::DuplicateException(id));
        }
        self.ensure_unique_key(&occurrence, None)?;

        occurrence.id = Some(id);
        tracing::debug!(generator = %occurrence.generator, exception = %id, "Inserted exception");
        self.exceptions.insert(id, occurrence);
        Ok(id)
    }

    fn update_exception(&mut self, id: ExceptionId, mut occurrence: Occurrence) -> OccurrentResult<()> {
        let stored = self
            .exceptions
            .get(&id)
            .ok_or(OccurrentError::ExceptionNotFound(id))?;
        if stored.generator != occurrence.generator {
            return Err(OccurrentError::ExceptionOwnership {
                exception: id,
                generator: occurrence.generator.to_string(),
            });
        }
        self.ensure_unique_key(&occurrence, Some(id))?;

        if !occurrence.is_exceptional() {
            tracing::debug!(exception = %id, "Exception matches generated output, removing it");
            self.exceptions.remove(&id);
            return Ok(());
        }

        occurrence.id = Some(id);
        self.exceptions.insert(id, occurrence);
        Ok(())
    }

    fn delete_exception(&mut self, id: ExceptionId) -> OccurrentResult<Occurrence> {
        self.exceptions
            .remove(&id)
            .ok_or(OccurrentError::ExceptionNotFound(id))
    }
}

impl GeneratorStore for MemoryStore {
    fn generators(&self) -> OccurrentResult<Vec<Generator>> {
        Ok(self.generators.values().cloned().collect())
    }

    fn generator(&self, id: &GeneratorId) -> OccurrentResult<Option<Generator>> {
        Ok(self.generators.get(id).cloned())
    }

    fn save_generator(&mut self, generator: Generator) -> OccurrentResult<Option<RetimePlan>> {
        // A rule that cannot be built is rejected up front.
        generator.oracle()?;

        let plan = match self.generators.get(&generator.id) {
            Some(saved) if saved.timespan != generator.timespan => {
                let exceptions = self.exceptions_for(&generator.id)?;
                Some(RetimePlan::compute(
                    &generator.id,
                    &saved.timespan,
                    &generator.timespan,
                    &exceptions,
                )?)
            }
            _ => None,
        };

        // Everything is validated; commit exceptions first, then the generator.
        if let Some(plan) = &plan {
            for retimed in &plan.exceptions {
                if let Some(id) = retimed.after.id {
                    self.exceptions.insert(id, retimed.after.clone());
                }
            }
            for retimed in &plan.dropped {
                if let Some(id) = retimed.before.id {
                    self.exceptions.remove(&id);
                }
            }
            tracing::info!(
                generator = %generator.id,
                exceptions = plan.exceptions.len(),
                dropped = plan.dropped.len(),
                start_shift = %plan.shift.start_shift,
                end_shift = %plan.shift.end_shift,
                "Retimed exceptions for edited generator"
            );
        }

        self.generators.insert(generator.id.clone(), generator);
        Ok(plan)
    }

    fn delete_generator(&mut self, id: &GeneratorId) -> OccurrentResult<Generator> {
        let generator = self
            .generators
            .remove(id)
            .ok_or_else(|| OccurrentError::GeneratorNotFound(id.to_string()))?;

        let before = self.exceptions.len();
        self.exceptions.retain(|_, occ| &occ.generator != id);
        tracing::debug!(
            generator = %id,
            exceptions = before - self.exceptions.len(),
            "Deleted generator and its exceptions"
        );

        Ok(generator)
    }
}
