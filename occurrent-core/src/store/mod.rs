//! Persistence seams for generators and their exceptions.
//!
//! The engine never stores generated occurrences, only generators and the
//! sparse set of exceptions that override them. Writes take `&mut self`;
//! share a store between threads through [`SharedStore`].

mod memory;

pub use memory::MemoryStore;

use std::sync::RwLock;

use crate::date_range::QueryWindow;
use crate::error::OccurrentResult;
use crate::generator::{Generator, GeneratorId};
use crate::occurrence::{ExceptionId, Occurrence};
use crate::retime::RetimePlan;
use crate::timespan::TimeSpan;

/// A store behind a read/write lock. Readers see a generator edit either
/// entirely or not at all.
pub type SharedStore<S> = RwLock<S>;

/// CRUD over exception records, keyed by `(generator, unvaried timespan)`.
pub trait ExceptionStore {
    /// All exceptions of a generator, sorted.
    fn exceptions_for(&self, generator: &GeneratorId) -> OccurrentResult<Vec<Occurrence>>;

    /// The exception overriding the occurrence with this unvaried timing.
    fn find_exception(
        &self,
        generator: &GeneratorId,
        unvaried: &TimeSpan,
    ) -> OccurrentResult<Option<Occurrence>>;

    /// Persist a new exception and return its id.
    ///
    /// Fails with `AmbiguousException` if the generator already has an
    /// exception for the same unvaried timing, and with `NotExceptional` if
    /// the occurrence does not differ from generated output.
    fn insert_exception(&mut self, occurrence: Occurrence) -> OccurrentResult<ExceptionId>;

    /// Replace a stored exception. An update that makes it indistinguishable
    /// from generated output removes the record instead.
    fn update_exception(&mut self, id: ExceptionId, occurrence: Occurrence) -> OccurrentResult<()>;

    fn delete_exception(&mut self, id: ExceptionId) -> OccurrentResult<Occurrence>;
}

/// Generators, plus the exception store they own.
pub trait GeneratorStore: ExceptionStore {
    /// All generators, ordered by id.
    fn generators(&self) -> OccurrentResult<Vec<Generator>>;

    fn generator(&self, id: &GeneratorId) -> OccurrentResult<Option<Generator>>;

    /// Generators that could produce occurrences in `window`. May include
    /// generators that turn out to produce nothing.
    fn candidates(&self, window: &QueryWindow) -> OccurrentResult<Vec<Generator>> {
        Ok(self
            .generators()?
            .into_iter()
            .filter(|g| g.may_occur_in(window))
            .collect())
    }

    /// Insert or update a generator. When an existing generator's timespan
    /// changes, its exceptions are retimed and committed together with it;
    /// the plan that was applied is returned.
    fn save_generator(&mut self, generator: Generator) -> OccurrentResult<Option<RetimePlan>>;

    /// Remove a generator and every exception it owns.
    fn delete_generator(&mut self, id: &GeneratorId) -> OccurrentResult<Generator>;
}
