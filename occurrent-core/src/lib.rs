//! Occurrence generation for recurring events.
//!
//! This crate computes the occurrences of events in a window from a compact
//! recurrence definition and overlays persisted exceptions on them:
//! - [`Generator`] produces the raw sequence from a [`TimeSpan`] and a [`Rule`]
//! - [`reconcile`] substitutes exceptions, keyed by their unvaried timing
//! - [`query`] answers calendar-wide questions against a [`store`]
//! - [`retime`] keeps exceptions attached when a generator's timing is edited

pub mod calendar_file;
pub mod config;
pub mod date_range;
pub mod error;
pub mod generator;
pub mod occurrence;
pub mod query;
pub mod reconcile;
pub mod retime;
pub mod rule;
pub mod store;
pub mod timespan;

pub use calendar_file::CalendarFile;
pub use config::OccurrentConfig;
pub use date_range::{DateRange, QueryWindow, WeekConfig};
pub use error::{OccurrentError, OccurrentResult};
pub use generator::{ConsumptionBound, EventId, Generator, GeneratorId};
pub use occurrence::{ExceptionId, Occurrence, Variation};
pub use reconcile::{OccurrenceReconciler, ReconcileOptions};
pub use retime::{RetimePlan, TimeShift};
pub use rule::{Frequency, RecurrenceOracle, Rule};
pub use store::{ExceptionStore, GeneratorStore, MemoryStore, SharedStore};
pub use timespan::TimeSpan;
