//! Agent control flow
//!
//! [`Scheduler`] calls a [`CycleRunner`] at a fixed delay; the production
//! runner is the [`Orchestrator`], which per cycle:
//!
//! 1. checks for a newer agent build,
//! 2. lists the monitored products,
//! 3. for each product in order reconciles the local and catalog versions,
//!    then stages the latest patch if it is newer.

pub mod error;
pub mod orchestrator;
pub mod report;
pub mod scheduler;

pub use error::CycleError;
pub use orchestrator::Orchestrator;
pub use report::{CycleReport, ProductReport, UpdateOutcome};
pub use scheduler::{CycleRunner, Scheduler};
