//! Time-triggered job orchestration for Bellwether.
//!
//! The [`Scheduler`] holds a table of named jobs, each with a [`Trigger`],
//! and runs every due job on its own tokio task. The `jobs` module builds the
//! standing job table (daily summary, market monitor, reminder sweep,
//! archival) from settings.

pub mod error;
pub mod job;
pub mod jobs;
pub mod runner;
pub mod trigger;

pub use error::{JobError, SchedulerError};
pub use job::{Job, JobDefinition, JobOutcome, JobReport, JobStatus, RunRecord};
pub use jobs::{standing_jobs, JobContext};
pub use runner::{Scheduler, SchedulerConfig};
pub use trigger::Trigger;
