use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::JobError;
use crate::trigger::Trigger;

/// What a successful run reports back to the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobReport {
    /// Number of items the run acted on (messages sent, tasks archived, ...).
    pub items_processed: usize,
    /// One-line human-readable summary.
    pub summary: String,
}

impl JobReport {
    pub fn new(items_processed: usize, summary: impl Into<String>) -> Self {
        Self {
            items_processed,
            summary: summary.into(),
        }
    }
}

/// A unit of scheduled work.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> Result<JobReport, JobError>;
}

/// A named job with its trigger, as registered with the scheduler.
#[derive(Clone)]
pub struct JobDefinition {
    pub name: String,
    pub trigger: Trigger,
    pub enabled: bool,
    pub job: Arc<dyn Job>,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, trigger: Trigger, job: Arc<dyn Job>) -> Self {
        Self {
            name: name.into(),
            trigger,
            enabled: true,
            job,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDefinition")
            .field("name", &self.name)
            .field("trigger", &self.trigger.describe())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Result of the most recent run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum JobOutcome {
    #[default]
    NeverRun,
    Success(String),
    Failure(String),
}

impl JobOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failure(_))
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::NeverRun => f.write_str("never run"),
            JobOutcome::Success(summary) => write!(f, "ok: {summary}"),
            JobOutcome::Failure(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// One finished run, as returned by `Scheduler::run_now`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: JobOutcome,
}

/// Point-in-time view of one registered job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub trigger: String,
    pub enabled: bool,
    /// Strictly in the future for enabled jobs; `None` when disabled.
    pub next_run: Option<DateTime<Utc>>,
    pub last_outcome: JobOutcome,
    pub last_started: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub running: bool,
    pub runs: u64,
    pub failures: u64,
    /// Trigger fires dropped because the previous run was still going.
    pub skipped: u64,
}
