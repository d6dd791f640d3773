use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use bellwether_core::{Settings, SettingsError};

use crate::error::{JobError, SchedulerError};
use crate::job::{Job, JobDefinition, JobOutcome, JobStatus, RunRecord};
use crate::trigger::Trigger;

const MAX_TICK: Duration = Duration::from_secs(60);

/// Loop timing and the offset clock-time triggers are evaluated in.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the loop looks for due jobs. Clamped to at most 60 s.
    pub tick: Duration,
    /// Lateness beyond this is logged as drift.
    pub drift_tolerance: Duration,
    pub offset: FixedOffset,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            drift_tolerance: Duration::from_secs(60),
            offset: Utc.fix(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        Ok(Self {
            tick: Duration::from_millis(settings.scheduler.tick_millis),
            drift_tolerance: Duration::from_secs(settings.scheduler.drift_tolerance_secs),
            offset: settings.local_offset()?,
        })
    }

    fn effective_tick(&self) -> Duration {
        self.tick.clamp(Duration::from_millis(1), MAX_TICK)
    }
}

struct JobEntry {
    name: String,
    trigger: Trigger,
    enabled: bool,
    job: Arc<dyn Job>,
    next_run: Option<DateTime<Utc>>,
    last_outcome: JobOutcome,
    last_started: Option<DateTime<Utc>>,
    last_duration_ms: Option<u64>,
    in_flight: u32,
    runs: u64,
    failures: u64,
    skipped: u64,
}

struct Inner {
    config: SchedulerConfig,
    /// Registration order is status order.
    jobs: RwLock<Vec<JobEntry>>,
    shutdown: AtomicBool,
    wake: Notify,
}

/// Runs registered jobs at their trigger times.
///
/// Each handler invocation runs on its own tokio task, so a slow or failing
/// job never holds up another. Bookkeeping lives behind a `std::sync::RwLock`
/// that is never held across an `.await`.
pub struct Scheduler {
    inner: Arc<Inner>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                jobs: RwLock::new(Vec::new()),
                shutdown: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            loop_handle: Mutex::new(None),
        }
    }

    /// Add a job. A duplicate name fails and leaves the existing job untouched.
    pub fn register(&self, definition: JobDefinition) -> Result<(), SchedulerError> {
        let offset = self.inner.config.offset;
        let mut jobs = self.inner.jobs_mut();
        if jobs.iter().any(|j| j.name == definition.name) {
            return Err(SchedulerError::DuplicateJob(definition.name));
        }

        let next_run = if definition.enabled {
            definition.trigger.next_after(Utc::now(), offset)
        } else {
            None
        };
        info!(
            job = %definition.name,
            trigger = %definition.trigger,
            enabled = definition.enabled,
            next_run = ?next_run,
            "Registered job"
        );
        jobs.push(JobEntry {
            name: definition.name,
            trigger: definition.trigger,
            enabled: definition.enabled,
            job: definition.job,
            next_run,
            last_outcome: JobOutcome::NeverRun,
            last_started: None,
            last_duration_ms: None,
            in_flight: 0,
            runs: 0,
            failures: 0,
            skipped: 0,
        });
        Ok(())
    }

    /// Spawn the trigger loop. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut handle = self
            .loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if handle.is_some() {
            debug!("Scheduler already started");
            return;
        }
        self.inner.shutdown.store(false, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        *handle = Some(tokio::spawn(run_loop(inner)));
    }

    pub fn is_running(&self) -> bool {
        self.loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop triggering and wait for in-flight runs to finish.
    pub async fn stop(&self) {
        info!("Scheduler shutdown requested");
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();

        let handle = self
            .loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler loop ended abnormally");
            }
        }
    }

    /// Status of every job in registration order.
    pub fn status(&self) -> Vec<JobStatus> {
        let now = Utc::now();
        let offset = self.inner.config.offset;
        self.inner
            .jobs_ref()
            .iter()
            .map(|j| JobStatus {
                name: j.name.clone(),
                trigger: j.trigger.describe(),
                enabled: j.enabled,
                next_run: if j.enabled {
                    // A fire the loop has not picked up yet is reported as the following one.
                    j.next_run
                        .filter(|t| *t > now)
                        .or_else(|| j.trigger.next_after(now, offset))
                } else {
                    None
                },
                last_outcome: j.last_outcome.clone(),
                last_started: j.last_started,
                last_duration_ms: j.last_duration_ms,
                running: j.in_flight > 0,
                runs: j.runs,
                failures: j.failures,
                skipped: j.skipped,
            })
            .collect()
    }

    pub fn job_names(&self) -> Vec<String> {
        self.inner.jobs_ref().iter().map(|j| j.name.clone()).collect()
    }

    /// Run a job now, bypassing its trigger, and return the outcome.
    pub async fn run_now(&self, name: &str) -> Result<RunRecord, SchedulerError> {
        let job = {
            let mut jobs = self.inner.jobs_mut();
            let entry = jobs
                .iter_mut()
                .find(|j| j.name == name)
                .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
            entry.in_flight += 1;
            Arc::clone(&entry.job)
        };
        info!(job = name, "Manual run requested");
        Ok(self.inner.execute(name, job).await)
    }

    /// Enable or disable a job. Enabling recomputes its next fire from now.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), SchedulerError> {
        let offset = self.inner.config.offset;
        let mut jobs = self.inner.jobs_mut();
        let entry = jobs
            .iter_mut()
            .find(|j| j.name == name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
        entry.enabled = enabled;
        entry.next_run = if enabled {
            entry.trigger.next_after(Utc::now(), offset)
        } else {
            None
        };
        info!(job = name, enabled, "Job toggled");
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }
}

impl Inner {
    fn jobs_ref(&self) -> std::sync::RwLockReadGuard<'_, Vec<JobEntry>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn jobs_mut(&self) -> std::sync::RwLockWriteGuard<'_, Vec<JobEntry>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Jobs whose fire time has been reached. Each one is marked in flight and
    /// rescheduled from `now`, so missed fires collapse into this single run.
    fn collect_due(&self, now: DateTime<Utc>) -> Vec<(String, Arc<dyn Job>)> {
        let offset = self.config.offset;
        let tolerance = chrono::Duration::from_std(self.config.drift_tolerance)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let mut due = Vec::new();

        for entry in self.jobs_mut().iter_mut() {
            if !entry.enabled {
                continue;
            }
            let Some(scheduled) = entry.next_run else {
                continue;
            };
            if scheduled > now {
                continue;
            }

            let late = now - scheduled;
            if late > tolerance {
                warn!(
                    job = %entry.name,
                    scheduled = %scheduled,
                    drift_secs = late.num_seconds(),
                    "Job fired later than scheduled"
                );
            }
            entry.next_run = entry.trigger.next_after(now, offset);

            if entry.in_flight > 0 {
                entry.skipped += 1;
                warn!(job = %entry.name, "Previous run still in progress, skipping this fire");
                continue;
            }
            entry.in_flight += 1;
            due.push((entry.name.clone(), Arc::clone(&entry.job)));
        }
        due
    }

    /// Run one invocation that has already been marked in flight.
    async fn execute(&self, name: &str, job: Arc<dyn Job>) -> RunRecord {
        let started_at = Utc::now();
        let start = Instant::now();
        debug!(job = name, "Job started");

        let result = match AssertUnwindSafe(job.run()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(JobError::Panicked(panic_message(panic.as_ref()))),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(report) => {
                info!(
                    job = name,
                    duration_ms,
                    items = report.items_processed,
                    summary = %report.summary,
                    "Job completed"
                );
                JobOutcome::Success(report.summary)
            }
            Err(e) => {
                error!(
                    job = name,
                    started_at = %started_at,
                    duration_ms,
                    error = %e,
                    "Job failed"
                );
                JobOutcome::Failure(e.to_string())
            }
        };

        if let Some(entry) = self.jobs_mut().iter_mut().find(|j| j.name == name) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
            entry.runs += 1;
            if outcome.is_failure() {
                entry.failures += 1;
            }
            entry.last_outcome = outcome.clone();
            entry.last_started = Some(started_at);
            entry.last_duration_ms = Some(duration_ms);
        }

        RunRecord {
            job: name.to_string(),
            started_at,
            duration_ms,
            outcome,
        }
    }
}

async fn run_loop(inner: Arc<Inner>) {
    let tick = inner.config.effective_tick();
    info!(
        tick_ms = tick.as_millis() as u64,
        jobs = inner.jobs_ref().len(),
        "Scheduler starting"
    );

    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut handlers: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if inner.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                for (name, job) in inner.collect_due(Utc::now()) {
                    let inner = Arc::clone(&inner);
                    handlers.spawn(async move {
                        inner.execute(&name, job).await;
                    });
                }
            }
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Job task aborted");
                }
            }
            _ = inner.wake.notified() => {
                if inner.shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    if !handlers.is_empty() {
        info!(in_flight = handlers.len(), "Waiting for running jobs to finish");
    }
    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Job task aborted");
        }
    }
    info!("Scheduler stopped");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
