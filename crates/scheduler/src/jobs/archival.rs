use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::JobContext;
use crate::error::JobError;
use crate::job::{Job, JobReport};

/// Archives completed tasks past the retention window. Never deletes rows.
pub struct ArchivalJob {
    ctx: Arc<JobContext>,
}

impl ArchivalJob {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobReport, JobError> {
        let days = self.ctx.settings.tasks.auto_archive_completed_days;
        let cutoff = now - Duration::days(i64::from(days));
        let archived = self
            .ctx
            .store
            .archive_completed_older_than(cutoff, now)
            .await?;
        info!(archived, retention_days = days, "archival finished");
        Ok(JobReport::new(
            archived,
            format!("archived {archived} task(s) completed before {}", cutoff.format("%Y-%m-%d")),
        ))
    }
}

#[async_trait::async_trait]
impl Job for ArchivalJob {
    async fn run(&self) -> Result<JobReport, JobError> {
        self.run_at(Utc::now()).await
    }
}
