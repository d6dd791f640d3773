use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{info, warn};

use bellwether_core::Task;
use bellwether_market::MarketDigest;
use bellwether_notify::{ChannelSelection, Notification, Urgency};
use bellwether_store::TaskStore;

use super::templates::{DAILY_SUMMARY_BODY, DAILY_SUMMARY_SUBJECT};
use super::{delivery_summary, JobContext};
use crate::error::JobError;
use crate::job::{Job, JobReport};

/// One task as shown in a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskLine {
    pub id: i64,
    pub title: String,
    pub priority: String,
    /// Pre-formatted due suffix, e.g. ` (due 14:00)`; empty when undated.
    pub when: String,
}

/// The task half of the daily summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskDigest {
    pub due_today: Vec<TaskLine>,
    /// Open tasks past due that are not already in `due_today`.
    pub overdue: Vec<TaskLine>,
    pub high_priority_open: usize,
}

impl TaskDigest {
    /// Query the store for the task section as seen at `now`.
    pub async fn collect(
        store: &dyn TaskStore,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<Self, JobError> {
        let local_now = now.with_timezone(&offset);
        let today = store.tasks_due_today(local_now).await?;
        let overdue = store.tasks_overdue(now).await?;
        let stats = store.task_stats(now).await?;

        let today_ids: HashSet<i64> = today.iter().map(|t| t.id).collect();
        Ok(Self {
            due_today: today
                .iter()
                .map(|t| task_line(t, offset, "%H:%M"))
                .collect(),
            overdue: overdue
                .iter()
                .filter(|t| !today_ids.contains(&t.id))
                .map(|t| task_line(t, offset, "%a %d %b %H:%M"))
                .collect(),
            high_priority_open: stats.high_priority_open,
        })
    }
}

fn task_line(task: &Task, offset: FixedOffset, due_format: &str) -> TaskLine {
    TaskLine {
        id: task.id,
        title: task.title.clone(),
        priority: task.priority.as_str().to_string(),
        when: task
            .due_at
            .map(|d| format!(" (due {})", d.with_timezone(&offset).format(due_format)))
            .unwrap_or_default(),
    }
}

#[derive(Serialize)]
struct SummaryView<'a> {
    date: String,
    demo: bool,
    market_unavailable: bool,
    market: &'a MarketDigest,
    tasks: &'a TaskDigest,
}

/// Morning digest: market overview plus today's and overdue tasks, sent once
/// to every channel.
pub struct DailySummaryJob {
    ctx: Arc<JobContext>,
}

impl DailySummaryJob {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    /// Build the summary message without sending it.
    pub async fn compose(&self, now: DateTime<Utc>) -> Result<(Notification, SummaryStats), JobError> {
        let ctx = &self.ctx;
        let (digest, tasks) = tokio::join!(
            ctx.market_digest(),
            TaskDigest::collect(ctx.store.as_ref(), now, ctx.offset)
        );
        let tasks = tasks?;

        if digest.is_unavailable() {
            warn!(failed = digest.failed.len(), "market data unavailable for daily summary");
        }

        let view = SummaryView {
            date: ctx.local(now).format("%a %d %b %Y").to_string(),
            demo: digest.is_demo(),
            market_unavailable: digest.is_unavailable(),
            market: &digest,
            tasks: &tasks,
        };
        let subject = ctx.renderer.render(DAILY_SUMMARY_SUBJECT, &view)?;
        let body = ctx.renderer.render(DAILY_SUMMARY_BODY, &view)?;

        let stats = SummaryStats {
            sentiment: digest.sentiment.to_string(),
            failed_symbols: digest.failed.iter().map(|f| f.symbol.clone()).collect(),
            due_today: tasks.due_today.len(),
            overdue: tasks.overdue.len(),
        };
        Ok((
            Notification::new(subject, body).with_urgency(Urgency::Normal),
            stats,
        ))
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobReport, JobError> {
        let (notification, stats) = self.compose(now).await?;
        let outcomes = self
            .ctx
            .dispatcher
            .send(&notification, &ChannelSelection::All)
            .await;

        info!(
            sentiment = %stats.sentiment,
            due_today = stats.due_today,
            overdue = stats.overdue,
            failed = stats.failed_symbols.len(),
            "daily summary dispatched"
        );

        let mut summary = format!(
            "sent to {}; sentiment {}; {} due today, {} overdue",
            delivery_summary(&outcomes),
            stats.sentiment,
            stats.due_today,
            stats.overdue
        );
        if !stats.failed_symbols.is_empty() {
            summary.push_str(&format!("; failed: {}", stats.failed_symbols.join(", ")));
        }
        Ok(JobReport::new(outcomes.len(), summary))
    }
}

/// Counts reported alongside a composed summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub sentiment: String,
    pub failed_symbols: Vec<String>,
    pub due_today: usize,
    pub overdue: usize,
}

#[async_trait::async_trait]
impl Job for DailySummaryJob {
    async fn run(&self) -> Result<JobReport, JobError> {
        self.run_at(Utc::now()).await
    }
}
