//! The standing jobs and the services they share.

mod archival;
mod daily_summary;
mod market_monitor;
mod reminder_sweep;
pub mod templates;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};

use bellwether_core::{Settings, SettingsError};
use bellwether_market::{summarize, DigestOptions, MarketDigest, MarketProvider};
use bellwether_notify::{Dispatcher, DispatchOutcome, TemplateRenderer};
use bellwether_store::TaskStore;

use crate::error::SchedulerError;
use crate::job::JobDefinition;
use crate::trigger::Trigger;

pub use archival::ArchivalJob;
pub use daily_summary::{DailySummaryJob, SummaryStats, TaskDigest, TaskLine};
pub use market_monitor::MarketMonitorJob;
pub use reminder_sweep::ReminderSweepJob;

pub const DAILY_SUMMARY: &str = "daily_summary";
pub const MARKET_MONITOR: &str = "market_monitor";
pub const REMINDER_SWEEP: &str = "reminder_sweep";
pub const ARCHIVAL: &str = "archival";

/// Everything a handler needs: settings, data sources and the dispatcher.
pub struct JobContext {
    pub settings: Settings,
    pub offset: FixedOffset,
    pub market: Arc<MarketProvider>,
    pub dispatcher: Dispatcher,
    pub store: Arc<dyn TaskStore>,
    pub renderer: TemplateRenderer,
}

impl JobContext {
    pub fn new(
        settings: Settings,
        market: Arc<MarketProvider>,
        dispatcher: Dispatcher,
        store: Arc<dyn TaskStore>,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            offset: settings.local_offset()?,
            settings,
            market,
            dispatcher,
            store,
            renderer: TemplateRenderer::new(),
        })
    }

    /// Fetch the configured indices and sectors and build a digest.
    pub async fn market_digest(&self) -> MarketDigest {
        let market = &self.settings.market;
        let (indices, sectors) = tokio::join!(
            self.market.fetch_all(&market.indices),
            self.market.fetch_all(&market.sectors)
        );

        let mut failed = indices.failures;
        failed.extend(sectors.failures);
        let opts = DigestOptions::from_alerts(&market.alerts, market.top_movers);
        summarize(indices.snapshots, failed, &opts).with_sectors(&sectors.snapshots)
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }
}

/// Build the four standing jobs from settings.
pub fn standing_jobs(ctx: Arc<JobContext>) -> Result<Vec<JobDefinition>, SchedulerError> {
    let s = &ctx.settings;
    let invalid = |e: SettingsError| SchedulerError::InvalidTrigger(e.to_string());

    let summary = Trigger::daily(s.market.summary_clock().map_err(invalid)?);
    let monitor = Trigger::window(
        s.market.open_clock().map_err(invalid)?,
        s.market.close_clock().map_err(invalid)?,
        Duration::from_secs(u64::from(s.market.monitor_interval_minutes) * 60),
        s.market.trading_days.clone(),
    )?;
    let sweep = Trigger::interval(Duration::from_secs(s.reminders.check_interval_seconds))?;
    let archive = Trigger::daily(s.scheduler.archive_clock().map_err(invalid)?);

    Ok(vec![
        JobDefinition::new(
            DAILY_SUMMARY,
            summary,
            Arc::new(DailySummaryJob::new(Arc::clone(&ctx))),
        ),
        JobDefinition::new(
            MARKET_MONITOR,
            monitor,
            Arc::new(MarketMonitorJob::new(Arc::clone(&ctx))),
        ),
        JobDefinition::new(
            REMINDER_SWEEP,
            sweep,
            Arc::new(ReminderSweepJob::new(Arc::clone(&ctx))),
        ),
        JobDefinition::new(ARCHIVAL, archive, Arc::new(ArchivalJob::new(ctx))),
    ])
}

/// "2/3 channels" style delivery summary.
pub(crate) fn delivery_summary(outcomes: &[DispatchOutcome]) -> String {
    let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
    format!("{delivered}/{} channels", outcomes.len())
}
