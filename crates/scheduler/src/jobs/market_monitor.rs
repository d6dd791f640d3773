use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use bellwether_market::{Direction, IndexSnapshot};
use bellwether_notify::{Channel, ChannelSelection, Notification, Urgency};

use super::templates::{
    LIVE_UPDATE_BODY, LIVE_UPDATE_SUBJECT, MARKET_ALERT_BODY, MARKET_ALERT_SUBJECT,
};
use super::JobContext;
use crate::error::JobError;
use crate::job::{Job, JobReport};

/// Moves this many times the alert threshold are sent as critical.
const CRITICAL_MULTIPLIER: f64 = 1.5;

#[derive(Serialize)]
struct AlertView<'a> {
    #[serde(flatten)]
    snapshot: &'a IndexSnapshot,
    direction: &'static str,
    threshold: f64,
}

#[derive(Serialize)]
struct LiveView<'a> {
    time: String,
    snapshots: &'a [IndexSnapshot],
}

/// Intraday check of the configured indices.
///
/// Each index whose move since the previous close exceeds the alert
/// threshold is reported once per direction per local day.
pub struct MarketMonitorJob {
    ctx: Arc<JobContext>,
    alerted: Mutex<HashSet<(String, Direction, NaiveDate)>>,
}

impl MarketMonitorJob {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self {
            ctx,
            alerted: Mutex::new(HashSet::new()),
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobReport, JobError> {
        let ctx = &self.ctx;
        let market = &ctx.settings.market;
        let threshold = market.alerts.significant_change_percent;
        let today = ctx.local(now).date_naive();

        let batch = ctx.market.fetch_all(&market.indices).await;
        for failure in &batch.failures {
            warn!(symbol = %failure.symbol, reason = %failure.reason, "index unavailable for monitor");
        }

        let mut alerts_sent = 0;
        for snapshot in &batch.snapshots {
            if snapshot.change_percent.abs() <= threshold {
                continue;
            }
            let direction = if snapshot.change_percent > 0.0 {
                Direction::Up
            } else {
                Direction::Down
            };
            let key = (snapshot.symbol.clone(), direction, today);
            if self.already_alerted(&key, today) {
                debug!(symbol = %snapshot.symbol, %direction, "alert already sent today");
                continue;
            }

            let notification = self.alert(snapshot, direction, threshold)?;
            let outcomes = ctx
                .dispatcher
                .send(&notification, &ChannelSelection::All)
                .await;
            info!(
                symbol = %snapshot.symbol,
                change_pct = snapshot.change_percent,
                urgency = notification.urgency.as_str(),
                "market alert dispatched"
            );

            // Retry next run if every channel failed.
            if outcomes.is_empty() || outcomes.iter().any(|o| o.is_delivered()) {
                self.alerted
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key);
            }
            alerts_sent += 1;
        }

        if market.live_updates
            && !batch.snapshots.is_empty()
            && ctx.dispatcher.has_channel(Channel::Desktop)
        {
            self.live_update(&batch.snapshots, now).await?;
        }

        let mut summary = format!(
            "checked {} of {} indices; {} alert(s)",
            batch.snapshots.len(),
            market.indices.len(),
            alerts_sent
        );
        if !batch.failures.is_empty() {
            let failed: Vec<String> = batch
                .failures
                .iter()
                .map(|f| format!("{} ({})", f.symbol, f.reason))
                .collect();
            summary.push_str(&format!("; failed: {}", failed.join(", ")));
        }
        Ok(JobReport::new(alerts_sent, summary))
    }

    /// Checks the de-dup set, dropping entries from previous days.
    fn already_alerted(&self, key: &(String, Direction, NaiveDate), today: NaiveDate) -> bool {
        let mut alerted = self.alerted.lock().unwrap_or_else(PoisonError::into_inner);
        alerted.retain(|(_, _, day)| *day == today);
        alerted.contains(key)
    }

    fn alert(
        &self,
        snapshot: &IndexSnapshot,
        direction: Direction,
        threshold: f64,
    ) -> Result<Notification, JobError> {
        let urgency = if snapshot.change_percent.abs() >= threshold * CRITICAL_MULTIPLIER {
            Urgency::Critical
        } else {
            Urgency::High
        };
        let view = AlertView {
            snapshot,
            direction: direction.as_str(),
            threshold,
        };
        let renderer = &self.ctx.renderer;
        Ok(Notification::new(
            renderer.render(MARKET_ALERT_SUBJECT, &view)?,
            renderer.render(MARKET_ALERT_BODY, &view)?,
        )
        .with_urgency(urgency))
    }

    async fn live_update(&self, snapshots: &[IndexSnapshot], now: DateTime<Utc>) -> Result<(), JobError> {
        let view = LiveView {
            time: self.ctx.local(now).format("%H:%M").to_string(),
            snapshots,
        };
        let renderer = &self.ctx.renderer;
        let notification = Notification::new(
            renderer.render(LIVE_UPDATE_SUBJECT, &view)?,
            renderer.render(LIVE_UPDATE_BODY, &view)?,
        )
        .with_urgency(Urgency::Low);
        self.ctx
            .dispatcher
            .send(&notification, &ChannelSelection::only(Channel::Desktop))
            .await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Job for MarketMonitorJob {
    async fn run(&self) -> Result<JobReport, JobError> {
        self.run_at(Utc::now()).await
    }
}
