use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use bellwether_core::Reminder;
use bellwether_notify::{ChannelSelection, Notification, Urgency};

use super::templates::{REMINDER_BODY, REMINDER_SUBJECT};
use super::JobContext;
use crate::error::JobError;
use crate::job::{Job, JobReport};

#[derive(Serialize)]
struct ReminderView<'a> {
    title: &'a str,
    description: Option<&'a str>,
    scheduled: String,
    next: Option<String>,
}

/// Sends due reminders, then moves recurring ones forward and retires one-shots.
pub struct ReminderSweepJob {
    ctx: Arc<JobContext>,
}

impl ReminderSweepJob {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobReport, JobError> {
        let ctx = &self.ctx;
        let lead = Duration::minutes(i64::from(
            ctx.settings.reminders.advance_notification_minutes,
        ));
        let due = ctx.store.reminders_due_by(now + lead).await?;
        if due.is_empty() {
            debug!("no reminders due");
            return Ok(JobReport::new(0, "no reminders due"));
        }

        let mut delivered = 0;
        for reminder in &due {
            let next = reminder.next_trigger(now, ctx.offset);
            let notification = self.notification(reminder, next)?;
            let outcomes = ctx
                .dispatcher
                .send(&notification, &ChannelSelection::All)
                .await;
            if outcomes.iter().any(|o| o.is_delivered()) {
                delivered += 1;
            }

            ctx.store.mark_reminder_fired(reminder.id, now, next).await?;
            info!(
                reminder_id = reminder.id,
                title = %reminder.title,
                next = ?next,
                "reminder fired"
            );
        }

        Ok(JobReport::new(
            due.len(),
            format!("{} reminder(s) fired, {} delivered", due.len(), delivered),
        ))
    }

    fn notification(
        &self,
        reminder: &Reminder,
        next: Option<DateTime<Utc>>,
    ) -> Result<Notification, JobError> {
        let fmt = "%a %d %b %H:%M";
        let view = ReminderView {
            title: &reminder.title,
            description: reminder.description.as_deref(),
            scheduled: self.ctx.local(reminder.trigger_at).format(fmt).to_string(),
            next: next.map(|n| self.ctx.local(n).format(fmt).to_string()),
        };
        let renderer = &self.ctx.renderer;
        Ok(Notification::new(
            renderer.render(REMINDER_SUBJECT, &view)?,
            renderer.render(REMINDER_BODY, &view)?,
        )
        .with_urgency(Urgency::High))
    }
}

#[async_trait::async_trait]
impl Job for ReminderSweepJob {
    async fn run(&self) -> Result<JobReport, JobError> {
        self.run_at(Utc::now()).await
    }
}
