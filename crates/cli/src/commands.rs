use anyhow::{bail, Context, Result};
use chrono::{NaiveTime, Utc};
use tracing::{info, warn};

use bellwether_core::{NewReminder, NewTask, Recurrence};
use bellwether_scheduler::jobs::TaskDigest;
use bellwether_scheduler::{JobOutcome, SchedulerError};
use bellwether_store::{TaskFilter, TaskStore};

use crate::app::App;
use crate::cli::{ReminderCommand, TaskCommand};
use crate::output;
use crate::when::parse_when;

/// Date-only due times mean end of that day.
const TASK_DEFAULT_TIME: (u32, u32) = (23, 59);
/// Date-only reminder times fire in the morning.
const REMINDER_DEFAULT_TIME: (u32, u32) = (9, 0);

fn clock((h, m): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

// ── Scheduler commands ────────────────────────────────────────

pub async fn daemon(app: &App, test: bool) -> Result<()> {
    info!("============================================================");
    info!("Starting {}", app.settings.app.name);
    info!("============================================================");
    app.settings.log_summary();

    let ctx = app.context().await?;
    let scheduler = app.scheduler(ctx.clone())?;
    scheduler.start();

    let statuses = scheduler.status();
    info!("Registered {} scheduled jobs:", statuses.len());
    for s in &statuses {
        info!(
            "  {} ({}), next run: {}",
            s.name,
            s.trigger,
            s.next_run
                .map(|n| ctx.local(n).to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    if test {
        info!("Sending test notification");
        let outcomes = ctx.dispatcher.send_test().await;
        println!("{}", output::dispatch_outcomes(&outcomes));
    }

    info!("Running. Press Ctrl+C to stop.");
    shutdown_signal().await?;
    info!("shutdown signal received");
    scheduler.stop().await;
    info!("{} exited cleanly", app.settings.app.name);
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("failed to register SIGTERM handler")?;
        tokio::select! {
            res = ctrl_c => res.context("failed to listen for ctrl_c")?,
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.context("failed to listen for ctrl_c")?;
    }

    Ok(())
}

pub async fn status(app: &App) -> Result<()> {
    let scheduler = app.scheduler(app.context().await?)?;
    println!("{}", output::job_status(&scheduler.status(), app.offset));
    Ok(())
}

pub async fn run_job(app: &App, name: &str) -> Result<()> {
    let scheduler = app.scheduler(app.context().await?)?;
    println!("Running job: {name}");
    let record = match scheduler.run_now(name).await {
        Ok(record) => record,
        Err(SchedulerError::UnknownJob(_)) => {
            bail!(
                "unknown job '{name}' (available: {})",
                scheduler.job_names().join(", ")
            )
        }
        Err(e) => return Err(e.into()),
    };
    println!("{}", output::run_record(&record));
    if let JobOutcome::Failure(reason) = &record.outcome {
        bail!("job {name} failed: {reason}");
    }
    Ok(())
}

// ── Summaries ─────────────────────────────────────────────────

pub async fn market_summary(app: &App) -> Result<()> {
    let ctx = app.context().await?;
    let digest = ctx.market_digest().await;
    if digest.is_unavailable() {
        warn!(failed = digest.failed.len(), "no market data could be fetched");
    }
    println!("{}", output::market_summary(&digest, app.offset));
    Ok(())
}

pub async fn task_summary(app: &App) -> Result<()> {
    let store = app.store().await?;
    let now = Utc::now();
    let digest = TaskDigest::collect(store.as_ref(), now, app.offset).await?;
    let stats = store.task_stats(now).await?;
    println!("{}", output::task_summary(&digest, &stats));
    Ok(())
}

pub async fn test_notify(app: &App) -> Result<()> {
    let ctx = app.context().await?;
    println!("Sending test notification...");
    let outcomes = ctx.dispatcher.send_test().await;
    println!("{}", output::dispatch_outcomes(&outcomes));
    if !outcomes.is_empty() && !outcomes.iter().any(|o| o.is_delivered()) {
        bail!("no channel delivered the test notification");
    }
    Ok(())
}

// ── Tasks ─────────────────────────────────────────────────────

pub async fn task(app: &App, command: TaskCommand) -> Result<()> {
    let store = app.store().await?;
    let now = Utc::now();

    match command {
        TaskCommand::Add {
            title,
            due,
            priority,
            description,
        } => {
            let mut new = NewTask::new(title)
                .priority(priority.unwrap_or(app.settings.tasks.default_priority));
            if let Some(due) = due {
                let local_now = now.with_timezone(&app.offset);
                new = new.due(parse_when(&due, local_now, clock(TASK_DEFAULT_TIME))?);
            }
            if let Some(description) = description {
                new = new.description(description);
            }
            let task = store.create_task(new).await?;
            info!(task_id = task.id, "task created");
            println!("Created task #{}: {}", task.id, task.title);
        }
        TaskCommand::List {
            all,
            archived,
            priority,
        } => {
            let filter = TaskFilter {
                include_completed: all || archived,
                include_archived: archived,
                priority,
            };
            let tasks = store.list_tasks(&filter).await?;
            println!("{}", output::task_list(&tasks, app.offset, now));
        }
        TaskCommand::Done { id } => {
            let task = store.complete_task(id, now).await?;
            println!("Completed task #{}: {}", task.id, task.title);
        }
        TaskCommand::Undo { id } => {
            let task = store.reopen_task(id).await?;
            println!("Reopened task #{}: {}", task.id, task.title);
        }
        TaskCommand::Rm { id } => {
            store.delete_task(id).await?;
            println!("Deleted task #{id}");
        }
    }
    Ok(())
}

// ── Reminders ─────────────────────────────────────────────────

pub async fn reminder(app: &App, command: ReminderCommand) -> Result<()> {
    let store = app.store().await?;

    match command {
        ReminderCommand::Add {
            title,
            at,
            repeat,
            description,
        } => {
            let local_now = Utc::now().with_timezone(&app.offset);
            let trigger_at = parse_when(&at, local_now, clock(REMINDER_DEFAULT_TIME))?;
            let mut new = NewReminder::new(title, trigger_at);
            if let Some(rec) = repeat
                .as_deref()
                .map(Recurrence::parse_optional)
                .transpose()?
                .flatten()
            {
                new = new.repeating(rec);
            }
            if let Some(description) = description {
                new = new.description(description);
            }
            let reminder = store.create_reminder(new).await?;
            info!(reminder_id = reminder.id, "reminder created");
            println!(
                "Created reminder #{} for {}",
                reminder.id,
                reminder.trigger_at.with_timezone(&app.offset).format("%Y-%m-%d %H:%M")
            );
        }
        ReminderCommand::List { all } => {
            let reminders = store.list_reminders(!all).await?;
            println!("{}", output::reminder_list(&reminders, app.offset));
        }
        ReminderCommand::Rm { id } => {
            store.delete_reminder(id).await?;
            println!("Deleted reminder #{id}");
        }
    }
    Ok(())
}
