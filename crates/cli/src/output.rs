//! Plain-text rendering of command results.

use chrono::{DateTime, FixedOffset, Utc};

use bellwether_core::{Reminder, Task, TaskStats};
use bellwether_market::MarketDigest;
use bellwether_notify::DispatchOutcome;
use bellwether_scheduler::jobs::TaskDigest;
use bellwether_scheduler::{JobStatus, RunRecord};

const RULE: &str = "============================================================";

fn local(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string()
}

fn signed_pct(value: f64) -> String {
    format!("{value:+.2}%")
}

// ── Scheduler ─────────────────────────────────────────────────

pub fn job_status(statuses: &[JobStatus], offset: FixedOffset) -> String {
    let mut lines = vec!["Scheduled jobs".to_string(), RULE.to_string()];
    if statuses.is_empty() {
        lines.push("No jobs scheduled.".to_string());
    }
    for s in statuses {
        lines.push(String::new());
        let state = if s.enabled { "" } else { " (disabled)" };
        lines.push(format!("{}{}", s.name, state));
        lines.push(format!("  trigger:   {}", s.trigger));
        lines.push(format!(
            "  next run:  {}",
            s.next_run.map_or_else(|| "-".to_string(), |n| local(n, offset))
        ));
        lines.push(format!("  last run:  {}", s.last_outcome));
        if s.runs > 0 {
            lines.push(format!(
                "  runs:      {} ({} failed, {} skipped)",
                s.runs, s.failures, s.skipped
            ));
        }
    }
    lines.push(RULE.to_string());
    lines.join("\n")
}

pub fn run_record(record: &RunRecord) -> String {
    format!(
        "{} finished in {} ms: {}",
        record.job, record.duration_ms, record.outcome
    )
}

pub fn dispatch_outcomes(outcomes: &[DispatchOutcome]) -> String {
    if outcomes.is_empty() {
        return "No notification channels are enabled.".to_string();
    }
    outcomes
        .iter()
        .map(|o| match o.error() {
            None => format!("  {:<9} delivered ({} attempt(s))", o.channel, o.attempts),
            Some(reason) => format!("  {:<9} FAILED after {} attempt(s): {}", o.channel, o.attempts, reason),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Market ────────────────────────────────────────────────────

pub fn market_summary(digest: &MarketDigest, offset: FixedOffset) -> String {
    let demo = if digest.is_demo() { " (demo data)" } else { "" };
    let mut lines = vec![
        format!("Market summary at {}{}", local(digest.generated_at, offset), demo),
        RULE.to_string(),
    ];

    if digest.is_unavailable() {
        lines.push("Market data unavailable.".to_string());
    } else {
        lines.push(format!("Sentiment: {}", digest.sentiment.as_str().to_uppercase()));
        lines.push(String::new());
        for s in &digest.snapshots {
            lines.push(format!(
                "  {:<22} {:>12.2}  {:>+10.2}  {:>8}",
                s.name,
                s.current_price,
                s.change,
                signed_pct(s.change_percent)
            ));
        }
        if !digest.significant_moves.is_empty() {
            lines.push(String::new());
            lines.push("Significant moves:".to_string());
            for m in &digest.significant_moves {
                lines.push(format!("  {} {}", m.name, signed_pct(m.change_percent)));
            }
        }
        if !digest.category_trends.is_empty() {
            lines.push(String::new());
            lines.push("By category:".to_string());
            for t in &digest.category_trends {
                lines.push(format!(
                    "  {:<12} {} ({})",
                    t.label,
                    signed_pct(t.average_change_percent),
                    t.direction
                ));
            }
        }
        if !digest.sectors.is_empty() {
            lines.push(String::new());
            lines.push("Sectors, best to worst:".to_string());
            for m in &digest.sectors {
                lines.push(format!("  {:<22} {}", m.name, signed_pct(m.change_percent)));
            }
        }
    }

    if !digest.failed.is_empty() {
        lines.push(String::new());
        lines.push("Unavailable:".to_string());
        for f in &digest.failed {
            lines.push(format!("  {} ({}): {}", f.name, f.symbol, f.reason));
        }
    }
    lines.join("\n")
}

// ── Tasks & reminders ─────────────────────────────────────────

pub fn task_summary(digest: &TaskDigest, stats: &TaskStats) -> String {
    let mut lines = vec!["Task summary".to_string(), RULE.to_string()];

    lines.push(format!("Due today ({}):", digest.due_today.len()));
    if digest.due_today.is_empty() {
        lines.push("  nothing due today".to_string());
    }
    for t in &digest.due_today {
        lines.push(format!("  #{} [{}] {}{}", t.id, t.priority.to_uppercase(), t.title, t.when));
    }

    lines.push(format!("Overdue ({}):", digest.overdue.len()));
    if digest.overdue.is_empty() {
        lines.push("  nothing overdue".to_string());
    }
    for t in &digest.overdue {
        lines.push(format!("  #{} [{}] {}{}", t.id, t.priority.to_uppercase(), t.title, t.when));
    }

    lines.push(String::new());
    lines.push(format!(
        "Open: {}  High priority: {}  Completed: {}  Archived: {}",
        stats.open, stats.high_priority_open, stats.completed, stats.archived
    ));
    lines.join("\n")
}

pub fn task_list(tasks: &[Task], offset: FixedOffset, now: DateTime<Utc>) -> String {
    if tasks.is_empty() {
        return "No tasks.".to_string();
    }
    tasks
        .iter()
        .map(|t| {
            let mark = if t.completed { "x" } else { " " };
            let due = t
                .due_at
                .map(|d| format!("  due {}", local(d, offset)))
                .unwrap_or_default();
            let flag = if t.is_overdue(now) {
                "  OVERDUE"
            } else if t.is_archived() {
                "  archived"
            } else {
                ""
            };
            format!(
                "[{mark}] #{:<4} {:<6} {}{due}{flag}",
                t.id,
                t.priority.as_str(),
                t.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn reminder_list(reminders: &[Reminder], offset: FixedOffset) -> String {
    if reminders.is_empty() {
        return "No reminders.".to_string();
    }
    reminders
        .iter()
        .map(|r| {
            let repeat = r.recurrence.map_or("once", |rec| rec.as_str());
            let state = if r.active { "" } else { "  (done)" };
            format!(
                "#{:<4} {}  {:<7} {}{state}",
                r.id,
                local(r.trigger_at, offset),
                repeat,
                r.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bellwether_core::{IndexCategory, Priority, Recurrence};
    use bellwether_market::{summarize, DigestOptions, FailedSymbol, IndexSnapshot};
    use bellwether_scheduler::jobs::TaskLine;
    use bellwether_scheduler::JobOutcome;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        ist()
            .with_ymd_and_hms(2026, 3, 10, h, m, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn task(id: i64, title: &str, due: Option<DateTime<Utc>>) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: None,
            due_at: due,
            priority: Priority::Medium,
            completed: false,
            created_at: at(6, 0),
            completed_at: None,
            archived_at: None,
        }
    }

    #[test]
    fn job_status_shows_local_next_run_and_outcome() {
        let status = JobStatus {
            name: "daily_summary".to_string(),
            trigger: "daily at 07:00".to_string(),
            enabled: true,
            next_run: Some(at(7, 0)),
            last_outcome: JobOutcome::Failure("store error".to_string()),
            last_started: None,
            last_duration_ms: None,
            running: false,
            runs: 3,
            failures: 1,
            skipped: 0,
        };
        let text = job_status(&[status], ist());
        assert!(text.contains("daily_summary"));
        assert!(text.contains("next run:  2026-03-10 07:00"));
        assert!(text.contains("failed: store error"));
        assert!(text.contains("3 (1 failed, 0 skipped)"));
    }

    #[test]
    fn market_summary_lists_prices_and_failures() {
        let snapshots = vec![IndexSnapshot::new(
            "^NSEI",
            "NIFTY 50",
            IndexCategory::LargeCap,
            1012.0,
            1000.0,
            at(9, 30),
        )];
        let failed = vec![FailedSymbol {
            symbol: "^BSESN".to_string(),
            name: "BSE SENSEX".to_string(),
            reason: "timed out".to_string(),
        }];
        let opts = DigestOptions::default();
        let digest = summarize(snapshots, failed, &opts);

        let text = market_summary(&digest, ist());
        assert!(text.contains("NIFTY 50"), "{text}");
        assert!(text.contains("+1.20%"), "{text}");
        assert!(text.contains("BSE SENSEX (^BSESN): timed out"), "{text}");
        assert!(!text.contains("demo data"));
    }

    #[test]
    fn task_summary_marks_empty_sections() {
        let digest = TaskDigest {
            due_today: vec![TaskLine {
                id: 4,
                title: "File taxes".to_string(),
                priority: "high".to_string(),
                when: " (due 17:00)".to_string(),
            }],
            overdue: Vec::new(),
            high_priority_open: 1,
        };
        let stats = TaskStats {
            open: 1,
            high_priority_open: 1,
            ..Default::default()
        };
        let text = task_summary(&digest, &stats);
        assert!(text.contains("#4 [HIGH] File taxes (due 17:00)"), "{text}");
        assert!(text.contains("nothing overdue"));
        assert!(text.contains("Open: 1"));
    }

    #[test]
    fn task_list_flags_overdue_and_completed() {
        let mut done = task(2, "Buy milk", None);
        done.set_completed(true, at(8, 0));
        let tasks = vec![task(1, "Call bank", Some(at(7, 0))), done];

        let text = task_list(&tasks, ist(), at(9, 0));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("[ ] #1"));
        assert!(lines[0].ends_with("OVERDUE"));
        assert!(lines[1].starts_with("[x] #2"));
    }

    #[test]
    fn reminder_list_shows_recurrence() {
        let reminder = Reminder {
            id: 9,
            title: "Stand up".to_string(),
            description: None,
            trigger_at: at(10, 0),
            recurrence: Some(Recurrence::Daily),
            active: true,
            created_at: at(6, 0),
            last_fired_at: None,
        };
        let text = reminder_list(&[reminder], ist());
        assert!(text.contains("2026-03-10 10:00"));
        assert!(text.contains("daily"));
        assert!(text.contains("Stand up"));
    }

    #[test]
    fn no_channels_is_explained() {
        assert_eq!(dispatch_outcomes(&[]), "No notification channels are enabled.");
    }
}
