use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseEnumError;

pub type TaskId = i64;
pub type ReminderId = i64;

// ── Priority ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "normal" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

// ── Recurrence ────────────────────────────────────────────────

/// How a reminder repeats after it fires. `None` on the reminder means one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    /// Parse an optional recurrence where `"none"` and the empty string mean one-shot.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, ParseEnumError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "once" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            _ => Err(ParseEnumError {
                kind: "recurrence",
                value: s.to_string(),
            }),
        }
    }
}

// ── Index category ────────────────────────────────────────────

/// Market-cap bucket of a monitored index, used for per-category trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexCategory {
    LargeCap,
    MidCap,
    SmallCap,
    Sector,
    Other,
}

impl Default for IndexCategory {
    fn default() -> Self {
        IndexCategory::Other
    }
}

impl fmt::Display for IndexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexCategory::LargeCap => "large-cap",
            IndexCategory::MidCap => "mid-cap",
            IndexCategory::SmallCap => "small-cap",
            IndexCategory::Sector => "sector",
            IndexCategory::Other => "other",
        };
        f.write_str(s)
    }
}

// ── Tasks ─────────────────────────────────────────────────────

/// A to-do item.
///
/// `completed_at` is `Some` exactly when `completed` is true. Archived tasks
/// keep their row but drop out of default listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Open task whose due time has already passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_at.is_some_and(|due| due < now)
    }

    /// Set or clear completion, keeping `completed_at` in step with the flag.
    pub fn set_completed(&mut self, completed: bool, at: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = if completed { Some(at) } else { None };
    }
}

/// Fields for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub priority: Priority,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn due(mut self, at: DateTime<Utc>) -> Self {
        self.due_at = Some(at);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update; `None` leaves a field untouched. `due_at: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
}

impl TaskUpdate {
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(due_at) = self.due_at {
            task.due_at = due_at;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
    }
}

/// Counters over the active (non-archived) task set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub open: usize,
    pub completed: usize,
    pub high_priority_open: usize,
    pub overdue: usize,
    pub archived: usize,
}

// ── Reminders ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    pub description: Option<String>,
    pub trigger_at: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_fired_at: Option<DateTime<Utc>>,
}

impl Reminder {
    pub fn is_due(&self, by: DateTime<Utc>) -> bool {
        self.active && self.trigger_at <= by
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReminder {
    pub title: String,
    pub description: Option<String>,
    pub trigger_at: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
}

impl NewReminder {
    pub fn new(title: impl Into<String>, trigger_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            trigger_at,
            recurrence: None,
        }
    }

    pub fn repeating(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub trigger_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Option<Recurrence>>,
    pub active: Option<bool>,
}

impl ReminderUpdate {
    pub fn apply(&self, reminder: &mut Reminder) {
        if let Some(title) = &self.title {
            reminder.title = title.clone();
        }
        if let Some(description) = &self.description {
            reminder.description = description.clone();
        }
        if let Some(trigger_at) = self.trigger_at {
            reminder.trigger_at = trigger_at;
        }
        if let Some(recurrence) = self.recurrence {
            reminder.recurrence = recurrence;
        }
        if let Some(active) = self.active {
            reminder.active = active;
        }
    }
}
