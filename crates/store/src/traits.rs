use chrono::{DateTime, FixedOffset, Utc};

use bellwether_core::{
    NewReminder, NewTask, Priority, Reminder, ReminderId, ReminderUpdate, Task, TaskId, TaskStats,
    TaskUpdate,
};

use crate::error::StoreError;

/// Which tasks `list_tasks` returns. The default is open, unarchived tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub include_completed: bool,
    pub include_archived: bool,
    pub priority: Option<Priority>,
}

impl TaskFilter {
    pub fn all() -> Self {
        Self {
            include_completed: true,
            include_archived: true,
            priority: None,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        (self.include_completed || !task.completed)
            && (self.include_archived || !task.is_archived())
            && self.priority.map_or(true, |p| task.priority == p)
    }
}

/// Listing order shared by every store: earliest due first (undated last),
/// then higher priority, then oldest id.
pub fn listing_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    let due = |t: &Task| (t.due_at.is_none(), t.due_at);
    due(a)
        .cmp(&due(b))
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| a.id.cmp(&b.id))
}

/// Persistence for tasks and reminders.
///
/// Archived tasks are invisible to every query except `get_task`,
/// `list_tasks` with `include_archived` and `task_stats`.
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    // ── Tasks ─────────────────────────────────────────────────

    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError>;

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError>;

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, StoreError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError>;

    /// Mark a task completed at `at`. Completing a completed task keeps the original time.
    async fn complete_task(&self, id: TaskId, at: DateTime<Utc>) -> Result<Task, StoreError>;

    /// Clear completion and any archive mark.
    async fn reopen_task(&self, id: TaskId) -> Result<Task, StoreError>;

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    /// Open tasks due within the local calendar day containing `now`.
    async fn tasks_due_today(&self, now: DateTime<FixedOffset>) -> Result<Vec<Task>, StoreError>;

    /// Open tasks whose due time is before `now`.
    async fn tasks_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError>;

    async fn task_stats(&self, now: DateTime<Utc>) -> Result<TaskStats, StoreError>;

    /// Archive completed tasks whose completion is before `cutoff`; returns how many.
    ///
    /// Already archived tasks are left alone, so repeated calls are no-ops.
    async fn archive_completed_older_than(
        &self,
        cutoff: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    // ── Reminders ─────────────────────────────────────────────

    async fn create_reminder(&self, new: NewReminder) -> Result<Reminder, StoreError>;

    async fn get_reminder(&self, id: ReminderId) -> Result<Reminder, StoreError>;

    async fn update_reminder(
        &self,
        id: ReminderId,
        update: ReminderUpdate,
    ) -> Result<Reminder, StoreError>;

    async fn delete_reminder(&self, id: ReminderId) -> Result<(), StoreError>;

    async fn list_reminders(&self, active_only: bool) -> Result<Vec<Reminder>, StoreError>;

    /// Active reminders with a trigger time at or before `by`, earliest first.
    async fn reminders_due_by(&self, by: DateTime<Utc>) -> Result<Vec<Reminder>, StoreError>;

    /// Record a firing. `Some(next)` moves the trigger and keeps the reminder
    /// active; `None` deactivates it.
    async fn mark_reminder_fired(
        &self,
        id: ReminderId,
        fired_at: DateTime<Utc>,
        next_trigger: Option<DateTime<Utc>>,
    ) -> Result<Reminder, StoreError>;
}

pub(crate) fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Invalid("title must not be empty".to_string()));
    }
    Ok(())
}
