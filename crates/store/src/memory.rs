use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, FixedOffset, Utc};

use bellwether_core::time::local_day_bounds;
use bellwether_core::{
    NewReminder, NewTask, Priority, Reminder, ReminderId, ReminderUpdate, Task, TaskId, TaskStats,
    TaskUpdate,
};

use crate::error::StoreError;
use crate::traits::{listing_order, validate_title, TaskFilter, TaskStore};

#[derive(Default)]
struct MemoryState {
    tasks: BTreeMap<TaskId, Task>,
    reminders: BTreeMap<ReminderId, Reminder>,
    next_task_id: TaskId,
    next_reminder_id: ReminderId,
}

/// In-process store. Used by tests and `--demo` runs; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> Result<T, StoreError> {
        let guard = self
            .state
            .read()
            .map_err(|_| StoreError::Corrupt("memory store lock poisoned".to_string()))?;
        Ok(f(&guard))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| StoreError::Corrupt("memory store lock poisoned".to_string()))?;
        f(&mut guard)
    }

    fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by(listing_order);
        tasks
    }
}

fn active(task: &Task) -> bool {
    !task.completed && !task.is_archived()
}

#[async_trait::async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        validate_title(&new.title)?;
        self.write(|s| {
            s.next_task_id += 1;
            let task = Task {
                id: s.next_task_id,
                title: new.title,
                description: new.description,
                due_at: new.due_at,
                priority: new.priority,
                completed: false,
                created_at: Utc::now(),
                completed_at: None,
                archived_at: None,
            };
            s.tasks.insert(task.id, task.clone());
            Ok(task)
        })
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.read(|s| s.tasks.get(&id).cloned())?
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, StoreError> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        self.write(|s| {
            let task = s
                .tasks
                .get_mut(&id)
                .ok_or_else(|| StoreError::task_not_found(id))?;
            update.apply(task);
            Ok(task.clone())
        })
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        self.write(|s| {
            s.tasks
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| StoreError::task_not_found(id))
        })
    }

    async fn complete_task(&self, id: TaskId, at: DateTime<Utc>) -> Result<Task, StoreError> {
        self.write(|s| {
            let task = s
                .tasks
                .get_mut(&id)
                .ok_or_else(|| StoreError::task_not_found(id))?;
            if !task.completed {
                task.set_completed(true, at);
            }
            Ok(task.clone())
        })
    }

    async fn reopen_task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.write(|s| {
            let task = s
                .tasks
                .get_mut(&id)
                .ok_or_else(|| StoreError::task_not_found(id))?;
            task.set_completed(false, Utc::now());
            task.archived_at = None;
            Ok(task.clone())
        })
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let tasks = self.read(|s| {
            s.tasks
                .values()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect()
        })?;
        Ok(Self::sorted(tasks))
    }

    async fn tasks_due_today(&self, now: DateTime<FixedOffset>) -> Result<Vec<Task>, StoreError> {
        let (start, end) = local_day_bounds(now);
        let tasks = self.read(|s| {
            s.tasks
                .values()
                .filter(|t| active(t) && t.due_at.is_some_and(|d| d >= start && d < end))
                .cloned()
                .collect()
        })?;
        Ok(Self::sorted(tasks))
    }

    async fn tasks_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
        let tasks = self.read(|s| {
            s.tasks
                .values()
                .filter(|t| active(t) && t.due_at.is_some_and(|d| d < now))
                .cloned()
                .collect()
        })?;
        Ok(Self::sorted(tasks))
    }

    async fn task_stats(&self, now: DateTime<Utc>) -> Result<TaskStats, StoreError> {
        self.read(|s| {
            let mut stats = TaskStats::default();
            for t in s.tasks.values() {
                if t.is_archived() {
                    stats.archived += 1;
                } else if t.completed {
                    stats.completed += 1;
                } else {
                    stats.open += 1;
                    if t.priority == Priority::High {
                        stats.high_priority_open += 1;
                    }
                    if t.is_overdue(now) {
                        stats.overdue += 1;
                    }
                }
            }
            stats
        })
    }

    async fn archive_completed_older_than(
        &self,
        cutoff: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.write(|s| {
            let mut count = 0;
            for t in s.tasks.values_mut() {
                let eligible = !t.is_archived() && t.completed_at.is_some_and(|c| c < cutoff);
                if eligible {
                    t.archived_at = Some(archived_at);
                    count += 1;
                }
            }
            Ok(count)
        })
    }

    async fn create_reminder(&self, new: NewReminder) -> Result<Reminder, StoreError> {
        validate_title(&new.title)?;
        self.write(|s| {
            s.next_reminder_id += 1;
            let reminder = Reminder {
                id: s.next_reminder_id,
                title: new.title,
                description: new.description,
                trigger_at: new.trigger_at,
                recurrence: new.recurrence,
                active: true,
                created_at: Utc::now(),
                last_fired_at: None,
            };
            s.reminders.insert(reminder.id, reminder.clone());
            Ok(reminder)
        })
    }

    async fn get_reminder(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        self.read(|s| s.reminders.get(&id).cloned())?
            .ok_or_else(|| StoreError::reminder_not_found(id))
    }

    async fn update_reminder(
        &self,
        id: ReminderId,
        update: ReminderUpdate,
    ) -> Result<Reminder, StoreError> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        self.write(|s| {
            let reminder = s
                .reminders
                .get_mut(&id)
                .ok_or_else(|| StoreError::reminder_not_found(id))?;
            update.apply(reminder);
            Ok(reminder.clone())
        })
    }

    async fn delete_reminder(&self, id: ReminderId) -> Result<(), StoreError> {
        self.write(|s| {
            s.reminders
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| StoreError::reminder_not_found(id))
        })
    }

    async fn list_reminders(&self, active_only: bool) -> Result<Vec<Reminder>, StoreError> {
        let mut reminders: Vec<Reminder> = self.read(|s| {
            s.reminders
                .values()
                .filter(|r| !active_only || r.active)
                .cloned()
                .collect()
        })?;
        reminders.sort_by_key(|r| (r.trigger_at, r.id));
        Ok(reminders)
    }

    async fn reminders_due_by(&self, by: DateTime<Utc>) -> Result<Vec<Reminder>, StoreError> {
        let mut due: Vec<Reminder> = self.read(|s| {
            s.reminders
                .values()
                .filter(|r| r.is_due(by))
                .cloned()
                .collect()
        })?;
        due.sort_by_key(|r| (r.trigger_at, r.id));
        Ok(due)
    }

    async fn mark_reminder_fired(
        &self,
        id: ReminderId,
        fired_at: DateTime<Utc>,
        next_trigger: Option<DateTime<Utc>>,
    ) -> Result<Reminder, StoreError> {
        self.write(|s| {
            let reminder = s
                .reminders
                .get_mut(&id)
                .ok_or_else(|| StoreError::reminder_not_found(id))?;
            reminder.last_fired_at = Some(fired_at);
            match next_trigger {
                Some(next) => reminder.trigger_at = next,
                None => reminder.active = false,
            }
            Ok(reminder.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    #[tokio::test]
    async fn task_lifecycle() {
        contract::task_lifecycle(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn due_today_and_overdue() {
        contract::due_today_and_overdue(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn archival_is_idempotent() {
        contract::archival_is_idempotent(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn reminder_firing() {
        contract::reminder_firing(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn listing_order_and_filters() {
        contract::listing_order_and_filters(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        contract::missing_rows_are_not_found(&MemoryStore::new()).await;
    }
}
