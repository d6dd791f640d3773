//! SQLite-backed store.
//!
//! Timestamps are stored as UTC epoch milliseconds so range queries compare
//! integers. Rows are read through `FromRow` structs and converted into the
//! core model types.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use bellwether_core::time::local_day_bounds;
use bellwether_core::{
    NewReminder, NewTask, Priority, Recurrence, Reminder, ReminderId, ReminderUpdate, Task, TaskId,
    TaskStats, TaskUpdate,
};

use crate::error::StoreError;
use crate::traits::{validate_title, TaskFilter, TaskStore};

const TASK_COLUMNS: &str =
    "id, title, description, due_at, priority, completed, created_at, completed_at, archived_at";
const REMINDER_COLUMNS: &str =
    "id, title, description, trigger_at, recurrence, active, created_at, last_fired_at";
const TASK_ORDER: &str = "ORDER BY due_at IS NULL, due_at, \
     CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, id";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite://data/bellwether.db`), creating the
    /// file and its parent directory if needed, then run migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Invalid(format!("{}: {e}", parent.display())))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Open a database file directly.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        Self::connect(&format!("sqlite://{}", path.display())).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("Database migrations applied successfully");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
        sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::task_not_found(id))?
            .try_into()
    }

    async fn fetch_reminder(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?");
        sqlx::query_as::<_, ReminderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::reminder_not_found(id))?
            .try_into()
    }

    async fn query_tasks(
        &self,
        where_clause: &str,
        binds: &[i64],
    ) -> Result<Vec<Task>, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE {where_clause} {TASK_ORDER}");
        let mut query = sqlx::query_as::<_, TaskRow>(&sql);
        for b in binds {
            query = query.bind(*b);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn write_task(&self, task: &Task) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE tasks
               SET title = ?, description = ?, due_at = ?, priority = ?,
                   completed = ?, completed_at = ?, archived_at = ?
               WHERE id = ?"#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_at.map(to_millis))
        .bind(task.priority.as_str())
        .bind(task.completed)
        .bind(task.completed_at.map(to_millis))
        .bind(task.archived_at.map(to_millis))
        .bind(task.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_reminder(&self, r: &Reminder) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE reminders
               SET title = ?, description = ?, trigger_at = ?, recurrence = ?,
                   active = ?, last_fired_at = ?
               WHERE id = ?"#,
        )
        .bind(&r.title)
        .bind(&r.description)
        .bind(to_millis(r.trigger_at))
        .bind(r.recurrence.map(|rec| rec.as_str()))
        .bind(r.active)
        .bind(r.last_fired_at.map(to_millis))
        .bind(r.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ── Rows ──────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    due_at: Option<i64>,
    priority: String,
    completed: bool,
    created_at: i64,
    completed_at: Option<i64>,
    archived_at: Option<i64>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            due_at: row.due_at.map(from_millis).transpose()?,
            priority: row
                .priority
                .parse::<Priority>()
                .map_err(|e| StoreError::Corrupt(format!("task {}: {e}", row.id)))?,
            completed: row.completed,
            created_at: from_millis(row.created_at)?,
            completed_at: row.completed_at.map(from_millis).transpose()?,
            archived_at: row.archived_at.map(from_millis).transpose()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReminderRow {
    id: i64,
    title: String,
    description: Option<String>,
    trigger_at: i64,
    recurrence: Option<String>,
    active: bool,
    created_at: i64,
    last_fired_at: Option<i64>,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = StoreError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let recurrence = match row.recurrence.as_deref() {
            None => None,
            Some(s) => Recurrence::parse_optional(s)
                .map_err(|e| StoreError::Corrupt(format!("reminder {}: {e}", row.id)))?,
        };
        Ok(Reminder {
            id: row.id,
            title: row.title,
            description: row.description,
            trigger_at: from_millis(row.trigger_at)?,
            recurrence,
            active: row.active,
            created_at: from_millis(row.created_at)?,
            last_fired_at: row.last_fired_at.map(from_millis).transpose()?,
        })
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {ms}")))
}

// ── TaskStore ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl TaskStore for SqliteStore {
    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        validate_title(&new.title)?;
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO tasks (title, description, due_at, priority, completed, created_at)
               VALUES (?, ?, ?, ?, 0, ?)
               RETURNING id"#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.due_at.map(to_millis))
        .bind(new.priority.as_str())
        .bind(to_millis(Utc::now()))
        .fetch_one(&self.pool)
        .await?;
        self.fetch_task(id).await
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.fetch_task(id).await
    }

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, StoreError> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        let mut task = self.fetch_task(id).await?;
        update.apply(&mut task);
        self.write_task(&task).await?;
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::task_not_found(id));
        }
        Ok(())
    }

    async fn complete_task(&self, id: TaskId, at: DateTime<Utc>) -> Result<Task, StoreError> {
        let result = sqlx::query(
            "UPDATE tasks SET completed = 1, completed_at = ? WHERE id = ? AND completed = 0",
        )
        .bind(to_millis(at))
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            // Either missing (NotFound) or already completed (unchanged).
            return self.fetch_task(id).await;
        }
        self.fetch_task(id).await
    }

    async fn reopen_task(&self, id: TaskId) -> Result<Task, StoreError> {
        sqlx::query(
            "UPDATE tasks SET completed = 0, completed_at = NULL, archived_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.fetch_task(id).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let mut clauses = vec!["1 = 1".to_string()];
        if !filter.include_completed {
            clauses.push("completed = 0".to_string());
        }
        if !filter.include_archived {
            clauses.push("archived_at IS NULL".to_string());
        }
        if let Some(p) = filter.priority {
            // Priority strings are a closed set, safe to inline.
            clauses.push(format!("priority = '{}'", p.as_str()));
        }
        self.query_tasks(&clauses.join(" AND "), &[]).await
    }

    async fn tasks_due_today(&self, now: DateTime<FixedOffset>) -> Result<Vec<Task>, StoreError> {
        let (start, end) = local_day_bounds(now);
        self.query_tasks(
            "completed = 0 AND archived_at IS NULL AND due_at >= ? AND due_at < ?",
            &[to_millis(start), to_millis(end)],
        )
        .await
    }

    async fn tasks_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
        self.query_tasks(
            "completed = 0 AND archived_at IS NULL AND due_at < ?",
            &[to_millis(now)],
        )
        .await
    }

    async fn task_stats(&self, now: DateTime<Utc>) -> Result<TaskStats, StoreError> {
        let (open, completed, high, overdue, archived): (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"SELECT
                 COALESCE(SUM(archived_at IS NULL AND completed = 0), 0),
                 COALESCE(SUM(archived_at IS NULL AND completed = 1), 0),
                 COALESCE(SUM(archived_at IS NULL AND completed = 0 AND priority = 'high'), 0),
                 COALESCE(SUM(archived_at IS NULL AND completed = 0 AND due_at < ?), 0),
                 COALESCE(SUM(archived_at IS NOT NULL), 0)
               FROM tasks"#,
        )
        .bind(to_millis(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(TaskStats {
            open: open as usize,
            completed: completed as usize,
            high_priority_open: high as usize,
            overdue: overdue as usize,
            archived: archived as usize,
        })
    }

    async fn archive_completed_older_than(
        &self,
        cutoff: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let result = sqlx::query(
            r#"UPDATE tasks SET archived_at = ?
               WHERE completed = 1 AND archived_at IS NULL AND completed_at < ?"#,
        )
        .bind(to_millis(archived_at))
        .bind(to_millis(cutoff))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn create_reminder(&self, new: NewReminder) -> Result<Reminder, StoreError> {
        validate_title(&new.title)?;
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO reminders (title, description, trigger_at, recurrence, active, created_at)
               VALUES (?, ?, ?, ?, 1, ?)
               RETURNING id"#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(to_millis(new.trigger_at))
        .bind(new.recurrence.map(|r| r.as_str()))
        .bind(to_millis(Utc::now()))
        .fetch_one(&self.pool)
        .await?;
        self.fetch_reminder(id).await
    }

    async fn get_reminder(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        self.fetch_reminder(id).await
    }

    async fn update_reminder(
        &self,
        id: ReminderId,
        update: ReminderUpdate,
    ) -> Result<Reminder, StoreError> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        let mut reminder = self.fetch_reminder(id).await?;
        update.apply(&mut reminder);
        self.write_reminder(&reminder).await?;
        Ok(reminder)
    }

    async fn delete_reminder(&self, id: ReminderId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::reminder_not_found(id));
        }
        Ok(())
    }

    async fn list_reminders(&self, active_only: bool) -> Result<Vec<Reminder>, StoreError> {
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE (? = 0 OR active = 1) ORDER BY trigger_at, id"
        );
        sqlx::query_as::<_, ReminderRow>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Reminder::try_from)
            .collect()
    }

    async fn reminders_due_by(&self, by: DateTime<Utc>) -> Result<Vec<Reminder>, StoreError> {
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE active = 1 AND trigger_at <= ? ORDER BY trigger_at, id"
        );
        sqlx::query_as::<_, ReminderRow>(&sql)
            .bind(to_millis(by))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Reminder::try_from)
            .collect()
    }

    async fn mark_reminder_fired(
        &self,
        id: ReminderId,
        fired_at: DateTime<Utc>,
        next_trigger: Option<DateTime<Utc>>,
    ) -> Result<Reminder, StoreError> {
        let mut reminder = self.fetch_reminder(id).await?;
        reminder.last_fired_at = Some(fired_at);
        match next_trigger {
            Some(next) => reminder.trigger_at = next,
            None => reminder.active = false,
        }
        self.write_reminder(&reminder).await?;
        Ok(reminder)
    }
}
