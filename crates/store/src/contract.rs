//! Behaviour every `TaskStore` must share. Each store's test module runs
//! these against its own instance.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

use bellwether_core::{
    NewReminder, NewTask, Priority, Recurrence, ReminderUpdate, TaskUpdate,
};

use crate::error::StoreError;
use crate::traits::{TaskFilter, TaskStore};

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn ist() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
}

pub(crate) async fn task_lifecycle(store: &dyn TaskStore) {
    let due = at(2026, 3, 10, 6, 0);
    let task = store
        .create_task(
            NewTask::new("renew passport")
                .due(due)
                .priority(Priority::High)
                .description("bring photos"),
        )
        .await
        .unwrap();
    assert!(task.id > 0);
    assert!(!task.completed);
    assert_eq!(task.due_at, Some(due));
    assert_eq!(task.description.as_deref(), Some("bring photos"));

    let updated = store
        .update_task(
            task.id,
            TaskUpdate {
                title: Some("renew passport (urgent)".into()),
                due_at: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "renew passport (urgent)");
    assert_eq!(updated.due_at, None);
    assert_eq!(updated.priority, Priority::High);

    let done_at = at(2026, 3, 9, 12, 0);
    let done = store.complete_task(task.id, done_at).await.unwrap();
    assert!(done.completed);
    assert_eq!(done.completed_at, Some(done_at));

    // Completing again keeps the first completion time.
    let again = store
        .complete_task(task.id, done_at + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(again.completed_at, Some(done_at));

    let reopened = store.reopen_task(task.id).await.unwrap();
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);

    store.delete_task(task.id).await.unwrap();
    assert!(matches!(
        store.get_task(task.id).await,
        Err(StoreError::NotFound { kind: "task", .. })
    ));

    assert!(matches!(
        store.create_task(NewTask::new("   ")).await,
        Err(StoreError::Invalid(_))
    ));
}

pub(crate) async fn due_today_and_overdue(store: &dyn TaskStore) {
    // 2026-03-10 09:00 IST == 03:30 UTC. The IST day spans 03-09 18:30 to 03-10 18:30 UTC.
    let now_utc = at(2026, 3, 10, 3, 30);
    let now_local = now_utc.with_timezone(&ist());

    let yesterday = store
        .create_task(NewTask::new("yesterday").due(at(2026, 3, 9, 10, 0)))
        .await
        .unwrap();
    let early_today = store
        .create_task(NewTask::new("early today").due(at(2026, 3, 9, 19, 0)))
        .await
        .unwrap();
    let later_today = store
        .create_task(
            NewTask::new("later today")
                .due(at(2026, 3, 10, 12, 0))
                .priority(Priority::High),
        )
        .await
        .unwrap();
    let tomorrow = store
        .create_task(NewTask::new("tomorrow").due(at(2026, 3, 10, 19, 0)))
        .await
        .unwrap();
    store.create_task(NewTask::new("someday")).await.unwrap();
    let finished = store
        .create_task(NewTask::new("finished").due(at(2026, 3, 10, 5, 0)))
        .await
        .unwrap();
    store.complete_task(finished.id, now_utc).await.unwrap();

    let today: Vec<_> = store
        .tasks_due_today(now_local)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(today, vec![early_today.id, later_today.id]);
    assert!(!today.contains(&tomorrow.id));

    let overdue: Vec<_> = store
        .tasks_overdue(now_utc)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(overdue, vec![yesterday.id, early_today.id]);

    let stats = store.task_stats(now_utc).await.unwrap();
    assert_eq!(stats.open, 5);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.high_priority_open, 1);
    assert_eq!(stats.overdue, 2);
    assert_eq!(stats.archived, 0);
}

pub(crate) async fn archival_is_idempotent(store: &dyn TaskStore) {
    let now = at(2026, 4, 30, 0, 0);
    let old = store.create_task(NewTask::new("old")).await.unwrap();
    let recent = store.create_task(NewTask::new("recent")).await.unwrap();
    let open = store.create_task(NewTask::new("open")).await.unwrap();
    store
        .complete_task(old.id, now - Duration::days(45))
        .await
        .unwrap();
    store
        .complete_task(recent.id, now - Duration::days(5))
        .await
        .unwrap();

    let cutoff = now - Duration::days(30);
    assert_eq!(
        store.archive_completed_older_than(cutoff, now).await.unwrap(),
        1
    );
    assert_eq!(
        store
            .archive_completed_older_than(cutoff, now + Duration::days(1))
            .await
            .unwrap(),
        0
    );

    let archived = store.get_task(old.id).await.unwrap();
    assert_eq!(archived.archived_at, Some(now));
    assert!(archived.completed);

    let visible: Vec<_> = store
        .list_tasks(&TaskFilter {
            include_completed: true,
            ..Default::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert!(!visible.contains(&old.id));
    assert!(visible.contains(&recent.id));
    assert!(visible.contains(&open.id));

    let all = store.list_tasks(&TaskFilter::all()).await.unwrap();
    assert_eq!(all.len(), 3);

    let stats = store.task_stats(now).await.unwrap();
    assert_eq!(stats.archived, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.open, 1);
}

pub(crate) async fn reminder_firing(store: &dyn TaskStore) {
    let now = at(2026, 5, 1, 9, 0);
    let one_shot = store
        .create_reminder(NewReminder::new("dentist", now - Duration::minutes(5)))
        .await
        .unwrap();
    let daily = store
        .create_reminder(
            NewReminder::new("stand-up", now - Duration::minutes(1)).repeating(Recurrence::Daily),
        )
        .await
        .unwrap();
    let future = store
        .create_reminder(NewReminder::new("later", now + Duration::hours(2)))
        .await
        .unwrap();
    assert!(one_shot.active);
    assert_eq!(daily.recurrence, Some(Recurrence::Daily));

    let due: Vec<_> = store
        .reminders_due_by(now)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(due, vec![one_shot.id, daily.id]);

    let fired = store.mark_reminder_fired(one_shot.id, now, None).await.unwrap();
    assert!(!fired.active);
    assert_eq!(fired.last_fired_at, Some(now));

    let next = daily.trigger_at + Duration::days(1);
    let moved = store
        .mark_reminder_fired(daily.id, now, Some(next))
        .await
        .unwrap();
    assert!(moved.active);
    assert_eq!(moved.trigger_at, next);

    assert!(store.reminders_due_by(now).await.unwrap().is_empty());
    assert_eq!(store.list_reminders(true).await.unwrap().len(), 2);
    assert_eq!(store.list_reminders(false).await.unwrap().len(), 3);

    let paused = store
        .update_reminder(
            future.id,
            ReminderUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!paused.active);
    assert!(store
        .reminders_due_by(now + Duration::days(1))
        .await
        .unwrap()
        .iter()
        .all(|r| r.id != future.id));

    store.delete_reminder(future.id).await.unwrap();
    assert_eq!(store.list_reminders(false).await.unwrap().len(), 2);
}

pub(crate) async fn listing_order_and_filters(store: &dyn TaskStore) {
    let due = at(2026, 6, 1, 8, 0);
    let undated = store.create_task(NewTask::new("undated")).await.unwrap();
    let later = store
        .create_task(NewTask::new("later").due(due + Duration::days(1)))
        .await
        .unwrap();
    let low = store
        .create_task(NewTask::new("low").due(due).priority(Priority::Low))
        .await
        .unwrap();
    let high = store
        .create_task(NewTask::new("high").due(due).priority(Priority::High))
        .await
        .unwrap();

    let ids: Vec<_> = store
        .list_tasks(&TaskFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![high.id, low.id, later.id, undated.id]);

    store.complete_task(low.id, due).await.unwrap();
    let open = store.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(open.len(), 3);
    assert!(open.iter().all(|t| !t.completed));

    let only_high = store
        .list_tasks(&TaskFilter {
            priority: Some(Priority::High),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(only_high.len(), 1);
    assert_eq!(only_high[0].id, high.id);
}

pub(crate) async fn missing_rows_are_not_found(store: &dyn TaskStore) {
    let now = at(2026, 1, 1, 0, 0);
    assert!(matches!(
        store.get_task(404).await,
        Err(StoreError::NotFound { kind: "task", id: 404 })
    ));
    assert!(matches!(
        store.complete_task(404, now).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.reopen_task(404).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.update_task(404, TaskUpdate::default()).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.delete_task(404).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.get_reminder(404).await,
        Err(StoreError::NotFound { kind: "reminder", .. })
    ));
    assert!(matches!(
        store.mark_reminder_fired(404, now, None).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.delete_reminder(404).await,
        Err(StoreError::NotFound { .. })
    ));
}
