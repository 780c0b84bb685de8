//! The periodic jobs themselves

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveTime};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::AppCache;
use crate::config::SchedulerConfig;
use crate::entity::maintenance_activity::{self, ActivityStatus};
use crate::entity::{calendar_event, equipment, event_comment, now_ts, user};
use crate::service::notify::{self, Notifier};
use crate::service::{activity, date_time_ts, schedule, settings, today, ts_to_datetime};

/// Everything a job needs to run
#[derive(Clone)]
pub struct JobContext {
    pub db: DatabaseConnection,
    pub cache: AppCache,
    pub notifier: Arc<dyn Notifier>,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    GenerateScheduledMaintenance,
    SendMaintenanceReminders,
    CheckOverdueMaintenance,
    SendEventReminders,
    GenerateMaintenanceEvents,
    CleanupOldEvents,
}

impl JobKind {
    pub const ALL: [JobKind; 6] = [
        JobKind::GenerateScheduledMaintenance,
        JobKind::SendMaintenanceReminders,
        JobKind::CheckOverdueMaintenance,
        JobKind::SendEventReminders,
        JobKind::GenerateMaintenanceEvents,
        JobKind::CleanupOldEvents,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::GenerateScheduledMaintenance => "generate_scheduled_maintenance",
            JobKind::SendMaintenanceReminders => "send_maintenance_reminders",
            JobKind::CheckOverdueMaintenance => "check_overdue_maintenance",
            JobKind::SendEventReminders => "send_event_reminders",
            JobKind::GenerateMaintenanceEvents => "generate_maintenance_events",
            JobKind::CleanupOldEvents => "cleanup_old_events",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn interval(&self, config: &SchedulerConfig) -> Duration {
        let secs = match self {
            JobKind::GenerateScheduledMaintenance => config.generate_interval_secs,
            JobKind::SendMaintenanceReminders | JobKind::SendEventReminders => config.reminder_interval_secs,
            JobKind::CheckOverdueMaintenance => config.overdue_interval_secs,
            JobKind::GenerateMaintenanceEvents => config.event_generation_interval_secs,
            JobKind::CleanupOldEvents => config.cleanup_interval_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Run one job, logging its start and outcome
pub async fn run(kind: JobKind, ctx: &JobContext) -> Result<String> {
    tracing::info!("Job {} started", kind.name());
    let result = match kind {
        JobKind::GenerateScheduledMaintenance => generate_scheduled_maintenance(ctx).await,
        JobKind::SendMaintenanceReminders => send_maintenance_reminders(ctx).await,
        JobKind::CheckOverdueMaintenance => check_overdue_maintenance(ctx, now_ts()).await,
        JobKind::SendEventReminders => send_event_reminders(ctx).await,
        JobKind::GenerateMaintenanceEvents => generate_maintenance_events(ctx).await,
        JobKind::CleanupOldEvents => cleanup_old_events(ctx).await,
    };
    match &result {
        Ok(message) => tracing::info!("Job {} finished: {}", kind.name(), message),
        Err(e) => tracing::error!("Job {} failed: {:#}", kind.name(), e),
    }
    result
}

async fn generate_scheduled_maintenance(ctx: &JobContext) -> Result<String> {
    let summary = schedule::generate_all(&ctx.db, today())
        .await
        .context("schedule generation failed")?;
    if summary.generated > 0 {
        ctx.cache.invalidate_dashboards().await;
    }
    Ok(format!("Generated {} activities", summary.generated))
}

/// Emails of active users, by id
async fn user_emails(db: &DatabaseConnection, ids: Vec<i64>) -> Result<HashMap<i64, String>> {
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .filter(user::Column::IsActive.eq(true))
        .all(db)
        .await?
        .into_iter()
        .filter_map(|u| {
            u.email
                .filter(|e| !e.trim().is_empty())
                .map(|e| (u.id, e))
        })
        .collect())
}

async fn equipment_names(db: &DatabaseConnection, ids: Vec<i64>) -> Result<HashMap<i64, String>> {
    Ok(equipment::Entity::find()
        .filter(equipment::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|e| (e.id, e.name))
        .collect())
}

async fn send_maintenance_reminders(ctx: &JobContext) -> Result<String> {
    let tomorrow = today() + ChronoDuration::days(1);
    let from = date_time_ts(tomorrow, NaiveTime::MIN);
    let to = from + 86_400;

    let activities = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::ScheduledStart.gte(from))
        .filter(maintenance_activity::Column::ScheduledStart.lt(to))
        .filter(maintenance_activity::Column::Status.eq(ActivityStatus::Scheduled.as_str()))
        .filter(maintenance_activity::Column::AssignedTo.is_not_null())
        .all(&ctx.db)
        .await?;
    if activities.is_empty() {
        return Ok("Sent 0 reminders".to_string());
    }

    let emails = user_emails(&ctx.db, activities.iter().filter_map(|a| a.assigned_to).collect()).await?;
    let names = equipment_names(&ctx.db, activities.iter().map(|a| a.equipment_id).collect()).await?;
    let site_name = settings::branding(&ctx.db).await?.site_name;

    let mut sent = 0;
    for a in &activities {
        let Some(to) = a.assigned_to.and_then(|id| emails.get(&id)) else {
            continue;
        };
        let start = ts_to_datetime(a.scheduled_start).format("%Y-%m-%d %H:%M").to_string();
        let equipment = names.get(&a.equipment_id).map(String::as_str).unwrap_or("");
        let mail = notify::maintenance_reminder(to, &a.title, equipment, &start, &site_name);
        match ctx.notifier.send(mail).await {
            Ok(()) => sent += 1,
            Err(e) => tracing::error!("Reminder for activity {} failed: {:#}", a.id, e),
        }
    }
    Ok(format!("Sent {} reminders", sent))
}

async fn check_overdue_maintenance(ctx: &JobContext, now: i64) -> Result<String> {
    let open = [
        ActivityStatus::Scheduled.as_str(),
        ActivityStatus::Pending.as_str(),
        ActivityStatus::InProgress.as_str(),
    ];
    let late = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::ScheduledEnd.lt(now))
        .filter(maintenance_activity::Column::Status.is_in(open))
        .all(&ctx.db)
        .await?;

    let to_mark: Vec<i64> = late
        .iter()
        .filter(|a| matches!(a.status(), ActivityStatus::Scheduled | ActivityStatus::Pending))
        .map(|a| a.id)
        .collect();
    if !to_mark.is_empty() {
        maintenance_activity::Entity::update_many()
            .col_expr(
                maintenance_activity::Column::Status,
                Expr::value(ActivityStatus::Overdue.as_str()),
            )
            .col_expr(maintenance_activity::Column::UpdatedAt, Expr::value(now))
            .filter(maintenance_activity::Column::Id.is_in(to_mark))
            .exec(&ctx.db)
            .await?;
    }

    if !late.is_empty() {
        tracing::warn!("{} maintenance activities are overdue", late.len());
        ctx.cache.invalidate_dashboards().await;
    }
    Ok(format!("Found {} overdue activities", late.len()))
}

async fn send_event_reminders(ctx: &JobContext) -> Result<String> {
    let tomorrow = today() + ChronoDuration::days(1);
    let events = calendar_event::Entity::find()
        .filter(calendar_event::Column::EventDate.eq(tomorrow))
        .filter(calendar_event::Column::IsCompleted.eq(false))
        .filter(calendar_event::Column::NotifyAssigned.eq(true))
        .filter(calendar_event::Column::NotificationSent.eq(false))
        .filter(calendar_event::Column::AssignedTo.is_not_null())
        .all(&ctx.db)
        .await?;
    if events.is_empty() {
        return Ok("Sent 0 event reminders".to_string());
    }

    let emails = user_emails(&ctx.db, events.iter().filter_map(|e| e.assigned_to).collect()).await?;
    let names = equipment_names(&ctx.db, events.iter().map(|e| e.equipment_id).collect()).await?;
    let site_name = settings::branding(&ctx.db).await?.site_name;
    let date = tomorrow.format("%Y-%m-%d").to_string();

    let mut sent = 0;
    for event in events {
        let Some(to) = event.assigned_to.and_then(|id| emails.get(&id)) else {
            continue;
        };
        let equipment = names.get(&event.equipment_id).map(String::as_str).unwrap_or("");
        let mail = notify::event_reminder(to, &event.title, equipment, &date, &site_name);
        if let Err(e) = ctx.notifier.send(mail).await {
            tracing::error!("Reminder for event {} failed: {:#}", event.id, e);
            continue;
        }
        let mut active: calendar_event::ActiveModel = event.into();
        active.notification_sent = Set(true);
        active.updated_at = Set(now_ts());
        active.update(&ctx.db).await?;
        sent += 1;
    }
    Ok(format!("Sent {} event reminders", sent))
}

async fn generate_maintenance_events(ctx: &JobContext) -> Result<String> {
    let scheduled = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::Status.eq(ActivityStatus::Scheduled.as_str()))
        .all(&ctx.db)
        .await?;

    let mut created = 0;
    for a in &scheduled {
        if activity::linked_event(&ctx.db, a.id).await?.is_some() {
            continue;
        }
        activity::sync_event(&ctx.db, a)
            .await
            .with_context(|| format!("event for activity {}", a.id))?;
        created += 1;
    }
    if created > 0 {
        ctx.cache.invalidate_dashboards().await;
    }
    Ok(format!("Created {} maintenance events", created))
}

async fn cleanup_old_events(ctx: &JobContext) -> Result<String> {
    let cutoff = today() - ChronoDuration::days(ctx.scheduler.cleanup_retention_days.max(0));
    let old: Vec<i64> = calendar_event::Entity::find()
        .filter(calendar_event::Column::IsCompleted.eq(true))
        .filter(calendar_event::Column::EventDate.lt(cutoff))
        .all(&ctx.db)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    if old.is_empty() {
        return Ok("Deleted 0 old events".to_string());
    }

    event_comment::Entity::delete_many()
        .filter(event_comment::Column::EventId.is_in(old.clone()))
        .exec(&ctx.db)
        .await?;
    let deleted = calendar_event::Entity::delete_many()
        .filter(calendar_event::Column::Id.is_in(old))
        .exec(&ctx.db)
        .await?;
    if deleted.rows_affected > 0 {
        ctx.cache.invalidate_dashboards().await;
    }
    Ok(format!("Deleted {} old events", deleted.rows_affected))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::db::connect_in_memory;
    use crate::permission::tests::insert_user;
    use crate::cache::dashboard_key;
    use crate::service::activity::tests::input;
    use crate::service::dashboard;
    use crate::service::default_start_time;
    use crate::service::equipment::tests::{insert_equipment, insert_type};
    use crate::service::event::{self, EventInput};
    use crate::service::notify::tests::MemoryNotifier;
    use sea_orm::PaginatorTrait;

    pub(crate) async fn context() -> (JobContext, Arc<MemoryNotifier>) {
        let db = connect_in_memory().await.unwrap();
        let notifier = Arc::new(MemoryNotifier::default());
        let ctx = JobContext {
            db,
            cache: AppCache::new(&CacheConfig::default()),
            notifier: notifier.clone(),
            scheduler: SchedulerConfig::default(),
        };
        (ctx, notifier)
    }

    fn event_input(equipment_id: i64, date: chrono::NaiveDate, assigned_to: Option<i64>) -> EventInput {
        EventInput {
            title: "Walkdown".to_string(),
            description: String::new(),
            event_type: "inspection".to_string(),
            equipment_id,
            event_date: date,
            start_time: None,
            end_time: None,
            all_day: true,
            priority: None,
            is_recurring: false,
            recurrence_pattern: None,
            assigned_to,
            notify_assigned: true,
            activity_type_id: None,
        }
    }

    #[test]
    fn test_job_names() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(
            JobKind::CleanupOldEvents.interval(&SchedulerConfig::default()),
            Duration::from_secs(604_800)
        );
    }

    #[tokio::test]
    async fn test_maintenance_reminders_need_an_email() {
        let (ctx, notifier) = context().await;
        let tech = insert_user(&ctx.db, "tech", false).await;
        let eq = insert_equipment(&ctx.db, "TX-01", None).await;
        let ty = insert_type(&ctx.db, "Oil Test", 30).await;
        let start = date_time_ts(today() + ChronoDuration::days(1), default_start_time());

        let mut with_assignee = input(eq.id, ty.id, start);
        with_assignee.assigned_to = Some(tech.id);
        activity::create(&ctx.db, &with_assignee, None).await.unwrap();
        activity::create(&ctx.db, &input(eq.id, ty.id, start), None).await.unwrap();

        let result = run(JobKind::SendMaintenanceReminders, &ctx).await.unwrap();
        assert_eq!(result, "Sent 1 reminders");
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "tech@example.com");
    }

    #[tokio::test]
    async fn test_check_overdue_marks_scheduled_and_pending() {
        let (ctx, _) = context().await;
        let eq = insert_equipment(&ctx.db, "TX-01", None).await;
        let ty = insert_type(&ctx.db, "Oil Test", 30).await;
        let now = now_ts();
        let future = activity::create(&ctx.db, &input(eq.id, ty.id, now + 3600), None).await.unwrap();
        let started = activity::create(&ctx.db, &input(eq.id, ty.id, now + 7200), None).await.unwrap();
        activity::start(&ctx.db, started.clone()).await.unwrap();

        // Both windows have closed; only the in-progress one keeps its status.
        let later = now + 3 * 3600 + 1;
        let result = check_overdue_maintenance(&ctx, later).await.unwrap();
        assert_eq!(result, "Found 2 overdue activities");

        let reloaded = maintenance_activity::Entity::find_by_id(future.id)
            .one(&ctx.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.status(), ActivityStatus::Overdue);
        let reloaded = maintenance_activity::Entity::find_by_id(started.id)
            .one(&ctx.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.status(), ActivityStatus::InProgress);
    }

    #[tokio::test]
    async fn test_event_reminders_are_sent_once() {
        let (ctx, notifier) = context().await;
        let tech = insert_user(&ctx.db, "tech", false).await;
        let eq = insert_equipment(&ctx.db, "TX-01", None).await;
        let tomorrow = today() + ChronoDuration::days(1);
        event::create(&ctx.db, &event_input(eq.id, tomorrow, Some(tech.id)), None)
            .await
            .unwrap();
        event::create(&ctx.db, &event_input(eq.id, tomorrow, None), None)
            .await
            .unwrap();

        assert_eq!(
            run(JobKind::SendEventReminders, &ctx).await.unwrap(),
            "Sent 1 event reminders"
        );
        assert_eq!(
            run(JobKind::SendEventReminders, &ctx).await.unwrap(),
            "Sent 0 event reminders"
        );
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_missing_events() {
        let (ctx, _) = context().await;
        let eq = insert_equipment(&ctx.db, "TX-01", None).await;
        let ty = insert_type(&ctx.db, "Oil Test", 30).await;
        let a = activity::insert_unsynced(&ctx.db, &input(eq.id, ty.id, now_ts() + 86_400), None)
            .await
            .unwrap();
        assert!(activity::linked_event(&ctx.db, a.id).await.unwrap().is_none());

        assert_eq!(
            run(JobKind::GenerateMaintenanceEvents, &ctx).await.unwrap(),
            "Created 1 maintenance events"
        );
        assert!(activity::linked_event(&ctx.db, a.id).await.unwrap().is_some());
        assert_eq!(
            run(JobKind::GenerateMaintenanceEvents, &ctx).await.unwrap(),
            "Created 0 maintenance events"
        );
    }

    #[tokio::test]
    async fn test_event_jobs_refresh_dashboard() {
        let (ctx, _) = context().await;
        let eq = insert_equipment(&ctx.db, "TX-01", None).await;
        let ty = insert_type(&ctx.db, "Oil Test", 30).await;
        activity::insert_unsynced(&ctx.db, &input(eq.id, ty.id, now_ts() + 86_400), None)
            .await
            .unwrap();

        let before = dashboard::load(&ctx.db, &ctx.cache, 1, None, now_ts()).await.unwrap();
        assert_eq!(before.kpis.unwrap().upcoming_events, 0);

        run(JobKind::GenerateMaintenanceEvents, &ctx).await.unwrap();
        let after = dashboard::load(&ctx.db, &ctx.cache, 1, None, now_ts()).await.unwrap();
        assert_eq!(after.kpis.unwrap().upcoming_events, 1);

        // Nothing to delete leaves cached dashboards alone
        let key = dashboard_key(1, None);
        run(JobKind::CleanupOldEvents, &ctx).await.unwrap();
        assert!(ctx.cache.get::<serde_json::Value>(&key).await.unwrap().is_some());

        let old = event::create(
            &ctx.db,
            &event_input(eq.id, today() - ChronoDuration::days(400), None),
            None,
        )
        .await
        .unwrap();
        event::complete(&ctx.db, old, "").await.unwrap();
        ctx.cache.set(&key, &serde_json::json!({"stale": true})).await.unwrap();
        run(JobKind::CleanupOldEvents, &ctx).await.unwrap();
        assert!(ctx.cache.get::<serde_json::Value>(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_only_removes_old_completed_events() {
        let (ctx, _) = context().await;
        let admin = insert_user(&ctx.db, "admin", true).await;
        let eq = insert_equipment(&ctx.db, "TX-01", None).await;
        let old_date = today() - ChronoDuration::days(400);
        let old = event::create(&ctx.db, &event_input(eq.id, old_date, None), None)
            .await
            .unwrap();
        event::complete(&ctx.db, old.clone(), "done").await.unwrap();
        event::add_comment(&ctx.db, old.id, admin.id, "archived", false).await.unwrap();
        event::create(&ctx.db, &event_input(eq.id, old_date, None), None)
            .await
            .unwrap();

        assert_eq!(
            run(JobKind::CleanupOldEvents, &ctx).await.unwrap(),
            "Deleted 1 old events"
        );
        assert_eq!(calendar_event::Entity::find().count(&ctx.db).await.unwrap(), 1);
        assert_eq!(event_comment::Entity::find().count(&ctx.db).await.unwrap(), 0);
    }
}
