//! Calendar events and the event side of activity sync

use chrono::{Duration, NaiveDate, NaiveTime};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};

use crate::entity::calendar_event::{self, EventType, RECURRENCE_PATTERNS};
use crate::entity::maintenance_activity::{self, ActivityStatus, Priority};
use crate::entity::{activity_type, equipment, event_comment, now_ts, user};
use crate::error::{AppError, AppResult};
use crate::service::activity::{self, ActivityInput};
use crate::service::{date_time_ts, default_start_time};

/// Fields accepted when creating or updating an event
#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    pub equipment_id: i64,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    #[serde(default = "default_true")]
    pub notify_assigned: bool,
    /// Activity type for the activity created alongside a maintenance event
    #[serde(default)]
    pub activity_type_id: Option<i64>,
}

fn default_event_type() -> String {
    EventType::Other.as_str().to_string()
}

fn default_true() -> bool {
    true
}

/// Event with its derived status
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: calendar_event::Model,
    pub status: String,
    pub is_overdue: bool,
    pub equipment_name: Option<String>,
}

/// Validated, normalized input
struct Normalized {
    event_type: EventType,
    priority: Priority,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    recurrence_pattern: Option<String>,
}

async fn check<C: ConnectionTrait>(db: &C, input: &EventInput) -> AppResult<Normalized> {
    if input.title.trim().is_empty() {
        return Err(AppError::validation("Event title is required"));
    }
    let event_type = EventType::parse(&input.event_type)
        .ok_or_else(|| AppError::validation(format!("Invalid event type: {}", input.event_type)))?;
    let priority = match input.priority.as_deref().filter(|p| !p.is_empty()) {
        Some(p) => Priority::parse(p).ok_or_else(|| AppError::validation(format!("Invalid priority: {}", p)))?,
        None => Priority::Medium,
    };

    let (start_time, end_time) = if input.all_day {
        (None, None)
    } else {
        (input.start_time, input.end_time)
    };
    if let (Some(start), Some(end)) = (start_time, end_time) {
        if start >= end {
            return Err(AppError::validation("Start time must be before end time"));
        }
    }

    let recurrence_pattern = if input.is_recurring {
        let pattern = input
            .recurrence_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("Recurring events need a recurrence pattern"))?;
        if !RECURRENCE_PATTERNS.contains(&pattern) {
            return Err(AppError::validation(format!("Invalid recurrence pattern: {}", pattern)));
        }
        Some(pattern.to_string())
    } else {
        None
    };

    if equipment::Entity::find_by_id(input.equipment_id).one(db).await?.is_none() {
        return Err(AppError::validation("Equipment does not exist"));
    }
    if let Some(user_id) = input.assigned_to {
        if user::Entity::find_by_id(user_id).one(db).await?.is_none() {
            return Err(AppError::validation("Assigned user does not exist"));
        }
    }

    Ok(Normalized {
        event_type,
        priority,
        start_time,
        end_time,
        recurrence_pattern,
    })
}

fn apply_input(active: &mut calendar_event::ActiveModel, input: &EventInput, n: Normalized, now: i64) {
    active.title = Set(input.title.trim().to_string());
    active.description = Set(input.description.clone());
    active.event_type = Set(n.event_type.as_str().to_string());
    active.equipment_id = Set(input.equipment_id);
    active.event_date = Set(input.event_date);
    active.start_time = Set(n.start_time);
    active.end_time = Set(n.end_time);
    active.all_day = Set(input.all_day);
    active.priority = Set(n.priority.as_str().to_string());
    active.is_recurring = Set(input.is_recurring);
    active.recurrence_pattern = Set(n.recurrence_pattern);
    active.assigned_to = Set(input.assigned_to);
    active.notify_assigned = Set(input.notify_assigned);
    active.updated_at = Set(now);
}

/// Create an event. A maintenance event without a linked activity gets
/// one, written in the same transaction.
pub async fn create<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    input: &EventInput,
    created_by: Option<i64>,
) -> AppResult<calendar_event::Model> {
    let normalized = check(db, input).await?;
    let is_maintenance = normalized.event_type == EventType::Maintenance;
    let priority = normalized.priority;
    let start_time = normalized.start_time;
    let end_time = normalized.end_time;
    let now = now_ts();

    let txn = db.begin().await?;
    let linked = if is_maintenance {
        Some(create_activity_for_event(&txn, input, priority, start_time, end_time, created_by).await?)
    } else {
        None
    };

    let mut active = calendar_event::ActiveModel {
        notification_sent: Set(false),
        is_completed: Set(false),
        completion_notes: Set(String::new()),
        maintenance_activity_id: Set(linked.as_ref().map(|a| a.id)),
        created_by: Set(created_by),
        created_at: Set(now),
        ..Default::default()
    };
    apply_input(&mut active, input, normalized, now);
    let created = active.insert(&txn).await?;
    txn.commit().await?;
    Ok(created)
}

async fn create_activity_for_event<C: ConnectionTrait>(
    db: &C,
    input: &EventInput,
    priority: Priority,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    created_by: Option<i64>,
) -> AppResult<maintenance_activity::Model> {
    let type_id = match input.activity_type_id {
        Some(id) => id,
        None => first_active_type(db)
            .await?
            .ok_or_else(|| AppError::validation("No active maintenance activity type is available"))?
            .id,
    };

    let start = date_time_ts(input.event_date, start_time.unwrap_or_else(default_start_time));
    let end = match end_time {
        Some(t) if start_time.is_some() => date_time_ts(input.event_date, t),
        _ => start + 2 * 3600,
    };

    let activity_input = ActivityInput {
        equipment_id: input.equipment_id,
        activity_type_id: type_id,
        title: input.title.trim().to_string(),
        description: input.description.clone(),
        status: Some(ActivityStatus::Scheduled.as_str().to_string()),
        priority: Some(priority.as_str().to_string()),
        scheduled_start: start,
        scheduled_end: end,
        actual_start: None,
        actual_end: None,
        assigned_to: input.assigned_to,
        required_status: String::new(),
        tools_required: String::new(),
        parts_required: String::new(),
        safety_notes: String::new(),
        completion_notes: String::new(),
    };
    activity::insert_unsynced(db, &activity_input, created_by).await
}

async fn first_active_type<C: ConnectionTrait>(db: &C) -> Result<Option<activity_type::Model>, sea_orm::DbErr> {
    use sea_orm::QueryOrder;
    activity_type::Entity::find()
        .filter(activity_type::Column::IsActive.eq(true))
        .order_by_asc(activity_type::Column::Id)
        .one(db)
        .await
}

pub async fn update<C: ConnectionTrait>(
    db: &C,
    existing: calendar_event::Model,
    input: &EventInput,
) -> AppResult<calendar_event::Model> {
    let normalized = check(db, input).await?;
    let mut active: calendar_event::ActiveModel = existing.into();
    apply_input(&mut active, input, normalized, now_ts());
    Ok(active.update(db).await?)
}

/// Close an event. A linked activity that is still open is completed too.
pub async fn complete<C: ConnectionTrait>(
    db: &C,
    event: calendar_event::Model,
    notes: &str,
) -> AppResult<calendar_event::Model> {
    if let Some(activity_id) = event.maintenance_activity_id {
        if let Some(linked) = maintenance_activity::Entity::find_by_id(activity_id).one(db).await? {
            if !linked.status().is_closed() {
                activity::complete(db, linked, notes).await?;
            }
        }
    }

    let event = calendar_event::Entity::find_by_id(event.id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    let mut active: calendar_event::ActiveModel = event.into();
    active.is_completed = Set(true);
    if !notes.trim().is_empty() {
        active.completion_notes = Set(notes.trim().to_string());
    }
    active.updated_at = Set(now_ts());
    Ok(active.update(db).await?)
}

/// Delete an event with its comments. A linked activity is kept.
pub async fn delete<C: ConnectionTrait>(db: &C, event_id: i64) -> AppResult<()> {
    event_comment::Entity::delete_many()
        .filter(event_comment::Column::EventId.eq(event_id))
        .exec(db)
        .await?;
    calendar_event::Entity::delete_by_id(event_id).exec(db).await?;
    Ok(())
}

/// Status shown for an event: the linked activity's status for
/// maintenance events, otherwise completed or scheduled
pub fn derived_status(event: &calendar_event::Model, linked: Option<&maintenance_activity::Model>) -> String {
    match linked {
        Some(a) if event.is_maintenance() => a.status.clone(),
        _ if event.is_completed => ActivityStatus::Completed.as_str().to_string(),
        _ => ActivityStatus::Scheduled.as_str().to_string(),
    }
}

pub fn is_overdue(
    event: &calendar_event::Model,
    linked: Option<&maintenance_activity::Model>,
    now: i64,
    today: NaiveDate,
) -> bool {
    match linked {
        Some(a) if event.is_maintenance() => {
            matches!(a.status(), ActivityStatus::Scheduled | ActivityStatus::Pending) && a.scheduled_end < now
        }
        _ => !event.is_completed && event.event_date < today,
    }
}

/// Attach derived fields to a batch of events
pub async fn views<C: ConnectionTrait>(db: &C, events: Vec<calendar_event::Model>) -> AppResult<Vec<EventView>> {
    use std::collections::HashMap;

    let activity_ids: Vec<i64> = events.iter().filter_map(|e| e.maintenance_activity_id).collect();
    let activities: HashMap<i64, maintenance_activity::Model> = if activity_ids.is_empty() {
        HashMap::new()
    } else {
        maintenance_activity::Entity::find()
            .filter(maintenance_activity::Column::Id.is_in(activity_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect()
    };

    let equipment_ids: Vec<i64> = events.iter().map(|e| e.equipment_id).collect();
    let names: HashMap<i64, String> = equipment::Entity::find()
        .filter(equipment::Column::Id.is_in(equipment_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|e| (e.id, e.name))
        .collect();

    let now = now_ts();
    let today = crate::service::today();
    Ok(events
        .into_iter()
        .map(|event| {
            let linked = event.maintenance_activity_id.and_then(|id| activities.get(&id));
            EventView {
                status: derived_status(&event, linked),
                is_overdue: is_overdue(&event, linked, now, today),
                equipment_name: names.get(&event.equipment_id).cloned(),
                event,
            }
        })
        .collect())
}

pub async fn add_comment<C: ConnectionTrait>(
    db: &C,
    event_id: i64,
    user_id: i64,
    comment: &str,
    is_internal: bool,
) -> AppResult<event_comment::Model> {
    if comment.trim().is_empty() {
        return Err(AppError::validation("Comment cannot be empty"));
    }
    Ok(event_comment::ActiveModel {
        event_id: Set(event_id),
        user_id: Set(user_id),
        comment: Set(comment.trim().to_string()),
        is_internal: Set(is_internal),
        created_at: Set(now_ts()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Day offset helper used by reminder queries
pub fn tomorrow(today: NaiveDate) -> NaiveDate {
    today + Duration::days(1)
}

/// Filters for the calendar listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub equipment_id: Option<i64>,
    pub site_id: Option<i64>,
    pub event_type: Option<String>,
    pub assigned_to: Option<i64>,
    pub completed: Option<bool>,
}

pub async fn list<C: ConnectionTrait>(db: &C, filter: &EventFilter) -> AppResult<Vec<EventView>> {
    use sea_orm::QueryOrder;

    let mut query = calendar_event::Entity::find();
    if let Some(start) = filter.start {
        query = query.filter(calendar_event::Column::EventDate.gte(start));
    }
    if let Some(end) = filter.end {
        query = query.filter(calendar_event::Column::EventDate.lte(end));
    }
    if let Some(id) = filter.equipment_id {
        query = query.filter(calendar_event::Column::EquipmentId.eq(id));
    }
    if let Some(site) = filter.site_id {
        let ids = crate::service::equipment::ids_under(db, site).await?;
        query = query.filter(calendar_event::Column::EquipmentId.is_in(ids));
    }
    if let Some(kind) = filter.event_type.as_deref().filter(|t| !t.is_empty()) {
        query = query.filter(calendar_event::Column::EventType.eq(kind));
    }
    if let Some(user_id) = filter.assigned_to {
        query = query.filter(calendar_event::Column::AssignedTo.eq(user_id));
    }
    if let Some(completed) = filter.completed {
        query = query.filter(calendar_event::Column::IsCompleted.eq(completed));
    }

    let events = query
        .order_by_asc(calendar_event::Column::EventDate)
        .order_by_asc(calendar_event::Column::StartTime)
        .all(db)
        .await?;
    views(db, events).await
}

/// One entry in an equipment's history
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub kind: &'static str,
    pub id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub status: String,
    pub completed: bool,
}

/// Events and activities of one equipment, newest first. Events linked
/// to an activity are shown once, as the activity.
pub async fn timeline<C: ConnectionTrait>(db: &C, equipment_id: i64) -> AppResult<Vec<TimelineEntry>> {
    let activities = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::EquipmentId.eq(equipment_id))
        .all(db)
        .await?;
    let events = calendar_event::Entity::find()
        .filter(calendar_event::Column::EquipmentId.eq(equipment_id))
        .filter(calendar_event::Column::MaintenanceActivityId.is_null())
        .all(db)
        .await?;

    let mut entries: Vec<TimelineEntry> = activities
        .into_iter()
        .map(|a| TimelineEntry {
            kind: "activity",
            id: a.id,
            date: crate::service::ts_date(a.actual_end.unwrap_or(a.scheduled_start)),
            completed: a.status() == ActivityStatus::Completed,
            status: a.status,
            title: a.title,
        })
        .chain(events.into_iter().map(|e| TimelineEntry {
            kind: "event",
            id: e.id,
            date: e.event_date,
            status: derived_status(&e, None),
            completed: e.is_completed,
            title: e.title,
        }))
        .collect();
    entries.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::service::equipment::tests::{insert_equipment, insert_type};
    use sea_orm::PaginatorTrait;

    fn input(equipment_id: i64, event_type: &str, date: NaiveDate) -> EventInput {
        EventInput {
            title: "Quarterly inspection".to_string(),
            description: String::new(),
            event_type: event_type.to_string(),
            equipment_id,
            event_date: date,
            start_time: NaiveTime::from_hms_opt(10, 0, 0),
            end_time: NaiveTime::from_hms_opt(11, 30, 0),
            all_day: false,
            priority: None,
            is_recurring: false,
            recurrence_pattern: None,
            assigned_to: None,
            notify_assigned: true,
            activity_type_id: None,
        }
    }

    fn future() -> NaiveDate {
        crate::service::today() + Duration::days(10)
    }

    #[tokio::test]
    async fn test_validation() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;

        let mut bad = input(eq.id, "inspection", future());
        bad.end_time = NaiveTime::from_hms_opt(9, 0, 0);
        assert!(create(&db, &bad, None).await.is_err());

        let mut recurring = input(eq.id, "inspection", future());
        recurring.is_recurring = true;
        assert!(create(&db, &recurring, None).await.is_err());
        recurring.recurrence_pattern = Some("monthly".to_string());
        assert!(create(&db, &recurring, None).await.is_ok());

        let mut all_day = input(eq.id, "outage", future());
        all_day.all_day = true;
        all_day.end_time = NaiveTime::from_hms_opt(1, 0, 0);
        let created = create(&db, &all_day, None).await.unwrap();
        assert!(created.start_time.is_none());
        assert!(created.end_time.is_none());
    }

    #[tokio::test]
    async fn test_failed_event_insert_keeps_no_activity() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        insert_type(&db, "Oil Test", 30).await;
        db.execute_unprepared("DROP TABLE md_calendar_event").await.unwrap();

        assert!(create(&db, &input(eq.id, "maintenance", future()), None).await.is_err());
        assert_eq!(maintenance_activity::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_maintenance_event_creates_activity() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        let ty = insert_type(&db, "Oil Test", 30).await;

        let event = create(&db, &input(eq.id, "maintenance", future()), None).await.unwrap();
        let activity_id = event.maintenance_activity_id.unwrap();
        let linked = maintenance_activity::Entity::find_by_id(activity_id).one(&db).await.unwrap().unwrap();
        assert_eq!(linked.activity_type_id, ty.id);
        assert_eq!(linked.scheduled_end - linked.scheduled_start, 90 * 60);
        assert_eq!(calendar_event::Entity::find().count(&db).await.unwrap(), 1);

        let views = views(&db, vec![event.clone()]).await.unwrap();
        assert_eq!(views[0].status, "scheduled");
        assert_eq!(views[0].equipment_name.as_deref(), Some("TX-01"));

        let done = complete(&db, event, "done").await.unwrap();
        assert!(done.is_completed);
        let linked = maintenance_activity::Entity::find_by_id(activity_id).one(&db).await.unwrap().unwrap();
        assert_eq!(linked.status, "completed");
    }

    #[tokio::test]
    async fn test_maintenance_event_needs_a_type() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        let result = create(&db, &input(eq.id, "maintenance", future()), None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_default_times_for_maintenance_event() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        insert_type(&db, "Oil Test", 30).await;

        let mut no_times = input(eq.id, "maintenance", future());
        no_times.start_time = None;
        no_times.end_time = None;
        let event = create(&db, &no_times, None).await.unwrap();
        let linked = maintenance_activity::Entity::find_by_id(event.maintenance_activity_id.unwrap())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linked.scheduled_start, date_time_ts(future(), default_start_time()));
        assert_eq!(linked.scheduled_end - linked.scheduled_start, 2 * 3600);
    }

    #[tokio::test]
    async fn test_list_and_timeline() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        let other = insert_equipment(&db, "TX-02", None).await;
        insert_type(&db, "Oil Test", 30).await;

        create(&db, &input(eq.id, "inspection", future()), None).await.unwrap();
        create(&db, &input(eq.id, "maintenance", future() + Duration::days(1)), None).await.unwrap();
        create(&db, &input(other.id, "outage", future()), None).await.unwrap();

        let for_eq = list(
            &db,
            &EventFilter {
                equipment_id: Some(eq.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(for_eq.len(), 2);

        let outages = list(
            &db,
            &EventFilter {
                event_type: Some("outage".to_string()),
                end: Some(future()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(outages.len(), 1);

        let history = timeline(&db, eq.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, "activity");
        assert_eq!(history[1].kind, "event");
    }

    #[test]
    fn test_overdue_rules() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        let event = calendar_event::Model {
            id: 1,
            title: "x".to_string(),
            description: String::new(),
            event_type: "inspection".to_string(),
            equipment_id: 1,
            event_date: NaiveDate::from_ymd_opt(2025, 5, 9).unwrap(),
            start_time: None,
            end_time: None,
            all_day: true,
            priority: "medium".to_string(),
            is_recurring: false,
            recurrence_pattern: None,
            assigned_to: None,
            notify_assigned: true,
            notification_sent: false,
            is_completed: false,
            completion_notes: String::new(),
            maintenance_activity_id: None,
            created_by: None,
            created_at: 0,
            updated_at: 0,
        };
        assert!(is_overdue(&event, None, 0, today));
        assert_eq!(derived_status(&event, None), "scheduled");

        let completed = calendar_event::Model { is_completed: true, ..event };
        assert!(!is_overdue(&completed, None, 0, today));
        assert_eq!(derived_status(&completed, None), "completed");
    }
}
