//! Maintenance activity rules and the activity side of calendar sync

use chrono::{Duration, NaiveDate};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;

use crate::entity::calendar_event::{self, EventType};
use crate::entity::equipment::EquipmentStatus;
use crate::entity::maintenance_activity::{self, ActivityStatus, Priority};
use crate::entity::{activity_type, checklist_item, equipment, event_comment, now_ts, user};
use crate::error::{AppError, AppResult};
use crate::service::title::{self, TitleContext};
use crate::service::{ts_date, ts_time};

/// Fields accepted when creating or updating an activity
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityInput {
    pub equipment_id: i64,
    pub activity_type_id: i64,
    /// Rendered from the title template when empty
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    pub scheduled_start: i64,
    pub scheduled_end: i64,
    #[serde(default)]
    pub actual_start: Option<i64>,
    #[serde(default)]
    pub actual_end: Option<i64>,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    #[serde(default)]
    pub required_status: String,
    #[serde(default)]
    pub tools_required: String,
    #[serde(default)]
    pub parts_required: String,
    #[serde(default)]
    pub safety_notes: String,
    #[serde(default)]
    pub completion_notes: String,
}

/// Input after validation, with the rows it refers to
struct Checked {
    equipment: equipment::Model,
    activity_type: activity_type::Model,
    status: ActivityStatus,
    priority: Priority,
}

async fn check<C: ConnectionTrait>(db: &C, input: &ActivityInput) -> AppResult<Checked> {
    let equipment = equipment::Entity::find_by_id(input.equipment_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::validation("Equipment does not exist"))?;
    let activity_type = activity_type::Entity::find_by_id(input.activity_type_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::validation("Activity type does not exist"))?;

    if input.scheduled_end <= input.scheduled_start {
        return Err(AppError::validation("Scheduled end must be after scheduled start"));
    }
    if let (Some(start), Some(end)) = (input.actual_start, input.actual_end) {
        if end <= start {
            return Err(AppError::validation("Actual end must be after actual start"));
        }
    }

    let status = match input.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => ActivityStatus::parse(s)
            .ok_or_else(|| AppError::validation(format!("Invalid status: {}", s)))?,
        None => ActivityStatus::Scheduled,
    };
    let priority = match input.priority.as_deref().filter(|s| !s.is_empty()) {
        Some(p) => Priority::parse(p)
            .ok_or_else(|| AppError::validation(format!("Invalid priority: {}", p)))?,
        None => Priority::Medium,
    };

    if !input.required_status.is_empty() && EquipmentStatus::parse(&input.required_status).is_none() {
        return Err(AppError::validation(format!(
            "Invalid required equipment status: {}",
            input.required_status
        )));
    }

    if let Some(user_id) = input.assigned_to {
        if user::Entity::find_by_id(user_id).one(db).await?.is_none() {
            return Err(AppError::validation("Assigned user does not exist"));
        }
    }

    Ok(Checked {
        equipment,
        activity_type,
        status,
        priority,
    })
}

/// Open activities whose window has passed become overdue
pub fn effective_status(status: ActivityStatus, scheduled_end: i64, now: i64) -> ActivityStatus {
    if scheduled_end < now && !status.is_closed() {
        ActivityStatus::Overdue
    } else {
        status
    }
}

/// Completion date plus the type's frequency
pub fn next_due_date(actual_end: i64, frequency_days: i32) -> NaiveDate {
    ts_date(actual_end) + Duration::days(i64::from(frequency_days.max(0)))
}

async fn render_title<C: ConnectionTrait>(
    db: &C,
    given: &str,
    checked: &Checked,
    scheduled_start: i64,
) -> AppResult<String> {
    if !given.trim().is_empty() {
        return Ok(given.trim().to_string());
    }
    let template = title::current_template(db).await?;
    Ok(title::render(
        &template,
        &TitleContext {
            activity_type: &checked.activity_type.name,
            equipment: &checked.equipment.name,
            date: ts_date(scheduled_start),
            priority: checked.priority,
            status: checked.status,
        },
    ))
}

fn apply_input(
    active: &mut maintenance_activity::ActiveModel,
    input: &ActivityInput,
    checked: &Checked,
    title: String,
    now: i64,
) {
    let status = effective_status(checked.status, input.scheduled_end, now);

    active.equipment_id = Set(input.equipment_id);
    active.activity_type_id = Set(input.activity_type_id);
    active.title = Set(title);
    active.description = Set(input.description.clone());
    active.status = Set(status.as_str().to_string());
    active.priority = Set(checked.priority.as_str().to_string());
    active.scheduled_start = Set(input.scheduled_start);
    active.scheduled_end = Set(input.scheduled_end);
    active.actual_start = Set(input.actual_start);
    active.actual_end = Set(input.actual_end);
    active.assigned_to = Set(input.assigned_to);
    active.required_status = Set(input.required_status.clone());
    active.tools_required = Set(input.tools_required.clone());
    active.parts_required = Set(input.parts_required.clone());
    active.safety_notes = Set(input.safety_notes.clone());
    active.completion_notes = Set(input.completion_notes.clone());
    if status == ActivityStatus::Completed {
        if let Some(end) = input.actual_end {
            active.next_due_date = Set(Some(next_due_date(end, checked.activity_type.frequency_days)));
        }
    }
    active.updated_at = Set(now);
}

/// Insert without touching the calendar
pub(crate) async fn insert_unsynced<C: ConnectionTrait>(
    db: &C,
    input: &ActivityInput,
    created_by: Option<i64>,
) -> AppResult<maintenance_activity::Model> {
    let checked = check(db, input).await?;
    let title = render_title(db, &input.title, &checked, input.scheduled_start).await?;
    let now = now_ts();

    let mut active = maintenance_activity::ActiveModel {
        next_due_date: Set(None),
        created_by: Set(created_by),
        created_at: Set(now),
        ..Default::default()
    };
    apply_input(&mut active, input, &checked, title, now);

    Ok(active.insert(db).await?)
}

/// Insert an activity and its calendar event in one transaction
pub async fn create<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    input: &ActivityInput,
    created_by: Option<i64>,
) -> AppResult<maintenance_activity::Model> {
    let txn = db.begin().await?;
    let activity = insert_unsynced(&txn, input, created_by).await?;
    sync_event(&txn, &activity).await?;
    txn.commit().await?;
    Ok(activity)
}

pub async fn update<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    existing: maintenance_activity::Model,
    input: &ActivityInput,
) -> AppResult<maintenance_activity::Model> {
    let checked = check(db, input).await?;
    let title = render_title(db, &input.title, &checked, input.scheduled_start).await?;

    let mut active: maintenance_activity::ActiveModel = existing.into();
    apply_input(&mut active, input, &checked, title, now_ts());

    let txn = db.begin().await?;
    let activity = active.update(&txn).await?;
    sync_event(&txn, &activity).await?;
    txn.commit().await?;
    Ok(activity)
}

pub async fn start<C: ConnectionTrait>(
    db: &C,
    activity: maintenance_activity::Model,
) -> AppResult<maintenance_activity::Model> {
    if activity.status().is_closed() {
        return Err(AppError::BadRequest(format!(
            "Cannot start an activity that is {}",
            activity.status().display_name()
        )));
    }
    let now = now_ts();
    let mut active: maintenance_activity::ActiveModel = activity.into();
    active.status = Set(ActivityStatus::InProgress.as_str().to_string());
    active.actual_start = Set(Some(now));
    active.updated_at = Set(now);
    let activity = active.update(db).await?;

    sync_event(db, &activity).await?;
    Ok(activity)
}

/// Mark completed now, compute the next due date and close the linked event
pub async fn complete<C: ConnectionTrait>(
    db: &C,
    activity: maintenance_activity::Model,
    notes: &str,
) -> AppResult<maintenance_activity::Model> {
    if activity.status() == ActivityStatus::Completed {
        return Err(AppError::BadRequest("Activity is already completed".to_string()));
    }
    let frequency_days = activity_type::Entity::find_by_id(activity.activity_type_id)
        .one(db)
        .await?
        .map(|t| t.frequency_days)
        .unwrap_or(365);

    let now = now_ts();
    let actual_start = activity.actual_start.unwrap_or(now);
    let mut active: maintenance_activity::ActiveModel = activity.into();
    active.status = Set(ActivityStatus::Completed.as_str().to_string());
    active.actual_end = Set(Some(now));
    active.actual_start = Set(Some(actual_start));
    if !notes.trim().is_empty() {
        active.completion_notes = Set(notes.trim().to_string());
    }
    active.next_due_date = Set(Some(next_due_date(now, frequency_days)));
    active.updated_at = Set(now);
    let activity = active.update(db).await?;

    if let Some(event) = linked_event(db, activity.id).await? {
        let mut event: calendar_event::ActiveModel = event.into();
        event.is_completed = Set(true);
        if !notes.trim().is_empty() {
            event.completion_notes = Set(notes.trim().to_string());
        }
        event.updated_at = Set(now);
        event.update(db).await?;
    }

    Ok(activity)
}

/// Delete an activity with its checklist and calendar event
pub async fn delete<C: ConnectionTrait>(db: &C, activity_id: i64) -> AppResult<()> {
    checklist_item::Entity::delete_many()
        .filter(checklist_item::Column::ActivityId.eq(activity_id))
        .exec(db)
        .await?;

    let event_ids: Vec<i64> = calendar_event::Entity::find()
        .filter(calendar_event::Column::MaintenanceActivityId.eq(activity_id))
        .all(db)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    if !event_ids.is_empty() {
        event_comment::Entity::delete_many()
            .filter(event_comment::Column::EventId.is_in(event_ids.clone()))
            .exec(db)
            .await?;
        calendar_event::Entity::delete_many()
            .filter(calendar_event::Column::Id.is_in(event_ids))
            .exec(db)
            .await?;
    }

    maintenance_activity::Entity::delete_by_id(activity_id)
        .exec(db)
        .await?;
    Ok(())
}

pub async fn linked_event<C: ConnectionTrait>(
    db: &C,
    activity_id: i64,
) -> Result<Option<calendar_event::Model>, sea_orm::DbErr> {
    calendar_event::Entity::find()
        .filter(calendar_event::Column::MaintenanceActivityId.eq(activity_id))
        .one(db)
        .await
}

/// Create or refresh the maintenance event that mirrors an activity
pub async fn sync_event<C: ConnectionTrait>(
    db: &C,
    activity: &maintenance_activity::Model,
) -> AppResult<calendar_event::Model> {
    let now = now_ts();
    let existing = linked_event(db, activity.id).await?;
    let is_new = existing.is_none();

    let mut event: calendar_event::ActiveModel = match existing {
        Some(e) => e.into(),
        None => calendar_event::ActiveModel {
            event_type: Set(EventType::Maintenance.as_str().to_string()),
            is_recurring: Set(false),
            recurrence_pattern: Set(None),
            notify_assigned: Set(true),
            notification_sent: Set(false),
            completion_notes: Set(String::new()),
            maintenance_activity_id: Set(Some(activity.id)),
            created_by: Set(activity.created_by),
            created_at: Set(now),
            ..Default::default()
        },
    };

    event.title = Set(activity.title.clone());
    event.description = Set(activity.description.clone());
    event.equipment_id = Set(activity.equipment_id);
    event.event_date = Set(ts_date(activity.scheduled_start));
    event.start_time = Set(Some(ts_time(activity.scheduled_start)));
    // An event holds a single day; work running past midnight has no end time on it
    let end_time = (ts_date(activity.scheduled_end) == ts_date(activity.scheduled_start))
        .then(|| ts_time(activity.scheduled_end));
    event.end_time = Set(end_time);
    event.all_day = Set(false);
    event.priority = Set(activity.priority.clone());
    event.assigned_to = Set(activity.assigned_to);
    event.is_completed = Set(activity.status() == ActivityStatus::Completed);
    event.updated_at = Set(now);

    let saved = if is_new {
        event.insert(db).await?
    } else {
        event.update(db).await?
    };
    Ok(saved)
}

/// Count of open activities on a piece of equipment
pub async fn pending_count<C: ConnectionTrait>(db: &C, equipment_id: i64) -> Result<u64, sea_orm::DbErr> {
    maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::EquipmentId.eq(equipment_id))
        .filter(maintenance_activity::Column::Status.is_in(ActivityStatus::open_statuses()))
        .count(db)
        .await
}

/// Fields for a new checklist item
#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistInput {
    pub item_text: String,
    /// Next free position when omitted
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default = "default_true")]
    pub is_required: bool,
}

fn default_true() -> bool {
    true
}

pub async fn checklist<C: ConnectionTrait>(
    db: &C,
    activity_id: i64,
) -> Result<Vec<checklist_item::Model>, sea_orm::DbErr> {
    checklist_item::Entity::find()
        .filter(checklist_item::Column::ActivityId.eq(activity_id))
        .order_by_asc(checklist_item::Column::SortOrder)
        .all(db)
        .await
}

pub async fn add_checklist_item<C: ConnectionTrait>(
    db: &C,
    activity_id: i64,
    input: &ChecklistInput,
) -> AppResult<checklist_item::Model> {
    if input.item_text.trim().is_empty() {
        return Err(AppError::validation("Checklist item text is required"));
    }
    let items = checklist(db, activity_id).await?;
    let sort_order = match input.sort_order {
        Some(order) => {
            if items.iter().any(|i| i.sort_order == order) {
                return Err(AppError::Conflict(format!(
                    "Checklist position {} is already used",
                    order
                )));
            }
            order
        }
        None => items.iter().map(|i| i.sort_order).max().unwrap_or(0) + 1,
    };

    Ok(checklist_item::ActiveModel {
        activity_id: Set(activity_id),
        item_text: Set(input.item_text.trim().to_string()),
        sort_order: Set(sort_order),
        is_required: Set(input.is_required),
        is_completed: Set(false),
        completed_by: Set(None),
        completed_at: Set(None),
        notes: Set(String::new()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn complete_checklist_item<C: ConnectionTrait>(
    db: &C,
    item: checklist_item::Model,
    user_id: i64,
    notes: &str,
) -> AppResult<checklist_item::Model> {
    let mut active: checklist_item::ActiveModel = item.into();
    active.is_completed = Set(true);
    active.completed_by = Set(Some(user_id));
    active.completed_at = Set(Some(now_ts()));
    if !notes.is_empty() {
        active.notes = Set(notes.to_string());
    }
    Ok(active.update(db).await?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityTypeInput {
    pub name: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_duration")]
    pub estimated_duration_hours: i32,
    #[serde(default = "default_frequency")]
    pub frequency_days: i32,
    #[serde(default = "default_true")]
    pub is_mandatory: bool,
    #[serde(default)]
    pub checklist_template: String,
    #[serde(default)]
    pub tools_required: String,
    #[serde(default)]
    pub parts_required: String,
    #[serde(default)]
    pub safety_notes: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_duration() -> i32 {
    1
}

fn default_frequency() -> i32 {
    365
}

pub async fn save_type<C: ConnectionTrait>(
    db: &C,
    existing: Option<activity_type::Model>,
    input: &ActivityTypeInput,
) -> AppResult<activity_type::Model> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Activity type name is required"));
    }
    if input.estimated_duration_hours < 1 {
        return Err(AppError::validation("Estimated duration must be at least 1 hour"));
    }
    if input.frequency_days < 1 {
        return Err(AppError::validation("Frequency must be at least 1 day"));
    }
    let self_id = existing.as_ref().map(|t| t.id);
    if let Some(other) = activity_type::Entity::find()
        .filter(activity_type::Column::Name.eq(name))
        .one(db)
        .await?
    {
        if Some(other.id) != self_id {
            return Err(AppError::Conflict(format!("Activity type '{}' already exists", name)));
        }
    }

    let is_new = existing.is_none();
    let mut active: activity_type::ActiveModel = match existing {
        Some(t) => t.into(),
        None => activity_type::ActiveModel {
            created_at: Set(now_ts()),
            ..Default::default()
        },
    };
    active.name = Set(name.to_string());
    active.category_id = Set(input.category_id);
    active.description = Set(input.description.clone());
    active.estimated_duration_hours = Set(input.estimated_duration_hours);
    active.frequency_days = Set(input.frequency_days);
    active.is_mandatory = Set(input.is_mandatory);
    active.checklist_template = Set(input.checklist_template.clone());
    active.tools_required = Set(input.tools_required.clone());
    active.parts_required = Set(input.parts_required.clone());
    active.safety_notes = Set(input.safety_notes.clone());
    active.is_active = Set(input.is_active);

    let saved = if is_new {
        active.insert(db).await?
    } else {
        active.update(db).await?
    };
    Ok(saved)
}

/// Refused while any activity still uses the type
pub async fn delete_type<C: ConnectionTrait>(db: &C, type_id: i64) -> AppResult<()> {
    let used = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::ActivityTypeId.eq(type_id))
        .count(db)
        .await?;
    if used > 0 {
        return Err(AppError::Conflict(format!(
            "Activity type is used by {} activities",
            used
        )));
    }
    crate::entity::maintenance_schedule::Entity::delete_many()
        .filter(crate::entity::maintenance_schedule::Column::ActivityTypeId.eq(type_id))
        .exec(db)
        .await?;
    activity_type::Entity::delete_by_id(type_id).exec(db).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::service::equipment::tests::{insert_equipment, insert_type};
    use sea_orm::DatabaseConnection;

    pub(crate) fn input(equipment_id: i64, type_id: i64, start: i64) -> ActivityInput {
        ActivityInput {
            equipment_id,
            activity_type_id: type_id,
            title: String::new(),
            description: "check".to_string(),
            status: None,
            priority: Some("high".to_string()),
            scheduled_start: start,
            scheduled_end: start + 3600,
            actual_start: None,
            actual_end: None,
            assigned_to: None,
            required_status: String::new(),
            tools_required: String::new(),
            parts_required: String::new(),
            safety_notes: String::new(),
            completion_notes: String::new(),
        }
    }

    async fn setup() -> (DatabaseConnection, i64, i64) {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        let ty = insert_type(&db, "Oil Test", 30).await;
        (db, eq.id, ty.id)
    }

    #[test]
    fn test_effective_status() {
        assert_eq!(effective_status(ActivityStatus::Scheduled, 10, 20), ActivityStatus::Overdue);
        assert_eq!(effective_status(ActivityStatus::Completed, 10, 20), ActivityStatus::Completed);
        assert_eq!(effective_status(ActivityStatus::Cancelled, 10, 20), ActivityStatus::Cancelled);
        assert_eq!(effective_status(ActivityStatus::Pending, 30, 20), ActivityStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_renders_title_and_syncs_event() {
        let (db, eq, ty) = setup().await;
        let start = now_ts() + 86400;
        let activity = create(&db, &input(eq, ty, start), None).await.unwrap();
        assert_eq!(activity.title, "Oil Test - TX-01");
        assert_eq!(activity.status, "scheduled");

        let event = linked_event(&db, activity.id).await.unwrap().unwrap();
        assert_eq!(event.title, activity.title);
        assert_eq!(event.event_type, "maintenance");
        assert_eq!(event.event_date, ts_date(start));
        assert_eq!(event.priority, "high");
    }

    #[tokio::test]
    async fn test_event_for_overnight_work_stays_valid() {
        use crate::service::event::{self, EventInput};
        use chrono::NaiveTime;

        let (db, eq, ty) = setup().await;
        let day = ts_date(now_ts()) + Duration::days(3);
        let late = crate::service::date_time_ts(day, NaiveTime::from_hms_opt(23, 0, 0).unwrap());
        let mut overnight = input(eq, ty, late);
        overnight.scheduled_end = late + 2 * 3600;
        let activity = create(&db, &overnight, None).await.unwrap();

        let synced = linked_event(&db, activity.id).await.unwrap().unwrap();
        assert_eq!(synced.event_date, day);
        assert_eq!(synced.start_time, NaiveTime::from_hms_opt(23, 0, 0));
        assert_eq!(synced.end_time, None);

        // The stored event must survive being saved back unchanged
        let same = EventInput {
            title: synced.title.clone(),
            description: synced.description.clone(),
            event_type: synced.event_type.clone(),
            equipment_id: synced.equipment_id,
            event_date: synced.event_date,
            start_time: synced.start_time,
            end_time: synced.end_time,
            all_day: synced.all_day,
            priority: Some(synced.priority.clone()),
            is_recurring: synced.is_recurring,
            recurrence_pattern: synced.recurrence_pattern.clone(),
            assigned_to: synced.assigned_to,
            notify_assigned: synced.notify_assigned,
            activity_type_id: None,
        };
        event::update(&db, synced, &same).await.unwrap();

        // Same-day work keeps both times
        let morning = crate::service::date_time_ts(day, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        let activity = create(&db, &input(eq, ty, morning), None).await.unwrap();
        let synced = linked_event(&db, activity.id).await.unwrap().unwrap();
        assert_eq!(synced.end_time, NaiveTime::from_hms_opt(10, 0, 0));
    }

    #[tokio::test]
    async fn test_failed_event_sync_rolls_back_activity() {
        let (db, eq, ty) = setup().await;
        db.execute_unprepared("DROP TABLE md_calendar_event").await.unwrap();

        assert!(create(&db, &input(eq, ty, now_ts() + 86_400), None).await.is_err());
        assert_eq!(maintenance_activity::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_validation() {
        let (db, eq, ty) = setup().await;
        let mut bad = input(eq, ty, now_ts());
        bad.scheduled_end = bad.scheduled_start;
        assert!(matches!(create(&db, &bad, None).await, Err(AppError::Validation(_))));

        let mut bad = input(eq, ty, now_ts());
        bad.actual_start = Some(100);
        bad.actual_end = Some(50);
        assert!(create(&db, &bad, None).await.is_err());

        let missing = input(999, ty, now_ts());
        assert!(create(&db, &missing, None).await.is_err());
    }

    #[tokio::test]
    async fn test_past_window_becomes_overdue() {
        let (db, eq, ty) = setup().await;
        let activity = create(&db, &input(eq, ty, now_ts() - 7200), None).await.unwrap();
        assert_eq!(activity.status, "overdue");
    }

    #[tokio::test]
    async fn test_update_moves_event() {
        let (db, eq, ty) = setup().await;
        let start = now_ts() + 86400;
        let activity = create(&db, &input(eq, ty, start), None).await.unwrap();

        let mut changed = input(eq, ty, start + 3 * 86400);
        changed.title = "Moved".to_string();
        let activity = update(&db, activity, &changed).await.unwrap();

        let event = linked_event(&db, activity.id).await.unwrap().unwrap();
        assert_eq!(event.title, "Moved");
        assert_eq!(event.event_date, ts_date(start + 3 * 86400));
        assert_eq!(calendar_event::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_and_complete() {
        let (db, eq, ty) = setup().await;
        let activity = create(&db, &input(eq, ty, now_ts() + 3600), None).await.unwrap();

        let started = start(&db, activity).await.unwrap();
        assert_eq!(started.status, "in_progress");
        assert!(started.actual_start.is_some());

        let done = complete(&db, started, "all good").await.unwrap();
        assert_eq!(done.status, "completed");
        assert_eq!(done.completion_notes, "all good");
        let end = done.actual_end.unwrap();
        assert_eq!(done.next_due_date, Some(ts_date(end) + Duration::days(30)));

        let event = linked_event(&db, done.id).await.unwrap().unwrap();
        assert!(event.is_completed);

        assert!(complete(&db, done, "").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_removes_event_and_checklist() {
        let (db, eq, ty) = setup().await;
        let activity = create(&db, &input(eq, ty, now_ts() + 3600), None).await.unwrap();
        add_checklist_item(
            &db,
            activity.id,
            &ChecklistInput { item_text: "Lockout".to_string(), sort_order: None, is_required: true },
        )
        .await
        .unwrap();

        delete(&db, activity.id).await.unwrap();
        assert_eq!(calendar_event::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(checklist_item::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(maintenance_activity::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_checklist_order_unique() {
        let (db, eq, ty) = setup().await;
        let activity = create(&db, &input(eq, ty, now_ts() + 3600), None).await.unwrap();

        let first = add_checklist_item(
            &db,
            activity.id,
            &ChecklistInput { item_text: "One".to_string(), sort_order: None, is_required: true },
        )
        .await
        .unwrap();
        assert_eq!(first.sort_order, 1);

        let clash = add_checklist_item(
            &db,
            activity.id,
            &ChecklistInput { item_text: "Two".to_string(), sort_order: Some(1), is_required: false },
        )
        .await;
        assert!(matches!(clash, Err(AppError::Conflict(_))));

        let done = complete_checklist_item(&db, first, 1, "ok").await.unwrap();
        assert!(done.is_completed);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_activity_type_in_use_cannot_be_deleted() {
        let (db, eq, ty) = setup().await;
        let dup = ActivityTypeInput {
            name: "Oil Test".to_string(),
            category_id: None,
            description: String::new(),
            estimated_duration_hours: 1,
            frequency_days: 365,
            is_mandatory: true,
            checklist_template: String::new(),
            tools_required: String::new(),
            parts_required: String::new(),
            safety_notes: String::new(),
            is_active: true,
        };
        assert!(matches!(save_type(&db, None, &dup).await, Err(AppError::Conflict(_))));

        let activity = create(&db, &input(eq, ty, now_ts() + 3600), None).await.unwrap();
        assert!(matches!(delete_type(&db, ty).await, Err(AppError::Conflict(_))));

        delete(&db, activity.id).await.unwrap();
        delete_type(&db, ty).await.unwrap();
        assert!(activity_type::Entity::find_by_id(ty).one(&db).await.unwrap().is_none());
    }
}
