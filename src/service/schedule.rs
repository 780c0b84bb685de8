//! Recurring maintenance schedules

use chrono::{Duration, NaiveDate};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entity::maintenance_activity::{self, ActivityStatus, Priority};
use crate::entity::maintenance_schedule::{self, Frequency};
use crate::entity::{activity_type, equipment, now_ts};
use crate::error::{AppError, AppResult};
use crate::service::activity::{self, ActivityInput};
use crate::service::{date_time_ts, default_start_time, ts_date};

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleInput {
    pub equipment_id: i64,
    pub activity_type_id: i64,
    pub frequency: String,
    #[serde(default)]
    pub frequency_days: Option<i32>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub auto_generate: bool,
    #[serde(default = "default_advance_notice")]
    pub advance_notice_days: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

fn default_advance_notice() -> i32 {
    7
}

/// Outcome of a bulk generation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationSummary {
    pub schedules: usize,
    pub generated: usize,
    pub errors: Vec<String>,
}

pub async fn save<C: ConnectionTrait>(
    db: &C,
    existing: Option<maintenance_schedule::Model>,
    input: &ScheduleInput,
) -> AppResult<maintenance_schedule::Model> {
    let frequency = Frequency::parse(&input.frequency)
        .ok_or_else(|| AppError::validation(format!("Invalid frequency: {}", input.frequency)))?;
    if input.frequency_days.is_some_and(|d| d < 1) {
        return Err(AppError::validation("Frequency days must be at least 1"));
    }
    if let Some(end) = input.end_date {
        if end < input.start_date {
            return Err(AppError::validation("End date cannot be before the start date"));
        }
    }
    if input.advance_notice_days < 0 {
        return Err(AppError::validation("Advance notice cannot be negative"));
    }
    if equipment::Entity::find_by_id(input.equipment_id).one(db).await?.is_none() {
        return Err(AppError::validation("Equipment does not exist"));
    }
    if activity_type::Entity::find_by_id(input.activity_type_id).one(db).await?.is_none() {
        return Err(AppError::validation("Activity type does not exist"));
    }

    let self_id = existing.as_ref().map(|s| s.id);
    if let Some(other) = maintenance_schedule::Entity::find()
        .filter(maintenance_schedule::Column::EquipmentId.eq(input.equipment_id))
        .filter(maintenance_schedule::Column::ActivityTypeId.eq(input.activity_type_id))
        .one(db)
        .await?
    {
        if Some(other.id) != self_id {
            return Err(AppError::Conflict(
                "A schedule for this equipment and activity type already exists".to_string(),
            ));
        }
    }

    let is_new = existing.is_none();
    let mut active: maintenance_schedule::ActiveModel = match existing {
        Some(s) => s.into(),
        None => maintenance_schedule::ActiveModel {
            last_generated: Set(None),
            created_at: Set(now_ts()),
            ..Default::default()
        },
    };
    active.equipment_id = Set(input.equipment_id);
    active.activity_type_id = Set(input.activity_type_id);
    active.frequency = Set(frequency.as_str().to_string());
    active.frequency_days = Set(input.frequency_days);
    active.start_date = Set(input.start_date);
    active.end_date = Set(input.end_date);
    active.auto_generate = Set(input.auto_generate);
    active.advance_notice_days = Set(input.advance_notice_days);
    active.is_active = Set(input.is_active);

    let saved = if is_new {
        active.insert(db).await?
    } else {
        active.update(db).await?
    };
    Ok(saved)
}

/// Date the next occurrence is due, from the last completed activity
pub async fn next_base_date<C: ConnectionTrait>(
    db: &C,
    schedule: &maintenance_schedule::Model,
) -> Result<NaiveDate, sea_orm::DbErr> {
    let last_completed = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::EquipmentId.eq(schedule.equipment_id))
        .filter(maintenance_activity::Column::ActivityTypeId.eq(schedule.activity_type_id))
        .filter(maintenance_activity::Column::Status.eq(ActivityStatus::Completed.as_str()))
        .filter(maintenance_activity::Column::ActualEnd.is_not_null())
        .order_by_desc(maintenance_activity::Column::ActualEnd)
        .one(db)
        .await?;

    Ok(match last_completed.and_then(|a| a.actual_end) {
        Some(end) => ts_date(end) + Duration::days(schedule.interval_days()),
        None => schedule.start_date,
    })
}

/// Create the next activity for a schedule if it is due within the
/// advance-notice window and not already there
pub async fn generate_next_activity<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    schedule: &maintenance_schedule::Model,
    today: NaiveDate,
) -> AppResult<Option<maintenance_activity::Model>> {
    if !schedule.is_active || !schedule.auto_generate {
        return Ok(None);
    }
    if schedule.end_date.is_some_and(|end| today > end) {
        return Ok(None);
    }

    let base = next_base_date(db, schedule).await?;
    if base > today + Duration::days(i64::from(schedule.advance_notice_days)) {
        return Ok(None);
    }

    let Some(activity_type) = activity_type::Entity::find_by_id(schedule.activity_type_id)
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let start = date_time_ts(base, default_start_time());
    let day_end = date_time_ts(base + Duration::days(1), chrono::NaiveTime::MIN);
    let duplicate = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::EquipmentId.eq(schedule.equipment_id))
        .filter(maintenance_activity::Column::ActivityTypeId.eq(schedule.activity_type_id))
        .filter(maintenance_activity::Column::ScheduledStart.gte(date_time_ts(base, chrono::NaiveTime::MIN)))
        .filter(maintenance_activity::Column::ScheduledStart.lt(day_end))
        .one(db)
        .await?;
    if duplicate.is_some() {
        return Ok(None);
    }

    let hours = i64::from(activity_type.estimated_duration_hours.max(1));
    let priority = if activity_type.is_mandatory {
        Priority::Medium
    } else {
        Priority::Low
    };

    let input = ActivityInput {
        equipment_id: schedule.equipment_id,
        activity_type_id: schedule.activity_type_id,
        title: String::new(),
        description: activity_type.description.clone(),
        status: Some(ActivityStatus::Scheduled.as_str().to_string()),
        priority: Some(priority.as_str().to_string()),
        scheduled_start: start,
        scheduled_end: start + hours * 3600,
        actual_start: None,
        actual_end: None,
        assigned_to: None,
        required_status: String::new(),
        tools_required: activity_type.tools_required.clone(),
        parts_required: activity_type.parts_required.clone(),
        safety_notes: activity_type.safety_notes.clone(),
        completion_notes: String::new(),
    };
    let created = activity::create(db, &input, None).await?;

    let mut active: maintenance_schedule::ActiveModel = schedule.clone().into();
    active.last_generated = Set(Some(today));
    active.update(db).await?;

    tracing::info!(
        "Generated activity {} for schedule {} due {}",
        created.id,
        schedule.id,
        base
    );
    Ok(Some(created))
}

/// Run generation for every active auto-generating schedule
pub async fn generate_all<C: ConnectionTrait + TransactionTrait>(db: &C, today: NaiveDate) -> AppResult<GenerationSummary> {
    let schedules = maintenance_schedule::Entity::find()
        .filter(maintenance_schedule::Column::IsActive.eq(true))
        .filter(maintenance_schedule::Column::AutoGenerate.eq(true))
        .all(db)
        .await?;

    let mut summary = GenerationSummary {
        schedules: schedules.len(),
        ..Default::default()
    };
    for schedule in &schedules {
        match generate_next_activity(db, schedule, today).await {
            Ok(Some(_)) => summary.generated += 1,
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Schedule {} generation failed: {}", schedule.id, e);
                summary.errors.push(format!("Schedule {}: {}", schedule.id, e));
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::service::equipment::tests::{insert_equipment, insert_type};
    use sea_orm::DatabaseConnection;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup(start: NaiveDate) -> (DatabaseConnection, maintenance_schedule::Model) {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        let ty = insert_type(&db, "Oil Test", 30).await;
        let schedule = save(
            &db,
            None,
            &ScheduleInput {
                equipment_id: eq.id,
                activity_type_id: ty.id,
                frequency: "monthly".to_string(),
                frequency_days: None,
                start_date: start,
                end_date: None,
                auto_generate: true,
                advance_notice_days: 7,
                is_active: true,
            },
        )
        .await
        .unwrap();
        (db, schedule)
    }

    #[tokio::test]
    async fn test_generates_at_nine_utc() {
        let today = day(2030, 1, 1);
        let (db, schedule) = setup(day(2030, 1, 5)).await;

        let activity = generate_next_activity(&db, &schedule, today).await.unwrap().unwrap();
        assert_eq!(activity.scheduled_start, date_time_ts(day(2030, 1, 5), default_start_time()));
        assert_eq!(activity.scheduled_end - activity.scheduled_start, 2 * 3600);
        assert_eq!(activity.priority, "medium");
        assert_eq!(activity.status, "scheduled");
        assert_eq!(activity.title, "Oil Test - TX-01");
        assert!(activity::linked_event(&db, activity.id).await.unwrap().is_some());

        let reloaded = maintenance_schedule::Entity::find_by_id(schedule.id).one(&db).await.unwrap().unwrap();
        assert_eq!(reloaded.last_generated, Some(today));

        // Same date again is a duplicate
        assert!(generate_next_activity(&db, &reloaded, today).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_outside_notice_window() {
        let (db, schedule) = setup(day(2030, 2, 1)).await;
        assert!(generate_next_activity(&db, &schedule, day(2030, 1, 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_or_ended() {
        let (db, mut schedule) = setup(day(2030, 1, 2)).await;
        schedule.auto_generate = false;
        assert!(generate_next_activity(&db, &schedule, day(2030, 1, 1)).await.unwrap().is_none());

        schedule.auto_generate = true;
        schedule.end_date = Some(day(2029, 12, 31));
        assert!(generate_next_activity(&db, &schedule, day(2030, 1, 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_schedule_rejected() {
        let (db, schedule) = setup(day(2030, 1, 2)).await;
        let again = ScheduleInput {
            equipment_id: schedule.equipment_id,
            activity_type_id: schedule.activity_type_id,
            frequency: "weekly".to_string(),
            frequency_days: None,
            start_date: day(2030, 1, 1),
            end_date: None,
            auto_generate: true,
            advance_notice_days: 7,
            is_active: true,
        };
        assert!(matches!(save(&db, None, &again).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_generate_all_counts() {
        let (db, _) = setup(day(2030, 1, 2)).await;
        let summary = generate_all(&db, day(2030, 1, 1)).await.unwrap();
        assert_eq!(summary.schedules, 1);
        assert_eq!(summary.generated, 1);
        assert!(summary.errors.is_empty());
    }
}
