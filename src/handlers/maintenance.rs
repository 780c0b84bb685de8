//! Maintenance handlers
//!
//! Activity types, activities with their checklists, schedules and the
//! summary report

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::maintenance_activity::{self, ActivityStatus, Priority};
use crate::entity::op_log::OpType;
use crate::entity::{activity_type, checklist_item, equipment, maintenance_schedule, now_ts};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::log_success;
use crate::handlers::{Page, Pagination};
use crate::middleware::auth::{perm, CurrentUser};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::service::activity::{self as activities, ActivityInput, ActivityTypeInput, ChecklistInput};
use crate::service::reports::{self, MaintenanceReport};
use crate::service::schedule::{self as schedules, GenerationSummary, ScheduleInput};
use crate::service::{date_time_ts, equipment as equipments, today};
use crate::state::AppState;

fn require_view(user: &CurrentUser) -> AppResult<()> {
    if user.can_view_maintenance() {
        Ok(())
    } else {
        Err(AppError::forbidden(perm::MAINTENANCE_VIEW))
    }
}

fn require_manage(user: &CurrentUser) -> AppResult<()> {
    if user.can_manage_maintenance() {
        Ok(())
    } else {
        Err(AppError::forbidden(perm::MAINTENANCE_MANAGE))
    }
}

// ---------------------------------------------------------------------------
// Activity types
// ---------------------------------------------------------------------------

/// GET /api/maintenance/types
pub async fn list_types(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<activity_type::Model>>>> {
    require_view(&current_user)?;
    let all = activity_type::Entity::find()
        .order_by_asc(activity_type::Column::Name)
        .all(&*db)
        .await?;
    Ok(Json(ApiResponse::success(all)))
}

async fn find_type(db: &DbConn, id: i64) -> AppResult<activity_type::Model> {
    activity_type::Entity::find_by_id(id)
        .one(&**db)
        .await?
        .ok_or_not_found("Activity type not found")
}

/// GET /api/maintenance/types/:id
pub async fn get_type(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<activity_type::Model>>> {
    require_view(&current_user)?;
    Ok(Json(ApiResponse::success(find_type(&db, id).await?)))
}

/// POST /api/maintenance/types
pub async fn create_type(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<ActivityTypeInput>,
) -> AppResult<Json<ApiResponse<activity_type::Model>>> {
    require_manage(&current_user)?;
    let created = activities::save_type(&*db, None, &input).await?;
    log_success(&current_user.username, OpType::Create, format!("activity type {}", created.name));
    Ok(Json(ApiResponse::success(created)))
}

/// PUT /api/maintenance/types/:id
pub async fn update_type(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<ActivityTypeInput>,
) -> AppResult<Json<ApiResponse<activity_type::Model>>> {
    require_manage(&current_user)?;
    let existing = find_type(&db, id).await?;
    let updated = activities::save_type(&*db, Some(existing), &input).await?;
    log_success(&current_user.username, OpType::Update, format!("activity type {}", updated.name));
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/maintenance/types/:id
pub async fn delete_type(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require_manage(&current_user)?;
    let existing = find_type(&db, id).await?;
    activities::delete_type(&*db, id).await?;
    log_success(&current_user.username, OpType::Delete, format!("activity type {}", existing.name));
    Ok(Json(ApiResponse::success_msg("Activity type deleted")))
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub equipment_id: Option<i64>,
    pub site_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub overdue_only: bool,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Activity with display values resolved
#[derive(Debug, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: maintenance_activity::Model,
    pub status_display: &'static str,
    pub priority_display: &'static str,
    pub equipment_name: Option<String>,
    pub activity_type_name: Option<String>,
    pub is_overdue: bool,
    pub duration_hours: f64,
}

async fn views(db: &DbConn, items: Vec<maintenance_activity::Model>, now: i64) -> AppResult<Vec<ActivityView>> {
    let equipment_ids: Vec<i64> = items.iter().map(|a| a.equipment_id).collect();
    let names: HashMap<i64, String> = equipment::Entity::find()
        .filter(equipment::Column::Id.is_in(equipment_ids))
        .all(&**db)
        .await?
        .into_iter()
        .map(|e| (e.id, e.name))
        .collect();
    let types: HashMap<i64, String> = activity_type::Entity::find()
        .all(&**db)
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();

    Ok(items
        .into_iter()
        .map(|a| ActivityView {
            status_display: a.status().display_name(),
            priority_display: a.priority().display_name(),
            equipment_name: names.get(&a.equipment_id).cloned(),
            activity_type_name: types.get(&a.activity_type_id).cloned(),
            is_overdue: a.is_overdue(now),
            duration_hours: a.duration_hours(),
            activity: a,
        })
        .collect())
}

fn closed_statuses() -> [&'static str; 2] {
    [ActivityStatus::Completed.as_str(), ActivityStatus::Cancelled.as_str()]
}

/// Open activities past their window, or already flagged overdue
fn overdue_condition(now: i64) -> Condition {
    Condition::any()
        .add(maintenance_activity::Column::Status.eq(ActivityStatus::Overdue.as_str()))
        .add(
            Condition::all()
                .add(maintenance_activity::Column::ScheduledEnd.lt(now))
                .add(maintenance_activity::Column::Status.is_not_in(closed_statuses())),
        )
}

/// GET /api/maintenance/activities
pub async fn list_activities(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<ApiResponse<Page<ActivityView>>>> {
    require_view(&current_user)?;
    let now = now_ts();

    let mut select = maintenance_activity::Entity::find();
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status = ActivityStatus::parse(status)
            .ok_or_else(|| AppError::validation(format!("Invalid status: {}", status)))?;
        select = select.filter(maintenance_activity::Column::Status.eq(status.as_str()));
    }
    if let Some(priority) = query.priority.as_deref().filter(|s| !s.is_empty()) {
        let priority = Priority::parse(priority)
            .ok_or_else(|| AppError::validation(format!("Invalid priority: {}", priority)))?;
        select = select.filter(maintenance_activity::Column::Priority.eq(priority.as_str()));
    }
    if let Some(id) = query.equipment_id {
        select = select.filter(maintenance_activity::Column::EquipmentId.eq(id));
    }
    if let Some(site) = query.site_id {
        let ids = equipments::ids_under(&*db, site).await?;
        select = select.filter(maintenance_activity::Column::EquipmentId.is_in(ids));
    }
    if let Some(user_id) = query.assigned_to {
        select = select.filter(maintenance_activity::Column::AssignedTo.eq(user_id));
    }
    if let Some(from) = query.from {
        select = select.filter(maintenance_activity::Column::ScheduledStart.gte(date_time_ts(from, NaiveTime::MIN)));
    }
    if let Some(to) = query.to {
        let end = date_time_ts(to + Duration::days(1), NaiveTime::MIN);
        select = select.filter(maintenance_activity::Column::ScheduledStart.lt(end));
    }
    if query.overdue_only {
        select = select.filter(overdue_condition(now));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(maintenance_activity::Column::Title.contains(search))
                .add(maintenance_activity::Column::Description.contains(search)),
        );
    }

    let page = Pagination::new(query.page, query.page_size);
    let total = select.clone().count(&*db).await?;
    let items = select
        .order_by_asc(maintenance_activity::Column::ScheduledStart)
        .offset(page.offset())
        .limit(page.limit())
        .all(&*db)
        .await?;

    let rows = views(&db, items, now).await?;
    Ok(Json(ApiResponse::success(Page::new(rows, total, page))))
}

/// GET /api/maintenance/overdue
pub async fn list_overdue(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<ActivityView>>>> {
    require_view(&current_user)?;
    let now = now_ts();
    let items = maintenance_activity::Entity::find()
        .filter(overdue_condition(now))
        .order_by_asc(maintenance_activity::Column::ScheduledEnd)
        .all(&*db)
        .await?;
    Ok(Json(ApiResponse::success(views(&db, items, now).await?)))
}

#[derive(Debug, Serialize)]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub view: ActivityView,
    pub checklist: Vec<checklist_item::Model>,
    pub event_id: Option<i64>,
}

async fn find_activity(db: &DbConn, id: i64) -> AppResult<maintenance_activity::Model> {
    maintenance_activity::Entity::find_by_id(id)
        .one(&**db)
        .await?
        .ok_or_not_found("Activity not found")
}

/// GET /api/maintenance/activities/:id
pub async fn get_activity(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<ActivityDetail>>> {
    require_view(&current_user)?;
    let activity = find_activity(&db, id).await?;
    let checklist = activities::checklist(&*db, id).await?;
    let event_id = activities::linked_event(&*db, id).await?.map(|e| e.id);
    let view = views(&db, vec![activity], now_ts())
        .await?
        .pop()
        .ok_or_not_found("Activity not found")?;
    Ok(Json(ApiResponse::success(ActivityDetail {
        view,
        checklist,
        event_id,
    })))
}

/// POST /api/maintenance/activities
pub async fn create_activity(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<ActivityInput>,
) -> AppResult<Json<ApiResponse<maintenance_activity::Model>>> {
    current_user.require(perm::MAINTENANCE_CREATE)?;
    if input.assigned_to.is_some_and(|id| id != current_user.id) {
        current_user.require(perm::MAINTENANCE_ASSIGN)?;
    }
    let created = activities::create(&state.db, &input, Some(current_user.id)).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Create, format!("activity {}", created.title));
    Ok(Json(ApiResponse::success(created)))
}

/// PUT /api/maintenance/activities/:id
pub async fn update_activity(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<ActivityInput>,
) -> AppResult<Json<ApiResponse<maintenance_activity::Model>>> {
    current_user.require(perm::MAINTENANCE_EDIT)?;
    let existing = find_activity(&db, id).await?;
    if input.assigned_to != existing.assigned_to && input.assigned_to.is_some_and(|u| u != current_user.id) {
        current_user.require(perm::MAINTENANCE_ASSIGN)?;
    }
    let updated = activities::update(&state.db, existing, &input).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Update, format!("activity {}", updated.title));
    Ok(Json(ApiResponse::success(updated)))
}

/// POST /api/maintenance/activities/:id/start
pub async fn start_activity(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<maintenance_activity::Model>>> {
    current_user.require(perm::MAINTENANCE_EDIT)?;
    let existing = find_activity(&db, id).await?;
    let started = activities::start(&state.db, existing).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Update, format!("started activity {}", started.title));
    Ok(Json(ApiResponse::success(started)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub notes: String,
}

/// POST /api/maintenance/activities/:id/complete
pub async fn complete_activity(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<CompleteRequest>,
) -> AppResult<Json<ApiResponse<maintenance_activity::Model>>> {
    current_user.require(perm::MAINTENANCE_COMPLETE)?;
    let existing = find_activity(&db, id).await?;
    let completed = activities::complete(&state.db, existing, &req.notes).await?;
    state.cache.invalidate_dashboards().await;
    tracing::info!("Activity {} completed by {}", completed.id, current_user.username);
    log_success(&current_user.username, OpType::Complete, format!("activity {}", completed.title));
    Ok(Json(ApiResponse::success(completed)))
}

/// DELETE /api/maintenance/activities/:id
pub async fn delete_activity(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::MAINTENANCE_DELETE)?;
    let existing = find_activity(&db, id).await?;
    activities::delete(&state.db, id).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Delete, format!("activity {}", existing.title));
    Ok(Json(ApiResponse::success_msg("Activity deleted")))
}

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

/// POST /api/maintenance/activities/:id/checklist
pub async fn add_checklist_item(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<ChecklistInput>,
) -> AppResult<Json<ApiResponse<checklist_item::Model>>> {
    current_user.require(perm::MAINTENANCE_EDIT)?;
    let activity = find_activity(&db, id).await?;
    let item = activities::add_checklist_item(&*db, activity.id, &input).await?;
    Ok(Json(ApiResponse::success(item)))
}

async fn find_item(db: &DbConn, activity_id: i64, item_id: i64) -> AppResult<checklist_item::Model> {
    checklist_item::Entity::find_by_id(item_id)
        .filter(checklist_item::Column::ActivityId.eq(activity_id))
        .one(&**db)
        .await?
        .ok_or_not_found("Checklist item not found")
}

/// POST /api/maintenance/activities/:id/checklist/:item_id/complete
pub async fn complete_checklist_item(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, item_id)): Path<(i64, i64)>,
    Json(req): Json<CompleteRequest>,
) -> AppResult<Json<ApiResponse<checklist_item::Model>>> {
    current_user.require(perm::MAINTENANCE_COMPLETE)?;
    let item = find_item(&db, id, item_id).await?;
    let item = activities::complete_checklist_item(&*db, item, current_user.id, req.notes.trim()).await?;
    Ok(Json(ApiResponse::success(item)))
}

/// DELETE /api/maintenance/activities/:id/checklist/:item_id
pub async fn delete_checklist_item(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::MAINTENANCE_EDIT)?;
    let item = find_item(&db, id, item_id).await?;
    checklist_item::Entity::delete_by_id(item.id).exec(&*db).await?;
    Ok(Json(ApiResponse::success_msg("Checklist item deleted")))
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub equipment_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// GET /api/maintenance/schedules
pub async fn list_schedules(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<Json<ApiResponse<Vec<maintenance_schedule::Model>>>> {
    require_view(&current_user)?;
    let mut select = maintenance_schedule::Entity::find();
    if let Some(id) = query.equipment_id {
        select = select.filter(maintenance_schedule::Column::EquipmentId.eq(id));
    }
    if let Some(active) = query.is_active {
        select = select.filter(maintenance_schedule::Column::IsActive.eq(active));
    }
    let all = select
        .order_by_asc(maintenance_schedule::Column::StartDate)
        .all(&*db)
        .await?;
    Ok(Json(ApiResponse::success(all)))
}

async fn find_schedule(db: &DbConn, id: i64) -> AppResult<maintenance_schedule::Model> {
    maintenance_schedule::Entity::find_by_id(id)
        .one(&**db)
        .await?
        .ok_or_not_found("Schedule not found")
}

/// GET /api/maintenance/schedules/:id
pub async fn get_schedule(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<maintenance_schedule::Model>>> {
    require_view(&current_user)?;
    Ok(Json(ApiResponse::success(find_schedule(&db, id).await?)))
}

/// POST /api/maintenance/schedules
pub async fn create_schedule(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<ScheduleInput>,
) -> AppResult<Json<ApiResponse<maintenance_schedule::Model>>> {
    require_manage(&current_user)?;
    let created = schedules::save(&*db, None, &input).await?;
    log_success(
        &current_user.username,
        OpType::Create,
        format!("schedule {} for equipment {}", created.id, created.equipment_id),
    );
    Ok(Json(ApiResponse::success(created)))
}

/// PUT /api/maintenance/schedules/:id
pub async fn update_schedule(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<ScheduleInput>,
) -> AppResult<Json<ApiResponse<maintenance_schedule::Model>>> {
    require_manage(&current_user)?;
    let existing = find_schedule(&db, id).await?;
    let updated = schedules::save(&*db, Some(existing), &input).await?;
    log_success(&current_user.username, OpType::Update, format!("schedule {}", updated.id));
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/maintenance/schedules/:id
///
/// Activities generated earlier are kept.
pub async fn delete_schedule(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require_manage(&current_user)?;
    let existing = find_schedule(&db, id).await?;
    maintenance_schedule::Entity::delete_by_id(existing.id).exec(&*db).await?;
    log_success(&current_user.username, OpType::Delete, format!("schedule {}", existing.id));
    Ok(Json(ApiResponse::success_msg("Schedule deleted")))
}

/// POST /api/maintenance/schedules/:id/generate
pub async fn generate_schedule(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Option<maintenance_activity::Model>>>> {
    require_manage(&current_user)?;
    let schedule = find_schedule(&db, id).await?;
    let generated = schedules::generate_next_activity(&state.db, &schedule, today()).await?;
    if let Some(activity) = &generated {
        state.cache.invalidate_dashboards().await;
        log_success(&current_user.username, OpType::Generate, format!("activity {}", activity.title));
    }
    Ok(Json(ApiResponse::success(generated)))
}

/// POST /api/maintenance/schedules/generate
pub async fn generate_all_schedules(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<GenerationSummary>>> {
    require_manage(&current_user)?;
    let summary = schedules::generate_all(&state.db, today()).await?;
    if summary.generated > 0 {
        state.cache.invalidate_dashboards().await;
    }
    log_success(
        &current_user.username,
        OpType::Generate,
        format!("{} activities from {} schedules", summary.generated, summary.schedules),
    );
    Ok(Json(ApiResponse::success(summary)))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub site_id: Option<i64>,
}

/// GET /api/maintenance/report
///
/// Defaults to the last 30 days.
pub async fn maintenance_report(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<ApiResponse<MaintenanceReport>>> {
    if !current_user.can_view_reports() {
        return Err(AppError::forbidden(perm::REPORTS_VIEW));
    }
    let to = query.to.unwrap_or_else(today);
    let from = query.from.unwrap_or(to - Duration::days(30));
    let report = reports::maintenance_report(&*db, from, to, query.site_id, now_ts()).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::service::equipment::tests::insert_equipment;
    use sea_orm::{ActiveModelTrait, Set};

    #[tokio::test]
    async fn test_overdue_condition_skips_closed() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "Breaker 1", None).await;
        let kind = activities::save_type(
            &db,
            None,
            &ActivityTypeInput {
                name: "Inspection".to_string(),
                category_id: None,
                description: String::new(),
                estimated_duration_hours: 1,
                frequency_days: 30,
                is_mandatory: true,
                checklist_template: String::new(),
                tools_required: String::new(),
                parts_required: String::new(),
                safety_notes: String::new(),
                is_active: true,
            },
        )
        .await
        .unwrap();

        let now = now_ts();
        for (status, end) in [
            ("scheduled", now - 3600),
            ("completed", now - 3600),
            ("in_progress", now + 3600),
            ("overdue", now + 3600),
        ] {
            maintenance_activity::ActiveModel {
                equipment_id: Set(eq.id),
                activity_type_id: Set(kind.id),
                title: Set(format!("{} activity", status)),
                description: Set(String::new()),
                status: Set(status.to_string()),
                priority: Set("medium".to_string()),
                scheduled_start: Set(end - 7200),
                scheduled_end: Set(end),
                actual_start: Set(None),
                actual_end: Set(None),
                assigned_to: Set(None),
                required_status: Set(String::new()),
                tools_required: Set(String::new()),
                parts_required: Set(String::new()),
                safety_notes: Set(String::new()),
                completion_notes: Set(String::new()),
                next_due_date: Set(None),
                created_by: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();
        }

        let overdue = maintenance_activity::Entity::find()
            .filter(overdue_condition(now))
            .all(&db)
            .await
            .unwrap();
        let mut titles: Vec<String> = overdue.into_iter().map(|a| a.title).collect();
        titles.sort();
        assert_eq!(titles, vec!["overdue activity", "scheduled activity"]);
    }
}
