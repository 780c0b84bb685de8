//! Calendar event handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entity::op_log::OpType;
use crate::entity::{calendar_event, equipment, event_comment};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::log_success;
use crate::middleware::auth::{perm, CurrentUser};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::service::event::{self as events, EventFilter, EventInput, EventView, TimelineEntry};
use crate::state::AppState;

fn require_view(user: &CurrentUser) -> AppResult<()> {
    if user.can_view_calendar() {
        Ok(())
    } else {
        Err(AppError::forbidden(perm::CALENDAR_VIEW))
    }
}

async fn find(db: &DbConn, id: i64) -> AppResult<calendar_event::Model> {
    calendar_event::Entity::find_by_id(id)
        .one(&**db)
        .await?
        .ok_or_not_found("Event not found")
}

/// GET /api/calendar/events
pub async fn list_events(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(filter): Query<EventFilter>,
) -> AppResult<Json<ApiResponse<Vec<EventView>>>> {
    require_view(&current_user)?;
    if let (Some(start), Some(end)) = (filter.start, filter.end) {
        if end < start {
            return Err(AppError::validation("End date cannot be before the start date"));
        }
    }
    Ok(Json(ApiResponse::success(events::list(&*db, &filter).await?)))
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub view: EventView,
    pub comments: Vec<event_comment::Model>,
}

/// GET /api/calendar/events/:id
///
/// Internal comments are only shown to users who can edit events.
pub async fn get_event(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<EventDetail>>> {
    require_view(&current_user)?;
    let event = find(&db, id).await?;
    let view = events::views(&*db, vec![event])
        .await?
        .pop()
        .ok_or_not_found("Event not found")?;

    let mut select = event_comment::Entity::find().filter(event_comment::Column::EventId.eq(id));
    if !current_user.has_permission(perm::CALENDAR_EDIT) {
        select = select.filter(event_comment::Column::IsInternal.eq(false));
    }
    let comments = select
        .order_by_asc(event_comment::Column::CreatedAt)
        .all(&*db)
        .await?;

    Ok(Json(ApiResponse::success(EventDetail { view, comments })))
}

/// POST /api/calendar/events
pub async fn create_event(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<EventInput>,
) -> AppResult<Json<ApiResponse<calendar_event::Model>>> {
    current_user.require(perm::CALENDAR_CREATE)?;
    let created = events::create(&state.db, &input, Some(current_user.id)).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Create, format!("event {}", created.title));
    Ok(Json(ApiResponse::success(created)))
}

/// PUT /api/calendar/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<EventInput>,
) -> AppResult<Json<ApiResponse<calendar_event::Model>>> {
    current_user.require(perm::CALENDAR_EDIT)?;
    let existing = find(&db, id).await?;
    let updated = events::update(&state.db, existing, &input).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Update, format!("event {}", updated.title));
    Ok(Json(ApiResponse::success(updated)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteEventRequest {
    #[serde(default)]
    pub notes: String,
}

/// POST /api/calendar/events/:id/complete
pub async fn complete_event(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<CompleteEventRequest>,
) -> AppResult<Json<ApiResponse<calendar_event::Model>>> {
    current_user.require(perm::CALENDAR_EDIT)?;
    let existing = find(&db, id).await?;
    if existing.is_completed {
        return Err(AppError::BadRequest("Event is already completed".to_string()));
    }
    let completed = events::complete(&state.db, existing, &req.notes).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Complete, format!("event {}", completed.title));
    Ok(Json(ApiResponse::success(completed)))
}

/// DELETE /api/calendar/events/:id
pub async fn delete_event(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::CALENDAR_DELETE)?;
    let existing = find(&db, id).await?;
    events::delete(&state.db, id).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Delete, format!("event {}", existing.title));
    Ok(Json(ApiResponse::success_msg("Event deleted")))
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub comment: String,
    #[serde(default)]
    pub is_internal: bool,
}

/// POST /api/calendar/events/:id/comments
pub async fn add_comment(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Json<ApiResponse<event_comment::Model>>> {
    require_view(&current_user)?;
    if req.is_internal {
        current_user.require(perm::CALENDAR_EDIT)?;
    }
    let event = find(&db, id).await?;
    let comment = events::add_comment(&*db, event.id, current_user.id, &req.comment, req.is_internal).await?;
    Ok(Json(ApiResponse::success(comment)))
}

/// DELETE /api/calendar/events/:id/comments/:comment_id
///
/// Authors can remove their own comments.
pub async fn delete_comment(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, comment_id)): Path<(i64, i64)>,
) -> AppResult<Json<ApiResponse<()>>> {
    let comment = event_comment::Entity::find_by_id(comment_id)
        .filter(event_comment::Column::EventId.eq(id))
        .one(&*db)
        .await?
        .ok_or_not_found("Comment not found")?;
    if comment.user_id != current_user.id {
        current_user.require(perm::CALENDAR_DELETE)?;
    }
    event_comment::Entity::delete_by_id(comment.id).exec(&*db).await?;
    Ok(Json(ApiResponse::success_msg("Comment deleted")))
}

/// GET /api/equipment/:id/timeline
pub async fn equipment_timeline(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<TimelineEntry>>>> {
    require_view(&current_user)?;
    equipment::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("Equipment not found")?;
    Ok(Json(ApiResponse::success(events::timeline(&*db, id).await?)))
}
