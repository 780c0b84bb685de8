//! Branding and dashboard settings handlers

use axum::{extract::State, response::Json, Extension};
use serde_json::Value;

use crate::entity::op_log::OpType;
use crate::entity::{branding_settings, dashboard_settings};
use crate::error::{AppError, AppResult};
use crate::handlers::audit::service::log_success;
use crate::middleware::auth::{perm, CurrentUser};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::service::settings;
use crate::state::AppState;

fn require_manage(user: &CurrentUser) -> AppResult<()> {
    if user.can_manage_settings() {
        Ok(())
    } else {
        Err(AppError::forbidden(perm::SETTINGS_MANAGE))
    }
}

/// GET /api/settings/branding
///
/// Public, the login page needs it before anyone signs in.
pub async fn get_branding(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<branding_settings::Model>>> {
    Ok(Json(ApiResponse::success(settings::branding(&state.db).await?)))
}

/// PUT /api/settings/branding
///
/// Accepts any subset of the branding fields.
pub async fn update_branding(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(patch): Json<Value>,
) -> AppResult<Json<ApiResponse<branding_settings::Model>>> {
    require_manage(&current_user)?;
    let updated = settings::update_branding(&*db, patch).await?;
    log_success(&current_user.username, OpType::Update, "branding settings");
    Ok(Json(ApiResponse::success(updated)))
}

/// POST /api/settings/branding/reset
pub async fn reset_branding(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<branding_settings::Model>>> {
    require_manage(&current_user)?;
    let reset = settings::reset_branding(&*db).await?;
    log_success(&current_user.username, OpType::Reset, "branding settings");
    Ok(Json(ApiResponse::success(reset)))
}

/// GET /api/settings/dashboard
pub async fn get_dashboard_settings(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<dashboard_settings::Model>>> {
    if !current_user.can_manage_settings() {
        current_user.require(perm::SETTINGS_VIEW)?;
    }
    Ok(Json(ApiResponse::success(settings::dashboard(&*db).await?)))
}

/// PUT /api/settings/dashboard
pub async fn update_dashboard_settings(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(patch): Json<Value>,
) -> AppResult<Json<ApiResponse<dashboard_settings::Model>>> {
    require_manage(&current_user)?;
    let updated = settings::update_dashboard(&state.db, patch).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Update, "dashboard settings");
    Ok(Json(ApiResponse::success(updated)))
}

/// POST /api/settings/dashboard/reset
pub async fn reset_dashboard_settings(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<dashboard_settings::Model>>> {
    require_manage(&current_user)?;
    let reset = settings::reset_dashboard(&state.db).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Reset, "dashboard settings");
    Ok(Json(ApiResponse::success(reset)))
}
