//! Administrative tools: data reset, demo data and background jobs

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::entity::op_log::OpType;
use crate::error::{AppError, AppResult};
use crate::handlers::audit::service::log_success;
use crate::middleware::auth::{perm, CurrentUser};
use crate::routes::ApiResponse;
use crate::service::demo::{self, DemoSummary, ResetCounts, ResetScope};
use crate::state::AppState;
use crate::task::JobInfo;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub scope: String,
    /// Must be true, guards against accidental calls
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub scope: String,
    pub deleted: ResetCounts,
}

/// POST /api/admin/reset
pub async fn reset_data(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<ResetRequest>,
) -> AppResult<Json<ApiResponse<ResetResponse>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    if !req.confirm {
        return Err(AppError::BadRequest("Reset requires confirm=true".to_string()));
    }
    let scope = ResetScope::parse(&req.scope)
        .ok_or_else(|| AppError::validation(format!("Unknown reset scope: {}", req.scope)))?;

    let deleted = demo::reset(&state.db, scope).await?;
    state.cache.invalidate_dashboards().await;
    tracing::warn!("Data reset ({}) by {}: {:?}", req.scope, current_user.username, deleted);
    log_success(&current_user.username, OpType::Reset, format!("data reset: {}", req.scope));

    Ok(Json(ApiResponse::success(ResetResponse {
        scope: req.scope,
        deleted,
    })))
}

/// POST /api/admin/demo
pub async fn populate_demo(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<DemoSummary>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    let summary = demo::populate(&state.db).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Generate, "demo data");
    Ok(Json(ApiResponse::success(summary)))
}

/// GET /api/admin/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<JobInfo>>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    Ok(Json(ApiResponse::success(state.jobs.list())))
}

/// POST /api/admin/jobs/:name/run
pub async fn run_job(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(name): Path<String>,
) -> AppResult<Json<ApiResponse<JobInfo>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    let info = state.jobs.run_now(&name, &state.job_context()).await?;
    log_success(
        &current_user.username,
        OpType::RunJob,
        format!("{}: {}", name, info.last_result.as_deref().unwrap_or("")),
    );
    Ok(Json(ApiResponse::success(info)))
}
