//! Dashboard handler

use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;

use crate::entity::now_ts;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{perm, CurrentUser};
use crate::routes::ApiResponse;
use crate::service::dashboard::{self, DashboardData};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub site_id: Option<i64>,
    /// Ignore the user's default site and show every site
    #[serde(default)]
    pub all_sites: bool,
}

/// GET /api/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<ApiResponse<DashboardData>>> {
    if !current_user.can_view_maintenance() && !current_user.can_view_equipment() {
        return Err(AppError::forbidden(perm::MAINTENANCE_VIEW));
    }
    let site_id = if query.all_sites {
        None
    } else {
        query.site_id.or(current_user.default_site_id)
    };
    let data = dashboard::load(&state.db, &state.cache, current_user.id, site_id, now_ts()).await?;
    Ok(Json(ApiResponse::success(data)))
}
