//! Role handlers
//!
//! Role metadata lives in `md_role`; grants are casbin policy lines

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::entity::op_log::OpType;
use crate::entity::{now_ts, permission, role, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::log_success;
use crate::middleware::auth::{perm, CurrentUser};
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Role with its grants and member count
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    #[serde(flatten)]
    pub role: role::Model,
    pub permissions: Vec<String>,
    pub user_count: u64,
}

async fn describe(state: &AppState, role: role::Model) -> AppResult<RoleResponse> {
    let permissions = state.perm.role_permissions(&role.name).await?;
    let user_count = user::Entity::find()
        .filter(user::Column::RoleId.eq(role.id))
        .count(&state.db)
        .await?;
    Ok(RoleResponse {
        role,
        permissions,
        user_count,
    })
}

fn can_read_roles(user: &CurrentUser) -> AppResult<()> {
    if user.can_manage_users() {
        Ok(())
    } else {
        user.require(perm::USERS_VIEW)
    }
}

/// Reject unknown codenames before anything is written
async fn validate(state: &AppState, req: &RoleRequest, self_id: Option<i64>) -> AppResult<()> {
    let name = req.name.trim();
    if name.is_empty() || name.len() > 50 {
        return Err(AppError::validation("Role name is required (at most 50 characters)"));
    }
    if let Some(other) = role::Entity::find()
        .filter(role::Column::Name.eq(name))
        .one(&state.db)
        .await?
    {
        if Some(other.id) != self_id {
            return Err(AppError::Conflict(format!("Role '{}' already exists", name)));
        }
    }

    let known: HashSet<String> = permission::Entity::find()
        .all(&state.db)
        .await?
        .into_iter()
        .map(|p| p.codename)
        .collect();
    let unknown: Vec<&str> = req
        .permissions
        .iter()
        .filter(|p| !known.contains(p.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::validation(format!(
            "Unknown permissions: {}",
            unknown.join(", ")
        )));
    }
    Ok(())
}

/// GET /api/roles
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<RoleResponse>>>> {
    can_read_roles(&current_user)?;
    let roles = role::Entity::find()
        .order_by_asc(role::Column::Name)
        .all(&state.db)
        .await?;
    let mut out = Vec::with_capacity(roles.len());
    for r in roles {
        out.push(describe(&state, r).await?);
    }
    Ok(Json(ApiResponse::success(out)))
}

/// GET /api/roles/:id
pub async fn get_role(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<RoleResponse>>> {
    can_read_roles(&current_user)?;
    let r = role::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("Role not found")?;
    Ok(Json(ApiResponse::success(describe(&state, r).await?)))
}

/// POST /api/roles
pub async fn create_role(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<ApiResponse<RoleResponse>>> {
    current_user.require(perm::USERS_MANAGE)?;
    validate(&state, &req, None).await?;

    let now = now_ts();
    let name = req.name.trim().to_string();
    let display_name = if req.display_name.trim().is_empty() {
        name.clone()
    } else {
        req.display_name.trim().to_string()
    };
    let created = role::ActiveModel {
        name: Set(name),
        display_name: Set(display_name),
        description: Set(req.description.clone()),
        is_active: Set(req.is_active),
        is_system_role: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    state.perm.set_role_permissions(&created.name, &req.permissions).await?;

    log_success(&current_user.username, OpType::Create, format!("role {}", created.name));
    Ok(Json(ApiResponse::success(describe(&state, created).await?)))
}

/// PUT /api/roles/:id
pub async fn update_role(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<ApiResponse<RoleResponse>>> {
    current_user.require(perm::USERS_MANAGE)?;
    let existing = role::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("Role not found")?;
    validate(&state, &req, Some(id)).await?;

    let new_name = req.name.trim().to_string();
    if existing.is_system_role && new_name != existing.name {
        return Err(AppError::BadRequest("System roles cannot be renamed".to_string()));
    }
    let old_name = existing.name.clone();

    let mut active: role::ActiveModel = existing.into();
    active.name = Set(new_name.clone());
    if !req.display_name.trim().is_empty() {
        active.display_name = Set(req.display_name.trim().to_string());
    }
    active.description = Set(req.description.clone());
    active.is_active = Set(req.is_active);
    active.updated_at = Set(now_ts());
    let updated = active.update(&state.db).await?;

    state.perm.rename_role(&old_name, &new_name).await?;
    state.perm.set_role_permissions(&new_name, &req.permissions).await?;

    log_success(&current_user.username, OpType::Update, format!("role {}", new_name));
    Ok(Json(ApiResponse::success(describe(&state, updated).await?)))
}

/// DELETE /api/roles/:id
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::USERS_MANAGE)?;
    let existing = role::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("Role not found")?;

    if existing.is_system_role {
        return Err(AppError::BadRequest("System roles cannot be deleted".to_string()));
    }
    let members = user::Entity::find()
        .filter(user::Column::RoleId.eq(existing.id))
        .count(&state.db)
        .await?;
    if members > 0 {
        return Err(AppError::Conflict(format!(
            "Role '{}' is assigned to {} users",
            existing.name, members
        )));
    }

    role::Entity::delete_by_id(id).exec(&state.db).await?;
    state.perm.delete_role_rules(&existing.name).await?;

    log_success(&current_user.username, OpType::Delete, format!("role {}", existing.name));
    Ok(Json(ApiResponse::success_msg("Role deleted")))
}

/// GET /api/permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<permission::Model>>>> {
    can_read_roles(&current_user)?;
    let all = permission::Entity::find()
        .order_by_asc(permission::Column::Module)
        .order_by_asc(permission::Column::Codename)
        .all(&state.db)
        .await?;
    Ok(Json(ApiResponse::success(all)))
}
