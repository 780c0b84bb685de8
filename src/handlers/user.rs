//! User handlers
//!
//! Implements user CRUD and role assignment

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::op_log::OpType;
use crate::entity::{now_ts, role, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::log_success;
use crate::handlers::auth::MIN_PASSWORD_LEN;
use crate::middleware::auth::{perm, CurrentUser};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    25
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<user::UserResponse>,
    pub total: u64,
}

/// Attach role names to user rows
async fn with_roles(db: &DbConn, users: Vec<user::Model>) -> AppResult<Vec<user::UserResponse>> {
    let roles: HashMap<i64, String> = role::Entity::find()
        .all(&**db)
        .await?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();
    Ok(users
        .into_iter()
        .map(|u| {
            let mut response = user::UserResponse::from(u);
            response.role = response.role_id.and_then(|id| roles.get(&id).cloned());
            response
        })
        .collect())
}

/// GET /api/users
pub async fn list_users(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<ApiResponse<UserPage>>> {
    if !current_user.can_manage_users() {
        current_user.require(perm::USERS_VIEW)?;
    }

    let mut select = user::Entity::find();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(user::Column::Username.contains(search))
                .add(user::Column::FirstName.contains(search))
                .add(user::Column::LastName.contains(search))
                .add(user::Column::Email.contains(search)),
        );
    }
    if let Some(role_id) = query.role_id {
        select = select.filter(user::Column::RoleId.eq(role_id));
    }
    if let Some(active) = query.is_active {
        select = select.filter(user::Column::IsActive.eq(active));
    }

    let page_size = query.page_size.clamp(1, 200);
    let total = select.clone().count(&*db).await?;
    let users = select
        .order_by_asc(user::Column::Username)
        .offset((query.page.max(1) - 1) * page_size)
        .limit(page_size)
        .all(&*db)
        .await?;

    Ok(Json(ApiResponse::success(UserPage {
        users: with_roles(&db, users).await?,
        total,
    })))
}

/// GET /api/users/:id
pub async fn get_user(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    if current_user.id != id && !current_user.can_manage_users() {
        current_user.require(perm::USERS_VIEW)?;
    }
    let model = user::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("User not found")?;
    let mut users = with_roles(&db, vec![model]).await?;
    users.pop().map(|u| Json(ApiResponse::success(u))).ok_or_not_found("User not found")
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub username: String,
    /// Required on create; on update an empty value keeps the current one
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub role_id: Option<i64>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub department: String,
}

fn default_true() -> bool {
    true
}

fn hash_password(password: &str) -> AppResult<String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| AppError::Internal(e.to_string()))
}

async fn find_role(db: &DbConn, role_id: Option<i64>) -> AppResult<Option<role::Model>> {
    match role_id {
        Some(id) => Ok(Some(
            role::Entity::find_by_id(id)
                .one(&**db)
                .await?
                .ok_or_else(|| AppError::validation("Role does not exist"))?,
        )),
        None => Ok(None),
    }
}

async fn check_unique(db: &DbConn, req: &UserRequest, self_id: Option<i64>) -> AppResult<()> {
    let username = req.username.trim();
    if username.is_empty() || username.len() > 150 {
        return Err(AppError::validation("Username is required (at most 150 characters)"));
    }
    if let Some(other) = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(&**db)
        .await?
    {
        if Some(other.id) != self_id {
            return Err(AppError::Conflict(format!("Username '{}' is taken", username)));
        }
    }
    if let Some(email) = req.email.as_deref().filter(|e| !e.is_empty()) {
        if !email.contains('@') {
            return Err(AppError::validation("Enter a valid email address"));
        }
    }
    Ok(())
}

fn apply(active: &mut user::ActiveModel, req: &UserRequest) {
    active.username = Set(req.username.trim().to_string());
    active.email = Set(req.email.clone().map(|e| e.trim().to_string()).filter(|e| !e.is_empty()));
    active.first_name = Set(req.first_name.trim().to_string());
    active.last_name = Set(req.last_name.trim().to_string());
    active.is_superuser = Set(req.is_superuser);
    active.is_active = Set(req.is_active);
    active.phone = Set(req.phone.trim().to_string());
    active.employee_id = Set(req.employee_id.trim().to_string());
    active.department = Set(req.department.trim().to_string());
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<UserRequest>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    current_user.require(perm::USERS_MANAGE)?;
    check_unique(&db, &req, None).await?;
    let role = find_role(&db, req.role_id).await?;

    let mut active = user::ActiveModel {
        password: Set(hash_password(&req.password)?),
        role_id: Set(None),
        default_location_id: Set(None),
        default_site_id: Set(None),
        email_notifications: Set(true),
        sms_notifications: Set(false),
        notification_frequency: Set("immediate".to_string()),
        theme_preference: Set("dark".to_string()),
        last_login: Set(0),
        created_at: Set(now_ts()),
        ..Default::default()
    };
    apply(&mut active, &req);
    let created = active.insert(&*db).await?;
    let created = state.perm.set_user_role(created, role.as_ref()).await?;

    tracing::info!("User created: {}", created.username);
    log_success(&current_user.username, OpType::Create, format!("user {}", created.username));
    let mut users = with_roles(&db, vec![created]).await?;
    users.pop().map(|u| Json(ApiResponse::success(u))).ok_or_not_found("User not found")
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UserRequest>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    current_user.require(perm::USERS_MANAGE)?;
    let existing = user::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("User not found")?;
    check_unique(&db, &req, Some(id)).await?;
    let role = find_role(&db, req.role_id).await?;

    if existing.id == current_user.id && (!req.is_active || (existing.is_superuser && !req.is_superuser)) {
        return Err(AppError::BadRequest(
            "You cannot deactivate or demote your own account".to_string(),
        ));
    }

    let old_username = existing.username.clone();
    let mut active: user::ActiveModel = existing.into();
    apply(&mut active, &req);
    if !req.password.is_empty() {
        active.password = Set(hash_password(&req.password)?);
    }
    let updated = active.update(&*db).await?;
    if old_username != updated.username {
        state.perm.forget_user(&old_username).await?;
    }
    let updated = state.perm.set_user_role(updated, role.as_ref()).await?;

    log_success(&current_user.username, OpType::Update, format!("user {}", updated.username));
    let mut users = with_roles(&db, vec![updated]).await?;
    users.pop().map(|u| Json(ApiResponse::success(u))).ok_or_not_found("User not found")
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::USERS_MANAGE)?;
    if id == current_user.id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }
    let existing = user::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("User not found")?;

    state.perm.forget_user(&existing.username).await?;
    user::Entity::delete_by_id(id).exec(&*db).await?;

    log_success(&current_user.username, OpType::Delete, format!("user {}", existing.username));
    Ok(Json(ApiResponse::success_msg("User deleted")))
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: Option<i64>,
}

/// PUT /api/users/:id/role
pub async fn assign_role(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<AssignRoleRequest>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    current_user.require(perm::USERS_MANAGE)?;
    let existing = user::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("User not found")?;
    let role = find_role(&db, req.role_id).await?;
    let updated = state.perm.set_user_role(existing, role.as_ref()).await?;

    log_success(
        &current_user.username,
        OpType::Update,
        format!(
            "user {} role {}",
            updated.username,
            role.as_ref().map(|r| r.name.as_str()).unwrap_or("none")
        ),
    );
    let mut users = with_roles(&db, vec![updated]).await?;
    users.pop().map(|u| Json(ApiResponse::success(u))).ok_or_not_found("User not found")
}
