//! Authentication handlers
//!
//! Implements login, logout, the current user and own-profile endpoints

use axum::{extract::State, http::HeaderMap, Extension, Json};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use tower_sessions::Session;

use crate::entity::op_log::{OpResult, OpType};
use crate::entity::{now_ts, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::{log_operation, log_success};
use crate::middleware::auth::{load_current_user, CurrentUser, SESSION_TIMESTAMP_KEY, SESSION_USER_KEY};
use crate::middleware::{client_ip, DbConn};
use crate::routes::ApiResponse;
use crate::service::settings::{self, PreferencesInput};
use crate::state::AppState;

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<CurrentUser>>> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest("Username and password are required".to_string()));
    }
    let ip = client_ip(&headers);
    let failed = |reason: &str| {
        log_operation(&req.username, OpType::Login, reason, OpResult::Failed, ip.as_deref());
        AppError::BadRequest("Invalid username or password".to_string())
    };

    let Some(db_user) = user::Entity::find()
        .filter(user::Column::Username.eq(&req.username))
        .one(&state.db)
        .await?
    else {
        tracing::warn!("Login failed: user not found - {}", req.username);
        return Err(failed("unknown user"));
    };

    if !bcrypt::verify(&req.password, &db_user.password).unwrap_or(false) {
        tracing::warn!("Login failed: wrong password - {}", req.username);
        return Err(failed("wrong password"));
    }
    if !db_user.is_active {
        tracing::warn!("Login failed: user disabled - {}", req.username);
        return Err(failed("account disabled"));
    }

    let mut active: user::ActiveModel = db_user.into();
    active.last_login = Set(now_ts());
    let db_user = active.update(&state.db).await?;

    session
        .insert(SESSION_USER_KEY, &db_user.username)
        .await
        .map_err(|e| AppError::Internal(format!("session: {}", e)))?;
    if let Err(e) = session.insert(SESSION_TIMESTAMP_KEY, now_ts()).await {
        tracing::error!("Failed to save session timestamp: {}", e);
    }

    tracing::info!("User logged in: {}", db_user.username);
    log_operation(&db_user.username, OpType::Login, "", OpResult::Success, ip.as_deref());

    let current = load_current_user(&state, db_user).await?;
    Ok(Json(ApiResponse::success(current)))
}

/// POST /api/logout
pub async fn logout(session: Session) -> AppResult<Json<ApiResponse<()>>> {
    let username: Option<String> = session.get(SESSION_USER_KEY).await.unwrap_or(None);
    session
        .flush()
        .await
        .map_err(|e| AppError::Internal(format!("session: {}", e)))?;
    if let Some(username) = username {
        log_success(&username, OpType::Logout, "");
    }
    Ok(Json(ApiResponse::success_msg("logout success")))
}

/// GET /api/user/current
pub async fn current_user(Extension(user): Extension<CurrentUser>) -> Json<ApiResponse<CurrentUser>> {
    Json(ApiResponse::success(user))
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// PUT /api/user/profile
pub async fn update_profile(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<ProfileRequest>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    let model = user::Entity::find_by_id(current_user.id)
        .one(&*db)
        .await?
        .ok_or_not_found("User not found")?;

    let mut active: user::ActiveModel = model.into();
    if let Some(first) = req.first_name {
        active.first_name = Set(first.trim().to_string());
    }
    if let Some(last) = req.last_name {
        active.last_name = Set(last.trim().to_string());
    }
    if let Some(email) = req.email {
        let email = email.trim().to_string();
        if !email.is_empty() && !email.contains('@') {
            return Err(AppError::validation("Enter a valid email address"));
        }
        active.email = Set(Some(email).filter(|e| !e.is_empty()));
    }
    if let Some(phone) = req.phone {
        active.phone = Set(phone.trim().to_string());
    }
    let updated = active.update(&*db).await?;

    log_success(&current_user.username, OpType::Update, "profile");
    Ok(Json(ApiResponse::success(updated.into())))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub const MIN_PASSWORD_LEN: usize = 8;

/// POST /api/user/change-password
pub async fn change_password(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let model = user::Entity::find_by_id(current_user.id)
        .one(&*db)
        .await?
        .ok_or_not_found("User not found")?;

    if !bcrypt::verify(&req.old_password, &model.password).unwrap_or(false) {
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let hashed = bcrypt::hash(&req.new_password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let mut active: user::ActiveModel = model.into();
    active.password = Set(hashed);
    active.update(&*db).await?;

    log_success(&current_user.username, OpType::Update, "password");
    Ok(Json(ApiResponse::success_msg("Password changed")))
}

/// PUT /api/user/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<PreferencesInput>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    let model = user::Entity::find_by_id(current_user.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("User not found")?;
    let updated = settings::update_preferences(&state.db, model, &input).await?;
    // The default site drives which dashboard the user sees.
    state.cache.invalidate_dashboards().await;
    Ok(Json(ApiResponse::success(updated.into())))
}
