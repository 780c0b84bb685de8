//! Authentication middleware
//!
//! Provides session-based authentication for API routes

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use serde_json::json;
use std::ops::Deref;
use tower_sessions::Session;

use crate::entity::{role, user};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub use crate::permission::perm;

/// Session key for storing username
pub const SESSION_USER_KEY: &str = "user";
pub const SESSION_TIMESTAMP_KEY: &str = "timestamp";

/// Database connection wrapper for use in handlers via Extension
#[derive(Clone)]
pub struct DbConn(pub DatabaseConnection);

impl Deref for DbConn {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extension to store current user in request
#[derive(Clone, Debug, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub is_superuser: bool,
    /// Role name, if any
    pub role: Option<String>,
    pub default_site_id: Option<i64>,
    pub default_location_id: Option<i64>,
    pub theme_preference: String,
    /// Active permission codenames resolved through casbin
    pub permissions: Vec<String>,
}

impl CurrentUser {
    pub fn has_permission(&self, codename: &str) -> bool {
        self.is_superuser
            || self
                .permissions
                .iter()
                .any(|p| p == codename || p == perm::ADMIN_FULL_ACCESS)
    }

    /// Reject with 403 unless the permission is held
    pub fn require(&self, codename: &str) -> AppResult<()> {
        if self.has_permission(codename) {
            Ok(())
        } else {
            Err(AppError::forbidden(codename))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.has_permission(perm::ADMIN_FULL_ACCESS)
    }

    pub fn can_view_equipment(&self) -> bool {
        self.is_admin() || self.has_permission(perm::EQUIPMENT_VIEW)
    }

    pub fn can_manage_equipment(&self) -> bool {
        self.is_admin()
            || self.has_permission(perm::EQUIPMENT_CREATE)
            || self.has_permission(perm::EQUIPMENT_EDIT)
    }

    pub fn can_view_maintenance(&self) -> bool {
        self.is_admin() || self.has_permission(perm::MAINTENANCE_VIEW)
    }

    pub fn can_manage_maintenance(&self) -> bool {
        self.is_admin()
            || self.has_permission(perm::MAINTENANCE_MANAGE)
            || self.has_permission(perm::MAINTENANCE_MANAGE_ALL)
    }

    pub fn can_view_calendar(&self) -> bool {
        self.is_admin() || self.has_permission(perm::CALENDAR_VIEW)
    }

    pub fn can_manage_users(&self) -> bool {
        self.is_admin() || self.has_permission(perm::USERS_MANAGE)
    }

    pub fn can_manage_settings(&self) -> bool {
        self.is_admin() || self.has_permission(perm::SETTINGS_MANAGE)
    }

    pub fn can_view_reports(&self) -> bool {
        self.is_admin() || self.has_permission(perm::REPORTS_VIEW)
    }
}

/// Paths that don't require authentication
fn is_public_path(method: &Method, path: &str) -> bool {
    // Everything outside the API is the static frontend
    if !path.starts_with("/api") {
        return true;
    }

    if path == "/api/login" || path == "/api/logout" || path == "/api/health" {
        return true;
    }
    // Authenticated by the shared secret header instead
    if path == "/api/webhook/redeploy" {
        return true;
    }
    // The login page renders with branding before anyone signs in
    if path == "/api/settings/branding" && method == Method::GET {
        return true;
    }
    false
}

/// Best-effort client address from proxy headers
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
}

/// Resolve a user row into the request extension
pub async fn load_current_user(state: &AppState, user_model: user::Model) -> Result<CurrentUser, sea_orm::DbErr> {
    let role_name = match user_model.role_id {
        Some(role_id) => role::Entity::find_by_id(role_id)
            .one(&state.db)
            .await?
            .map(|r| r.name),
        None => None,
    };
    let permissions = state.perm.user_permissions(&user_model).await;
    let full_name = user_model.full_name();

    Ok(CurrentUser {
        id: user_model.id,
        username: user_model.username,
        full_name,
        email: user_model.email.unwrap_or_default(),
        is_superuser: user_model.is_superuser,
        role: role_name,
        default_site_id: user_model.default_site_id,
        default_location_id: user_model.default_location_id,
        theme_preference: user_model.theme_preference,
        permissions,
    })
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    // All handlers can reach the pool via Extension<DbConn>
    request.extensions_mut().insert(DbConn(state.db.clone()));

    if is_public_path(&method, &path) {
        return next.run(request).await;
    }

    let username: Option<String> = session.get(SESSION_USER_KEY).await.unwrap_or(None);

    let Some(username) = username else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": false, "error": "unauthorized"})),
        )
            .into_response();
    };

    let user_result = user::Entity::find()
        .filter(user::Column::Username.eq(&username))
        .one(&state.db)
        .await;

    match user_result {
        Ok(Some(user_model)) if user_model.is_active => {
            match load_current_user(&state, user_model).await {
                Ok(current_user) => {
                    request.extensions_mut().insert(current_user);
                    next.run(request).await
                }
                Err(e) => {
                    tracing::error!("Database error during auth: {}", e);
                    AppError::Database(e).into_response()
                }
            }
        }
        Ok(Some(_)) => {
            tracing::warn!("Inactive user tried to use a session: {}", username);
            let _ = session.flush().await;
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"code": false, "error": "account_disabled"})),
            )
                .into_response()
        }
        Ok(None) => {
            tracing::warn!("User not found in database: {}", username);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"code": false, "error": "invalid_session"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error during auth: {}", e);
            AppError::Database(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(perms: &[&str], superuser: bool) -> CurrentUser {
        CurrentUser {
            id: 1,
            username: "u".to_string(),
            full_name: "U".to_string(),
            email: String::new(),
            is_superuser: superuser,
            role: None,
            default_site_id: None,
            default_location_id: None,
            theme_preference: "dark".to_string(),
            permissions: perms.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_public_paths() {
        assert!(is_public_path(&Method::GET, "/index.html"));
        assert!(is_public_path(&Method::POST, "/api/login"));
        assert!(is_public_path(&Method::GET, "/api/health"));
        assert!(is_public_path(&Method::POST, "/api/webhook/redeploy"));
        assert!(is_public_path(&Method::GET, "/api/settings/branding"));
        assert!(!is_public_path(&Method::PUT, "/api/settings/branding"));
        assert!(!is_public_path(&Method::GET, "/api/equipment"));
    }

    #[test]
    fn test_require() {
        let viewer = user_with(&[perm::EQUIPMENT_VIEW], false);
        assert!(viewer.require(perm::EQUIPMENT_VIEW).is_ok());
        let err = viewer.require(perm::EQUIPMENT_CREATE).unwrap_err();
        assert_eq!(err.to_string(), "Required permission: equipment.create");
        assert!(!viewer.can_manage_equipment());
    }

    #[test]
    fn test_admin_helpers() {
        let admin = user_with(&[perm::ADMIN_FULL_ACCESS], false);
        assert!(admin.is_admin());
        assert!(admin.can_manage_users());
        assert!(admin.has_permission(perm::REPORTS_GENERATE));

        let root = user_with(&[], true);
        assert!(root.is_admin());
        assert!(root.require(perm::SETTINGS_MANAGE).is_ok());
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.1"));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
