//! Container redeploy webhook
//!
//! The inbound endpoint is authenticated by a shared secret header, the
//! rest are admin endpoints for the Portainer connection.

use axum::{extract::State, http::HeaderMap, response::Json, Extension};
use serde::Serialize;

use crate::entity::op_log::{OpResult, OpType};
use crate::entity::portainer_config;
use crate::error::{AppError, AppResult};
use crate::handlers::audit::service::{log_operation, log_success};
use crate::middleware::auth::{perm, CurrentUser};
use crate::middleware::client_ip;
use crate::routes::ApiResponse;
use crate::service::webhook::{
    self, ConnectionReport, PortainerInput, PortainerView, RedeployOutcome, SECRET_HEADER,
};
use crate::state::AppState;

const WEBHOOK_USER: &str = "webhook";

/// POST /api/webhook/redeploy
pub async fn redeploy(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<RedeployOutcome>>> {
    let ip = client_ip(&headers);
    let Some(config) = webhook::config(&state.db).await? else {
        return Err(AppError::Unavailable("Webhook is not configured".to_string()));
    };

    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !webhook::secret_matches(&config.webhook_secret, provided) {
        tracing::warn!("Redeploy webhook rejected from {}", ip.as_deref().unwrap_or("unknown"));
        log_operation(WEBHOOK_USER, OpType::Redeploy, "invalid secret", OpResult::Failed, ip.as_deref());
        return Err(AppError::Forbidden("Invalid webhook secret".to_string()));
    }

    match webhook::trigger_redeploy(&config).await {
        Ok(outcome) => {
            let result = if outcome.success { OpResult::Success } else { OpResult::Failed };
            log_operation(
                WEBHOOK_USER,
                OpType::Redeploy,
                &format!("stack {} status {}", config.stack_name, outcome.status),
                result,
                ip.as_deref(),
            );
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => {
            tracing::error!("Redeploy of stack {} failed: {}", config.stack_name, e);
            log_operation(WEBHOOK_USER, OpType::Redeploy, &e.to_string(), OpResult::Failed, ip.as_deref());
            Err(e)
        }
    }
}

async fn require_config(state: &AppState) -> AppResult<portainer_config::Model> {
    webhook::config(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Portainer is not configured".to_string()))
}

/// GET /api/admin/webhook
pub async fn show_config(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Option<PortainerView>>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    let view = webhook::config(&state.db).await?.as_ref().map(PortainerView::from);
    Ok(Json(ApiResponse::success(view)))
}

/// PUT /api/admin/webhook
pub async fn update_config(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<PortainerInput>,
) -> AppResult<Json<ApiResponse<PortainerView>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    let saved = webhook::save(&state.db, &input).await?;
    log_success(&current_user.username, OpType::Update, "portainer config");
    Ok(Json(ApiResponse::success(PortainerView::from(&saved))))
}

/// POST /api/admin/webhook/test
pub async fn test_config(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<ConnectionReport>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    let config = require_config(&state).await?;
    Ok(Json(ApiResponse::success(webhook::test_connection(&config).await?)))
}

/// POST /api/admin/webhook/trigger
pub async fn trigger(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<RedeployOutcome>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    let config = require_config(&state).await?;
    let outcome = webhook::trigger_redeploy(&config).await?;
    log_success(
        &current_user.username,
        OpType::Redeploy,
        format!("stack {} status {}", config.stack_name, outcome.status),
    );
    Ok(Json(ApiResponse::success(outcome)))
}

#[derive(Debug, Serialize)]
pub struct SecretResponse {
    /// Shown once, only the masked value is available afterwards
    pub webhook_secret: String,
}

/// POST /api/admin/webhook/rotate-secret
pub async fn rotate_secret(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<SecretResponse>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    let secret = webhook::rotate_secret(&state.db).await?;
    log_success(&current_user.username, OpType::Update, "webhook secret rotated");
    Ok(Json(ApiResponse::success(SecretResponse { webhook_secret: secret })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_redeploy_without_config_is_unavailable() {
        let state = test_state().await;
        let result = redeploy(State(state), HeaderMap::new()).await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_redeploy_rejects_wrong_secret() {
        let state = test_state().await;
        webhook::save(
            &state.db,
            &PortainerInput {
                portainer_url: "http://127.0.0.1:9".to_string(),
                stack_name: "maintdash".to_string(),
                portainer_user: "admin".to_string(),
                portainer_password: "secret".to_string(),
                webhook_secret: "expected-secret".to_string(),
                endpoint_id: 1,
            },
        )
        .await
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, HeaderValue::from_static("wrong"));
        let result = redeploy(State(state), headers).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
