//! Container redeploy through the Portainer API

use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::entity::{now_ts, portainer_config};
use crate::error::{AppError, AppResult};

pub const SECRET_HEADER: &str = "X-Webhook-Secret";
const SINGLETON_ID: i64 = 1;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 32 random hex characters
pub fn generate_secret() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Compare secrets without leaking where they differ
pub fn secret_matches(expected: &str, provided: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(provided.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Short fingerprint for logs, never the secret itself
pub fn fingerprint(secret: &str) -> String {
    hex::encode(&Sha256::digest(secret.as_bytes())[..4])
}

pub fn mask(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else if value.chars().count() <= 8 {
        "********".to_string()
    } else {
        let tail: String = value.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("********{}", tail)
    }
}

/// Config as shown to administrators
#[derive(Debug, Clone, Serialize)]
pub struct PortainerView {
    pub configured: bool,
    pub portainer_url: String,
    pub stack_name: String,
    pub portainer_user: String,
    pub portainer_password: String,
    pub webhook_secret: String,
    pub endpoint_id: i64,
    pub updated_at: i64,
}

impl From<&portainer_config::Model> for PortainerView {
    fn from(model: &portainer_config::Model) -> Self {
        Self {
            configured: model.is_complete(),
            portainer_url: model.portainer_url.clone(),
            stack_name: model.stack_name.clone(),
            portainer_user: model.portainer_user.clone(),
            portainer_password: mask(&model.portainer_password),
            webhook_secret: mask(&model.webhook_secret),
            endpoint_id: model.endpoint_id,
            updated_at: model.updated_at,
        }
    }
}

/// Blank password or secret keeps the stored value
#[derive(Debug, Clone, Deserialize)]
pub struct PortainerInput {
    pub portainer_url: String,
    pub stack_name: String,
    #[serde(default)]
    pub portainer_user: String,
    #[serde(default)]
    pub portainer_password: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_endpoint")]
    pub endpoint_id: i64,
}

fn default_endpoint() -> i64 {
    1
}

pub async fn config<C: ConnectionTrait>(db: &C) -> Result<Option<portainer_config::Model>, sea_orm::DbErr> {
    portainer_config::Entity::find_by_id(SINGLETON_ID).one(db).await
}

pub async fn save<C: ConnectionTrait>(db: &C, input: &PortainerInput) -> AppResult<portainer_config::Model> {
    let url = input.portainer_url.trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::validation("Portainer URL must start with http:// or https://"));
    }
    if input.stack_name.trim().is_empty() {
        return Err(AppError::validation("Stack name is required"));
    }
    if input.endpoint_id < 1 {
        return Err(AppError::validation("Endpoint id must be at least 1"));
    }

    let now = now_ts();
    let existing = config(db).await?;
    let is_new = existing.is_none();
    let mut active: portainer_config::ActiveModel = match existing {
        Some(c) => c.into(),
        None => portainer_config::ActiveModel {
            id: Set(SINGLETON_ID),
            portainer_password: Set(String::new()),
            webhook_secret: Set(generate_secret()),
            created_at: Set(now),
            ..Default::default()
        },
    };
    active.portainer_url = Set(url.to_string());
    active.stack_name = Set(input.stack_name.trim().to_string());
    active.portainer_user = Set(input.portainer_user.trim().to_string());
    if !input.portainer_password.is_empty() {
        active.portainer_password = Set(input.portainer_password.clone());
    }
    if !input.webhook_secret.trim().is_empty() {
        active.webhook_secret = Set(input.webhook_secret.trim().to_string());
    }
    active.endpoint_id = Set(input.endpoint_id);
    active.updated_at = Set(now);

    let saved = if is_new {
        active.insert(db).await?
    } else {
        active.update(db).await?
    };
    Ok(saved)
}

/// Remove the stored connection, disabling the inbound webhook
pub async fn clear<C: ConnectionTrait>(db: &C) -> Result<bool, sea_orm::DbErr> {
    let result = portainer_config::Entity::delete_by_id(SINGLETON_ID).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Replace the stored secret and return the new value
pub async fn rotate_secret<C: ConnectionTrait>(db: &C) -> AppResult<String> {
    let existing = config(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Portainer is not configured".to_string()))?;
    let secret = generate_secret();
    let mut active: portainer_config::ActiveModel = existing.into();
    active.webhook_secret = Set(secret.clone());
    active.updated_at = Set(now_ts());
    active.update(db).await?;
    tracing::info!("Webhook secret rotated, fingerprint {}", fingerprint(&secret));
    Ok(secret)
}

#[derive(Debug, Clone, Deserialize)]
struct AuthResponse {
    jwt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Minimal Portainer API client
pub struct PortainerClient {
    http: reqwest::Client,
    base: String,
}

fn upstream(e: reqwest::Error) -> AppError {
    AppError::Unavailable(format!("Portainer request failed: {}", e))
}

impl PortainerClient {
    pub fn new(base: &str) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<String> {
        let response = self
            .http
            .post(format!("{}/api/auth", self.base))
            .json(&serde_json::json!({ "Username": username, "Password": password }))
            .send()
            .await
            .map_err(upstream)?;
        if !response.status().is_success() {
            return Err(AppError::Unavailable(format!(
                "Portainer authentication failed with status {}",
                response.status()
            )));
        }
        let auth: AuthResponse = response.json().await.map_err(upstream)?;
        Ok(auth.jwt)
    }

    pub async fn stacks(&self, jwt: &str) -> AppResult<Vec<Stack>> {
        let response = self
            .http
            .get(format!("{}/api/stacks", self.base))
            .bearer_auth(jwt)
            .send()
            .await
            .map_err(upstream)?;
        if !response.status().is_success() {
            return Err(AppError::Unavailable(format!(
                "Listing stacks failed with status {}",
                response.status()
            )));
        }
        response.json().await.map_err(upstream)
    }

    pub async fn redeploy(&self, jwt: &str, stack_id: i64, endpoint_id: i64) -> AppResult<u16> {
        let response = self
            .http
            .put(format!(
                "{}/api/stacks/{}/git/redeploy?endpointId={}",
                self.base, stack_id, endpoint_id
            ))
            .bearer_auth(jwt)
            .json(&serde_json::json!({ "pullImage": true, "prune": false }))
            .send()
            .await
            .map_err(upstream)?;
        Ok(response.status().as_u16())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub auth_ok: bool,
    pub stack_found: bool,
    pub stack_id: Option<i64>,
    pub available_stacks: Vec<String>,
    pub message: String,
}

pub async fn test_connection(config: &portainer_config::Model) -> AppResult<ConnectionReport> {
    let client = PortainerClient::new(&config.portainer_url)?;
    let jwt = match client
        .authenticate(&config.portainer_user, &config.portainer_password)
        .await
    {
        Ok(jwt) => jwt,
        Err(e) => {
            return Ok(ConnectionReport {
                auth_ok: false,
                stack_found: false,
                stack_id: None,
                available_stacks: Vec::new(),
                message: e.to_string(),
            })
        }
    };

    let stacks = client.stacks(&jwt).await?;
    let found = stacks.iter().find(|s| s.name == config.stack_name);
    Ok(match found {
        Some(stack) => ConnectionReport {
            auth_ok: true,
            stack_found: true,
            stack_id: Some(stack.id),
            available_stacks: Vec::new(),
            message: format!("Authenticated and found stack '{}'", stack.name),
        },
        None => ConnectionReport {
            auth_ok: true,
            stack_found: false,
            stack_id: None,
            message: format!("Stack '{}' not found", config.stack_name),
            available_stacks: stacks.into_iter().map(|s| s.name).collect(),
        },
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeployOutcome {
    pub stack_id: i64,
    pub status: u16,
    pub success: bool,
}

pub async fn trigger_redeploy(config: &portainer_config::Model) -> AppResult<RedeployOutcome> {
    if !config.is_complete() {
        return Err(AppError::Unavailable("Portainer is not configured".to_string()));
    }
    let client = PortainerClient::new(&config.portainer_url)?;
    let jwt = client
        .authenticate(&config.portainer_user, &config.portainer_password)
        .await?;
    let stack = client
        .stacks(&jwt)
        .await?
        .into_iter()
        .find(|s| s.name == config.stack_name)
        .ok_or_else(|| AppError::NotFound(format!("Stack '{}' not found", config.stack_name)))?;

    let status = client.redeploy(&jwt, stack.id, config.endpoint_id).await?;
    let success = (200..300).contains(&status);
    if success {
        tracing::info!("Redeploy of stack {} accepted ({})", stack.name, status);
    } else {
        tracing::warn!("Redeploy of stack {} returned {}", stack.name, status);
    }
    Ok(RedeployOutcome {
        stack_id: stack.id,
        status,
        success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, post, put},
        Json, Router,
    };
    use std::collections::HashMap;

    #[test]
    fn test_secret_helpers() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(secret_matches(&secret, &secret));
        assert!(!secret_matches(&secret, "wrong"));
        assert!(!secret_matches("", ""));
        assert_eq!(fingerprint("abc").len(), 8);
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(""), "");
        assert_eq!(mask("short"), "********");
        assert_eq!(mask("0123456789abcdef"), "********cdef");
    }

    #[tokio::test]
    async fn test_save_keeps_blank_password() {
        let db = connect_in_memory().await.unwrap();
        let mut input = PortainerInput {
            portainer_url: "https://portainer.local/".to_string(),
            stack_name: "maint".to_string(),
            portainer_user: "admin".to_string(),
            portainer_password: "hunter2".to_string(),
            webhook_secret: String::new(),
            endpoint_id: 1,
        };
        let first = save(&db, &input).await.unwrap();
        assert_eq!(first.portainer_url, "https://portainer.local");
        assert_eq!(first.webhook_secret.len(), 32);

        input.portainer_password = String::new();
        let second = save(&db, &input).await.unwrap();
        assert_eq!(second.portainer_password, "hunter2");
        assert_eq!(second.webhook_secret, first.webhook_secret);

        let view = PortainerView::from(&second);
        assert!(view.configured);
        assert!(view.portainer_password.starts_with("****"));

        input.portainer_url = "portainer.local".to_string();
        assert!(save(&db, &input).await.is_err());
    }

    async fn fake_portainer() -> String {
        let app = Router::new()
            .route(
                "/api/auth",
                post(|Json(body): Json<serde_json::Value>| async move {
                    if body["Password"] == "secret" {
                        Ok(Json(serde_json::json!({"jwt": "token"})))
                    } else {
                        Err(StatusCode::UNPROCESSABLE_ENTITY)
                    }
                }),
            )
            .route(
                "/api/stacks",
                get(|headers: HeaderMap| async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer token") {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(Json(serde_json::json!([
                        {"Id": 3, "Name": "web"},
                        {"Id": 7, "Name": "maint"}
                    ])))
                }),
            )
            .route(
                "/api/stacks/:id/git/redeploy",
                put(|Path(id): Path<i64>, Query(q): Query<HashMap<String, String>>| async move {
                    if id == 7 && q.get("endpointId").map(String::as_str) == Some("2") {
                        StatusCode::OK
                    } else {
                        StatusCode::BAD_REQUEST
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn model(url: String, password: &str, stack: &str) -> portainer_config::Model {
        portainer_config::Model {
            id: 1,
            portainer_url: url,
            stack_name: stack.to_string(),
            portainer_user: "admin".to_string(),
            portainer_password: password.to_string(),
            webhook_secret: generate_secret(),
            endpoint_id: 2,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_connection_report() {
        let url = fake_portainer().await;

        let ok = test_connection(&model(url.clone(), "secret", "maint")).await.unwrap();
        assert!(ok.auth_ok && ok.stack_found);
        assert_eq!(ok.stack_id, Some(7));

        let missing = test_connection(&model(url.clone(), "secret", "nope")).await.unwrap();
        assert!(missing.auth_ok && !missing.stack_found);
        assert_eq!(missing.available_stacks, vec!["web".to_string(), "maint".to_string()]);

        let denied = test_connection(&model(url, "bad", "maint")).await.unwrap();
        assert!(!denied.auth_ok);
    }

    #[tokio::test]
    async fn test_redeploy() {
        let url = fake_portainer().await;
        let outcome = trigger_redeploy(&model(url.clone(), "secret", "maint")).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.stack_id, 7);

        let missing = trigger_redeploy(&model(url, "secret", "nope")).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
