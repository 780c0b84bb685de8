use axum::{extract::State, response::Json};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Serialize;
use std::time::Instant;

use super::ApiResponse;
use crate::cache::AppCache;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    pub response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: String,
    pub database_health: ComponentHealth,
    pub cache_health: ComponentHealth,
    pub overall_status: &'static str,
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

async fn database_health(db: &DatabaseConnection) -> ComponentHealth {
    let start = Instant::now();
    let (status, error) = match db.ping().await {
        Ok(()) => ("healthy", None),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            ("unhealthy", Some(e.to_string()))
        }
    };
    ComponentHealth {
        status,
        response_time_ms: elapsed_ms(start),
        error,
    }
}

async fn cache_health(cache: &AppCache) -> ComponentHealth {
    let start = Instant::now();
    let (status, error) = match cache.health_check().await {
        Ok(()) => ("healthy", None),
        Err(e) => {
            tracing::warn!("Cache health check failed: {}", e);
            ("unhealthy", Some(e.to_string()))
        }
    };
    ComponentHealth {
        status,
        response_time_ms: elapsed_ms(start),
        error,
    }
}

/// critical when the database is down, warning when only the cache is
pub fn overall_status(database: &ComponentHealth, cache: &ComponentHealth) -> &'static str {
    if database.status != "healthy" {
        "critical"
    } else if cache.status != "healthy" {
        "warning"
    } else {
        "healthy"
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let (database_health, cache_health) =
        futures::join!(database_health(&state.db), cache_health(&state.cache));
    let overall = overall_status(&database_health, &cache_health);

    Json(ApiResponse::success(HealthStatus {
        status: if overall == "critical" { "unhealthy" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION").to_string(),
        database_health,
        cache_health,
        overall_status: overall,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;

    fn component(status: &'static str) -> ComponentHealth {
        ComponentHealth {
            status,
            response_time_ms: 0.0,
            error: None,
        }
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(overall_status(&component("healthy"), &component("healthy")), "healthy");
        assert_eq!(overall_status(&component("healthy"), &component("unhealthy")), "warning");
        assert_eq!(overall_status(&component("unhealthy"), &component("healthy")), "critical");
    }

    #[tokio::test]
    async fn test_health_check_in_memory() {
        let state = test_state().await;
        let Json(response) = health_check(State(state)).await;
        let data = response.data.unwrap();
        assert_eq!(data.database_health.status, "healthy");
        assert_eq!(data.cache_health.status, "healthy");
        assert_eq!(data.overall_status, "healthy");
    }
}
