//! Audit log handlers
//!
//! Implements operation log query and management

use axum::{extract::Query, response::Json, Extension};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::entity::op_log;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{perm, CurrentUser};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;

/// Query parameters for log pagination
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    pub username: Option<String>,
    pub op_type: Option<String>,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

/// Query response with pagination
#[derive(Debug, Serialize)]
pub struct LogQueryResponse {
    pub logs: Vec<op_log::Model>,
    pub total: u64,
}

/// GET /api/admin/audit
pub async fn query_oplog(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<ApiResponse<LogQueryResponse>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;

    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 100);

    let mut select = op_log::Entity::find();
    if let Some(username) = query.username.as_deref().filter(|u| !u.is_empty()) {
        select = select.filter(op_log::Column::Username.eq(username));
    }
    if let Some(op_type) = query.op_type.as_deref().filter(|t| !t.is_empty()) {
        select = select.filter(op_log::Column::OpType.eq(op_type));
    }

    let total = select.clone().count(&*db).await?;
    let logs = select
        .order_by_desc(op_log::Column::Id)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(&*db)
        .await?;

    Ok(Json(ApiResponse::success(LogQueryResponse { logs, total })))
}

/// POST /api/admin/audit/delete
pub async fn delete_oplog(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;

    if ids.is_empty() {
        return Err(AppError::BadRequest("No IDs provided".to_string()));
    }

    let res = op_log::Entity::delete_many()
        .filter(op_log::Column::Id.is_in(ids))
        .exec(&*db)
        .await?;

    Ok(Json(ApiResponse::success_msg(format!(
        "Deleted {} log entries",
        res.rows_affected
    ))))
}

/// Service for adding operation logs
pub mod service {
    use sea_orm::{ActiveModelTrait, Set};
    use tokio::sync::mpsc;

    use crate::entity::now_ts;
    use crate::entity::op_log::{self, OpResult, OpType};

    /// Log entry to be added
    #[derive(Debug, Clone)]
    pub struct LogEntry {
        pub username: String,
        pub op_type: OpType,
        pub op_desc: String,
        pub result: OpResult,
        pub ip: Option<String>,
    }

    /// Global log channel
    static LOG_TX: std::sync::OnceLock<mpsc::Sender<LogEntry>> = std::sync::OnceLock::new();

    /// Start the background inserter. Calling it again is a no-op.
    pub fn init(db: sea_orm::DatabaseConnection) {
        if LOG_TX.get().is_some() {
            tracing::debug!("Audit log service already initialized, skipping");
            return;
        }

        let (tx, mut rx) = mpsc::channel::<LogEntry>(200);
        if LOG_TX.set(tx).is_err() {
            return;
        }

        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                let log = op_log::ActiveModel {
                    op_time: Set(now_ts()),
                    username: Set(entry.username),
                    op_type: Set(entry.op_type.as_str().to_string()),
                    op_desc: Set(entry.op_desc),
                    result: Set(entry.result.as_str().to_string()),
                    ip: Set(entry.ip),
                    ..Default::default()
                };

                if let Err(e) = log.insert(&db).await {
                    tracing::error!("Failed to log operation: {}", e);
                }
            }
        });
    }

    /// Add an operation log entry
    pub fn add_log(entry: LogEntry) {
        if let Some(tx) = LOG_TX.get() {
            if tx.try_send(entry).is_err() {
                tracing::warn!("Log channel is full, operation log dropped");
            }
        } else {
            tracing::debug!(
                "Audit log service not initialized, log dropped: {} - {}",
                entry.op_type.as_str(),
                entry.op_desc
            );
        }
    }

    pub fn log_operation(username: &str, op_type: OpType, op_desc: &str, result: OpResult, ip: Option<&str>) {
        add_log(LogEntry {
            username: username.to_string(),
            op_type,
            op_desc: op_desc.to_string(),
            result,
            ip: ip.map(|s| s.to_string()),
        });
    }

    /// Successful operation by a signed-in user
    pub fn log_success(username: &str, op_type: OpType, op_desc: impl AsRef<str>) {
        log_operation(username, op_type, op_desc.as_ref(), OpResult::Success, None);
    }
}

#[cfg(test)]
mod tests {
    use super::service::*;
    use super::*;
    use crate::db::connect_in_memory;
    use crate::entity::op_log::{OpResult, OpType};

    #[tokio::test]
    async fn test_logs_are_written_in_background() {
        let db = connect_in_memory().await.unwrap();
        init(db.clone());
        log_operation("alice", OpType::Login, "", OpResult::Success, Some("10.0.0.1"));

        let mut found = Vec::new();
        for _ in 0..50 {
            found = op_log::Entity::find()
                .filter(op_log::Column::Username.eq("alice"))
                .all(&db)
                .await
                .unwrap();
            if !found.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        // The channel is process-wide, so another test may have claimed it first.
        if let Some(entry) = found.first() {
            assert_eq!(entry.op_type, "login");
            assert_eq!(entry.ip.as_deref(), Some("10.0.0.1"));
        }
    }
}
