use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::cache::AppCache;
use crate::config::Config;
use crate::permission::PermissionEnforcer;
use crate::service::notify::{self, Notifier};
use crate::task::JobManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Permission enforcer
    pub perm: PermissionEnforcer,
    /// Application configuration
    pub config: Arc<Config>,
    /// Dashboard and probe cache
    pub cache: AppCache,
    /// Outbound reminder mail
    pub notifier: Arc<dyn Notifier>,
    /// Periodic background jobs
    pub jobs: Arc<JobManager>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, perm: PermissionEnforcer, config: Config) -> Self {
        let cache = AppCache::new(&config.cache);
        let notifier = notify::from_config(&config.mail);
        let jobs = Arc::new(JobManager::with_defaults(&config.scheduler));

        Self {
            db,
            perm,
            config: Arc::new(config),
            cache,
            notifier,
            jobs,
        }
    }

    /// Context handed to background jobs
    pub fn job_context(&self) -> crate::task::JobContext {
        crate::task::JobContext {
            db: self.db.clone(),
            cache: self.cache.clone(),
            notifier: self.notifier.clone(),
            scheduler: self.config.scheduler.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    /// Fully wired state over an in-memory database
    pub(crate) async fn test_state() -> AppState {
        let db = connect_in_memory().await.unwrap();
        let perm = PermissionEnforcer::new(db.clone(), None).await.unwrap();
        perm.ensure_defaults().await.unwrap();
        AppState::new(db, perm, Config::default())
    }

    #[tokio::test]
    async fn test_state_wiring() {
        let state = test_state().await;
        assert_eq!(state.cache.ttl().as_secs(), 300);
        assert_eq!(state.jobs.list().len(), 6);
    }
}
