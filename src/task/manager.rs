//! Job Manager implementation
//!
//! Keeps the registry of periodic jobs and drives their timers

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::jobs::{self, JobContext, JobKind};
use crate::config::SchedulerConfig;
use crate::entity::now_ts;
use crate::error::{AppError, AppResult};

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Failed,
    Disabled,
}

/// Job information as shown to administrators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    pub interval_secs: u64,
    pub last_run: Option<i64>,
    pub last_result: Option<String>,
    pub run_count: u64,
    pub status: JobStatus,
    pub error: Option<String>,
}

struct JobEntry {
    kind: JobKind,
    enabled: bool,
    info: JobInfo,
}

/// Job Manager
pub struct JobManager {
    /// Jobs by name
    jobs: DashMap<&'static str, JobEntry>,
    /// Cancelled on shutdown, stops every timer loop
    shutdown: CancellationToken,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Manager with every known job registered at its configured interval
    pub fn with_defaults(config: &SchedulerConfig) -> Self {
        let manager = Self::new();
        for kind in JobKind::ALL {
            manager.register(kind, kind.interval(config), config.enabled);
        }
        manager
    }

    /// Add a job to the registry, replacing any job with the same name
    pub fn register(&self, kind: JobKind, interval: Duration, enabled: bool) {
        let info = JobInfo {
            name: kind.name().to_string(),
            interval_secs: interval.as_secs(),
            last_run: None,
            last_result: None,
            run_count: 0,
            status: if enabled { JobStatus::Idle } else { JobStatus::Disabled },
            error: None,
        };
        self.jobs.insert(kind.name(), JobEntry { kind, enabled, info });
    }

    /// All jobs, sorted by name
    pub fn list(&self) -> Vec<JobInfo> {
        let mut all: Vec<JobInfo> = self.jobs.iter().map(|e| e.info.clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn get(&self, name: &str) -> Option<JobInfo> {
        self.jobs.get(name).map(|e| e.info.clone())
    }

    /// Mark a job running. Fails if it is unknown or already running.
    fn begin(&self, name: &str) -> AppResult<JobKind> {
        let mut entry = self
            .jobs
            .get_mut(name)
            .ok_or_else(|| AppError::NotFound(format!("Unknown job: {}", name)))?;
        if entry.info.status == JobStatus::Running {
            return Err(AppError::Conflict(format!("Job {} is already running", name)));
        }
        entry.info.status = JobStatus::Running;
        Ok(entry.kind)
    }

    fn finish(&self, name: &str, result: &anyhow::Result<String>) {
        if let Some(mut entry) = self.jobs.get_mut(name) {
            let enabled = entry.enabled;
            let info = &mut entry.info;
            info.last_run = Some(now_ts());
            info.run_count += 1;
            match result {
                Ok(message) => {
                    info.last_result = Some(message.clone());
                    info.error = None;
                    info.status = if enabled { JobStatus::Idle } else { JobStatus::Disabled };
                }
                Err(e) => {
                    info.last_result = None;
                    info.error = Some(e.to_string());
                    info.status = JobStatus::Failed;
                }
            }
        }
    }

    /// Run one job immediately and wait for its result
    pub async fn run_now(&self, name: &str, ctx: &JobContext) -> AppResult<JobInfo> {
        let kind = self.begin(name)?;
        let result = jobs::run(kind, ctx).await;
        self.finish(name, &result);
        self.get(name)
            .ok_or_else(|| AppError::NotFound(format!("Unknown job: {}", name)))
    }

    /// Spawn a timer loop per enabled job
    pub fn start(self: &Arc<Self>, ctx: JobContext) {
        let enabled: Vec<(&'static str, u64)> = self
            .jobs
            .iter()
            .filter(|e| e.enabled)
            .map(|e| (*e.key(), e.info.interval_secs))
            .collect();

        for (name, interval_secs) in enabled {
            let manager = Arc::clone(self);
            let ctx = ctx.clone();
            let token = self.shutdown.child_token();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
                // The first tick fires immediately; wait a full period instead.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = manager.run_now(name, &ctx).await {
                                tracing::warn!("Job {} skipped: {}", name, e);
                            }
                        }
                    }
                }
                tracing::debug!("Job loop {} stopped", name);
            });
        }
        tracing::info!("Background scheduler started with {} jobs", self.jobs.len());
    }

    /// Stop every timer loop
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::jobs::tests::context;

    #[tokio::test]
    async fn test_registry_and_run_now() {
        let (ctx, _) = context().await;
        let manager = JobManager::with_defaults(&SchedulerConfig::default());
        let names: Vec<String> = manager.list().into_iter().map(|j| j.name).collect();
        assert_eq!(names.len(), 6);
        assert_eq!(names[0], "check_overdue_maintenance");

        let info = manager.run_now("generate_scheduled_maintenance", &ctx).await.unwrap();
        assert_eq!(info.run_count, 1);
        assert_eq!(info.status, JobStatus::Idle);
        assert_eq!(info.last_result.as_deref(), Some("Generated 0 activities"));
        assert!(info.last_run.is_some());

        assert!(matches!(
            manager.run_now("nope", &ctx).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_jobs_stay_disabled() {
        let (ctx, _) = context().await;
        let config = SchedulerConfig {
            enabled: false,
            ..Default::default()
        };
        let manager = JobManager::with_defaults(&config);
        assert!(manager.list().iter().all(|j| j.status == JobStatus::Disabled));

        let info = manager.run_now("cleanup_old_events", &ctx).await.unwrap();
        assert_eq!(info.status, JobStatus::Disabled);
        assert_eq!(info.run_count, 1);
    }

    #[tokio::test]
    async fn test_stop_cancels_loops() {
        let (ctx, _) = context().await;
        let manager = Arc::new(JobManager::with_defaults(&SchedulerConfig::default()));
        manager.start(ctx);
        assert!(!manager.is_stopped());
        manager.stop();
        assert!(manager.is_stopped());
    }
}
