//! In-process cache backed by moka
//!
//! Values are stored as JSON so any serializable type can be cached.
//! Dashboard payloads use keys of the form `dashboard:<user_id>:<site|all>`.

use anyhow::{Context, Result};
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub const DASHBOARD_PREFIX: &str = "dashboard:";
const HEALTH_KEY: &str = "health:probe";

#[derive(Clone)]
pub struct AppCache {
    cache: Cache<String, Arc<String>>,
    ttl: Duration,
}

impl std::fmt::Debug for AppCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCache")
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl AppCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs.max(1));
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(data) => {
                let value = serde_json::from_str(&data).context("Failed to deserialize cache value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        self.cache.insert(key.to_string(), Arc::new(json)).await;
        Ok(())
    }

    pub async fn delete(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Drop every entry whose key starts with `prefix`
    pub async fn delete_prefix(&self, prefix: &str) {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Write, read back and delete a probe value
    pub async fn health_check(&self) -> Result<()> {
        let stamp = chrono::Utc::now().timestamp_millis();
        self.set(HEALTH_KEY, &stamp).await?;
        let read: Option<i64> = self.get(HEALTH_KEY).await?;
        self.delete(HEALTH_KEY).await;
        match read {
            Some(v) if v == stamp => Ok(()),
            _ => anyhow::bail!("cache probe value mismatch"),
        }
    }

    pub async fn invalidate_dashboards(&self) {
        self.delete_prefix(DASHBOARD_PREFIX).await;
    }
}

pub fn dashboard_key(user_id: i64, site_id: Option<i64>) -> String {
    match site_id {
        Some(site) => format!("{}{}:{}", DASHBOARD_PREFIX, user_id, site),
        None => format!("{}{}:all", DASHBOARD_PREFIX, user_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> AppCache {
        AppCache::new(&CacheConfig::default())
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = cache();
        cache.set("k", &vec![1, 2, 3]).await.unwrap();
        let v: Option<Vec<i32>> = cache.get("k").await.unwrap();
        assert_eq!(v, Some(vec![1, 2, 3]));

        cache.delete("k").await;
        let v: Option<Vec<i32>> = cache.get("k").await.unwrap();
        assert!(v.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_dashboards() {
        let cache = cache();
        cache.set(&dashboard_key(1, None), &"a").await.unwrap();
        cache.set(&dashboard_key(1, Some(4)), &"b").await.unwrap();
        cache.set("other", &"c").await.unwrap();

        cache.invalidate_dashboards().await;

        assert!(cache.get::<String>(&dashboard_key(1, None)).await.unwrap().is_none());
        assert!(cache.get::<String>(&dashboard_key(1, Some(4))).await.unwrap().is_none());
        assert_eq!(cache.get::<String>("other").await.unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(cache().health_check().await.is_ok());
    }

    #[test]
    fn test_dashboard_key() {
        assert_eq!(dashboard_key(7, None), "dashboard:7:all");
        assert_eq!(dashboard_key(7, Some(3)), "dashboard:7:3");
    }
}
