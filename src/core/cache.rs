//! In-process TTL cache for public read endpoints.
//!
//! Entries carry their own TTL so hot public lists can expire sooner than
//! the configured default. Keys are namespaced strings (`public:display:...`)
//! and invalidated by prefix after writes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;
use signage_core::AppError;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

/// Expires each entry after its own TTL.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Hit/miss counters reported by the system endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: u64,
    pub hit_rate: f64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// JSON value cache with per-entry TTL. Cheap to clone.
#[derive(Clone)]
pub struct TtlCache {
    inner: Cache<String, Entry>,
    default_ttl: Duration,
    counters: Arc<Counters>,
}

impl TtlCache {
    #[must_use]
    pub fn new(default_ttl: Duration, max_keys: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_keys)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            inner,
            default_ttl,
            counters: Arc::default(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.inner.get(key).await {
            Some(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store with the default TTL.
    pub async fn set(&self, key: impl Into<String>, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.inner.insert(key.into(), Entry { value, ttl }).await;
    }

    pub async fn del(&self, key: &str) -> bool {
        self.inner.remove(key).await.is_some()
    }

    /// Remove every key starting with `prefix`, returning how many were live.
    pub async fn del_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<Arc<String>> = self
            .inner
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.inner.remove(key.as_str()).await.is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(prefix, removed, "Cache entries invalidated");
        }
        removed
    }

    /// Drop every entry and reset the counters.
    pub async fn flush(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        #[expect(clippy::cast_precision_loss, reason = "ratio of counters")]
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        CacheStats {
            hits,
            misses,
            keys: self.inner.entry_count(),
            hit_rate,
        }
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// Loader errors are returned as is and nothing is cached.
    pub async fn wrap<F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<Value, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, AppError>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = loader().await?;
        self.set_with_ttl(key, value.clone(), ttl).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> TtlCache {
        TtlCache::new(Duration::from_secs(300), 100)
    }

    #[tokio::test]
    async fn set_then_get() {
        let cache = cache();
        cache.set("public:displays:list", json!([1, 2])).await;
        assert_eq!(cache.get("public:displays:list").await, Some(json!([1, 2])));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn entries_expire_after_their_own_ttl() {
        let cache = cache();
        cache
            .set_with_ttl("short", json!("x"), Duration::from_millis(50))
            .await;
        cache.set("long", json!("y")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("long").await, Some(json!("y")));
    }

    #[tokio::test]
    async fn del_prefix_removes_only_matching_keys() {
        let cache = cache();
        cache.set("public:display:lobby:posts", json!(1)).await;
        cache.set("public:display:hall:posts", json!(2)).await;
        cache.set("public:posts:all:all", json!(3)).await;

        assert_eq!(cache.del_prefix("public:display").await, 2);
        assert_eq!(cache.get("public:display:lobby:posts").await, None);
        assert_eq!(cache.get("public:posts:all:all").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = cache();
        cache.set("k", json!(true)).await;
        cache.get("k").await;
        cache.get("k").await;
        cache.get("nope").await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.keys, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn flush_clears_entries_and_counters() {
        let cache = cache();
        cache.set("a", json!(1)).await;
        cache.get("a").await;
        cache.flush().await;

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.keys), (0, 0, 0));
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn wrap_runs_loader_once() {
        let cache = cache();
        let calls = AtomicU64::new(0);
        for _ in 0..3 {
            let value = cache
                .wrap("computed", Duration::from_secs(30), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({ "count": 4 }))
                })
                .await
                .unwrap();
            assert_eq!(value["count"], 4);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wrap_does_not_cache_errors() {
        let cache = cache();
        let result = cache
            .wrap("failing", Duration::from_secs(30), || async {
                Err(AppError::Unavailable("db down".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get("failing").await, None);
    }
}
