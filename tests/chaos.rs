//! Chaos Testing for Sena Engine
//!
//! This module tests failure scenarios using:
//! 1. **FailingCacheStore wrapper** - precise error injection at specific call counts
//! 2. **Data corruption** - garbage bytes in the cache backend
//! 3. **Container killing** - Redis dying after startup
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos
//! cargo test --test chaos -- --ignored --nocapture   # container tests, needs Docker
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use sena_engine::storage::memory::InMemoryStore;
use sena_engine::{
    BackendKind, CacheManager, CacheStore, DrawLookup, DrawNumbers, DrawRecord, DrawSource,
    FetchError, SenaEngineConfig, SenaError, SenaService, StorageError,
};

use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

// =============================================================================
// Failing Store Wrapper - Precise Error Injection
// =============================================================================

/// A wrapper that injects failures at specific call counts.
pub struct FailingCacheStore<S: CacheStore> {
    inner: S,
    call_count: AtomicU64,
    /// Fail on these call numbers (1-indexed)
    fail_on_calls: Vec<u64>,
    /// Fail every call once set
    fail_permanently: AtomicBool,
}

impl<S: CacheStore> FailingCacheStore<S> {
    pub fn new(inner: S, fail_on_calls: Vec<u64>) -> Self {
        Self {
            inner,
            call_count: AtomicU64::new(0),
            fail_on_calls,
            fail_permanently: AtomicBool::new(false),
        }
    }

    /// A store where every call fails
    pub fn always(inner: S) -> Self {
        let store = Self::new(inner, vec![]);
        store.fail_permanently.store(true, Ordering::SeqCst);
        store
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_permanently.load(Ordering::SeqCst) || self.fail_on_calls.contains(&count) {
            Err(StorageError::Backend(format!("injected failure on call {}", count)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: CacheStore> CacheStore for FailingCacheStore<S> {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.maybe_fail()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.clear().await
    }
}

// =============================================================================
// Upstream Stub
// =============================================================================

/// One draw per day for the last `days` days
struct DailySource {
    days: u32,
    requests: AtomicUsize,
}

impl DailySource {
    fn new(days: u32) -> Arc<Self> {
        Arc::new(Self { days, requests: AtomicUsize::new(0) })
    }

    fn record(&self, contest: u32) -> Option<DrawRecord> {
        if contest == 0 || contest > self.days {
            return None;
        }
        let age = i64::from(self.days - contest);
        let shift = (contest % 50) as u8;
        Some(DrawRecord::new(
            contest,
            Utc::now().date_naive() - chrono::Duration::days(age),
            DrawNumbers::new([1 + shift, 2 + shift, 3 + shift, 4 + shift, 5 + shift, 11 + shift])
                .ok()?,
        ))
    }
}

#[async_trait]
impl DrawSource for DailySource {
    async fn latest(&self) -> Result<DrawRecord, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.record(self.days).ok_or(FetchError::Status { status: 404 })
    }

    async fn contest(&self, number: u32) -> Result<Option<DrawRecord>, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.record(number))
    }
}

fn iso_days_ago(days: i64) -> String {
    (Utc::now().date_naive() - chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

// =============================================================================
// Chaos Tests - Failure Injection
// =============================================================================

#[tokio::test]
async fn chaos_dead_cache_never_fails_requests() {
    let cache = CacheManager::with_store(Arc::new(FailingCacheStore::always(InMemoryStore::new())));
    let source = DailySource::new(30);
    let service = SenaService::new(SenaEngineConfig::default(), cache, source.clone());

    let estimate = service.get_estimate().await.expect("cache errors must not surface");
    assert_eq!(estimate.corpus_size, 30);

    let lookup = service.get_draw(&iso_days_ago(3)).await.expect("cache errors must not surface");
    assert!(lookup.is_found());
}

#[tokio::test]
async fn chaos_dead_cache_is_a_miss_every_time() {
    let cache = CacheManager::with_store(Arc::new(FailingCacheStore::always(InMemoryStore::new())));
    let source = DailySource::new(30);
    let service = SenaService::new(SenaEngineConfig::default(), cache, source.clone());
    let date = iso_days_ago(40); // outside the loaded corpus

    service.get_draw(&date).await.unwrap();
    let after_first = source.requests.load(Ordering::SeqCst);
    service.get_draw(&date).await.unwrap();

    // Nothing was cached, so the second lookup went upstream again
    assert!(source.requests.load(Ordering::SeqCst) > after_first);
}

#[tokio::test]
async fn chaos_failed_write_back_does_not_lose_result() {
    // Call 1: get (miss), call 2: set fails
    let cache = CacheManager::with_store(Arc::new(FailingCacheStore::new(InMemoryStore::new(), vec![2])));
    let service = SenaService::new(SenaEngineConfig::default(), cache, DailySource::new(10));

    let lookup = service.get_draw(&iso_days_ago(2)).await.unwrap();
    let DrawLookup::Found(draw) = lookup else { panic!("draw should exist") };
    assert_eq!(draw.contest, 8);
}

#[tokio::test]
async fn chaos_clear_cache_failure_is_reported() {
    let cache = CacheManager::with_store(Arc::new(FailingCacheStore::always(InMemoryStore::new())));
    let service = SenaService::new(SenaEngineConfig::default(), cache, DailySource::new(10));

    let err = service.clear_cache().await.unwrap_err();
    assert!(matches!(err, SenaError::Cache(StorageError::Backend(_))));
    assert_eq!(err.code(), "CACHE_ERROR");
}

// =============================================================================
// Chaos Tests - Data Corruption
// =============================================================================

#[tokio::test]
async fn chaos_garbage_in_cache_is_refetched() {
    let store = Arc::new(InMemoryStore::new());
    let cache = CacheManager::with_store(store.clone());
    let source = DailySource::new(10);
    let service = SenaService::new(SenaEngineConfig::default(), cache, source.clone());
    let date = iso_days_ago(1);

    store
        .set(&format!("draw:{}", date), b"\xff\xfe{not json".to_vec(), Duration::from_secs(600))
        .await
        .unwrap();
    store
        .set("estimate", br#"{"sena": "seven"}"#.to_vec(), Duration::from_secs(600))
        .await
        .unwrap();

    let lookup = service.get_draw(&date).await.unwrap();
    assert!(lookup.is_found());
    assert!(source.requests.load(Ordering::SeqCst) > 0);

    let estimate = service.get_estimate().await.unwrap();
    assert_eq!(estimate.sena.len(), 6);
}

#[tokio::test]
async fn chaos_cached_draw_with_invalid_numbers_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let cache = CacheManager::with_store(store.clone());
    let service = SenaService::new(SenaEngineConfig::default(), cache, DailySource::new(10));
    let date = iso_days_ago(1);

    // Structurally valid JSON, but 61 is not a lottery number
    let poisoned = serde_json::json!({
        "status": "found",
        "draw": {"contest": 9, "date": "2020-01-01", "numbers": [1, 2, 3, 4, 5, 61]}
    });
    store
        .set(&format!("draw:{}", date), serde_json::to_vec(&poisoned).unwrap(), Duration::from_secs(600))
        .await
        .unwrap();

    let DrawLookup::Found(draw) = service.get_draw(&date).await.unwrap() else {
        panic!("draw should exist")
    };
    assert!(draw.numbers.iter().all(|n| (1..=60).contains(&n)));
    assert_eq!(draw.contest, 9);
}

#[tokio::test]
async fn chaos_cached_draw_for_wrong_date_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let cache = CacheManager::with_store(store.clone());
    let source = DailySource::new(10);
    let service = SenaService::new(SenaEngineConfig::default(), cache, source.clone());
    let date = iso_days_ago(1);

    // Valid draw, filed under the wrong day (e.g. written by a buggy peer)
    let misfiled = serde_json::json!({
        "status": "found",
        "draw": {"contest": 3, "date": "2020-01-01", "numbers": [1, 2, 3, 4, 5, 6]}
    });
    store
        .set(&format!("draw:{}", date), serde_json::to_vec(&misfiled).unwrap(), Duration::from_secs(600))
        .await
        .unwrap();

    let DrawLookup::Found(draw) = service.get_draw(&date).await.unwrap() else {
        panic!("draw should exist")
    };
    assert_eq!(draw.date.format("%Y-%m-%d").to_string(), date);
    assert_eq!(draw.contest, 9);
    assert!(source.requests.load(Ordering::SeqCst) > 0);
}

// =============================================================================
// Chaos Tests - Container Killing (Abrupt Death)
// =============================================================================

fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

#[tokio::test]
#[ignore] // Requires Docker
async fn chaos_redis_killed_after_startup() {
    // Redis is chosen at startup and stays chosen; once it dies every cache
    // call errors and the service keeps answering from upstream.
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let redis_port = redis.get_host_port_ipv4(6379);

    let config = SenaEngineConfig {
        redis_url: Some(format!("redis://127.0.0.1:{}", redis_port)),
        ..Default::default()
    };
    let cache = CacheManager::connect(&config).await;
    assert_eq!(cache.kind(), BackendKind::Redis);

    let service = SenaService::new(config, cache, DailySource::new(20));
    service.get_estimate().await.expect("estimate with live Redis");

    drop(redis);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let lookup = tokio::time::timeout(Duration::from_secs(10), service.get_draw(&iso_days_ago(25)))
        .await
        .expect("lookup should not hang on a dead cache");
    assert!(lookup.is_ok());
    assert_eq!(service.get_stats().cache_backend, BackendKind::Redis);
}
