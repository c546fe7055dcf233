// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Service operations: estimate, draw lookup, cache clear, stats.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::draw::DrawRecord;
use crate::error::SenaError;
use crate::estimation::{estimate, EstimateResult};
use crate::metrics;

use super::types::LookupSource;
use super::{DrawLookup, SenaService, ServiceStats};

const ESTIMATE_KEY: &str = "estimate";

/// Date of the first ever contest; nothing before it can exist
const FIRST_DRAW: (i32, u32, u32) = (1996, 3, 11);

fn draw_key(date: NaiveDate) -> String {
    format!("draw:{}", date.format("%Y-%m-%d"))
}

/// Strict `YYYY-MM-DD`, on or after the first contest. Future dates pass.
pub(crate) fn parse_request_date(raw: &str) -> Result<NaiveDate, SenaError> {
    let invalid = || SenaError::InvalidInput(format!("'{}' is not a YYYY-MM-DD date", raw));

    // chrono accepts unpadded fields; the wire format does not
    if raw.len() != 10 {
        return Err(invalid());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;

    let (y, m, d) = FIRST_DRAW;
    let first = NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid)?;
    if date < first {
        return Err(SenaError::InvalidInput(format!(
            "{} is before the first draw ({})",
            date, first
        )));
    }
    Ok(date)
}

impl SenaService {
    // ═══════════════════════════════════════════════════════════════════════════
    // API: Estimates & Lookups
    // ═══════════════════════════════════════════════════════════════════════════

    /// Quadra/quina/sena by historical frequency.
    ///
    /// Served from cache when possible; otherwise computed from the corpus
    /// (refreshing it first if stale) and cached for `cache_ttl`. An empty
    /// corpus yields an empty, uncached result rather than an error.
    ///
    /// # Errors
    ///
    /// [`SenaError::TransientUnavailable`] when the upstream circuit is open and
    /// [`SenaError::UpstreamFailure`] when the refresh fails. Neither is cached.
    #[tracing::instrument(skip(self))]
    pub async fn get_estimate(&self) -> Result<EstimateResult, SenaError> {
        let epoch = self.epoch();
        if let Some(cached) = self.cache.get_json::<EstimateResult>(ESTIMATE_KEY).await {
            debug!("Estimate served from cache");
            return Ok(cached);
        }

        let snapshot = self.ensure_corpus().await?;
        let result = estimate(&snapshot.corpus);
        let degraded = result.is_degraded();
        metrics::record_estimate(degraded);

        if degraded {
            info!("Corpus is empty, returning empty estimate");
        } else {
            self.write_back(ESTIMATE_KEY, &result, self.config.cache_ttl(), epoch)
                .await;
        }
        Ok(result)
    }

    /// Look up the draw held on `date` (`YYYY-MM-DD`).
    ///
    /// Resolution: cache → loaded corpus → direct upstream lookup. Answers from
    /// the corpus or upstream are written back: found draws for `draw_ttl`,
    /// absent dates for the shorter `not_found_ttl`. Errors are never cached.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use sena_engine::{SenaService, SenaError, DrawLookup};
    /// # async fn example(service: &SenaService) -> Result<(), SenaError> {
    /// if let DrawLookup::Found(draw) = service.get_draw("2024-01-15").await? {
    ///     println!("{:?}", draw.numbers);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self), fields(source))]
    pub async fn get_draw(&self, date: &str) -> Result<DrawLookup, SenaError> {
        let date = parse_request_date(date)?;
        let key = draw_key(date);
        let epoch = self.epoch();

        match self.cache.get_json::<DrawLookup>(&key).await {
            Some(DrawLookup::Found(record)) if record.date != date => {
                warn!(%date, cached = %record.date, "Cached draw is for another date, ignoring");
            }
            Some(cached) => {
                Self::note_source(LookupSource::Cache);
                return Ok(cached);
            }
            None => {}
        }

        // Draws never change, so a stale snapshot is still a valid source
        let from_corpus: Option<DrawRecord> = self
            .current_snapshot()
            .and_then(|s| s.corpus.find_by_date(date).cloned());

        let (lookup, source) = match from_corpus {
            Some(record) => (DrawLookup::Found(record), LookupSource::Corpus),
            None => {
                let fetched = self.fetcher.fetch_draw(date).await?;
                (DrawLookup::from(fetched), LookupSource::Upstream)
            }
        };

        let ttl = if lookup.is_found() {
            self.config.draw_ttl()
        } else {
            self.config.not_found_ttl()
        };
        self.write_back(&key, &lookup, ttl, epoch).await;

        Self::note_source(source);
        debug!(%date, found = lookup.is_found(), "Draw lookup resolved");
        Ok(lookup)
    }

    /// Cache a result computed under `epoch`, unless a clear happened since.
    /// A clear that lands while the write is in flight is caught by the
    /// re-check and the entry removed again.
    async fn write_back<T: Serialize>(&self, key: &str, value: &T, ttl: Duration, epoch: u64) {
        if self.epoch() != epoch {
            debug!(key, "Cache cleared meanwhile, skipping write-back");
            return;
        }
        if self.cache.set_json(key, value, ttl).await && self.epoch() != epoch {
            debug!(key, "Cache cleared during write-back, removing entry");
            if let Err(e) = self.cache.store().delete(key).await {
                warn!(key, error = %e, "Failed to remove write-back that raced a clear");
            }
        }
    }

    fn note_source(source: LookupSource) {
        tracing::Span::current().record("source", source.as_str());
        metrics::record_lookup(source.as_str());
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // API: Maintenance
    // ═══════════════════════════════════════════════════════════════════════════

    /// Drop every cached entry and the loaded corpus.
    ///
    /// The next estimate refetches from upstream. Estimates and lookups still
    /// in flight return their answer but do not cache it.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<(), SenaError> {
        self.begin_clear();
        self.cache.clear().await?;
        info!("Cache and corpus cleared");
        Ok(())
    }

    /// Cache backend, circuit state and corpus info. No I/O.
    #[must_use]
    pub fn get_stats(&self) -> ServiceStats {
        let selection = self.cache.selection();
        let snapshot = self.current_snapshot();
        ServiceStats {
            cache_backend: selection.kind(),
            cache_degraded: selection.is_degraded(),
            circuit: self.fetcher.breaker().stats(),
            corpus_size: snapshot.as_ref().map(|s| s.corpus.len()),
            corpus_refreshed_at: snapshot.as_ref().map(|s| s.refreshed_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SenaEngineConfig;
    use crate::draw::DrawNumbers;
    use crate::fetcher::{DrawSource, FetchError};
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::storage::memory::InMemoryStore;
    use crate::storage::{BackendKind, CacheManager, CacheStore, StorageError};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Weekly draws ending today
    struct ScriptedSource {
        draws: BTreeMap<u32, DrawRecord>,
        failing: Mutex<bool>,
        latest_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn weekly(count: u32) -> Self {
            let today = Utc::now().date_naive();
            let draws = (0..count)
                .map(|i| {
                    let contest = 1000 - i;
                    let date = today - chrono::Duration::days(7 * i64::from(i));
                    let numbers = DrawNumbers::new([7u8, 13, 21, 34, 45, 59 - (i % 5) as u8]).unwrap();
                    (contest, DrawRecord::new(contest, date, numbers))
                })
                .collect();
            Self { draws, failing: Mutex::new(false), latest_calls: AtomicUsize::new(0) }
        }

        fn set_failing(&self, failing: bool) {
            *self.failing.lock() = failing;
        }
    }

    #[async_trait]
    impl DrawSource for ScriptedSource {
        async fn latest(&self) -> Result<DrawRecord, FetchError> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            if *self.failing.lock() {
                return Err(FetchError::Transport("connection reset".into()));
            }
            self.draws
                .values()
                .next_back()
                .cloned()
                .ok_or(FetchError::Status { status: 404 })
        }

        async fn contest(&self, number: u32) -> Result<Option<DrawRecord>, FetchError> {
            if *self.failing.lock() {
                return Err(FetchError::Transport("connection reset".into()));
            }
            Ok(self.draws.get(&number).cloned())
        }
    }

    /// Memory store whose first `set` of one key parks until released
    struct GatedStore {
        inner: InMemoryStore,
        gated_key: &'static str,
        armed: AtomicBool,
        reached: Notify,
        release: Notify,
    }

    impl GatedStore {
        fn on(key: &'static str) -> Arc<Self> {
            Arc::new(Self {
                inner: InMemoryStore::new(),
                gated_key: key,
                armed: AtomicBool::new(true),
                reached: Notify::new(),
                release: Notify::new(),
            })
        }
    }

    #[async_trait]
    impl CacheStore for GatedStore {
        fn kind(&self) -> BackendKind {
            BackendKind::Memory
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError> {
            if key == self.gated_key && self.armed.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.release.notified().await;
            }
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }

        async fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear().await
        }
    }

    fn service(source: Arc<ScriptedSource>) -> SenaService {
        SenaService::new(SenaEngineConfig::default(), CacheManager::in_memory(), source)
    }

    #[test]
    fn test_parse_request_date() {
        assert_eq!(
            parse_request_date("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert!(parse_request_date("1996-03-11").is_ok());
        assert!(parse_request_date("2999-12-31").is_ok());

        for bad in ["2024-1-15", "15/01/2024", "2024-13-01", "2024-02-30", "", "1996-03-10"] {
            assert!(
                matches!(parse_request_date(bad), Err(SenaError::InvalidInput(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_date_touches_nothing() {
        let source = Arc::new(ScriptedSource::weekly(10));
        let service = service(source.clone());

        assert!(matches!(service.get_draw("yesterday").await, Err(SenaError::InvalidInput(_))));
        assert_eq!(source.latest_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.breaker().calls_total(), 0);
    }

    #[tokio::test]
    async fn test_estimate_is_cached_and_corpus_loaded_once() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let service = service(source.clone());

        let first = service.get_estimate().await.unwrap();
        let second = service.get_estimate().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.corpus_size, 20);
        assert!(first.sena.contains(&7));
        assert_eq!(source.latest_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_estimates_share_one_refresh() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let service = Arc::new(service(source.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.get_estimate().await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(source.latest_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lookup_prefers_loaded_corpus_and_writes_through() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let service = service(source.clone());
        service.get_estimate().await.unwrap();

        let date = Utc::now().date_naive() - chrono::Duration::days(14);
        let lookup = service.get_draw(&date.format("%Y-%m-%d").to_string()).await.unwrap();

        let DrawLookup::Found(record) = lookup else { panic!("expected a draw") };
        assert_eq!(record.contest, 998);
        // Served from the corpus: no extra upstream call
        assert_eq!(source.latest_calls.load(Ordering::SeqCst), 1);
        assert!(service.cache().store().exists(&draw_key(date)).await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let service = service(source.clone());
        let gap = (Utc::now().date_naive() - chrono::Duration::days(3))
            .format("%Y-%m-%d")
            .to_string();

        assert_eq!(service.get_draw(&gap).await.unwrap(), DrawLookup::NotFound);
        assert_eq!(service.get_draw(&gap).await.unwrap(), DrawLookup::NotFound);

        assert_eq!(source.latest_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_open_breaker_result_is_not_cached() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let service = service(source.clone());
        let date = (Utc::now().date_naive() - chrono::Duration::days(7))
            .format("%Y-%m-%d")
            .to_string();

        source.set_failing(true);
        for _ in 0..5 {
            assert!(matches!(service.get_draw(&date).await, Err(SenaError::UpstreamFailure(_))));
        }
        assert!(matches!(service.get_draw(&date).await, Err(SenaError::TransientUnavailable)));
        assert_eq!(service.breaker().state(), CircuitState::Open);

        // Upstream recovers; an operator reset lets the lookup through uncached
        source.set_failing(false);
        service.reset_circuit();
        assert!(service.get_draw(&date).await.unwrap().is_found());
    }

    #[tokio::test]
    async fn test_clear_cache_drops_corpus() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let service = service(source.clone());
        service.get_estimate().await.unwrap();
        assert_eq!(service.get_stats().corpus_size, Some(20));

        service.clear_cache().await.unwrap();
        assert_eq!(service.get_stats().corpus_size, None);

        service.get_estimate().await.unwrap();
        assert_eq!(source.latest_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_during_estimate_write_back_wins() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let store = GatedStore::on(ESTIMATE_KEY);
        let service = Arc::new(SenaService::new(
            SenaEngineConfig::default(),
            CacheManager::with_store(store.clone()),
            source.clone(),
        ));

        let pending = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.get_estimate().await }
        });

        // Estimate computed and parked inside its cache write
        store.reached.notified().await;
        service.clear_cache().await.unwrap();
        store.release.notify_one();

        let estimate = pending.await.unwrap().unwrap();
        assert_eq!(estimate.corpus_size, 20);
        assert_eq!(service.get_stats().corpus_size, None);
        assert!(!store.exists(ESTIMATE_KEY).await.unwrap());

        // Nothing stale survived the clear, so the next estimate goes upstream
        service.get_estimate().await.unwrap();
        assert_eq!(source.latest_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_draw_for_another_date_is_a_miss() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let service = service(source.clone());
        let date = Utc::now().date_naive() - chrono::Duration::days(7);
        let elsewhere = DrawRecord::new(
            1,
            NaiveDate::from_ymd_opt(1996, 3, 11).unwrap(),
            DrawNumbers::new([4u8, 5, 30, 33, 41, 52]).unwrap(),
        );
        service
            .cache()
            .set_json(&draw_key(date), &DrawLookup::Found(elsewhere), Duration::from_secs(600))
            .await;

        let DrawLookup::Found(record) = service.get_draw(&date.format("%Y-%m-%d").to_string()).await.unwrap()
        else {
            panic!("expected a draw")
        };
        assert_eq!(record.date, date);
        assert_eq!(record.contest, 999);

        // The mismatched entry was replaced by the real one
        let cached: DrawLookup = service.cache().get_json(&draw_key(date)).await.unwrap();
        assert_eq!(cached, DrawLookup::Found(record));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_corpus_is_refreshed() {
        let source = Arc::new(ScriptedSource::weekly(20));
        let service = service(source.clone());
        service.get_estimate().await.unwrap();

        // Past cache_ttl both the cached estimate and the snapshot are stale
        tokio::time::advance(service.config().cache_ttl() + Duration::from_secs(1)).await;
        service.get_estimate().await.unwrap();

        assert_eq!(source.latest_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stats_report_backend_and_circuit() {
        let service = service(Arc::new(ScriptedSource::weekly(5)));
        let stats = service.get_stats();

        assert_eq!(stats.cache_backend, BackendKind::Memory);
        assert!(!stats.cache_degraded);
        assert_eq!(stats.circuit.state, CircuitState::Closed);
        assert_eq!(stats.circuit.failure_count, 0);
        assert_eq!(stats.circuit.failure_threshold, 5);
        assert_eq!(stats.corpus_size, None);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["cache_backend"], "memory");
        assert_eq!(json["circuit"]["state"], "closed");
    }
}
