// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine service.
//!
//! [`SenaService`] ties the components together and is the only surface the
//! orchestration layer (HTTP handlers, CLI) talks to:
//!
//! - [`CacheManager`]: shared or in-process cache, chosen once at startup
//! - [`DrawFetcher`]: breaker-guarded upstream access
//! - [`estimate`](crate::estimation::estimate): frequency ranking over the corpus
//! - the loaded [`CorpusSnapshot`], refreshed single-flight when stale
//!
//! # Example
//!
//! ```rust,no_run
//! use sena_engine::{SenaEngineConfig, SenaService, DrawLookup};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SenaService::connect(SenaEngineConfig::from_env()?).await?;
//!
//! let estimate = service.get_estimate().await?;
//! println!("sena: {:?}", estimate.sena);
//!
//! match service.get_draw("2024-01-15").await? {
//!     DrawLookup::Found(draw) => println!("contest {}: {:?}", draw.contest, draw.numbers),
//!     DrawLookup::NotFound => println!("no draw that day"),
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod types;

pub use types::{CorpusSnapshot, DrawLookup, ServiceStats};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::SenaEngineConfig;
use crate::error::SenaError;
use crate::fetcher::{CaixaClient, DrawFetcher, DrawSource, FetchSettings};
use crate::metrics;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitConfig};
use crate::storage::CacheManager;

/// Circuit name used in logs and metrics
const UPSTREAM_CIRCUIT: &str = "upstream";

/// The engine's public entry point. `Send + Sync`; share it behind an `Arc`.
pub struct SenaService {
    pub(super) config: SenaEngineConfig,

    /// Cache facade (backend fixed for the process lifetime)
    pub(super) cache: CacheManager,

    /// Breaker-guarded upstream
    pub(super) fetcher: DrawFetcher,

    /// Loaded history window; swapped wholesale, never patched
    pub(super) corpus: RwLock<Option<Arc<CorpusSnapshot>>>,

    /// Serializes refreshes so concurrent callers share one upstream fetch
    pub(super) refresh_lock: Mutex<()>,

    /// Bumped by every `clear_cache()`. Work that started under an older
    /// epoch must not write its results back.
    pub(super) clear_epoch: AtomicU64,
}

impl SenaService {
    /// Build the production service: HTTP source plus the cache the config asks for.
    ///
    /// Cache trouble never fails this call (it degrades to memory); only an
    /// unbuildable HTTP client does.
    pub async fn connect(config: SenaEngineConfig) -> Result<Self, SenaError> {
        let client = CaixaClient::new(config.api_url.clone(), config.request_timeout())
            .map_err(SenaError::UpstreamFailure)?;
        let cache = CacheManager::connect(&config).await;
        Ok(Self::new(config, cache, Arc::new(client)))
    }

    /// Assemble from parts. Tests and embedders use this to plug in their own
    /// source or cache.
    pub fn new(config: SenaEngineConfig, cache: CacheManager, source: Arc<dyn DrawSource>) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            UPSTREAM_CIRCUIT,
            CircuitConfig {
                failure_threshold: config.failure_threshold,
                recovery_timeout: config.recovery_timeout(),
            },
        ));
        let fetcher = DrawFetcher::new(source, breaker, FetchSettings::from(&config));

        let selection = cache.selection();
        metrics::set_cache_backend(cache.kind().as_str(), selection.is_degraded());
        info!(
            backend = %cache.kind(),
            degraded = selection.is_degraded(),
            failure_threshold = config.failure_threshold,
            "Sena service ready"
        );

        Self {
            config,
            cache,
            fetcher,
            corpus: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            clear_epoch: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SenaEngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.fetcher.breaker()
    }

    /// Operator action: close the upstream circuit and zero its counter.
    pub fn reset_circuit(&self) {
        self.fetcher.breaker().reset();
    }

    /// The loaded snapshot, fresh or not
    pub(super) fn current_snapshot(&self) -> Option<Arc<CorpusSnapshot>> {
        self.corpus.read().clone()
    }

    fn fresh_snapshot(&self) -> Option<Arc<CorpusSnapshot>> {
        self.current_snapshot()
            .filter(|s| s.is_fresh(self.config.cache_ttl()))
    }

    /// Return a fresh corpus, refreshing it from upstream if needed.
    ///
    /// Only one refresh runs at a time; callers that queued behind it reuse
    /// its result instead of fetching again. A failed refresh keeps the old
    /// snapshot in place and returns the error.
    pub(super) async fn ensure_corpus(&self) -> Result<Arc<CorpusSnapshot>, SenaError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        let epoch = self.epoch();
        match self
            .fetcher
            .fetch_recent_draws(self.config.history_window())
            .await
        {
            Ok(corpus) => {
                let snapshot = Arc::new(CorpusSnapshot::new(corpus));
                {
                    let mut slot = self.corpus.write();
                    // A clear during the fetch wins; the caller still gets its answer
                    if self.epoch() == epoch {
                        *slot = Some(Arc::clone(&snapshot));
                    }
                }
                metrics::set_corpus_size(snapshot.corpus.len());
                metrics::record_corpus_refresh("success");
                info!(draws = snapshot.corpus.len(), "Corpus refreshed");
                Ok(snapshot)
            }
            Err(e) => {
                metrics::record_corpus_refresh("error");
                warn!(error = %e, "Corpus refresh failed");
                Err(e)
            }
        }
    }

    pub(super) fn epoch(&self) -> u64 {
        self.clear_epoch.load(Ordering::Acquire)
    }

    /// Invalidate in-flight write-backs and drop the loaded corpus.
    pub(super) fn begin_clear(&self) {
        let mut slot = self.corpus.write();
        self.clear_epoch.fetch_add(1, Ordering::AcqRel);
        *slot = None;
    }
}
