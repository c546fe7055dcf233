// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache backend selection and typed access.
//!
//! The backend is chosen exactly once, when the manager is built:
//!
//! ```text
//! redis_url configured? ──no──▶ Memory
//!        │ yes
//!        ▼
//! connect + PING ok?    ──no──▶ Memory (warn, for the rest of the process)
//!        │ yes
//!        ▼
//!      Redis
//! ```
//!
//! There is no per-call re-selection. Runtime errors from the chosen backend
//! are logged, counted in metrics, and treated as a miss (reads) or a skipped
//! write-back (writes), so a cache hiccup never fails a request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::memory::InMemoryStore;
use super::redis::RedisStore;
use super::traits::{BackendKind, CacheStore, StorageError};
use crate::config::SenaEngineConfig;
use crate::metrics;
use crate::resilience::retry::RetryConfig;

/// Why the manager ended up on its backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    /// Shared cache reachable at startup
    Redis,
    /// No shared cache configured
    MemoryByConfig,
    /// Shared cache configured but unreachable; degraded for process lifetime
    MemoryFallback { reason: String },
}

impl BackendSelection {
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Redis => BackendKind::Redis,
            Self::MemoryByConfig | Self::MemoryFallback { .. } => BackendKind::Memory,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::MemoryFallback { .. })
    }
}

/// Cache facade used by the service.
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn CacheStore>,
    selection: BackendSelection,
}

impl CacheManager {
    /// Build from config, attempting Redis when a URL is configured.
    pub async fn connect(config: &SenaEngineConfig) -> Self {
        Self::connect_with_retry(config, &RetryConfig::startup()).await
    }

    pub async fn connect_with_retry(config: &SenaEngineConfig, retry_config: &RetryConfig) -> Self {
        match config.redis_url.as_deref() {
            None => Self::in_memory(),
            Some(url) => {
                let attempt = RedisStore::with_prefix(
                    url,
                    Some(&config.redis_prefix),
                    retry_config,
                    config.redis_connect_timeout(),
                )
                .await;
                Self::from_connect_result(attempt)
            }
        }
    }

    /// The single decision point between shared and in-process backends.
    pub fn from_connect_result(attempt: Result<RedisStore, StorageError>) -> Self {
        match attempt {
            Ok(store) => {
                info!("Using Redis cache");
                Self {
                    backend: Arc::new(store),
                    selection: BackendSelection::Redis,
                }
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to in-memory cache");
                Self {
                    backend: Arc::new(InMemoryStore::new()),
                    selection: BackendSelection::MemoryFallback { reason: e.to_string() },
                }
            }
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        info!("Using in-memory cache");
        Self {
            backend: Arc::new(InMemoryStore::new()),
            selection: BackendSelection::MemoryByConfig,
        }
    }

    /// Wrap any store; used for custom backends and failure injection in tests
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        let selection = match store.kind() {
            BackendKind::Redis => BackendSelection::Redis,
            BackendKind::Memory => BackendSelection::MemoryByConfig,
        };
        Self { backend: store, selection }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    #[must_use]
    pub fn selection(&self) -> &BackendSelection {
        &self.selection
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.backend
    }

    /// Read and decode a value. Backend or decode errors count as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.kind().as_str();
        let start = Instant::now();
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                metrics::record_cache_operation(backend, "get", "error");
                return None;
            }
        };
        metrics::record_cache_latency(backend, "get", start.elapsed());

        let Some(bytes) = raw else {
            debug!(key, "Cache miss");
            metrics::record_cache_operation(backend, "get", "miss");
            return None;
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!(key, "Cache hit");
                metrics::record_cache_operation(backend, "get", "hit");
                Some(value)
            }
            Err(e) => {
                let err = StorageError::Codec { key: key.to_string(), reason: e.to_string() };
                warn!(error = %err, "Dropping undecodable cache entry");
                metrics::record_cache_operation(backend, "get", "error");
                if let Err(e) = self.backend.delete(key).await {
                    warn!(key, error = %e, "Failed to delete undecodable cache entry");
                }
                None
            }
        }
    }

    /// Encode and store a value. Returns whether the write landed.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let backend = self.kind().as_str();
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode cache value");
                metrics::record_cache_operation(backend, "set", "error");
                return false;
            }
        };

        match self.backend.set(key, bytes, ttl).await {
            Ok(()) => {
                debug!(key, ttl_secs = ttl.as_secs(), "Cache set");
                metrics::record_cache_operation(backend, "set", "success");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "Cache write failed");
                metrics::record_cache_operation(backend, "set", "error");
                false
            }
        }
    }

    /// Empty the whole namespace. This is the only cache-busting path.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let result = self.backend.clear().await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::record_cache_operation(self.kind().as_str(), "clear", outcome);
        if result.is_ok() {
            info!(backend = %self.kind(), "Cache cleared");
        }
        result
    }
}
