// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::traits::{BackendKind, CacheStore, StorageError};

/// A cached blob with its expiry bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self { value, created_at: Instant::now(), ttl }
    }

    /// Expired strictly after `created_at + ttl`; at exactly the boundary the
    /// entry is still served. A TTL past the clock's range never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.created_at
            .checked_add(self.ttl)
            .is_some_and(|deadline| now > deadline)
    }
}

/// In-process cache. Used when no shared cache is configured or reachable.
pub struct InMemoryStore {
    data: DashMap<String, CacheEntry>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current entry count (including expired entries not yet reaped)
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.data.len())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let now = Instant::now();
        if let Some(entry) = self.data.get(key) {
            if !entry.is_expired_at(now) {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }

        // Lazy eviction. Re-check under the shard lock so a concurrent
        // set() of a fresh value is not removed.
        if self.data.remove_if(key, |_, entry| entry.is_expired_at(now)).is_some() {
            debug!(key, "Cache entry expired");
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.data.clear();
        Ok(())
    }
}
