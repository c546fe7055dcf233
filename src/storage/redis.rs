// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis storage backend for the shared cache.
//!
//! Blobs are stored as plain Redis STRINGs with a millisecond expiry
//! (`SET key value PX ttl`), so expiry is enforced by Redis itself and every
//! process sharing the instance sees the same entries.
//!
//! All keys live under a prefix (default `sena:`). `clear()` walks the prefix
//! with `SCAN` and deletes only those keys, so a shared Redis instance can
//! host other applications' data.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client};
use tokio::time::timeout;
use tracing::{debug, info};

use super::traits::{BackendKind, CacheStore, StorageError};
use crate::resilience::retry::{retry, RetryConfig};

const SCAN_BATCH: usize = 500;

/// Per-attempt connect limit used by [`RedisStore::new`]
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RedisStore {
    connection: ConnectionManager,
    /// Key prefix for namespacing (e.g., "sena:" → "sena:estimate")
    prefix: String,
}

impl RedisStore {
    /// Connect without a key prefix.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::with_prefix(
            connection_string,
            None,
            &RetryConfig::startup(),
            DEFAULT_CONNECT_TIMEOUT,
        )
        .await
    }

    /// Connect with an optional key prefix.
    ///
    /// The connection is verified with `PING` before returning, so a
    /// reachable-but-broken endpoint fails here rather than on first use.
    /// Each attempt (connect plus `PING`) is cut off after `connect_timeout`,
    /// so a host that drops packets fails in bounded time.
    ///
    /// ```rust,no_run
    /// # use std::time::Duration;
    /// # use sena_engine::storage::redis::RedisStore;
    /// # use sena_engine::RetryConfig;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = RedisStore::with_prefix(
    ///     "redis://localhost",
    ///     Some("sena:"),
    ///     &RetryConfig::startup(),
    ///     Duration::from_secs(2),
    /// ).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_prefix(
        connection_string: &str,
        prefix: Option<&str>,
        retry_config: &RetryConfig,
        connect_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = Client::open(connection_string)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let connection = retry("redis_connect", retry_config, || async {
            let attempt = async {
                let mut conn = ConnectionManager::new(client.clone()).await?;
                let _: String = cmd("PING").query_async(&mut conn).await?;
                Ok::<_, redis::RedisError>(conn)
            };
            match timeout(connect_timeout, attempt).await {
                Ok(result) => result,
                Err(_) => Err(redis::RedisError::from(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no answer within {:?}", connect_timeout),
                ))),
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        info!(prefix = prefix.unwrap_or(""), "Connected to Redis cache");

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
        })
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Collect every key under the prefix using cursor-based SCAN
    async fn scan_prefixed_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", self.prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut conn = self.connection.clone();
        let data: Option<Vec<u8>> = conn
            .get(self.prefixed_key(key))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(data)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        // PX rejects 0; a zero TTL still means "valid until now"
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let _: () = cmd("SET")
            .arg(self.prefixed_key(key))
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(self.prefixed_key(key))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();

        if self.prefix.is_empty() {
            let _: () = cmd("FLUSHDB")
                .query_async(&mut conn)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            info!("Redis cache flushed");
            return Ok(());
        }

        let keys = self.scan_prefixed_keys().await?;
        let removed = keys.len();
        for chunk in keys.chunks(SCAN_BATCH) {
            let _: () = conn
                .del(chunk)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        debug!(prefix = %self.prefix, removed, "Redis namespace cleared");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.connection.clone();
        conn.exists(self.prefixed_key(key))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}
