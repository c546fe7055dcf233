// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the sena engine.
//!
//! # Example
//!
//! ```
//! use sena_engine::SenaEngineConfig;
//!
//! // Minimal config (uses defaults, in-process cache only)
//! let config = SenaEngineConfig::default();
//! assert_eq!(config.failure_threshold, 5);
//! assert!(config.redis_url.is_none());
//!
//! // Shared cache with a tighter breaker
//! let config = SenaEngineConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     failure_threshold: 3,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Longest history window honoured, roughly a century. Larger (or negative)
/// settings are clamped into `0..=MAX_HISTORY_WINDOW_DAYS`.
pub const MAX_HISTORY_WINDOW_DAYS: i64 = 36_525;

/// Configuration for the sena engine.
///
/// Every field has a default; `from_env()` overrides them from `SENA_*`
/// environment variables (e.g. `SENA_REDIS_URL`, `SENA_FAILURE_THRESHOLD`).
#[derive(Debug, Clone, Deserialize)]
pub struct SenaEngineConfig {
    /// Base URL of the upstream draw API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Redis connection string. `None` runs the in-process cache only.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Per-attempt limit on connecting to Redis at startup
    #[serde(default = "default_redis_connect_timeout_secs")]
    pub redis_connect_timeout_secs: u64,

    /// Key namespace inside Redis; `clear()` only touches keys under it
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,

    /// TTL for estimates and corpus freshness
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// TTL for found draw lookups
    #[serde(default = "default_draw_ttl_secs")]
    pub draw_ttl_secs: u64,

    /// TTL for negative draw lookups
    #[serde(default = "default_not_found_ttl_secs")]
    pub not_found_ttl_secs: u64,

    /// Timeout applied to every upstream request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Circuit breaker settings
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,

    /// Rolling window of history used for estimates
    #[serde(default = "default_history_window_days")]
    pub history_window_days: i64,

    /// Number of recent contests requested per corpus refresh
    #[serde(default = "default_contest_scan_depth")]
    pub contest_scan_depth: u32,

    /// Max contests walked backwards for a single date lookup
    #[serde(default = "default_lookup_scan_depth")]
    pub lookup_scan_depth: u32,

    /// Parallel contest requests during a refresh
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

fn default_api_url() -> String {
    "https://servicebus2.caixa.gov.br/portaldeloterias/api/megasena".to_string()
}
fn default_redis_prefix() -> String { "sena:".to_string() }
fn default_redis_connect_timeout_secs() -> u64 { 2 }
fn default_cache_ttl_secs() -> u64 { 3600 }
fn default_draw_ttl_secs() -> u64 { 86_400 }
fn default_not_found_ttl_secs() -> u64 { 300 }
fn default_request_timeout_secs() -> u64 { 10 }
fn default_failure_threshold() -> u32 { 5 }
fn default_recovery_timeout_secs() -> u64 { 30 }
fn default_history_window_days() -> i64 { 730 }
fn default_contest_scan_depth() -> u32 { 180 }
fn default_lookup_scan_depth() -> u32 { 300 }
fn default_fetch_concurrency() -> usize { 10 }

impl Default for SenaEngineConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            redis_url: None,
            redis_connect_timeout_secs: default_redis_connect_timeout_secs(),
            redis_prefix: default_redis_prefix(),
            cache_ttl_secs: default_cache_ttl_secs(),
            draw_ttl_secs: default_draw_ttl_secs(),
            not_found_ttl_secs: default_not_found_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            history_window_days: default_history_window_days(),
            contest_scan_depth: default_contest_scan_depth(),
            lookup_scan_depth: default_lookup_scan_depth(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl SenaEngineConfig {
    /// Load configuration from `SENA_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("SENA").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    #[must_use]
    pub fn redis_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_connect_timeout_secs)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub fn draw_ttl(&self) -> Duration {
        Duration::from_secs(self.draw_ttl_secs)
    }

    #[must_use]
    pub fn not_found_ttl(&self) -> Duration {
        Duration::from_secs(self.not_found_ttl_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    #[must_use]
    pub fn history_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.history_window_days.clamp(0, MAX_HISTORY_WINDOW_DAYS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_upstream_settings() {
        let config = SenaEngineConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.recovery_timeout(), Duration::from_secs(30));
        assert_eq!(config.history_window(), chrono::Duration::days(730));
        assert!(config.not_found_ttl() < config.draw_ttl());
        assert_eq!(config.redis_connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_history_window_is_clamped() {
        let huge = SenaEngineConfig { history_window_days: i64::MAX, ..Default::default() };
        assert_eq!(huge.history_window(), chrono::Duration::days(MAX_HISTORY_WINDOW_DAYS));

        let negative = SenaEngineConfig { history_window_days: i64::MIN, ..Default::default() };
        assert_eq!(negative.history_window(), chrono::Duration::zero());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: SenaEngineConfig = serde_json::from_str(
            r#"{"redis_url": "redis://cache:6379", "failure_threshold": 2}"#,
        )
        .unwrap();

        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.redis_prefix, "sena:");
        assert_eq!(config.contest_scan_depth, 180);
    }
}
