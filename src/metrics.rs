// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for sena-engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host process is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `sena_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `backend`: redis, memory
//! - `operation`: get, set, clear, latest, contest, corpus, draw
//! - `outcome` / `status`: hit, miss, success, error, rejected, not_found

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cache operation outcome
pub fn record_cache_operation(backend: &str, operation: &str, outcome: &str) {
    counter!(
        "sena_engine_cache_operations_total",
        "backend" => backend.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record cache operation latency
pub fn record_cache_latency(backend: &str, operation: &str, duration: Duration) {
    histogram!(
        "sena_engine_cache_operation_seconds",
        "backend" => backend.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set which backend serves the cache (1 = active)
pub fn set_cache_backend(backend: &str, degraded: bool) {
    gauge!(
        "sena_engine_cache_backend",
        "backend" => backend.to_string(),
        "degraded" => degraded.to_string()
    )
    .set(1.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// CIRCUIT BREAKER - Resilience metrics
// ═══════════════════════════════════════════════════════════════════════════

/// Record circuit breaker state (0 = Closed, 1 = HalfOpen, 2 = Open)
pub fn set_circuit_state(circuit: &str, state: u8) {
    gauge!(
        "sena_engine_circuit_breaker_state",
        "circuit" => circuit.to_string()
    )
    .set(state as f64);
}

/// Record circuit breaker call outcome
pub fn record_circuit_call(circuit: &str, outcome: &str) {
    counter!(
        "sena_engine_circuit_breaker_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// UPSTREAM
// ═══════════════════════════════════════════════════════════════════════════

/// Record an upstream request outcome
pub fn record_upstream_request(operation: &str, status: &str) {
    counter!(
        "sena_engine_upstream_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record upstream latency
pub fn record_upstream_latency(operation: &str, duration: Duration) {
    histogram!(
        "sena_engine_upstream_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════
// CORPUS / ESTIMATES
// ═══════════════════════════════════════════════════════════════════════════

/// Set the number of draws in the current corpus
pub fn set_corpus_size(count: usize) {
    gauge!("sena_engine_corpus_draws").set(count as f64);
}

/// Record a corpus refresh
pub fn record_corpus_refresh(status: &str) {
    counter!(
        "sena_engine_corpus_refreshes_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an estimate computation (`degraded` = empty corpus)
pub fn record_estimate(degraded: bool) {
    counter!(
        "sena_engine_estimates_computed_total",
        "degraded" => degraded.to_string()
    )
    .increment(1);
}

/// Record a draw lookup and which step resolved it
pub fn record_lookup(source: &str) {
    counter!(
        "sena_engine_draw_lookups_total",
        "source" => source.to_string()
    )
    .increment(1);
}
