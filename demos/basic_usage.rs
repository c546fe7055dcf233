// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic sena-engine usage example.
//!
//! Demonstrates:
//! 1. Building the service (Redis if `SENA_REDIS_URL` is set and reachable)
//! 2. Computing an estimate from the last two years of draws
//! 3. Looking up draws by date, including a cached repeat and a future date
//! 4. Rejecting malformed input
//! 5. Displaying stats and captured metrics
//! 6. Clearing the cache
//!
//! # Prerequisites
//!
//! Network access to the lottery API. Optionally a local Redis:
//! ```bash
//! docker run -d -p 6379:6379 redis:7-alpine
//! export SENA_REDIS_URL=redis://localhost:6379
//! ```
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=sena_engine=debug cargo run --example basic_usage
//! ```

use chrono::Utc;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use sena_engine::{DrawLookup, SenaEngineConfig, SenaService};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures everything the engine records)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           sena-engine: Basic Usage Example                    ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and build the service
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Configuring sena-engine...");
    let config = SenaEngineConfig::from_env()?;
    println!("   API:   {}", config.api_url);
    println!("   Redis: {}", config.redis_url.as_deref().unwrap_or("(not configured)"));

    let service = SenaService::connect(config).await?;
    let stats = service.get_stats();
    println!(
        "   ✅ Cache backend: {}{}",
        stats.cache_backend,
        if stats.cache_degraded { " (degraded: Redis unreachable)" } else { "" }
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Estimate
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🎲 Computing estimate (fetches ~2 years of draws)...");
    match service.get_estimate().await {
        Ok(estimate) if estimate.is_degraded() => println!("   ⚠️  No draws in window, estimate is empty"),
        Ok(estimate) => {
            println!("   ├─ Draws used: {}", estimate.corpus_size);
            println!("   ├─ Quadra:     {:?}", estimate.quadra);
            println!("   ├─ Quina:      {:?}", estimate.quina);
            println!("   └─ Sena:       {:?}", estimate.sena);
        }
        Err(e) => println!("   ❌ {} [{}]", e, e.code()),
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Draw lookups
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Looking up draws by date...");
    let today = Utc::now().date_naive();
    let week_ago = (today - chrono::Duration::days(7)).format("%Y-%m-%d").to_string();
    let next_month = (today + chrono::Duration::days(30)).format("%Y-%m-%d").to_string();

    for date in [week_ago.as_str(), week_ago.as_str(), "2024-01-13", next_month.as_str()] {
        match service.get_draw(date).await {
            Ok(DrawLookup::Found(draw)) => {
                println!("   ├─ {} → contest {} {:?}", date, draw.contest, draw.numbers.as_slice())
            }
            Ok(DrawLookup::NotFound) => println!("   ├─ {} → no draw", date),
            Err(e) => println!("   ├─ {} → ❌ {} [{}]", date, e, e.code()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Invalid input
    // ─────────────────────────────────────────────────────────────────────────
    for bad in ["13/01/2024", "1990-01-01"] {
        if let Err(e) = service.get_draw(bad).await {
            println!("   └─ {:?} rejected: {} [{}]", bad, e, e.code());
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Stats and metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Stats:");
    println!("{}", serde_json::to_string_pretty(&service.get_stats())?);

    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Clear
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🧹 Clearing cache...");
    service.clear_cache().await?;
    println!("   ✅ Cleared; next estimate will refetch");

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics, grouped by kind
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let max = samples.iter().map(|v| v.into_inner()).fold(0.0, f64::max);
                histograms.push((name, label_str, count, sum, max));
            }
        }
    }

    counters.sort();
    gauges.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    histograms.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }
    if !gauges.is_empty() {
        println!("   ├─ Gauges (current)");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }
    if !histograms.is_empty() {
        println!("   └─ Histograms (seconds)");
        for (name, labels, count, sum, max) in &histograms {
            let avg = if *count > 0 { sum / *count as f64 } else { 0.0 };
            println!(
                "      └─ {}{}: n={} avg={:.4} max={:.4}",
                name, labels, count, avg, max
            );
        }
    }
}
