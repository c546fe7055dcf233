// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Sena Engine
//!
//! Resilient retrieval and caching core for Mega-Sena draw data, with
//! frequency-based number estimates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SenaService                          │
//! │  • get_estimate / get_draw / clear_cache / get_stats        │
//! │  • Corpus snapshot, single-flight refresh                   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────┐  ┌──────────────────┐  ┌─────────────────┐
//! │  CacheManager   │  │   DrawFetcher    │  │   estimation    │
//! │ Redis or memory │  │ CircuitBreaker   │  │ FrequencyTable  │
//! │ (chosen once)   │  │  └▶ DrawSource   │  │ top 4 / 5 / 6   │
//! └─────────────────┘  └──────────────────┘  └─────────────────┘
//!                               │
//!                               ▼
//!                      Caixa lottery API (reqwest)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sena_engine::{SenaEngineConfig, SenaService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SenaEngineConfig {
//!         redis_url: Some("redis://localhost:6379".into()),
//!         ..Default::default()
//!     };
//!
//!     // Falls back to an in-process cache if Redis is unreachable
//!     let service = SenaService::connect(config).await.expect("Failed to build service");
//!
//!     match service.get_estimate().await {
//!         Ok(estimate) if estimate.is_degraded() => println!("No history available yet"),
//!         Ok(estimate) => println!("sena: {:?}", estimate.sena),
//!         Err(e) => eprintln!("{} ({})", e, e.code()),
//!     }
//!
//!     println!("{:?}", service.get_stats());
//! }
//! ```
//!
//! ## Failure Handling
//!
//! - **Cache**: Redis is tried once at startup; if it is unreachable the
//!   engine runs on the in-process cache for the rest of its life
//! - **Upstream**: every fetch runs through one [`CircuitBreaker`]; an open
//!   circuit fails fast with [`SenaError::TransientUnavailable`]
//! - **Absent data**: a date without a draw is [`DrawLookup::NotFound`], never
//!   an error and never a breaker failure
//! - **Empty history**: estimates come back empty ([`EstimateResult::is_degraded`])
//!
//! ## Configuration
//!
//! See [`SenaEngineConfig`] for all options and their `SENA_*` environment names.
//!
//! ## Modules
//!
//! - [`service`]: The [`SenaService`] orchestrating all components
//! - [`storage`]: Cache backends (Redis, memory) and backend selection
//! - [`fetcher`]: Upstream draw source and breaker-guarded fetch operations
//! - [`estimation`]: Frequency table and estimate sets
//! - [`resilience`]: Circuit breaker, retry with backoff
//! - [`draw`]: Draw records and the historical corpus

pub mod config;
pub mod draw;
pub mod error;
pub mod storage;
pub mod resilience;
pub mod fetcher;
pub mod estimation;
pub mod service;
pub mod metrics;

pub use config::SenaEngineConfig;
pub use draw::{DrawNumbers, DrawNumbersError, DrawRecord, HistoricalCorpus};
pub use error::SenaError;
pub use storage::{BackendKind, BackendSelection, CacheManager, CacheStore, StorageError};
pub use resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError, CircuitState, CircuitStats};
pub use resilience::retry::{retry_if, RetryConfig};
pub use fetcher::{CaixaClient, DrawFetcher, DrawSource, FetchError, FetchSettings};
pub use estimation::{estimate, EstimateResult, FrequencyTable};
pub use service::{CorpusSnapshot, DrawLookup, SenaService, ServiceStats};
