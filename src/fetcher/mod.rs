// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Upstream draw retrieval.
//!
//! [`DrawSource`] is the raw transport seam (one request, one record).
//! [`DrawFetcher`] builds the two operations the engine needs on top of it and
//! runs each of them as a single circuit-breaker call:
//!
//! - [`DrawFetcher::fetch_recent_draws`]: the rolling history window
//! - [`DrawFetcher::fetch_draw`]: one draw by calendar date
//!
//! Only transport/status/shape failures reach the breaker as failures. A
//! contest or date the API legitimately does not have is an `Ok(None)` and
//! leaves the failure count alone. The fetcher never retries on its own.

pub mod http;
pub mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SenaEngineConfig;
use crate::draw::{DrawRecord, HistoricalCorpus};
use crate::error::SenaError;
use crate::resilience::circuit_breaker::CircuitBreaker;

pub use http::CaixaClient;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

/// Where draws come from.
#[async_trait]
pub trait DrawSource: Send + Sync {
    /// The most recent contest
    async fn latest(&self) -> Result<DrawRecord, FetchError>;

    /// A contest by number; `Ok(None)` when the source has no such contest
    async fn contest(&self, number: u32) -> Result<Option<DrawRecord>, FetchError>;
}

/// Tunables for how far back the fetcher looks.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Recent contests requested per history refresh
    pub contest_scan_depth: u32,
    /// Max contests walked backwards for one date
    pub lookup_scan_depth: u32,
    /// Parallel contest requests during a refresh
    pub concurrency: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from(&SenaEngineConfig::default())
    }
}

impl From<&SenaEngineConfig> for FetchSettings {
    fn from(config: &SenaEngineConfig) -> Self {
        Self {
            contest_scan_depth: config.contest_scan_depth,
            lookup_scan_depth: config.lookup_scan_depth,
            concurrency: config.fetch_concurrency.max(1),
        }
    }
}

/// Breaker-guarded access to a [`DrawSource`].
pub struct DrawFetcher {
    source: Arc<dyn DrawSource>,
    breaker: Arc<CircuitBreaker>,
    settings: FetchSettings,
}

impl DrawFetcher {
    pub fn new(
        source: Arc<dyn DrawSource>,
        breaker: Arc<CircuitBreaker>,
        settings: FetchSettings,
    ) -> Self {
        Self { source, breaker, settings }
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Draws dated within `window` of today.
    pub async fn fetch_recent_draws(
        &self,
        window: chrono::Duration,
    ) -> Result<HistoricalCorpus, SenaError> {
        self.fetch_recent_draws_as_of(window, Utc::now().date_naive()).await
    }

    /// Draws dated on or after `today - window`.
    pub async fn fetch_recent_draws_as_of(
        &self,
        window: chrono::Duration,
        today: NaiveDate,
    ) -> Result<HistoricalCorpus, SenaError> {
        // A window reaching past chrono's calendar takes the whole history
        let cutoff = today.checked_sub_signed(window).unwrap_or(NaiveDate::MIN);
        let corpus = self
            .breaker
            .call(|| self.load_window(cutoff))
            .await?;
        info!(draws = corpus.len(), %cutoff, "Fetched historical corpus");
        Ok(corpus)
    }

    /// The draw held on `date`, if the source has one.
    pub async fn fetch_draw(&self, date: NaiveDate) -> Result<Option<DrawRecord>, SenaError> {
        let found = self.breaker.call(|| self.scan_for_date(date)).await?;
        debug!(%date, found = found.is_some(), "Direct draw lookup finished");
        Ok(found)
    }

    async fn load_window(&self, cutoff: NaiveDate) -> Result<HistoricalCorpus, FetchError> {
        let latest = self.source.latest().await?;
        let first = latest
            .contest
            .saturating_sub(self.settings.contest_scan_depth)
            .max(1);

        // Any failed contest aborts the refresh; a partial window would skew
        // the frequency table.
        let fetched: Vec<Option<DrawRecord>> = stream::iter(first..latest.contest)
            .map(|n| self.source.contest(n))
            .buffer_unordered(self.settings.concurrency)
            .try_collect()
            .await?;

        let records: Vec<DrawRecord> = fetched
            .into_iter()
            .flatten()
            .chain(std::iter::once(latest))
            .filter(|r| r.date >= cutoff)
            .collect();

        Ok(HistoricalCorpus::new(records))
    }

    async fn scan_for_date(&self, date: NaiveDate) -> Result<Option<DrawRecord>, FetchError> {
        let latest = self.source.latest().await?;
        if date > latest.date {
            return Ok(None);
        }
        if date == latest.date {
            return Ok(Some(latest));
        }

        let floor = latest
            .contest
            .saturating_sub(self.settings.lookup_scan_depth)
            .max(1);

        // Contests are chronological: once we pass the date, it had no draw
        for n in (floor..latest.contest).rev() {
            match self.source.contest(n).await? {
                Some(draw) if draw.date == date => return Ok(Some(draw)),
                Some(draw) if draw.date < date => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}
