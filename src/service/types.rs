// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the service layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::draw::{DrawRecord, HistoricalCorpus};
use crate::resilience::circuit_breaker::CircuitStats;
use crate::storage::BackendKind;

/// Outcome of a draw lookup.
///
/// `NotFound` is a normal answer (no draw that day, or a future date), not an
/// error. It is also what gets cached for known-absent dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "draw", rename_all = "snake_case")]
pub enum DrawLookup {
    Found(DrawRecord),
    NotFound,
}

impl DrawLookup {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    #[must_use]
    pub fn into_record(self) -> Option<DrawRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound => None,
        }
    }
}

impl From<Option<DrawRecord>> for DrawLookup {
    fn from(record: Option<DrawRecord>) -> Self {
        record.map_or(Self::NotFound, Self::Found)
    }
}

/// Which resolution step answered a lookup (metrics label)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LookupSource {
    Cache,
    Corpus,
    Upstream,
}

impl LookupSource {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Corpus => "corpus",
            Self::Upstream => "upstream",
        }
    }
}

/// A loaded history window, replaced wholesale on refresh.
#[derive(Debug)]
pub struct CorpusSnapshot {
    pub corpus: HistoricalCorpus,
    /// Wall-clock time of the fetch, for reporting
    pub refreshed_at: DateTime<Utc>,
    /// Monotonic time of the fetch, for staleness
    pub(super) loaded_at: Instant,
}

impl CorpusSnapshot {
    pub(super) fn new(corpus: HistoricalCorpus) -> Self {
        Self {
            corpus,
            refreshed_at: Utc::now(),
            loaded_at: Instant::now(),
        }
    }

    pub(super) fn is_fresh(&self, ttl: std::time::Duration) -> bool {
        self.loaded_at.elapsed() <= ttl
    }
}

/// Runtime view of the service for stats endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    /// Backend serving the cache
    pub cache_backend: BackendKind,
    /// True when Redis was configured but unreachable at startup
    pub cache_degraded: bool,
    pub circuit: CircuitStats,
    /// Draws in the loaded corpus, `None` before the first refresh
    pub corpus_size: Option<usize>,
    pub corpus_refreshed_at: Option<DateTime<Utc>>,
}
