// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Errors that cross the engine boundary.
//!
//! Only the failures the orchestration layer has to decide messaging for are
//! errors here. A date with no draw is a normal [`DrawLookup::NotFound`]
//! result, and an empty corpus yields an empty
//! [`EstimateResult`](crate::EstimateResult) rather than an error.
//!
//! [`DrawLookup::NotFound`]: crate::service::DrawLookup::NotFound

use thiserror::Error;

use crate::fetcher::FetchError;
use crate::resilience::circuit_breaker::CircuitError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum SenaError {
    /// Circuit breaker is open; callers should show a fixed "try later" message
    #[error("draw service temporarily unavailable, try again later")]
    TransientUnavailable,

    /// Upstream call failed (network, non-2xx, malformed body)
    #[error("upstream draw source failed: {0}")]
    UpstreamFailure(#[source] FetchError),

    /// Request rejected before touching cache, breaker or upstream
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Explicit cache maintenance failed (reads and write-backs never surface this)
    #[error("cache error: {0}")]
    Cache(#[from] StorageError),
}

impl SenaError {
    /// Stable code for the HTTP layer
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransientUnavailable => "CIRCUIT_BREAKER_OPEN",
            Self::UpstreamFailure(_) => "API_CONNECTION_ERROR",
            Self::InvalidInput(_) => "INVALID_DATE",
            Self::Cache(_) => "CACHE_ERROR",
        }
    }

    /// Whether an outer caller may retry with backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamFailure(_) | Self::Cache(_))
    }
}

impl From<CircuitError<FetchError>> for SenaError {
    fn from(err: CircuitError<FetchError>) -> Self {
        match err {
            CircuitError::Rejected => SenaError::TransientUnavailable,
            CircuitError::Inner(e) => SenaError::UpstreamFailure(e),
        }
    }
}
