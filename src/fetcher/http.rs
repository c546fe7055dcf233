// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP draw source backed by the public lottery API.
//!
//! - `GET {base}` → latest contest
//! - `GET {base}/{n}` → contest `n`
//!
//! 404 and 204 are the API's "no such contest" answers. Every other non-2xx
//! status, transport error or undecodable body is a failure.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::wire::parse_draw;
use super::{DrawSource, FetchError};
use crate::draw::DrawRecord;
use crate::metrics;

pub struct CaixaClient {
    client: Client,
    base_url: String,
}

impl CaixaClient {
    /// Build a client. `timeout` applies to every request it makes.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sena-engine/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_draw(&self, url: &str, operation: &str) -> Result<Option<DrawRecord>, FetchError> {
        let start = Instant::now();
        let result = self.request(url).await;
        metrics::record_upstream_latency(operation, start.elapsed());

        let status = match &result {
            Ok(Some(_)) => "success",
            Ok(None) => "not_found",
            Err(_) => "error",
        };
        metrics::record_upstream_request(operation, status);
        result
    }

    async fn request(&self, url: &str) -> Result<Option<DrawRecord>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            debug!(url, status = status.as_u16(), "Upstream has no such draw");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("invalid JSON body: {}", e)))?;
        parse_draw(&body).map(Some)
    }
}

#[async_trait]
impl DrawSource for CaixaClient {
    async fn latest(&self) -> Result<DrawRecord, FetchError> {
        self.get_draw(&self.base_url, "latest")
            .await?
            .ok_or(FetchError::Status { status: StatusCode::NOT_FOUND.as_u16() })
    }

    async fn contest(&self, number: u32) -> Result<Option<DrawRecord>, FetchError> {
        let url = format!("{}/{}", self.base_url, number);
        self.get_draw(&url, "contest").await
    }
}
