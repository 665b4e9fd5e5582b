//! Roster fetched over HTTP.

use super::unwrap_envelope;
use crate::error::SourceUnavailableError;
use crate::provider::RosterSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, Instrument};

pub struct HttpRosterSource {
    http_client: Client,
    url: String,
    authorization: Option<String>,
}

impl std::fmt::Debug for HttpRosterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRosterSource")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl HttpRosterSource {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, authorization: Option<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http_client,
            url: url.into(),
            authorization,
        })
    }

    async fn fetch(&self) -> Result<Vec<Value>> {
        let start = Instant::now();
        let mut request = self.http_client.get(&self.url);
        if let Some(authorization) = &self.authorization {
            request = request.header("Authorization", authorization);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("roster endpoint returned {status}: {body}");
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse roster response as JSON")?;
        let records = unwrap_envelope(body)?;

        debug!(
            records = records.len(),
            duration_ms = start.elapsed().as_millis(),
            "Roster fetched"
        );
        Ok(records)
    }
}

#[async_trait]
impl RosterSource for HttpRosterSource {
    async fn fetch_roster(&self) -> Result<Vec<Value>, SourceUnavailableError> {
        let span = info_span!("roster.fetch", roster.url = %self.url);
        self.fetch()
            .instrument(span)
            .await
            .map_err(|e| SourceUnavailableError::new("roster", e))
    }
}
