//! # Report Sinks
//!
//! Destinations for a finished pass report:
//!
//! - [`TracingReportSink`] logs the tally
//! - [`MetricsReportSink`] feeds the Prometheus registry
//! - [`LastReportSink`] keeps the latest report for `GET /report`
//! - [`WebhookReportSink`] pushes the counters to a telemetry endpoint

use crate::model::{PassOutcome, ReconciliationReport};
use crate::observability::metrics;
use crate::provider::ReportSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Latest finished report, shared with the HTTP server
pub type SharedReport = Arc<RwLock<Option<ReconciliationReport>>>;

#[derive(Debug, Default)]
pub struct TracingReportSink;

#[async_trait]
impl ReportSink for TracingReportSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn publish(&self, report: &ReconciliationReport) -> Result<()> {
        let duration = report.duration_secs().unwrap_or_default();
        if report.has_errors() {
            warn!(
                pass.id = %report.pass_id,
                created_users = report.created,
                updated_users = report.updated,
                deleted_users = report.deleted,
                error_count = report.errors,
                duration_secs = duration,
                "❗ Pass finished with errors"
            );
        } else {
            info!(
                pass.id = %report.pass_id,
                created_users = report.created,
                updated_users = report.updated,
                deleted_users = report.deleted,
                error_count = report.errors,
                duration_secs = duration,
                "Pass finished"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MetricsReportSink;

#[async_trait]
impl ReportSink for MetricsReportSink {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn publish(&self, report: &ReconciliationReport) -> Result<()> {
        let outcome = match report.outcome {
            PassOutcome::Aborted => "aborted",
            PassOutcome::Completed | PassOutcome::Running => "completed",
        };
        metrics::increment_passes(outcome);
        metrics::increment_pass_errors(report.errors);
        metrics::increment_users_created(report.created);
        metrics::increment_users_updated(report.updated);
        metrics::increment_users_deleted(report.deleted);
        if let Some(duration) = report.duration_secs() {
            metrics::observe_pass_duration(duration);
        }
        let finished = report.finished_at.unwrap_or(report.started_at);
        metrics::set_last_pass(finished.timestamp(), report.errors);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LastReportSink {
    report: SharedReport,
}

impl LastReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> SharedReport {
        Arc::clone(&self.report)
    }
}

#[async_trait]
impl ReportSink for LastReportSink {
    fn name(&self) -> &str {
        "last-report"
    }

    async fn publish(&self, report: &ReconciliationReport) -> Result<()> {
        *self.report.write().await = Some(report.clone());
        Ok(())
    }
}

/// One telemetry data point
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TelemetryVariable {
    pub variable: &'static str,
    pub value: u64,
    /// Pass id, groups the four points of one pass
    pub group: String,
}

pub fn telemetry_payload(report: &ReconciliationReport) -> Vec<TelemetryVariable> {
    let group = report.pass_id.to_string();
    report
        .variables()
        .into_iter()
        .map(|(variable, value)| TelemetryVariable {
            variable,
            value,
            group: group.clone(),
        })
        .collect()
}

/// Posts the pass counters as `[{variable, value, group}]`
pub struct WebhookReportSink {
    http_client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl std::fmt::Debug for WebhookReportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookReportSink")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl WebhookReportSink {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http_client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl ReportSink for WebhookReportSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(&self, report: &ReconciliationReport) -> Result<()> {
        let mut request = self
            .http_client
            .post(&self.url)
            .json(&telemetry_payload(report));
        if let Some(token) = &self.token {
            request = request.header("Authorization", token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to post report to {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("report webhook returned {status}: {body}");
        }
        debug!(pass.id = %report.pass_id, "Report posted to webhook");
        Ok(())
    }
}
