//! # Initialization
//!
//! Runtime initialization: rustls setup, tracing, metrics registration and
//! construction of the reconciler with its collaborators.

use crate::config::SyncConfig;
use crate::controller::reconciler::Reconciler;
use crate::observability;
use crate::provider::device::IsapiDeviceClient;
use crate::provider::roster::{FileRosterSource, HttpRosterSource};
use crate::provider::sink::{
    LastReportSink, MetricsReportSink, SharedReport, TracingReportSink, WebhookReportSink,
};
use crate::provider::{DeviceDirectory, ReportSink, RosterSource};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the commands need to run passes
pub struct Components {
    pub reconciler: Arc<Reconciler>,
    /// Latest report, fed by the last-report sink
    pub last_report: SharedReport,
}

impl std::fmt::Debug for Components {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Components")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Process-wide setup shared by every command
///
/// # Errors
/// Returns an error if the metrics registry cannot be populated
pub fn initialize(config: &SyncConfig) -> Result<()> {
    // rustls 0.23 needs a process-wide provider before the first TLS handshake.
    // A second install (tests, embedding) fails harmlessly.
    let _ = rustls::crypto::ring::default_provider().install_default();

    observability::init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting roster-sync");
    for warning in &config.load_warnings {
        warn!("{}", warning);
    }

    observability::metrics::register_metrics()?;
    Ok(())
}

fn roster_source(config: &SyncConfig) -> Result<Arc<dyn RosterSource>> {
    let roster = &config.roster;
    if let Some(path) = &roster.file {
        info!(roster.file = %path.display(), "Using file roster");
        return Ok(Arc::new(FileRosterSource::new(path.clone())));
    }

    let url = roster
        .url
        .as_deref()
        .ok_or_else(|| anyhow!("roster.url or roster.file is required"))?;
    info!(roster.url = %url, "Using HTTP roster");
    let authorization = roster.authorization.as_ref().map(|s| s.expose().to_string());
    let source = HttpRosterSource::new(url, authorization, config.request_timeout())?;
    Ok(Arc::new(source))
}

fn report_sinks(config: &SyncConfig, last_report: &LastReportSink) -> Result<Vec<Arc<dyn ReportSink>>> {
    let mut sinks: Vec<Arc<dyn ReportSink>> = vec![
        Arc::new(TracingReportSink),
        Arc::new(MetricsReportSink),
        Arc::new(last_report.clone()),
    ];

    if let Some(url) = &config.report.webhook_url {
        let token = config
            .report
            .webhook_token
            .as_ref()
            .map(|s| s.expose().to_string());
        let webhook = WebhookReportSink::new(url.clone(), token, config.request_timeout())
            .context("Failed to create report webhook sink")?;
        info!(report.webhook = %url, "Publishing reports to webhook");
        sinks.push(Arc::new(webhook));
    }

    Ok(sinks)
}

/// Build the reconciler and its collaborators from a validated config
///
/// # Errors
/// Returns an error if an HTTP client cannot be built or a required source is missing
pub fn build_components(config: &SyncConfig) -> Result<Components> {
    let roster = roster_source(config)?;
    let directory: Arc<dyn DeviceDirectory> =
        Arc::new(IsapiDeviceClient::new(&config.device, config.request_timeout())?);

    let targets = config.targets();
    info!(
        targets = %targets.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
        "Device targets configured"
    );

    let last_report = LastReportSink::new();
    let shared = last_report.shared();

    let mut reconciler = Reconciler::new(roster, directory, targets, config.pass_settings());
    for sink in report_sinks(config, &last_report)? {
        reconciler = reconciler.with_sink(sink);
    }

    Ok(Components {
        reconciler: Arc::new(reconciler),
        last_report: shared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Secret, TargetConfig};

    fn config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.roster.url = Some("http://roster.local/users".into());
        config.device.host = Some("http://10.0.0.5".into());
        config.device.password = Secret::new("pw");
        config.device.targets = vec![TargetConfig {
            dev_index: "A1".into(),
            ..TargetConfig::default()
        }];
        config
    }

    #[tokio::test]
    async fn test_build_components_with_default_sinks() {
        let components = build_components(&config()).unwrap();
        let debug = format!("{:?}", components.reconciler);
        assert!(debug.contains("tracing"));
        assert!(debug.contains("metrics"));
        assert!(debug.contains("last-report"));
        assert!(!debug.contains("webhook"));
        assert!(components.last_report.read().await.is_none());
    }

    #[test]
    fn test_build_components_adds_webhook() {
        let mut config = config();
        config.report.webhook_url = Some("http://telemetry.local/data".into());
        let components = build_components(&config).unwrap();
        assert!(format!("{:?}", components.reconciler).contains("webhook"));
    }

    #[test]
    fn test_build_components_requires_roster_source() {
        let mut config = config();
        config.roster.url = None;
        assert!(build_components(&config).is_err());
    }

    #[test]
    fn test_primary_target_is_first_configured() {
        let mut config = config();
        config.device.targets.push(TargetConfig {
            dev_index: "B2".into(),
            ..TargetConfig::default()
        });
        let components = build_components(&config).unwrap();
        let primary = components.reconciler.primary_target().unwrap();
        assert_eq!(primary.dev_index, "A1");
    }
}
