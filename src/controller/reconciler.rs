//! # Reconciler
//!
//! Runs one reconciliation pass:
//!
//! `FetchRoster → FetchDeviceState → Diff → ApplyCreates → ApplyUpdates → ApplyDeletes → Report`
//!
//! A fetch failure aborts the pass before anything is written. Once the diff is
//! computed every operation is applied on its own; failures are counted and the
//! remaining items and phases still run. Nothing is carried over between passes.

use crate::controller::diff::{diff, DiffResult};
use crate::controller::dispatch::Dispatcher;
use crate::controller::normalize::{self, Normalized};
use crate::error::{MalformedRecordError, SourceUnavailableError};
use crate::model::{Operation, ReconciliationReport};
use crate::observability::metrics;
use crate::provider::{DeviceDirectory, DeviceTarget, ReportSink, RosterSource};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Knobs for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSettings {
    /// Items applied at once within a phase (1 = sequential)
    pub max_concurrent_operations: usize,
    /// Upper bound for each device call
    pub request_timeout: Duration,
}

impl Default for PassSettings {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            max_concurrent_operations: DEFAULT_MAX_CONCURRENT_OPERATIONS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Fetched, normalized and diffed state, before anything is written
#[derive(Debug, Clone)]
pub struct Plan {
    pub diff: DiffResult,
    pub rejected: Vec<MalformedRecordError>,
    pub roster_users: usize,
    pub device_users: usize,
}

impl Plan {
    fn from_sources(roster: Normalized, device: Normalized) -> Self {
        let mut quarantined: HashSet<String> = roster.quarantined_ids();
        quarantined.extend(device.quarantined_ids());

        let result = diff(&roster.snapshot, &device.snapshot).without_ids(&quarantined);
        if !quarantined.is_empty() {
            warn!(
                count = quarantined.len(),
                "users with malformed records left untouched this pass"
            );
        }

        let mut rejected = roster.rejected;
        rejected.extend(device.rejected);

        Self {
            diff: result,
            rejected,
            roster_users: roster.snapshot.len(),
            device_users: device.snapshot.len(),
        }
    }
}

pub struct Reconciler {
    roster: Arc<dyn RosterSource>,
    directory: Arc<dyn DeviceDirectory>,
    dispatcher: Dispatcher,
    sinks: Vec<Arc<dyn ReportSink>>,
    settings: PassSettings,
    pass_lock: AsyncMutex<()>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("targets", &self.dispatcher.targets())
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        roster: Arc<dyn RosterSource>,
        directory: Arc<dyn DeviceDirectory>,
        targets: Vec<DeviceTarget>,
        settings: PassSettings,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::clone(&directory),
            targets,
            settings.request_timeout,
        );
        Self {
            roster,
            directory,
            dispatcher,
            sinks: Vec::new(),
            settings,
            pass_lock: AsyncMutex::new(()),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Target whose listing feeds the diff: the one flagged primary, else the first
    pub fn primary_target(&self) -> Option<&DeviceTarget> {
        let targets = self.dispatcher.targets();
        targets.iter().find(|t| t.primary).or_else(|| targets.first())
    }

    /// Fetch both sides and compute the diff without writing anything
    pub async fn plan(&self) -> Result<Plan, SourceUnavailableError> {
        let raw_roster = self.roster.fetch_roster().await?;
        debug!(records = raw_roster.len(), "fetched roster");

        let target = self.primary_target().ok_or_else(|| {
            SourceUnavailableError::new("device", anyhow::anyhow!("no target devices configured"))
        })?;
        let raw_device = self.directory.fetch_users(target).await?;
        debug!(records = raw_device.len(), device = %target.name, "fetched device users");

        let roster = normalize::normalize_all(&raw_roster, normalize::roster_record);
        let device = normalize::normalize_all(&raw_device, normalize::device_record);

        metrics::increment_malformed_records("roster", roster.rejected.len() as u64);
        metrics::increment_malformed_records("device", device.rejected.len() as u64);
        metrics::set_snapshot_sizes(roster.snapshot.len(), device.snapshot.len());

        Ok(Plan::from_sources(roster, device))
    }

    /// Run one full pass and publish its report.
    ///
    /// Concurrent callers are serialized; each gets the report of its own pass.
    pub async fn run_pass(&self) -> ReconciliationReport {
        let _guard = self.pass_lock.lock().await;

        let mut report = ReconciliationReport::begin();
        let span = info_span!("reconcile.pass", pass.id = %report.pass_id);

        async move {
            info!("Starting reconciliation pass");

            match self.plan().await {
                Ok(plan) => {
                    report.planned = plan.diff.planned();
                    report.record_errors(plan.rejected.len() as u64);
                    info!(
                        roster = plan.roster_users,
                        device = plan.device_users,
                        create = report.planned.create,
                        update = report.planned.update,
                        delete = report.planned.delete,
                        malformed = plan.rejected.len(),
                        "Computed diff"
                    );
                    for phase in plan.diff.into_phases() {
                        self.apply_phase(phase, &mut report).await;
                    }
                }
                Err(e) => {
                    error!("Pass aborted, nothing applied: {}", e);
                    report.abort();
                }
            }

            let report = report.finish();
            info!(outcome = ?report.outcome, "✅ Reconciliation pass finished: {}", report);
            self.publish(&report).await;
            report
        }
        .instrument(span)
        .await
    }

    async fn apply_phase(&self, operations: Vec<Operation>, report: &mut ReconciliationReport) {
        if operations.is_empty() {
            return;
        }

        let outcomes: Vec<_> = stream::iter(operations)
            .map(|operation| async move { self.dispatcher.apply(&operation).await })
            .buffered(self.settings.max_concurrent_operations.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            let kind = outcome.kind;
            match outcome.into_result() {
                Ok(()) => report.record_success(kind),
                Err(e) => {
                    warn!("{}", e);
                    metrics::increment_operation_failures(kind.as_str());
                    report.record_errors(1);
                }
            }
        }
    }

    async fn publish(&self, report: &ReconciliationReport) {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(report).await {
                warn!(sink = sink.name(), "Failed to publish report: {:#}", e);
            }
        }
    }
}
