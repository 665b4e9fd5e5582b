//! # Reconciliation Report
//!
//! Tally of one reconciliation pass. Created empty when the pass starts,
//! incremented while operations run, finalized once and handed to the sinks.

use crate::model::OperationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How the pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassOutcome {
    /// Still running (only visible before `finish`)
    Running,
    /// All phases ran, possibly with per-item errors
    Completed,
    /// A fetch failed and no operation was applied
    Aborted,
}

/// Sizes of the diff the pass worked from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedCounts {
    pub create: u64,
    pub update: u64,
    pub delete: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: PassOutcome,
    pub planned: PlannedCounts,
    /// Creates that succeeded on at least one device
    pub created: u64,
    /// Updates that succeeded on at least one device
    pub updated: u64,
    /// Deletes that succeeded on at least one device
    pub deleted: u64,
    /// Failed operations, malformed records, and aborted fetches
    pub errors: u64,
}

impl ReconciliationReport {
    pub fn begin() -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: PassOutcome::Running,
            planned: PlannedCounts::default(),
            created: 0,
            updated: 0,
            deleted: 0,
            errors: 0,
        }
    }

    pub fn record_success(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::Create => self.created = self.created.saturating_add(1),
            OperationKind::Update => self.updated = self.updated.saturating_add(1),
            OperationKind::Delete => self.deleted = self.deleted.saturating_add(1),
        }
    }

    pub fn record_errors(&mut self, count: u64) {
        self.errors = self.errors.saturating_add(count);
    }

    /// Mark the pass as aborted before dispatch; counts as one error
    pub fn abort(&mut self) {
        self.created = 0;
        self.updated = 0;
        self.deleted = 0;
        self.errors = self.errors.saturating_add(1);
        self.outcome = PassOutcome::Aborted;
    }

    #[must_use]
    pub fn finish(mut self) -> Self {
        if self.outcome == PassOutcome::Running {
            self.outcome = PassOutcome::Completed;
        }
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Counter name/value pairs pushed to telemetry endpoints
    pub fn variables(&self) -> [(&'static str, u64); 4] {
        [
            ("created_users", self.created),
            ("updated_users", self.updated),
            ("deleted_users", self.deleted),
            ("error_count", self.errors),
        ]
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} deleted={} errors={}",
            self.created, self.updated, self.deleted, self.errors
        )
    }
}
