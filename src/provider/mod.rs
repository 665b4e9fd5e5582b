//! # Provider Modules
//!
//! Collaborators the reconciler talks to, each behind a trait so passes can run
//! against mocks:
//!
//! - `RosterSource` for the authoritative roster (HTTP endpoint or local file)
//! - `DeviceDirectory` for access-control devices (ISAPI over Digest auth)
//! - `ReportSink` for wherever a finished pass report goes

use crate::error::SourceUnavailableError;
use crate::model::{CanonicalUser, ReconciliationReport};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

pub mod device;
pub mod roster;
pub mod sink;

/// One addressable device behind the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    /// Name used in logs and reports
    pub name: String,
    /// ISAPI `devIndex` query parameter
    pub dev_index: String,
    /// Overrides the directory's base host
    pub host: Option<String>,
    /// Snapshot source for the diff
    pub primary: bool,
}

impl DeviceTarget {
    pub fn new(name: impl Into<String>, dev_index: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dev_index: dev_index.into(),
            host: None,
            primary: false,
        }
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (devIndex={})", self.name, self.dev_index)
    }
}

/// Source of truth for who should have access
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetch every raw roster record. All or nothing.
    async fn fetch_roster(&self) -> Result<Vec<Value>, SourceUnavailableError>;
}

/// Access-control device API
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// List every user enrolled on `target`. All or nothing.
    async fn fetch_users(&self, target: &DeviceTarget) -> Result<Vec<Value>, SourceUnavailableError>;

    async fn create_user(&self, target: &DeviceTarget, user: &CanonicalUser) -> Result<()>;

    async fn update_user(&self, target: &DeviceTarget, user: &CanonicalUser) -> Result<()>;

    async fn delete_user(&self, target: &DeviceTarget, user_id: &str) -> Result<()>;
}

/// Destination for finished pass reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, report: &ReconciliationReport) -> Result<()>;
}
