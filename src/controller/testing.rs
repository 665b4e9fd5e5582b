//! In-memory collaborators for unit tests.

use crate::error::SourceUnavailableError;
use crate::model::{CanonicalUser, ReconciliationReport};
use crate::provider::{DeviceDirectory, DeviceTarget, ReportSink, RosterSource};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn roster_json(id: &str, name: &str, enabled: bool) -> Value {
    json!({"employeeNo": id, "name": name, "pin": "", "valid": {"enable": enabled, "belongGroup": "staff"}})
}

pub fn device_json(id: &str, name: &str, enabled: bool) -> Value {
    json!({"employeeNo": id, "name": name, "userType": "normal", "Valid": {"enable": enabled}})
}

#[derive(Debug, Default)]
pub struct MockRoster {
    pub records: Mutex<Vec<Value>>,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
    pub fetches: AtomicUsize,
}

impl MockRoster {
    pub fn with_records(records: Vec<Value>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RosterSource for MockRoster {
    async fn fetch_roster(&self) -> Result<Vec<Value>, SourceUnavailableError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceUnavailableError::new(
                "roster",
                anyhow!("connection refused"),
            ));
        }
        Ok(self.records.lock().unwrap().clone())
    }
}

/// Device directory backed by one user list per target name
#[derive(Debug, Default)]
pub struct MockDirectory {
    pub stores: Mutex<HashMap<String, Vec<Value>>>,
    /// Targets whose listing fails
    pub unavailable_targets: HashSet<String>,
    /// Targets where every write fails
    pub failing_targets: HashSet<String>,
    /// Targets where every write never returns
    pub hanging_targets: HashSet<String>,
    /// User ids whose writes fail on every target
    pub failing_users: HashSet<String>,
    /// `kind:user@target` for every write attempted
    pub calls: Mutex<Vec<String>>,
}

impl MockDirectory {
    pub fn with_users(target: &str, users: Vec<Value>) -> Self {
        let directory = Self::default();
        directory
            .stores
            .lock()
            .unwrap()
            .insert(target.to_string(), users);
        directory
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn users(&self, target: &str) -> Vec<Value> {
        self.stores
            .lock()
            .unwrap()
            .get(target)
            .cloned()
            .unwrap_or_default()
    }

    async fn write(&self, kind: &str, target: &DeviceTarget, user_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{kind}:{user_id}@{}", target.name));
        if self.hanging_targets.contains(&target.name) {
            std::future::pending::<()>().await;
        }
        if self.failing_targets.contains(&target.name) {
            return Err(anyhow!("device {} rejected {kind}", target.name));
        }
        if self.failing_users.contains(user_id) {
            return Err(anyhow!("statusCode 4: invalid content for {user_id}"));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceDirectory for MockDirectory {
    async fn fetch_users(&self, target: &DeviceTarget) -> Result<Vec<Value>, SourceUnavailableError> {
        if self.unavailable_targets.contains(&target.name) {
            return Err(SourceUnavailableError::new(
                format!("device '{}'", target.name),
                anyhow!("timed out"),
            ));
        }
        Ok(self.users(&target.name))
    }

    async fn create_user(&self, target: &DeviceTarget, user: &CanonicalUser) -> Result<()> {
        self.write("create", target, &user.id).await?;
        self.stores
            .lock()
            .unwrap()
            .entry(target.name.clone())
            .or_default()
            .push(device_json(&user.id, &user.display_name, user.enabled));
        Ok(())
    }

    async fn update_user(&self, target: &DeviceTarget, user: &CanonicalUser) -> Result<()> {
        self.write("update", target, &user.id).await?;
        let mut stores = self.stores.lock().unwrap();
        let store = stores.entry(target.name.clone()).or_default();
        for existing in store.iter_mut() {
            if existing["employeeNo"] == user.id.as_str() {
                *existing = device_json(&user.id, &user.display_name, user.enabled);
            }
        }
        Ok(())
    }

    async fn delete_user(&self, target: &DeviceTarget, user_id: &str) -> Result<()> {
        self.write("delete", target, user_id).await?;
        self.stores
            .lock()
            .unwrap()
            .entry(target.name.clone())
            .or_default()
            .retain(|u| u["employeeNo"] != user_id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<ReconciliationReport>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<ReconciliationReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, report: &ReconciliationReport) -> Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        if self.fail {
            return Err(anyhow!("sink offline"));
        }
        Ok(())
    }
}
