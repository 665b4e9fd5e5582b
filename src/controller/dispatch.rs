//! # Device Operation Dispatcher
//!
//! Applies one [`Operation`] to every target device. Targets are called
//! concurrently and every call is bounded by a timeout. An operation counts as
//! failed only when it failed on all targets; partial success is logged.
//! Nothing raised by a device call escapes this module.

use crate::error::OperationFailedError;
use crate::model::{Operation, OperationKind};
use crate::provider::{DeviceDirectory, DeviceTarget};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Why a single target rejected an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub device: String,
    pub reason: String,
}

/// Per-target results of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub kind: OperationKind,
    pub user_id: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<TargetFailure>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        self.is_success() && !self.failed.is_empty()
    }

    pub fn into_result(self) -> Result<(), OperationFailedError> {
        if self.is_success() {
            return Ok(());
        }
        let reason = if self.failed.is_empty() {
            "no target devices".to_string()
        } else {
            self.failed
                .iter()
                .map(|f| format!("{}: {}", f.device, f.reason))
                .collect::<Vec<_>>()
                .join("; ")
        };
        Err(OperationFailedError {
            kind: self.kind,
            user_id: self.user_id,
            reason,
        })
    }
}

pub struct Dispatcher {
    directory: Arc<dyn DeviceDirectory>,
    targets: Vec<DeviceTarget>,
    call_timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("targets", &self.targets)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        targets: Vec<DeviceTarget>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            targets,
            call_timeout,
        }
    }

    pub fn targets(&self) -> &[DeviceTarget] {
        &self.targets
    }

    /// Apply `operation` to every target and gather the outcomes
    pub async fn apply(&self, operation: &Operation) -> DispatchOutcome {
        let kind = operation.kind();
        let user_id = operation.user_id();

        let results = join_all(
            self.targets
                .iter()
                .map(|target| async move { (target, self.call(operation, target).await) }),
        )
        .await;

        let mut outcome = DispatchOutcome {
            kind,
            user_id: user_id.to_string(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        };

        for (target, result) in results {
            match result {
                Ok(()) => {
                    debug!(operation = %kind, user.id = user_id, device = %target.name, "device call succeeded");
                    outcome.succeeded.push(target.name.clone());
                }
                Err(reason) => {
                    error!(
                        operation = %kind,
                        user.id = user_id,
                        device = %target.name,
                        dev_index = %target.dev_index,
                        "device call failed: {}",
                        reason
                    );
                    outcome.failed.push(TargetFailure {
                        device: target.name.clone(),
                        reason,
                    });
                }
            }
        }

        if outcome.is_partial() {
            warn!(
                operation = %kind,
                user.id = user_id,
                failed = outcome.failed.len(),
                succeeded = outcome.succeeded.len(),
                "operation only partially applied"
            );
        }

        outcome
    }

    async fn call(&self, operation: &Operation, target: &DeviceTarget) -> Result<(), String> {
        let request = async {
            match operation {
                Operation::Create(user) => self.directory.create_user(target, user).await,
                Operation::Update(user) => self.directory.update_user(target, user).await,
                Operation::Delete(user_id) => self.directory.delete_user(target, user_id).await,
            }
        };

        match tokio::time::timeout(self.call_timeout, request).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!(
                "timed out after {}ms",
                self.call_timeout.as_millis()
            )),
        }
    }
}
