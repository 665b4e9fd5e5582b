//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use roster_sync::prelude::*;
//! ```

// Records and reports
pub use crate::model::{
    CanonicalUser, Operation, OperationKind, PassOutcome, ReconciliationReport, Snapshot,
};

// Collaborator traits, for plugging in other sources and devices
pub use crate::provider::{DeviceDirectory, DeviceTarget, ReportSink, RosterSource};

// Core reconciliation
pub use crate::controller::diff::{diff, DiffResult};
pub use crate::controller::dispatch::{DispatchOutcome, Dispatcher};
pub use crate::controller::reconciler::{PassSettings, Plan, Reconciler};
pub use crate::controller::scheduler::{Scheduler, TriggerHandle, TriggerSource};

pub use crate::config::SyncConfig;

pub use crate::error::{
    ConfigError, MalformedRecordError, OperationFailedError, SourceUnavailableError,
};

pub use crate::provider::device::IsapiDeviceClient;
pub use crate::provider::roster::{FileRosterSource, HttpRosterSource};
