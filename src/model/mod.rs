//! # Model
//!
//! Data types shared by every stage of a reconciliation pass.

mod report;
mod user;

pub use report::{PassOutcome, PlannedCounts, ReconciliationReport};
pub use user::{CanonicalUser, Operation, OperationKind, Snapshot};
