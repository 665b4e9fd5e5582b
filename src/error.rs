//! # Errors
//!
//! Error taxonomy for a reconciliation pass.
//!
//! - [`SourceUnavailableError`] aborts the pass (roster or device listing unusable)
//! - [`OperationFailedError`] is isolated to one create/update/delete and counted
//! - [`MalformedRecordError`] is isolated to one record and counted
//! - [`ConfigError`] only occurs at startup
//!
//! Collaborator internals use `anyhow` with context, the typed errors are built
//! at the boundaries where the reconciler needs to tell them apart.

use crate::model::OperationKind;
use std::fmt;
use thiserror::Error;

/// Which system a raw record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    Roster,
    Device,
}

impl fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Roster => f.write_str("roster"),
            Self::Device => f.write_str("device"),
        }
    }
}

/// One raw record could not be normalized.
///
/// `id` is set when the identifier itself was readable, so the reconciler can
/// keep that user out of every diff set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {origin} record '{}': {reason}", .id.as_deref().unwrap_or("<no id>"))]
pub struct MalformedRecordError {
    pub origin: RecordOrigin,
    pub id: Option<String>,
    pub reason: String,
}

impl MalformedRecordError {
    pub fn new(origin: RecordOrigin, id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            origin,
            id,
            reason: reason.into(),
        }
    }
}

/// The roster or a device listing could not be fetched in full
#[derive(Debug, Error)]
#[error("{origin} unavailable: {cause:#}")]
pub struct SourceUnavailableError {
    /// Human-readable name of the source (`roster`, `device 'lobby'`, ...)
    pub origin: String,
    pub cause: anyhow::Error,
}

impl SourceUnavailableError {
    pub fn new(origin: impl Into<String>, cause: anyhow::Error) -> Self {
        Self {
            origin: origin.into(),
            cause,
        }
    }
}

/// A single create/update/delete failed on every target device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} failed for user '{user_id}': {reason}")]
pub struct OperationFailedError {
    pub kind: OperationKind,
    pub user_id: String,
    pub reason: String,
}

/// Invalid or incomplete configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
