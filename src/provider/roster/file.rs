//! Roster read from a local JSON file, re-read on every pass.

use super::records_from_document;
use crate::error::SourceUnavailableError;
use crate::provider::RosterSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FileRosterSource {
    path: PathBuf,
}

impl FileRosterSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<Vec<Value>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read roster file {}", self.path.display()))?;
        let document: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse roster file {}", self.path.display()))?;
        records_from_document(document)
    }
}

#[async_trait]
impl RosterSource for FileRosterSource {
    async fn fetch_roster(&self) -> Result<Vec<Value>, SourceUnavailableError> {
        self.read()
            .await
            .map_err(|e| SourceUnavailableError::new("roster", e))
    }
}
