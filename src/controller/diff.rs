//! # Diff Engine
//!
//! Computes the create/update/delete sets that bring a device in line with the
//! roster. Pure and deterministic: no I/O, inputs are never mutated.

use crate::model::{CanonicalUser, Operation, PlannedCounts, Snapshot};
use std::collections::{HashMap, HashSet};

/// Planned changes for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// In roster, not on device (roster order)
    pub to_create: Vec<CanonicalUser>,
    /// On both sides but name or enabled flag differ (roster order)
    pub to_update: Vec<CanonicalUser>,
    /// On device, not in roster (device order)
    pub to_delete: Vec<String>,
}

/// Compare the roster against the device snapshot
pub fn diff(roster: &Snapshot, device: &Snapshot) -> DiffResult {
    let mut device_by_id: HashMap<&str, &CanonicalUser> = HashMap::with_capacity(device.len());
    for user in device {
        // first match wins
        device_by_id.entry(user.id.as_str()).or_insert(user);
    }
    let roster_ids: HashSet<&str> = roster.iter().map(|u| u.id.as_str()).collect();

    let mut result = DiffResult::default();

    for user in roster {
        match device_by_id.get(user.id.as_str()) {
            None => result.to_create.push(user.clone()),
            Some(device_copy) if user.needs_update_from(device_copy) => {
                result.to_update.push(user.clone());
            }
            Some(_) => {}
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for user in device {
        let id = user.id.as_str();
        if !roster_ids.contains(id) && seen.insert(id) {
            result.to_delete.push(user.id.clone());
        }
    }

    result
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }

    pub fn planned(&self) -> PlannedCounts {
        PlannedCounts {
            create: self.to_create.len() as u64,
            update: self.to_update.len() as u64,
            delete: self.to_delete.len() as u64,
        }
    }

    /// Drop every entry whose id is in `ids`.
    ///
    /// Used to quarantine users whose roster or device record could not be
    /// normalized, so a bad record never deletes or re-enrolls them.
    #[must_use]
    pub fn without_ids(mut self, ids: &HashSet<String>) -> Self {
        if ids.is_empty() {
            return self;
        }
        self.to_create.retain(|u| !ids.contains(&u.id));
        self.to_update.retain(|u| !ids.contains(&u.id));
        self.to_delete.retain(|id| !ids.contains(id));
        self
    }

    /// Operations grouped by phase, in execution order
    pub fn into_phases(self) -> [Vec<Operation>; 3] {
        [
            self.to_create.into_iter().map(Operation::Create).collect(),
            self.to_update.into_iter().map(Operation::Update).collect(),
            self.to_delete.into_iter().map(Operation::Delete).collect(),
        ]
    }
}
