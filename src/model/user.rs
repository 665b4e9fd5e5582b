//! # Canonical User
//!
//! Source-agnostic user record, the ordered snapshots built from it, and the
//! operations the reconciler can issue against a device.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Normalized access entry for one person.
///
/// `id` is the reconciliation key. Only `display_name` and `enabled` take part
/// in change detection; `pin`, `group` and `photo_ref` are carried along so
/// they reach the device on enroll/modify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalUser {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub pin: String,
    pub enabled: bool,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub photo_ref: Option<String>,
}

impl CanonicalUser {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            pin: String::new(),
            enabled,
            group: None,
            photo_ref: None,
        }
    }

    #[must_use]
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = pin.into();
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with_photo_ref(mut self, photo_ref: impl Into<String>) -> Self {
        self.photo_ref = Some(photo_ref.into());
        self
    }

    /// True when the device copy needs a modify to match `self`
    pub fn needs_update_from(&self, device_copy: &CanonicalUser) -> bool {
        self.display_name != device_copy.display_name || self.enabled != device_copy.enabled
    }
}

/// Ordered, id-unique collection of users fetched from one source at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    users: Vec<CanonicalUser>,
}

impl Snapshot {
    /// Build a snapshot, collapsing duplicate ids.
    ///
    /// The last record seen for an id wins and takes the slot of the first
    /// occurrence, so ordering stays stable across passes.
    pub fn from_users(users: impl IntoIterator<Item = CanonicalUser>) -> Self {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut deduped: Vec<CanonicalUser> = Vec::new();

        for user in users {
            if let Some(&slot) = positions.get(&user.id) {
                warn!(user.id = %user.id, "duplicate id in snapshot, keeping last record");
                if let Some(existing) = deduped.get_mut(slot) {
                    *existing = user;
                }
            } else {
                positions.insert(user.id.clone(), deduped.len());
                deduped.push(user);
            }
        }

        Self { users: deduped }
    }

    pub fn users(&self) -> &[CanonicalUser] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalUser> {
        self.users.iter()
    }

    pub fn into_users(self) -> Vec<CanonicalUser> {
        self.users
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a CanonicalUser;
    type IntoIter = std::slice::Iter<'a, CanonicalUser>;

    fn into_iter(self) -> Self::IntoIter {
        self.users.iter()
    }
}

/// Kind of write issued against a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One write to apply to every target device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create(CanonicalUser),
    Update(CanonicalUser),
    Delete(String),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Create(_) => OperationKind::Create,
            Self::Update(_) => OperationKind::Update,
            Self::Delete(_) => OperationKind::Delete,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Create(user) | Self::Update(user) => &user.id,
            Self::Delete(id) => id,
        }
    }
}
