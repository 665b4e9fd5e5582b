//! # Record Normalizer
//!
//! Maps raw roster and device records into [`CanonicalUser`].
//!
//! The two sources use different envelopes:
//!
//! - roster: `{employeeNo, name, pin, valid: {enable, belongGroup}, faceURL}`
//! - device: `{employeeNo, name, password?, belongGroup?, faceURL?, Valid: {enable, ...}}`
//!
//! Both entry points converge on the same type so the diff engine never has to
//! know where a record came from. A record that cannot be mapped yields a
//! [`MalformedRecordError`] and is kept out of the snapshot.

use crate::error::{MalformedRecordError, RecordOrigin};
use crate::model::{CanonicalUser, Snapshot};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

/// Normalize one roster record
pub fn roster_record(raw: &Value) -> Result<CanonicalUser, MalformedRecordError> {
    let origin = RecordOrigin::Roster;
    let obj = as_object(raw, origin)?;
    let id = read_id(obj, origin)?;
    let malformed = |reason: String| MalformedRecordError::new(origin, Some(id.clone()), reason);

    let valid = obj
        .get("valid")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing 'valid' object".to_string()))?;
    let enabled = read_enable(valid).map_err(&malformed)?;

    Ok(CanonicalUser {
        display_name: read_text(obj, "name").map_err(&malformed)?.unwrap_or_default(),
        pin: read_text(obj, "pin").map_err(&malformed)?.unwrap_or_default(),
        enabled,
        group: non_empty(read_text(valid, "belongGroup").map_err(&malformed)?),
        photo_ref: non_empty(read_text(obj, "faceURL").map_err(&malformed)?),
        id,
    })
}

/// Normalize one device `UserInfo` record
pub fn device_record(raw: &Value) -> Result<CanonicalUser, MalformedRecordError> {
    let origin = RecordOrigin::Device;
    let obj = as_object(raw, origin)?;
    let id = read_id(obj, origin)?;
    let malformed = |reason: String| MalformedRecordError::new(origin, Some(id.clone()), reason);

    let valid = obj
        .get("Valid")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing 'Valid' object".to_string()))?;
    let enabled = read_enable(valid).map_err(&malformed)?;

    let group = match read_text(obj, "belongGroup").map_err(&malformed)? {
        Some(group) => Some(group),
        None => read_text(valid, "belongGroup").map_err(&malformed)?,
    };

    Ok(CanonicalUser {
        display_name: read_text(obj, "name").map_err(&malformed)?.unwrap_or_default(),
        pin: read_text(obj, "password").map_err(&malformed)?.unwrap_or_default(),
        enabled,
        group: non_empty(group),
        photo_ref: non_empty(read_text(obj, "faceURL").map_err(&malformed)?),
        id,
    })
}

/// Records of one source after normalization
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub snapshot: Snapshot,
    pub rejected: Vec<MalformedRecordError>,
}

impl Normalized {
    /// Ids recovered from rejected records
    pub fn quarantined_ids(&self) -> HashSet<String> {
        self.rejected.iter().filter_map(|e| e.id.clone()).collect()
    }
}

/// Normalize a whole listing, isolating failures per record
pub fn normalize_all<F>(records: &[Value], normalize: F) -> Normalized
where
    F: Fn(&Value) -> Result<CanonicalUser, MalformedRecordError>,
{
    let mut users = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for raw in records {
        match normalize(raw) {
            Ok(user) => users.push(user),
            Err(e) => {
                warn!(origin = %e.origin, user.id = e.id.as_deref().unwrap_or(""), "{}", e);
                rejected.push(e);
            }
        }
    }

    Normalized {
        snapshot: Snapshot::from_users(users),
        rejected,
    }
}

/// Coerce an enable flag to a boolean.
///
/// Accepts JSON booleans, the numbers 0/1, and the strings
/// `true/false/1/0/yes/no` in any case. Everything else is rejected.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_object(raw: &Value, origin: RecordOrigin) -> Result<&Map<String, Value>, MalformedRecordError> {
    raw.as_object()
        .ok_or_else(|| MalformedRecordError::new(origin, None, "record is not a JSON object"))
}

/// Identifiers are compared as strings regardless of their JSON type
fn read_id(obj: &Map<String, Value>, origin: RecordOrigin) -> Result<String, MalformedRecordError> {
    let id = match obj.get("employeeNo") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(MalformedRecordError::new(
                origin,
                None,
                format!("employeeNo has unsupported type: {other}"),
            ))
        }
        None => {
            return Err(MalformedRecordError::new(
                origin,
                None,
                "missing employeeNo",
            ))
        }
    };

    if id.is_empty() {
        return Err(MalformedRecordError::new(origin, None, "empty employeeNo"));
    }
    Ok(id)
}

/// A missing flag means no access
fn read_enable(valid: &Map<String, Value>) -> Result<bool, String> {
    match valid.get("enable") {
        None | Some(Value::Null) => Ok(false),
        Some(value) => coerce_bool(value).ok_or_else(|| format!("unrecognized enable flag: {value}")),
    }
}

fn read_text(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(format!("field '{key}' is not text: {other}")),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
