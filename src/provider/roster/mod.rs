//! # Roster Sources
//!
//! The roster endpoint wraps its records in `{"correcto": bool, "contenido": [...]}`.
//! A local file may hold either that envelope or a bare JSON array.

mod file;
mod http;

pub use file::FileRosterSource;
pub use http::HttpRosterSource;

use anyhow::{bail, Result};
use serde_json::Value;

/// Extract the record list from an enveloped roster response
pub fn unwrap_envelope(body: Value) -> Result<Vec<Value>> {
    let Value::Object(mut envelope) = body else {
        bail!("roster response is not a JSON object");
    };

    match envelope.get("correcto") {
        Some(Value::Bool(true)) => {}
        Some(other) => bail!("roster reported failure (correcto={other})"),
        None => bail!("roster response has no 'correcto' flag"),
    }

    match envelope.remove("contenido") {
        Some(Value::Array(records)) => Ok(records),
        Some(_) => bail!("roster 'contenido' is not an array"),
        None => bail!("roster response has no 'contenido'"),
    }
}

/// Accept a bare array or an envelope
pub fn records_from_document(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(records) => Ok(records),
        other => unwrap_envelope(other),
    }
}
