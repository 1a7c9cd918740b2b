//! Response envelope decoding.
//!
//! ApiAxle never returns a bare payload.  Reads answer with
//! `{"results": {...}}`, updates with `{"results": {"new": {...}, "old": {...}}}`
//! and deletes with `{"results": true}`.  Callers name the key path to the
//! payload and get back a typed value; the subtree is decoded in place with
//! `serde_json::from_value` rather than re-encoded.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{AxleError, Result};

/// Path to the payload of a read or create response.
pub const RESULTS: &[&str] = &["results"];

/// Path to the payload of an update response.
pub const RESULTS_NEW: &[&str] = &["results", "new"];

/// Parse a response body as a top-level JSON object.
pub fn parse_object(body: &[u8]) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AxleError::Decode(format!("response is not valid JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(AxleError::Decode(
            "response is not a JSON object".to_string(),
        )),
    }
}

/// Walk `path` from the top-level object, returning the object found at the
/// end.  Every step must exist and must itself be an object.
pub fn descend(body: &[u8], path: &[&str]) -> Result<Map<String, Value>> {
    let mut current = parse_object(body)?;
    for key in path {
        let next = current
            .remove(*key)
            .ok_or_else(|| AxleError::MissingKey((*key).to_string()))?;
        current = match next {
            Value::Object(map) => map,
            _ => return Err(AxleError::NotAnObject((*key).to_string())),
        };
    }
    Ok(current)
}

/// Decode the object at `path` into `T`.
pub fn unwrap<T: DeserializeOwned>(body: &[u8], path: &[&str]) -> Result<T> {
    let object = descend(body, path)?;
    serde_json::from_value(Value::Object(object)).map_err(AxleError::decode)
}

/// Read the boolean acknowledgement carried in `{"results": bool}`.
///
/// Whether `false` is an error is left to the caller, which knows what was
/// being acknowledged.
pub fn acknowledgement(body: &[u8]) -> Result<bool> {
    let object = parse_object(body)?;
    let results = object
        .get("results")
        .ok_or_else(|| AxleError::MissingKey("results".to_string()))?;
    results.as_bool().ok_or(AxleError::TypeMismatch {
        key: "results".to_string(),
        expected: "boolean",
    })
}
