//! Paginated collection responses.
//!
//! With `resolve=true` the server answers list requests with
//! `{"results": {"<identifier>": {...fields...}, ...}}`: a map, not an array.
//! Order follows the decoded map and carries no meaning.

use axle_core::envelope::{self, RESULTS};
use axle_core::{AxleError, Result};
use serde_json::{Map, Value};

/// Decode every `identifier → fields` entry under `"results"` with `decode`.
pub fn decode_collection<T>(
    body: &[u8],
    mut decode: impl FnMut(String, Map<String, Value>) -> Result<T>,
) -> Result<Vec<T>> {
    let results = envelope::descend(body, RESULTS)?;
    results
        .into_iter()
        .map(|(identifier, value)| match value {
            Value::Object(fields) => decode(identifier, fields),
            _ => Err(AxleError::NotAnObject(identifier)),
        })
        .collect()
}

/// `?resolve=true&from=..&to=..` shared by every collection endpoint.
pub(crate) fn range_query(from: u32, to: u32) -> String {
    format!("resolve=true&from={from}&to={to}")
}
