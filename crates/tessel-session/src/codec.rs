//! On-disk encoding of session values.
//!
//! Values are wrapped in a `{"data": ...}` envelope so that every encoded
//! payload is a JSON object, whatever the value's own shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    data: &'a Value,
}

#[derive(Deserialize)]
struct Envelope {
    data: Value,
}

/// Encode a value for storage.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&EnvelopeRef { data: value })?)
}

/// Decode a value previously produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    Ok(envelope.data)
}
