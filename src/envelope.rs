//! REST response envelope decoding.
//!
//! The API wraps payloads as `{ "success": true, "data": ... }` and failures
//! as `{ "success": false, "message": ... }` — except where it doesn't:
//! several endpoints use bespoke collection keys (`roles`, `cases`, ...) and
//! some spell the failure field `error`. Decoding tolerates all observed
//! shapes and classifies everything else as a parse failure.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::ApiError;

/// Extract the payload from a 2xx response body.
///
/// `keys` lists the payload keys to probe in order; `"data"` is always tried
/// first. A body with no `success` field and none of the keys is treated as
/// a bare payload (a few endpoints return the resource directly).
pub fn decode_payload<T: DeserializeOwned>(
    status: u16,
    body: Value,
    keys: &[&str],
) -> Result<T, ApiError> {
    let payload = extract_payload(status, body, keys)?;
    serde_json::from_value(payload).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Decode a body that carries no payload of interest, keeping only the
/// success/failure classification (delete and bulk endpoints).
pub fn decode_ack(status: u16, body: Value) -> Result<(), ApiError> {
    match extract_payload(status, body, &[]) {
        Ok(_) => Ok(()),
        // An ack without a data field is still an ack.
        Err(ApiError::Parse(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// The server-provided human-readable message, if any. Failure bodies carry
/// it under `message` or `error`; some success envelopes carry an outcome
/// summary under `message`.
pub fn server_message(body: &Value) -> Option<String> {
    for key in ["message", "error"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            if !msg.is_empty() {
                return Some(msg.to_string());
            }
        }
    }
    None
}

fn extract_payload(status: u16, body: Value, keys: &[&str]) -> Result<Value, ApiError> {
    let map = match &body {
        Value::Object(map) => map,
        // Bare payload (array or scalar) straight from the endpoint.
        _ => return Ok(body),
    };

    if map.get("success").and_then(Value::as_bool) == Some(false) {
        let message =
            server_message(&body).unwrap_or_else(|| "The request could not be completed".into());
        return Err(ApiError::Validation { status, message });
    }

    if let Some(data) = map.get("data") {
        return Ok(data.clone());
    }
    for key in keys {
        if let Some(payload) = map.get(*key) {
            return Ok(payload.clone());
        }
    }

    if map.contains_key("success") {
        // Successful envelope with nothing under any known key.
        return Err(ApiError::Parse(format!(
            "success envelope carried no payload under data or {:?}",
            keys
        )));
    }

    Ok(body)
}
