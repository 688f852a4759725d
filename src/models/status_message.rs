//! Inbound status messages reported by control nodes
//!
//! Messages arrive with at-least-once delivery in one of three encodings:
//! a push envelope (`{"message": {"data": "<base64>"}}`), a bare base64
//! string, or the JSON document itself.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is neither a status message nor a push envelope")]
    UnrecognizedEnvelope,
    #[error("\"step\" requires a \"timestamp\"")]
    MissingTimestamp,
    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(f64),
}

/// Wire shape of the status document
#[derive(Debug, Deserialize)]
struct RawStatusMessage {
    operation_id: i32,
    #[serde(default)]
    hostnames: Vec<String>,
    #[serde(default)]
    host_status: Option<String>,
    #[serde(default)]
    step: Option<String>,
    /// Epoch seconds, fractional part allowed
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    dms: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepUpdate {
    pub name: String,
    pub at: DateTime<Utc>,
}

/// Decoded status message
///
/// Any combination of the assignment-less (`dms`), host-keyed and
/// operation-level paths may be present.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub operation_id: i32,
    pub hostnames: Vec<String>,
    pub host_status: Option<String>,
    pub step: Option<StepUpdate>,
    pub status: Option<String>,
    pub dms: bool,
}

impl StatusMessage {
    /// Decode a raw message body in any supported encoding
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => {
                if map.contains_key("operation_id") {
                    return Self::from_document(Value::Object(map));
                }
                let data = map
                    .get("message")
                    .and_then(|m| m.get("data"))
                    .and_then(Value::as_str)
                    .ok_or(DecodeError::UnrecognizedEnvelope)?;
                Self::from_base64(data)
            }
            Ok(Value::String(encoded)) => Self::from_base64(&encoded),
            Ok(_) => Err(DecodeError::UnrecognizedEnvelope),
            Err(_) => Self::from_base64(text),
        }
    }

    fn from_base64(encoded: &str) -> Result<Self, DecodeError> {
        let bytes = BASE64.decode(encoded.trim())?;
        let document: Value = serde_json::from_slice(&bytes)?;
        Self::from_document(document)
    }

    fn from_document(document: Value) -> Result<Self, DecodeError> {
        let raw: RawStatusMessage = serde_json::from_value(document)?;

        let step = match (raw.step, raw.timestamp) {
            (Some(name), Some(ts)) => Some(StepUpdate {
                name,
                at: timestamp_from_epoch(ts)?,
            }),
            (Some(_), None) => return Err(DecodeError::MissingTimestamp),
            (None, _) => None,
        };

        Ok(Self {
            operation_id: raw.operation_id,
            hostnames: raw.hostnames,
            host_status: raw.host_status,
            step,
            status: raw.status,
            dms: raw.dms.as_ref().is_some_and(is_marker),
        })
    }
}

fn timestamp_from_epoch(ts: f64) -> Result<DateTime<Utc>, DecodeError> {
    if !ts.is_finite() {
        return Err(DecodeError::InvalidTimestamp(ts));
    }
    // nanos is a non-negative offset from the floored second
    let floor = ts.floor();
    let mut secs = floor as i64;
    let mut nanos = ((ts - floor) * 1e9).round() as u32;
    if nanos >= 1_000_000_000 {
        secs += 1;
        nanos = 0;
    }
    DateTime::from_timestamp(secs, nanos).ok_or(DecodeError::InvalidTimestamp(ts))
}

/// `dms` may be a bool or any other non-empty marker
fn is_marker(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
