//! JSON output envelopes.
//!
//! Every command prints exactly one JSON object on stdout:
//!
//! ```json
//! { "ok": true, "id": "2", "is_new": false }
//! { "ok": false, "error": { "code": "NOT_FOUND", "message": "...", "details": {} } }
//! ```
//!
//! Success payloads are flattened into the envelope, so they must serialize
//! as JSON objects.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Successful output, flattened under `"ok": true`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Envelope<T> {
    pub const fn success(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Helper trait for wrapping outputs in the success envelope
pub trait WithEnvelope: Sized + Serialize {
    fn into_envelope(self) -> Envelope<Self> {
        Envelope::success(self)
    }
}

impl<T: Serialize> WithEnvelope for T {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&Error> for ErrorDetail {
    fn from(error: &Error) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

/// Failure output: `{"ok": false, "error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonError {
    pub ok: bool,
    pub error: ErrorDetail,
}

impl JsonError {
    pub const fn new(error: ErrorDetail) -> Self {
        Self { ok: false, error }
    }
}

impl From<&Error> for JsonError {
    fn from(error: &Error) -> Self {
        Self::new(ErrorDetail::from(error))
    }
}
