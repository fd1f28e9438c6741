//! JSON envelopes written to clients.
//!
//! Every response body is one of two shapes:
//!
//! ```json
//! { "code": 200, "data": { ... } }
//! { "code": 404, "message": "route not found" }
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Success envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    /// HTTP status code.
    pub code: u16,
    /// Response payload.
    pub data: T,
}

impl<T: Serialize> DataEnvelope<T> {
    /// Creates a new envelope.
    pub fn new(code: u16, data: T) -> Self {
        Self { code, data }
    }

    /// Serializes the envelope.
    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub code: u16,
    /// Client-safe message.
    pub message: String,
}

impl ErrorBody {
    /// Serializes the body.
    ///
    /// Falls back to a fixed body if serialization fails.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        serde_json::to_vec(self).map_or_else(
            |_| Bytes::from_static(br#"{"code":500,"message":"Something went wrong"}"#),
            Bytes::from,
        )
    }
}
