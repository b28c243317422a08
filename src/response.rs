//! Wire envelope for dynamic-endpoint responses
//!
//! Every response, success or error, uses the same shape:
//! `{status, message, version, result, metadata}`. The version field
//! carries the crate version so clients can correlate behavior changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TableServiceError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Response envelope shared by all dynamic endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// "success" or "error"
    pub status: String,
    pub message: String,
    pub version: String,
    pub result: Value,
    /// Free-form extras, usually empty; pagination counts go here
    pub metadata: serde_json::Map<String, Value>,
}

impl ResponseEnvelope {
    /// Success envelope wrapping a result payload
    pub fn success(message: impl Into<String>, result: Value) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            version: VERSION.to_string(),
            result,
            metadata: serde_json::Map::new(),
        }
    }

    /// Error envelope for a service error; the message is the redacted
    /// client form, never raw driver text
    pub fn error(err: &TableServiceError) -> Self {
        Self {
            status: "error".to_string(),
            message: err.client_message(),
            version: VERSION.to_string(),
            result: Value::Null,
            metadata: serde_json::Map::new(),
        }
    }

    /// HTTP status to pair this envelope with
    pub fn http_status(&self, err: Option<&TableServiceError>) -> u16 {
        match err {
            Some(e) => e.http_status(),
            None => 200,
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
