//! HTTP status errors surfaced by the typed JSON layer
//!
//! Mirrors the wire shape hosts expect: `statusCode`, `message` and an
//! optional `result` holding whatever part of the body could be parsed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Error raised when a JSON call finishes with a status above 299
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientError {
    /// Final HTTP status code
    pub status_code: u16,
    /// Best-effort human-readable message
    pub message: String,
    /// Parsed response body, if it was valid JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl HttpClientError {
    /// Create an error without a parsed result
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            status_code,
            message: message.into(),
            result: None,
        }
    }

    /// Attach the parsed body
    pub fn with_result(mut self, result: Option<Value>) -> Self {
        self.result = result;
        self
    }

    /// Build the error for a failed response.
    ///
    /// The message prefers a non-empty `message` field of the parsed body,
    /// then the raw body text, then a generic `Failed request: (<status>)`.
    pub fn from_body(status_code: u16, parsed: Option<Value>, contents: &str) -> Self {
        let message = Self::extract_message(parsed.as_ref(), contents)
            .unwrap_or_else(|| format!("Failed request: ({})", status_code));

        Self {
            status_code,
            message,
            result: parsed,
        }
    }

    fn extract_message(parsed: Option<&Value>, contents: &str) -> Option<String> {
        let from_json = parsed
            .and_then(|json| json.get("message"))
            .and_then(|message| match message {
                Value::Null | Value::Bool(false) => None,
                Value::String(text) if text.is_empty() => None,
                Value::String(text) => Some(text.clone()),
                other => Some(other.to_string()),
            });

        from_json.or_else(|| {
            if contents.is_empty() {
                None
            } else {
                Some(contents.to_string())
            }
        })
    }
}

impl fmt::Display for HttpClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP Error [{}]: {}", self.status_code, self.message)
    }
}

impl std::error::Error for HttpClientError {}
