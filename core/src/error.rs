//! Error type for every client operation.
//!
//! # Design
//! Callers branch on the HTTP status (401/403 vs 404 vs 5xx), so the status
//! is kept as data on `Status` instead of being folded into the message.
//! A failure that never reached a response (`Network`) has no status at all,
//! which is what the session layer uses to tell an outage from a rejection.

use serde_json::Value;
use thiserror::Error;

/// Errors returned by `Transport`, the resolver, the `Gateway` and the
/// session manager.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received.
    #[error("{message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        payload: Value,
    },

    /// A successful response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The candidate list was empty.
    #[error("All endpoints failed")]
    NoEndpoints,
}

impl ApiError {
    pub fn network(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ApiError::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message, never empty.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// HTTP status of the response that caused the error, if one arrived
    /// and it was a failure status.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed error body of a non-2xx response (`{}` when the body was not JSON).
    pub fn payload(&self) -> Option<&Value> {
        match self {
            ApiError::Status { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// 401 or 403: the server authoritatively says there is no session.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self.status_code(), Some(401 | 403))
    }
}
