//! # Error Handling
//!
//! Centralized error types for Clay core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Validation failures are *not* errors: they are ordinary `400` replies.
//! `Error::Http` is the one variant a host is expected to translate into a
//! response (permission denials and handler-raised HTTP failures).

use serde_json::Value;
use thiserror::Error;

/// Result type alias for Clay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Clay engine
#[derive(Error, Debug)]
pub enum Error {
    /// An HTTP-level failure carrying the status and payload to send back
    #[error("HTTP {status}: {payload}")]
    Http {
        /// Status code to respond with
        status: u16,
        /// Response payload
        payload: Value,
    },

    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A permission decorator names a check its policy does not define
    #[error("Policy {policy} has no check named `{check}`")]
    UnknownPolicyCheck {
        /// Policy type name
        policy: &'static str,
        /// The missing check
        check: String,
    },

    /// `forward` was called on a request that passed no `ForwardTo` decorator
    #[error("No forward target was set for this request")]
    NoForwardTarget,

    /// The forward target service was not registered on this request
    #[error("Service `{key}` is not registered for this request")]
    ServiceNotRegistered {
        /// Structural key of the missing service
        key: String,
    },

    /// The forward target service has no endpoint with this name
    #[error("Service {service} has no handler named `{handler}`")]
    UnknownHandler {
        /// Service name
        service: &'static str,
        /// The missing handler
        handler: String,
    },

    /// Request body could not be parsed
    #[error("Invalid request body: {reason}")]
    InvalidBody {
        /// Parser message
        reason: String,
    },

    /// Request payload too large
    #[error("Payload too large: body exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an HTTP error, the handler-side way of failing a request with a
    /// specific status.
    pub fn http(status: u16, payload: impl Into<Value>) -> Self {
        Self::Http {
            status,
            payload: payload.into(),
        }
    }

    /// Status a host should respond with for this error
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            Self::PayloadTooLarge { .. } => 413,
            Self::InvalidBody { .. } => 400,
            _ => 500,
        }
    }
}
