//! Error types for the optimizer bridge.
//!
//! Sampler-side failures (unavailable process, timeouts, malformed
//! responses) are recoverable: the bridge degrades to random sampling.
//! Configuration errors are fatal at construction and never deferred
//! into the optimization loop.

use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// External sampler process missing, crashed or unreachable
    #[error("Sampler unavailable: {0}")]
    SamplerUnavailable(String),

    /// External call exceeded its deadline
    #[error("Sampler call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Response parsed but did not match the protocol shape
    #[error("Malformed sampler response: {0}")]
    MalformedResponse(String),

    /// Invalid search space or trial budget
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process spawn / pipe errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Creates a new sampler-unavailable error.
    #[must_use]
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::SamplerUnavailable(msg.into())
    }

    /// Creates a new malformed-response error.
    #[must_use]
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True when the failure should trigger the random-sampling fallback
    /// rather than propagate.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
