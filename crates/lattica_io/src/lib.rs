//! # Lattica IO
//!
//! The optimizer bridge: everything that crosses the process boundary to
//! the external Bayesian sampler.
//!
//! This crate provides:
//! - Structured error handling with recoverable/fatal classification
//! - The `Sampler` protocol trait with subprocess and random
//!   implementations
//! - The `TpeBridge` suggest -> evaluate -> record loop with graceful
//!   degradation to uniform random sampling

/// The suggest/record/optimize loop and best-trial tracking
pub mod bridge;
/// Error types and result aliases for bridge operations
pub mod error;
/// The external sampler protocol and its implementations
pub mod sampler;

pub use bridge::TpeBridge;
pub use error::{BridgeError, Result};
pub use sampler::{RandomSampler, Sampler, SubprocessConfig, SubprocessSampler};
