//! # Lattica
//!
//! A self-optimizing cellular automaton. A 3D lattice of soft-logic
//! cells is stepped under a differentiable gate ruleset, observed for
//! criticality (phase locking, permutation entropy, activity rate,
//! divergence), and tuned toward the edge of chaos by an external
//! Bayesian sampler with an in-process random fallback.
//!
//! The workspace splits along the same seams as the runtime:
//! - `lattica_data`: shared cell, metric, parameter and event types
//! - `lattica_core`: lattice, ruleset, encoder, cycle detection and
//!   trace evaluation
//! - `lattica_observer`: the metrics engine and its actor wrapper
//! - `lattica_io`: the optimizer bridge and sampler transports
//!
//! This crate ties them together: configuration and the orchestrator.

pub mod config;
pub mod orchestrator;

pub use config::AppConfig;
pub use orchestrator::DiffLogicCa;
