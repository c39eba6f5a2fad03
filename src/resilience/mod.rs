//! Failure isolation for downstream calls.

pub mod circuit;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitStateKind};
