//! Resilience patterns for policyflow-runtime.
//!
//! This module provides:
//! - Retry with a fixed delay
//! - Failure policies for nodes whose calls are exhausted

mod fallback;
mod retry;

pub use fallback::FailurePolicy;
pub use retry::RetryPolicy;
