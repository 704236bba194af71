//! Retry support for idempotent management calls.
//!
//! Only GET requests against workspace endpoints go through the policy.
//! Stream-chat requests and connection probes are never retried: a
//! retried stream would replay deltas the caller has already seen, and a
//! probe should report the backend's state as it is right now.

mod retry;

pub use retry::{RetryConfig, RetryPolicy};
