//! Retry policy for calls and reconnects.
//!
//! ```text
//! send → [per-call budget, same session] → [reconnect budget, next endpoint]
//! ```

pub mod retry;

pub use retry::{backoff_delay, sleep_and_check_retries, Budget, RetryLimit};
