//! Retry budgets and the stepped backoff schedule.
//!
//! Delay for the `count`-th consecutive failure:
//! ```text
//! count <= 1      →  0s
//! 2 <= count <= 9 →  (count - 1) * 1.5 + 0.5 s
//! count >= 10     →  10s
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::interrupt::Interrupt;

/// Upper bound on attempts. Serialised as an integer; negative means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RetryLimit {
    Unlimited,
    Limited(u32),
}

impl RetryLimit {
    pub fn unlimited() -> Self {
        Self::Unlimited
    }

    /// Returns `true` once `attempt` has gone past the limit.
    pub fn is_exceeded(self, attempt: u32) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Limited(limit) => attempt > limit,
        }
    }
}

impl From<i64> for RetryLimit {
    fn from(n: i64) -> Self {
        if n < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(n).unwrap_or(u32::MAX))
        }
    }
}

impl From<RetryLimit> for i64 {
    fn from(limit: RetryLimit) -> Self {
        match limit {
            RetryLimit::Unlimited => -1,
            RetryLimit::Limited(n) => i64::from(n),
        }
    }
}

impl std::fmt::Display for RetryLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Limited(n) => write!(f, "{n}"),
        }
    }
}

/// Delay before the next attempt after `count` failures.
pub fn backoff_delay(count: u32) -> Duration {
    match count {
        0 | 1 => Duration::ZERO,
        2..=9 => Duration::from_secs_f64(f64::from(count - 1) * 1.5 + 0.5),
        _ => Duration::from_secs(10),
    }
}

/// Which budget a check is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Resending one call on the same session.
    Call,
    /// Establishing a new session.
    Reconnect,
}

/// Check `attempt` against `limit`, then optionally back off.
///
/// Fails with [`RpcError::CallRetriesExhausted`] or
/// [`RpcError::RetriesExhausted`] depending on `budget` once the limit is
/// passed. With `sleep == false` only the check runs.
pub async fn sleep_and_check_retries(
    limit: RetryLimit,
    attempt: u32,
    url: &str,
    reason: &str,
    budget: Budget,
    sleep: bool,
    interrupt: &Interrupt,
) -> Result<(), RpcError> {
    if limit.is_exceeded(attempt) {
        let url = url.to_string();
        return Err(match budget {
            Budget::Call => RpcError::CallRetriesExhausted { url, attempts: attempt },
            Budget::Reconnect => {
                tracing::error!(url = %url, attempt, "reconnect budget exhausted");
                RpcError::RetriesExhausted { url, attempts: attempt }
            }
        });
    }

    match budget {
        Budget::Call => {
            tracing::warn!(url = %url, attempt, limit = %limit, reason, "retrying RPC call")
        }
        Budget::Reconnect => tracing::warn!(
            url = %url,
            attempt,
            limit = %limit,
            reason,
            "lost connection or internal error on node"
        ),
    }

    if !sleep {
        return Ok(());
    }
    let delay = backoff_delay(attempt);
    if !delay.is_zero() {
        tracing::warn!(delay_ms = delay.as_millis() as u64, "retrying after backoff");
        interrupt.sleep(delay).await?;
    }
    Ok(())
}
