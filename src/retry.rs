//! Bounded retry for calls to the external oracle.
//!
//! The policy is deliberately simple: a fixed number of total attempts
//! with a fixed delay between them and no jitter, matching the rate
//! behavior the oracle tolerates. Transport failures and unparseable
//! responses both count as failed attempts. [`with_retry`] keeps the
//! policy testable in isolation from any particular fallible call.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::config::OracleConfig;

/// Raised once the attempt budget is exhausted; carries the last
/// underlying cause. Aborts the current enrichment run when surfaced.
#[derive(Debug, Error)]
#[error("external service failed after {attempts} attempts: {source}")]
pub struct ExternalServiceError {
    pub attempts: u32,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Run `op` until it succeeds or the policy's attempt budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ExternalServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_err = None;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "oracle call failed"
                );
                last_err = Some(e);
            }
        }
    }

    Err(ExternalServiceError {
        attempts: policy.max_attempts,
        source: last_err.unwrap_or_else(|| anyhow::anyhow!("retry budget was zero")),
    })
}
