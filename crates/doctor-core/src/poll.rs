//! Bounded poll-until-ready helper.
//!
//! Slow-starting components are waited for by re-probing at a fixed
//! interval up to a fixed number of attempts, never by one long sleep.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Fixed-interval, bounded polling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between consecutive attempts (not before the first).
    pub interval: Duration,

    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), 15)
    }
}

/// Value (or last error) plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled<T> {
    pub value: T,
    pub attempts: u32,
}

/// Call `probe(attempt)` until it returns `Ok` or the policy is exhausted.
///
/// Returns the first `Ok` value, or the last `Err` once every attempt failed.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    mut probe: F,
) -> std::result::Result<Polled<T>, Polled<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match probe(attempt).await {
            Ok(value) => {
                return Ok(Polled {
                    value,
                    attempts: attempt,
                })
            }
            Err(err) if attempt >= max_attempts => {
                return Err(Polled {
                    value: err,
                    attempts: attempt,
                })
            }
            Err(_) => {
                debug!(attempt, max_attempts, "Not ready, polling again");
                tokio::time::sleep(policy.interval).await;
                attempt += 1;
            }
        }
    }
}
