//! Bounded retries.
//!
//! One combinator drives every retry loop in the crate: the orchestrator's
//! sweeps, the wait on a threaded device write and the streaming writes.

use std::future::Future;
use std::time::Duration;

use crate::runtime::{self, TimedOut};

/// How many times to try, how long to wait in between and how long one try may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub attempt_timeout: Option<Duration>,
}

/// How a retried operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl RetryOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts } | RetryOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
            attempt_timeout: None,
        }
    }

    pub const fn with_delay(self, delay: Duration) -> Self {
        RetryPolicy { delay, ..self }
    }

    pub const fn with_attempt_timeout(self, attempt_timeout: Duration) -> Self {
        RetryPolicy {
            attempt_timeout: Some(attempt_timeout),
            ..self
        }
    }

    /// Await a single attempt, cancelling it past the attempt timeout.
    pub async fn attempt<F, T>(&self, attempt: F) -> Result<T, TimedOut>
    where
        F: Future<Output = T>,
    {
        match self.attempt_timeout {
            Some(limit) => runtime::timeout(limit, attempt).await,
            None => Ok(attempt.await),
        }
    }

    /// Call `op` with the 1-based attempt number until it reports success
    /// or the attempts run out.
    pub async fn run<F, Fut>(&self, mut op: F) -> RetryOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut attempts = 0;
        while attempts < self.max_attempts {
            attempts += 1;
            if self.attempt(op(attempts)).await.unwrap_or(false) {
                return RetryOutcome::Succeeded { attempts };
            }
            if attempts < self.max_attempts && !self.delay.is_zero() {
                runtime::sleep(self.delay).await;
            }
        }
        RetryOutcome::Exhausted { attempts }
    }
}
