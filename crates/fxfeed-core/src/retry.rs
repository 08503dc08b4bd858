//! Classified retry with endpoint rotation and exponential backoff.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ErrorClass, FeedError};

/// Backoff strategy between attempts that failed transiently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`, capped at `max`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(1_000),
            factor: 2.0,
            max: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay after the 0-based `attempt` failed.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Attempt cap and backoff for provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Timer abstraction for backoff waits.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration) -> SleepFuture;
}

/// Waits on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, delay: Duration) -> SleepFuture {
        Box::pin(tokio::time::sleep(delay))
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .expect("recording sleeper lock is not poisoned")
            .clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) -> SleepFuture {
        self.delays
            .lock()
            .expect("recording sleeper lock is not poisoned")
            .push(delay);
        Box::pin(async {})
    }
}

/// Runs one provider call under the retry state machine:
/// `Attempting -> Succeeded | Rotating+Waiting -> Attempting | Failed`.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// `operation` receives the 0-based attempt number. `on_transient` runs
    /// after a transient failure that still has attempts left; its own
    /// failure ends the call immediately.
    pub async fn execute<T, Op, OpFut, Rot, RotFut>(
        &self,
        label: &str,
        mut operation: Op,
        mut on_transient: Rot,
    ) -> Result<T, FeedError>
    where
        Op: FnMut(u32) -> OpFut,
        OpFut: Future<Output = Result<T, FeedError>>,
        Rot: FnMut() -> RotFut,
        RotFut: Future<Output = Result<(), FeedError>>,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let class = error.class();
            if class == ErrorClass::Fatal {
                return Err(error);
            }
            if attempt + 1 >= attempts {
                warn!(
                    call = label,
                    attempts,
                    error = %error,
                    "provider call failed after final attempt"
                );
                return Err(error);
            }

            if class == ErrorClass::Transient {
                let delay = self.policy.delay_for_attempt(attempt);
                warn!(
                    call = label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient provider error; rotating endpoint"
                );
                on_transient().await?;
                self.sleeper.sleep(delay).await;
            } else {
                debug!(
                    call = label,
                    attempt = attempt + 1,
                    error = %error,
                    "provider call failed; retrying"
                );
            }

            attempt += 1;
        }
    }
}
