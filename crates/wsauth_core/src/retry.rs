//! RetryingInvoker — bounded, fixed-delay retries of a single remote call.
//!
//! Each attempt runs under `attempt_timeout`. The whole loop, sleeps
//! included, runs under `overall_deadline` when one is set. Sleeps are
//! ordinary tokio timers, so dropping the future cancels a pending wait.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Default attempts per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between failed attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_OVERALL_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Fixed pause after a failed attempt; no growth.
    pub delay: Duration,
    pub attempt_timeout: Duration,
    pub overall_deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            overall_deadline: Some(DEFAULT_OVERALL_DEADLINE),
        }
    }
}

/// What a single attempt produced.
#[derive(Debug)]
pub enum Attempt<T> {
    /// Terminal answer; stop retrying.
    Settled(T),
    /// Consumes the attempt; the loop continues if budget remains.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    pub attempt: u32,
    pub reason: String,
}

#[derive(Debug)]
pub struct RetryReport<T> {
    pub value: T,
    /// Attempt number that settled.
    pub attempts: u32,
    /// Failed attempts before the settling one.
    pub failures: Vec<AttemptFailure>,
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("no settled outcome after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        failures: Vec<AttemptFailure>,
    },

    #[error("deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded {
        attempts: u32,
        failures: Vec<AttemptFailure>,
    },
}

#[derive(Default)]
struct Progress {
    attempts: u32,
    failures: Vec<AttemptFailure>,
}

#[derive(Clone, Debug, Default)]
pub struct RetryingInvoker {
    policy: RetryPolicy,
}

impl RetryingInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it settles, the attempt budget runs out, or the overall
    /// deadline passes. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<RetryReport<T>, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut progress = Progress::default();

        let settled = match self.policy.overall_deadline {
            Some(limit) => {
                let deadline = Instant::now() + limit;
                let timed =
                    tokio::time::timeout_at(deadline, self.drive(&mut op, &mut progress)).await;
                match timed {
                    Ok(settled) => settled,
                    Err(_) => {
                        tracing::warn!(
                            attempts = progress.attempts,
                            deadline_ms = limit.as_millis() as u64,
                            "overall deadline reached, abandoning remote call"
                        );
                        return Err(RetryError::DeadlineExceeded {
                            attempts: progress.attempts,
                            failures: progress.failures,
                        });
                    }
                }
            }
            None => self.drive(&mut op, &mut progress).await,
        };

        match settled {
            Some(value) => Ok(RetryReport {
                value,
                attempts: progress.attempts,
                failures: progress.failures,
            }),
            None => Err(RetryError::Exhausted {
                attempts: progress.attempts,
                failures: progress.failures,
            }),
        }
    }

    async fn drive<T, F, Fut>(&self, op: &mut F, progress: &mut Progress) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            progress.attempts = attempt;

            let outcome = match tokio::time::timeout(self.policy.attempt_timeout, op(attempt)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Attempt::Failed(format!(
                    "attempt timed out after {}ms",
                    self.policy.attempt_timeout.as_millis()
                )),
            };

            match outcome {
                Attempt::Settled(value) => return Some(value),
                Attempt::Failed(reason) => {
                    tracing::warn!(attempt, max_attempts, reason = %reason, "remote attempt failed");
                    progress.failures.push(AttemptFailure { attempt, reason });
                }
            }

            if attempt < max_attempts {
                tracing::debug!(
                    delay_ms = self.policy.delay.as_millis() as u64,
                    "waiting before next attempt"
                );
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32, deadline: Option<Duration>) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(3),
            attempt_timeout: Duration::from_secs(5),
            overall_deadline: deadline,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn settles_on_third_attempt_after_two_fixed_delays() {
        let invoker = RetryingInvoker::new(policy(3, None));
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let report = invoker
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Attempt::Failed(format!("boom {attempt}"))
                    } else {
                        Attempt::Settled("ok")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(report.value, "ok");
        assert_eq!(report.attempts, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[1].reason, "boom 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_without_sleeping_after_last_attempt() {
        let invoker = RetryingInvoker::new(policy(3, None));
        let started = Instant::now();

        let err = invoker
            .run(|_| async { Attempt::<()>::Failed("down".into()) })
            .await
            .unwrap_err();

        match err {
            RetryError::Exhausted { attempts, failures } => {
                assert_eq!(attempts, 3);
                assert_eq!(
                    failures.iter().map(|f| f.attempt).collect::<Vec<_>>(),
                    vec![1, 2, 3]
                );
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_counts_as_failure() {
        let invoker = RetryingInvoker::new(policy(2, None));

        let report = invoker
            .run(|attempt| async move {
                if attempt == 1 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Attempt::Settled(attempt)
            })
            .await
            .unwrap();

        assert_eq!(report.value, 2);
        assert!(report.failures[0].reason.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn overall_deadline_cuts_the_wait_short() {
        let invoker = RetryingInvoker::new(policy(3, Some(Duration::from_secs(4))));
        let started = Instant::now();

        let err = invoker
            .run(|_| async { Attempt::<()>::Failed("down".into()) })
            .await
            .unwrap_err();

        match err {
            RetryError::DeadlineExceeded { attempts, failures } => {
                assert_eq!(attempts, 2);
                assert_eq!(failures.len(), 2);
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let invoker = RetryingInvoker::new(policy(0, None));
        let report = invoker.run(|_| async { Attempt::Settled(1) }).await.unwrap();
        assert_eq!(report.attempts, 1);
    }
}
