//! Retry policy shared by collaborator clients and pipeline stages
//!
//! A policy bounds the number of attempts, draws the delay between attempts
//! from a `backoff` schedule, and lets the caller decide what counts as
//! success. An `Ok` value the caller rejects is retried just like an error.

use backoff::backoff::{Backoff, Constant};
use backoff::ExponentialBackoffBuilder;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics::record_retry_attempts;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Same delay before every retry
    Fixed(Duration),
    /// Doubling delay starting at `initial`, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

/// Bounded retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Delay,
}

/// Value produced by a successful attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Outcome of the final attempt when no attempt succeeded
#[derive(Debug)]
pub enum RetryError<T, E> {
    /// The last attempt returned a value the predicate rejected
    Rejected { last: T, attempts: u32 },
    /// The last attempt failed
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryError<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Rejected { attempts, .. } | RetryError::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The error of the last attempt, if it failed
    pub fn into_error(self) -> Option<E> {
        match self {
            RetryError::Failed { error, .. } => Some(error),
            RetryError::Rejected { .. } => None,
        }
    }
}

impl<T, E: fmt::Display> fmt::Display for RetryError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Rejected { attempts, .. } => {
                write!(f, "result rejected after {} attempt(s)", attempts)
            }
            RetryError::Failed { error, attempts } => {
                write!(f, "failed after {} attempt(s): {}", attempts, error)
            }
        }
    }
}

impl RetryPolicy {
    /// Policy with a fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Delay::Fixed(delay),
        }
    }

    /// Policy with an exponentially growing delay between attempts
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Delay::Exponential { initial, max },
        }
    }

    /// Single attempt, no retries
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Delay {
        self.delay
    }

    fn schedule(&self) -> Box<dyn Backoff + Send> {
        match self.delay {
            Delay::Fixed(interval) => Box::new(Constant::new(interval)),
            Delay::Exponential { initial, max } => Box::new(
                ExponentialBackoffBuilder::new()
                    .with_initial_interval(initial)
                    .with_max_interval(max)
                    .with_multiplier(2.0)
                    .with_randomization_factor(0.0)
                    .with_max_elapsed_time(None)
                    .build(),
            ),
        }
    }

    /// Run `attempt` until `accept` approves its value or attempts run out.
    ///
    /// Every error is retried. The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        operation: &str,
        attempt: F,
        accept: P,
    ) -> Result<Retried<T>, RetryError<T, E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
        E: fmt::Display,
    {
        self.run_when(operation, attempt, accept, |_| true).await
    }

    /// Like [`RetryPolicy::run`], but errors for which `retryable` returns
    /// false end the loop immediately.
    pub async fn run_when<T, E, F, Fut, P, R>(
        &self,
        operation: &str,
        mut attempt: F,
        accept: P,
        retryable: R,
    ) -> Result<Retried<T>, RetryError<T, E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
        R: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let mut schedule = self.schedule();
        let mut number = 1;

        loop {
            let outcome = attempt(number).await;

            let give_up = number >= self.max_attempts;
            let failure = match outcome {
                Ok(value) if accept(&value) => {
                    record_retry_attempts(operation, number);
                    return Ok(Retried {
                        value,
                        attempts: number,
                    });
                }
                Ok(value) => {
                    debug!(operation, attempt = number, "Attempt result rejected");
                    RetryError::Rejected {
                        last: value,
                        attempts: number,
                    }
                }
                Err(error) => {
                    warn!(
                        operation,
                        attempt = number,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "Attempt failed"
                    );
                    let stop = !retryable(&error);
                    let failure = RetryError::Failed {
                        error,
                        attempts: number,
                    };
                    if stop {
                        record_retry_attempts(operation, number);
                        return Err(failure);
                    }
                    failure
                }
            };

            if give_up {
                record_retry_attempts(operation, number);
                return Err(failure);
            }

            if let Some(delay) = schedule.next_backoff() {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            number += 1;
        }
    }
}
