//! Retry loop shared by membership clients.

use std::error::Error;
use std::future::Future;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::MutationOutcome;
use crate::policy::{Disposition, Mutation, disposition};

/// Default number of retries after the first attempt.
const DEFAULT_RETRY_COUNT: usize = 30;

/// Default wait between attempts.
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(10);

/// Bounds of a retried mutation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub retry_count: usize,

    /// Wait between two attempts.
    pub retry_wait: Duration,
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[must_use]
    pub const fn new(retry_count: usize, retry_wait: Duration) -> Self {
        Self {
            retry_count,
            retry_wait,
        }
    }

    /// A policy that sends the request exactly once.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total number of requests the policy allows.
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.retry_count + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_COUNT, DEFAULT_RETRY_WAIT)
    }
}

/// Why a mutation did not complete.
#[derive(Debug, Error)]
pub enum MutationError<E>
where
    E: Error + 'static,
{
    /// The request could not be sent or its response not read.
    #[error("request failed: {0}")]
    Send(#[source] E),

    /// The API answered with a status the mutation does not handle.
    #[error("unexpected status {0}")]
    UnexpectedStatus(StatusCode),

    /// Every allowed attempt was answered with a retryable status.
    #[error("no success after {attempts} attempts, last status {status}")]
    RetriesExhausted {
        /// Requests sent.
        attempts: usize,

        /// Status of the last response.
        status: StatusCode,
    },
}

/// Sends a mutation until its response settles it or the policy runs out.
///
/// `send` issues one request and yields the response status. `target` names the object the
/// mutation applies to and only feeds the logs.
///
/// # Errors
///
/// Fails on transport errors and unhandled statuses immediately, and with
/// [`MutationError::RetriesExhausted`] once every attempt was answered with a retryable status.
pub async fn run_mutation<F, Fut, E>(
    mutation: Mutation,
    policy: RetryPolicy,
    target: &str,
    mut send: F,
) -> Result<MutationOutcome, MutationError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusCode, E>>,
    E: Error + 'static,
{
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let status = send().await.map_err(MutationError::Send)?;

        match disposition(mutation, status) {
            Disposition::Done(outcome) => {
                match outcome {
                    MutationOutcome::Applied => debug!("{} {} succeeded", mutation, target),
                    MutationOutcome::AssumedApplied => warn!(
                        "HTTP timeout while {} {}, it should have been applied anyways",
                        mutation, target
                    ),
                    MutationOutcome::Ignored => warn!(
                        "HTTP status [{}] while {} {}, nothing left to do",
                        status, mutation, target
                    ),
                }
                return Ok(outcome);
            }
            Disposition::Fail => return Err(MutationError::UnexpectedStatus(status)),
            Disposition::Retry if attempts >= max_attempts => {
                return Err(MutationError::RetriesExhausted { attempts, status });
            }
            Disposition::Retry => {
                warn!(
                    "HTTP status [{}] while {} {}, retrying ({}/{}) ...",
                    status, mutation, target, attempts, max_attempts
                );
                tokio::time::sleep(policy.retry_wait).await;
            }
        }
    }
}
