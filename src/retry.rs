// Bounded retry with backoff for list membership writes.
//
// Each call moves through `Attempting(1..=max_attempts)` and ends either
// succeeded or failed with the last error and the attempt count. Creating a
// record also survives an expired access token: the session is refreshed and
// the same attempt is replayed without waiting.

use crate::api::{ListService, RpcError};
use crate::auth::AuthSession;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{ListUri, MembershipRecord, RecordHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for honoring a server-provided rate-limit reset.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(48 * 60 * 60);

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per mutation, including the first.
    pub max_attempts: u32,
    /// Base for exponential backoff: `base_wait * 2^(attempt - 1)`.
    pub base_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_wait: Duration::from_secs(60),
        }
    }
}

/// Why a particular wait was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    RateLimitReset,
    Backoff,
}

/// A single mutation against the list.
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
    Create { subject: &'a str },
    Delete { record: &'a MembershipRecord },
}

impl Mutation<'_> {
    fn subject(&self) -> &str {
        match self {
            Mutation::Create { subject } => *subject,
            Mutation::Delete { record } => record.subject.as_str(),
        }
    }

    fn refreshes_expired_token(&self) -> bool {
        matches!(self, Mutation::Create { .. })
    }
}

/// Result of a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created(RecordHandle),
    Deleted,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_wait,
        }
    }

    /// How long to wait after `attempt` failed with `error`.
    ///
    /// Only the first retry looks at rate-limit metadata: a reset timestamp
    /// that puts the wait strictly between zero and 48 hours is used as
    /// `reset - now + 1` seconds. Everything else is exponential backoff.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &RpcError, now: i64) -> (Duration, WaitReason) {
        if attempt == 1 {
            if let Some(reset_at) = error.rate_limit().and_then(|r| r.reset_at) {
                let secs = reset_at.saturating_sub(now).saturating_add(1);
                if secs > 0 && (secs as u64) < MAX_RATE_LIMIT_WAIT.as_secs() {
                    return (Duration::from_secs(secs as u64), WaitReason::RateLimitReset);
                }
            }
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        (self.base_wait.saturating_mul(factor), WaitReason::Backoff)
    }

    /// Run one mutation to completion.
    pub fn apply<S, C>(
        &self,
        service: &S,
        auth: &mut AuthSession,
        list: &ListUri,
        mutation: Mutation<'_>,
        clock: &mut C,
    ) -> Result<Applied>
    where
        S: ListService,
        C: Clock,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        let mut refreshed = false;

        loop {
            debug!(subject = mutation.subject(), attempt, max_attempts, "attempting mutation");
            let outcome = match mutation {
                Mutation::Create { subject } => service
                    .create_list_item(auth.session(), subject, list)
                    .map(Applied::Created),
                Mutation::Delete { record } => service
                    .delete_list_item(auth.session(), &record.record)
                    .map(|()| Applied::Deleted),
            };

            let err = match outcome {
                Ok(applied) => {
                    debug!(subject = mutation.subject(), attempt, "mutation succeeded");
                    return Ok(applied);
                }
                Err(err) => err,
            };

            if err.is_expired_token() && mutation.refreshes_expired_token() && !refreshed {
                warn!(
                    subject = mutation.subject(),
                    attempt, "access token expired, refreshing session"
                );
                auth.refresh(service)?;
                refreshed = true;
                continue;
            }

            if attempt >= max_attempts || !err.is_retryable() {
                warn!(subject = mutation.subject(), attempt, error = %err, "mutation failed");
                return Err(Error::Mutation {
                    attempts: attempt,
                    source: err,
                });
            }

            let (wait, reason) = self.delay_for(attempt, &err, clock.now());
            match reason {
                WaitReason::RateLimitReset => warn!(
                    attempt,
                    max_attempts,
                    error = %err,
                    remaining = err.rate_limit().and_then(|r| r.remaining),
                    wait_secs = wait.as_secs(),
                    "rate limited, waiting until reset + 1s"
                ),
                WaitReason::Backoff => warn!(
                    attempt,
                    max_attempts,
                    error = %err,
                    wait_secs = wait.as_secs(),
                    "attempt failed, backing off"
                ),
            }
            clock.sleep(wait);
            attempt += 1;
            refreshed = false;
        }
    }
}
