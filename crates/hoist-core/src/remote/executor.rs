//! Budgeted retry loop around one logical remote operation.

use std::time::{Duration, Instant};

use tracing::debug;

use super::{Authenticator, Remediation, RemoteError};
use crate::cancel::CancellationToken;

/// Remaining time allowance for one executor invocation.
///
/// Counted monotonically downward across retries; one invocation owns
/// exactly one budget and it dies with the invocation.
#[derive(Debug, Clone, Copy)]
pub struct RequestBudget {
    total: Duration,
    remaining: Duration,
}

impl RequestBudget {
    pub fn new(total: Duration) -> Self {
        Self {
            total,
            remaining: total,
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }

    fn consume(&mut self, spent: Duration) {
        self.remaining = self.remaining.saturating_sub(spent);
    }

    fn covers(&self, delay: Duration) -> bool {
        delay <= self.remaining
    }
}

/// Executes one logical remote operation such that transient failures are
/// retried within a time budget rather than surfaced to the caller.
///
/// The classifier is passed per call because operations disagree on what is
/// transient: reading staged build output tolerates "not finished yet",
/// deleting a resource must not.
pub struct ResilientExecutor<'a> {
    auth: &'a dyn Authenticator,
    cancel: &'a CancellationToken,
}

impl<'a> ResilientExecutor<'a> {
    pub fn new(auth: &'a dyn Authenticator, cancel: &'a CancellationToken) -> Self {
        Self { auth, cancel }
    }

    /// Run `op` until it succeeds, a fatal classification stops it, or the
    /// budget runs out.
    ///
    /// Remediation per failure: `Fatal` propagates immediately;
    /// `Reauthenticate` re-establishes the session and retries at once (an
    /// authenticator failure propagates); `Backoff` sleeps the requested
    /// delay, deducting it from the budget. All elapsed time counts against
    /// the budget. Exhaustion yields a timeout error carrying the last
    /// observed failure as cause.
    pub fn execute<T, F, C>(
        &self,
        mut budget: RequestBudget,
        classify: C,
        mut op: F,
    ) -> Result<T, RemoteError>
    where
        F: FnMut() -> Result<T, RemoteError>,
        C: Fn(&RemoteError) -> Remediation,
    {
        let total = budget.total();
        let mut last: Option<RemoteError> = None;

        while !budget.is_exhausted() {
            if self.cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }

            let attempt_start = Instant::now();
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            budget.consume(attempt_start.elapsed());

            match classify(&err) {
                Remediation::Fatal => return Err(err),
                Remediation::Reauthenticate => {
                    debug!(error = %err, "re-authenticating after rejected call");
                    let reauth_start = Instant::now();
                    self.auth.reauthenticate()?;
                    budget.consume(reauth_start.elapsed());
                    last = Some(err);
                }
                Remediation::Backoff(delay) => {
                    let fits = budget.covers(delay);
                    debug!(
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        fits,
                        "transient failure; backing off"
                    );
                    last = Some(err);
                    if !fits {
                        break;
                    }
                    if self.cancel.sleep(delay) {
                        return Err(RemoteError::Cancelled);
                    }
                    budget.consume(delay);
                }
            }
        }

        let cause = last
            .unwrap_or_else(|| RemoteError::Transport("budget exhausted before any attempt".into()));
        Err(RemoteError::Timeout {
            after: total,
            source: Box::new(cause),
        })
    }
}
