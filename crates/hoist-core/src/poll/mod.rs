//! Bounded poll-until-valid loop.
//!
//! The controller has no push channel for state changes; state is discovered
//! by re-querying. The only correctness-preserving strategy is a bounded,
//! cancellable poll at a fixed cadence.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::cancel::CancellationToken;

/// How a bounded wait ended when no hard failure occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    /// The validity predicate held; polling stopped immediately.
    Satisfied(T),
    /// All attempts ran without the predicate holding. Carries the last
    /// (invalid) value so the caller decides how to read "timed out but no
    /// hard error".
    Exhausted(T),
}

impl<T> WaitOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Satisfied(value) | Self::Exhausted(value) => value,
        }
    }
}

/// Terminal failures of one bounded wait.
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// The caller cancelled while polling or sleeping.
    #[error("wait cancelled")]
    Cancelled,
    /// The final attempt produced a hard error.
    #[error("wait failed after {attempts} attempts")]
    Failed {
        attempts: u32,
        #[source]
        source: E,
    },
}

/// Repeatedly evaluate `produce` until `is_valid` holds for its result, the
/// attempt cap is reached, or cancellation is observed.
///
/// A producer error is recorded and treated as an invalid result; polling
/// continues. After `attempts` iterations without a valid result, the wait
/// resolves to `Failed` if the last iteration errored, otherwise to
/// `Exhausted` carrying the last value. A valid result returns immediately
/// with no further sleep.
pub fn wait_until<T, E, P, V>(
    attempts: u32,
    interval: Duration,
    cancel: &CancellationToken,
    mut produce: P,
    is_valid: V,
) -> Result<WaitOutcome<T>, WaitError<E>>
where
    E: std::error::Error + 'static,
    P: FnMut() -> Result<T, E>,
    V: Fn(&T) -> bool,
{
    let attempts = attempts.max(1);
    let mut last: Option<Result<T, E>> = None;

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }

        match produce() {
            Ok(value) if is_valid(&value) => return Ok(WaitOutcome::Satisfied(value)),
            Ok(value) => last = Some(Ok(value)),
            Err(err) => {
                debug!(attempt, error = %err, "poll attempt errored; continuing");
                last = Some(Err(err));
            }
        }

        if attempt < attempts && cancel.sleep(interval) {
            return Err(WaitError::Cancelled);
        }
    }

    match last {
        Some(Ok(value)) => Ok(WaitOutcome::Exhausted(value)),
        Some(Err(source)) => Err(WaitError::Failed { attempts, source }),
        // attempts >= 1, so at least one iteration recorded a result.
        None => Err(WaitError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::io;
    use std::time::Instant;

    fn no_cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn returns_immediately_once_valid() {
        let mut calls = 0u32;
        let start = Instant::now();
        let result = wait_until(
            10,
            Duration::from_millis(200),
            &no_cancel(),
            || -> Result<u32, Infallible> {
                calls += 1;
                Ok(calls)
            },
            |n| *n == 3,
        );

        assert!(matches!(result, Ok(WaitOutcome::Satisfied(3))));
        assert_eq!(calls, 3);
        // Two sleeps at most; well under the full 10 x 200ms window.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn exhausts_after_attempt_cap_with_last_value() {
        let mut calls = 0u32;
        let result = wait_until(
            4,
            Duration::from_millis(1),
            &no_cancel(),
            || -> Result<u32, Infallible> {
                calls += 1;
                Ok(calls)
            },
            |_| false,
        );

        assert_eq!(calls, 4, "producer runs at most `attempts` times");
        assert!(matches!(result, Ok(WaitOutcome::Exhausted(4))));
    }

    #[test]
    fn propagates_error_from_final_attempt() {
        let mut calls = 0u32;
        let result: Result<WaitOutcome<u32>, _> = wait_until(
            3,
            Duration::from_millis(1),
            &no_cancel(),
            || {
                calls += 1;
                Err(io::Error::other(format!("boom {calls}")))
            },
            |_| true,
        );

        match result {
            Err(WaitError::Failed { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source.to_string(), "boom 3");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn error_then_valid_result_succeeds() {
        let mut calls = 0u32;
        let result = wait_until(
            5,
            Duration::from_millis(1),
            &no_cancel(),
            || {
                calls += 1;
                if calls < 3 {
                    Err(io::Error::other("not yet"))
                } else {
                    Ok(calls)
                }
            },
            |n| *n >= 3,
        );

        assert!(matches!(result, Ok(WaitOutcome::Satisfied(3))));
    }

    #[test]
    fn cancellation_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result = wait_until(
            10,
            Duration::from_secs(10),
            &token,
            || -> Result<u32, Infallible> { Ok(1) },
            |_| false,
        );
        assert!(matches!(result, Err(WaitError::Cancelled)));
    }

    #[test]
    fn cancellation_interrupts_the_interval_sleep() {
        let token = CancellationToken::new();
        let poller = token.clone();
        let handle = std::thread::spawn(move || {
            wait_until(
                100,
                Duration::from_secs(10),
                &poller,
                || -> Result<u32, Infallible> { Ok(1) },
                |_| false,
            )
        });

        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        let result = handle.join().expect("poller should not panic");
        assert!(matches!(result, Err(WaitError::Cancelled)));
    }
}
