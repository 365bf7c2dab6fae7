//! Bounded retries with exponential backoff

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use backoff::ExponentialBackoffBuilder;

use crate::context::RetryPolicy;
use crate::error::resolve::{cancelled, fetch_failed};
use crate::error::{NccError, Result};

/// Shared flag that stops further fetch attempts once set
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(cancelled)` once the token is set
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(cancelled())
        } else {
            Ok(())
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, runs out of
/// attempts or `cancel` is set
///
/// The final error of an exhausted retry is a `Fetch` error carrying the
/// number of attempts made.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_backoff)
        .with_max_interval(policy.max_backoff)
        .with_max_elapsed_time(None)
        .build();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;

    let outcome = backoff::retry(backoff, || {
        cancel.check().map_err(backoff::Error::permanent)?;
        attempts += 1;
        tracing::debug!(what, attempt = attempts, "Fetching");
        match op() {
            Ok(value) => Ok(value),
            Err(err) if err.is_retryable() && attempts < max_attempts => {
                tracing::warn!(what, attempt = attempts, error = %err, "Fetch failed, retrying");
                Err(backoff::Error::transient(err))
            }
            Err(err) => Err(backoff::Error::permanent(err)),
        }
    });

    outcome.map_err(|err| {
        let err = match err {
            backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
        };
        exhausted(what, attempts, err)
    })
}

fn exhausted(what: &str, attempts: u32, err: NccError) -> NccError {
    match err {
        NccError::Fetch { reason, .. } => fetch_failed(what, attempts, reason),
        NccError::Io { path, reason } => fetch_failed(what, attempts, format!("{path}: {reason}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = with_retry(&policy(3), &CancellationToken::new(), "pkg", || {
            calls += 1;
            if calls < 3 {
                Err(fetch_failed("pkg", 1, "connection reset"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let err = with_retry(&policy(3), &CancellationToken::new(), "pkg", || -> Result<()> {
            calls += 1;
            Err(fetch_failed("pkg", 1, "timed out"))
        })
        .unwrap_err();
        assert_eq!(calls, 3);
        assert!(matches!(err, NccError::Fetch { attempts: 3, .. }));
    }

    #[test]
    fn test_non_retryable_errors_surface_immediately() {
        let mut calls = 0;
        let err = with_retry(&policy(5), &CancellationToken::new(), "pkg", || -> Result<()> {
            calls += 1;
            Err(crate::error::registry::authentication("reg", "HTTP 401"))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, NccError::Authentication { .. }));
    }

    #[test]
    fn test_cancellation_stops_retries() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let err = with_retry(&policy(10), &cancel, "pkg", || -> Result<()> {
            calls += 1;
            cancel.cancel();
            Err(fetch_failed("pkg", 1, "boom"))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err, cancelled());
    }
}
