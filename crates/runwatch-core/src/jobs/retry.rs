use crate::errors::JobError;
use std::time::Duration;
use tracing::{error, warn};

const MAX_BACKOFF: Duration = Duration::from_millis(50);

/// Backoff before retry number `retry` (1-based): 1, 2, 4 ... ms, capped.
pub fn backoff(retry: u32) -> Duration {
    let ms = 1u64 << retry.saturating_sub(1).min(16);
    Duration::from_millis(ms).min(MAX_BACKOFF)
}

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` retryable failures have been seen.
pub fn with_retries<T, F>(label: &str, max_attempts: u32, mut attempt: F) -> Result<T, JobError>
where
    F: FnMut(u32) -> Result<T, JobError>,
{
    let max_attempts = max_attempts.max(1);
    let mut tries = 0u32;
    loop {
        tries += 1;
        match attempt(tries) {
            Ok(value) => return Ok(value),
            Err(JobError::Store(e)) if e.is_retryable() => {
                if tries >= max_attempts {
                    error!(
                        task = label,
                        attempts = tries,
                        error = %e,
                        "giving up after repeated store conflicts"
                    );
                    return Err(JobError::RetriesExhausted {
                        label: label.to_string(),
                        attempts: tries,
                        last: e,
                    });
                }
                let wait = backoff(tries);
                warn!(
                    task = label,
                    attempt = tries,
                    max_attempts = max_attempts,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "store conflict, retrying"
                );
                std::thread::sleep(wait);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;

    #[test]
    fn backoff_doubles_and_caps() {
        let got: Vec<u64> = (1..=8).map(|n| backoff(n).as_millis() as u64).collect();
        assert_eq!(got, vec![1, 2, 4, 8, 16, 32, 50, 50]);
    }

    #[test]
    fn conflicts_are_retried_until_success() {
        let mut calls = 0;
        let out = with_retries("status", 5, |_| {
            calls += 1;
            if calls < 3 {
                Err(JobError::Store(StoreError::Conflict("busy".into())))
            } else {
                Ok(calls)
            }
        })
        .unwrap();
        assert_eq!(out, 3);
    }

    #[test]
    fn exhaustion_reports_attempts() {
        let err = with_retries::<(), _>("coverage", 3, |_| {
            Err(JobError::Store(StoreError::Conflict("busy".into())))
        })
        .unwrap_err();
        assert!(matches!(
            err,
            JobError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn other_errors_are_not_retried() {
        let mut calls = 0;
        let err = with_retries::<(), _>("status", 5, |_| {
            calls += 1;
            Err(JobError::Store(StoreError::Database("disk I/O".into())))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.kind(), "store");
    }
}
