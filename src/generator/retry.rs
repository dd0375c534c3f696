// Retry/backoff policy for remote calls

use crate::error::{AiconError, Result, TransportError};
use crate::models::AppConfig;
use log::warn;
use std::thread;
use std::time::Duration;

/// Bounded retry with exponential backoff.
///
/// After failed attempt `n` (0-based) the policy waits `base_delay * 2^n`
/// before trying again. Only errors accepted by `retryable` are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub retryable: fn(&TransportError) -> bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            retryable: TransportError::is_transient,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let base_secs = if config.backoff_base_secs.is_finite() {
            config.backoff_base_secs.max(0.0)
        } else {
            0.0
        };
        Self::new(config.max_attempts, Duration::from_secs_f64(base_secs))
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `op` until it succeeds, fails permanently or the budget runs out.
    ///
    /// `op` receives the 0-based attempt number.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> std::result::Result<T, TransportError>,
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if (self.retryable)(&err) => {
                    if attempt + 1 >= budget {
                        return Err(AiconError::RemoteUnavailable {
                            attempts: budget,
                            source: err,
                        });
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt + 1,
                        budget,
                        err,
                        delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(AiconError::RemoteRequest(err)),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limited() -> TransportError {
        TransportError::Status {
            code: 429,
            body: "slow down".into(),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let result = policy.run("test", |_| {
            calls += 1;
            if calls < 3 {
                Err(rate_limited())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_budget_exhaustion_is_remote_unavailable() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let result: Result<()> = policy.run("test", |_| {
            calls += 1;
            Err(TransportError::Network("connection reset".into()))
        });
        assert_eq!(calls, 3);
        match result.unwrap_err() {
            AiconError::RemoteUnavailable { attempts, source } => {
                assert_eq!(attempts, 3);
                assert_eq!(source, TransportError::Network("connection reset".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::immediate(5);
        let mut calls = 0;
        let result: Result<()> = policy.run("test", |_| {
            calls += 1;
            Err(TransportError::Status {
                code: 400,
                body: "bad size".into(),
            })
        });
        assert_eq!(calls, 1);
        assert!(matches!(result.unwrap_err(), AiconError::RemoteRequest(_)));
    }

    #[test]
    fn test_custom_retryable_predicate() {
        let mut policy = RetryPolicy::immediate(2);
        policy.retryable = |_| false;
        let mut calls = 0;
        let _: Result<()> = policy.run("test", |_| {
            calls += 1;
            Err(rate_limited())
        });
        assert_eq!(calls, 1);
    }
}
