//! Exponential backoff for provider calls.
//!
//! Two kinds of failure are retried: provider rate limiting and transport
//! failures. Failed attempt `n` waits `backoff_base_ms * 2^n` before the
//! caller sees the next outcome. The kinds differ in what happens once the
//! attempt budget runs out:
//! rate limiting escalates to [`PlacesError::QuotaExceeded`], while a
//! transport failure hands back its last error so the caller can keep
//! whatever it already collected. Everything else is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::PlacesError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included. Zero behaves as one.
    pub max_retries: u32,
    /// Delay after failed attempt `n` (starting at 1) is `backoff_base_ms * 2^n`.
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff after the given failed attempt (1-based).
    ///
    /// | Attempt | Delay with `backoff_base_ms = 1000` |
    /// |---------|-------------------------------------|
    /// | 1       | 2 s                                 |
    /// | 2       | 4 s                                 |
    /// | 3       | 8 s                                 |
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(32);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryClass {
    RateLimited,
    Transient,
    Terminal,
}

fn classify(err: &PlacesError) -> RetryClass {
    match err {
        PlacesError::RateLimited { .. } => RetryClass::RateLimited,
        PlacesError::Http(_) | PlacesError::ServerError { .. } => RetryClass::Transient,
        PlacesError::UnexpectedStatus { .. }
        | PlacesError::ProviderStatus { .. }
        | PlacesError::Deserialize { .. }
        | PlacesError::InvalidBaseUrl { .. }
        | PlacesError::QuotaExceeded { .. } => RetryClass::Terminal,
    }
}

/// Outcome of a retried operation plus how many times it was actually invoked.
///
/// Every invocation is one billable provider request, successful or not.
#[derive(Debug)]
pub(crate) struct Attempted<T> {
    pub result: Result<T, PlacesError>,
    pub attempts: u32,
}

/// Runs `operation`, retrying rate-limit and transport failures per `policy`.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlacesError>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let err = match operation().await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts,
                }
            }
            Err(err) => err,
        };

        let class = classify(&err);
        if class == RetryClass::Terminal {
            return Attempted {
                result: Err(err),
                attempts,
            };
        }

        let delay = policy.delay_for(attempts);
        tracing::warn!(
            attempt = attempts,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retryable provider error, backing off"
        );
        tokio::time::sleep(delay).await;

        if attempts >= max_attempts {
            let result = match class {
                RetryClass::RateLimited => Err(PlacesError::QuotaExceeded { attempts }),
                _ => Err(err),
            };
            return Attempted { result, attempts };
        }
    }
}
