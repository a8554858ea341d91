//! Retry with exponential back-off and jitter for calls against the XRPC
//! service.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors. Rate-limit responses are honored: when the server sends
//! a `Retry-After` hint the sleep is at least that long. Everything else
//! (auth failures, unexpected statuses, malformed bodies) is returned
//! immediately without any retry.

use std::future::Future;
use std::time::Duration;

use crate::error::CollectError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - [`CollectError::RateLimited`]: HTTP 429; the server asked us to back off.
/// - [`CollectError::Http`]: network-level failure or 5xx.
///
/// **Not retriable (hard stop):**
/// - [`CollectError::Unauthorized`]: retrying with the same credentials cannot help.
/// - [`CollectError::UnexpectedStatus`] below 500: application-level rejection.
/// - [`CollectError::Deserialize`] / [`CollectError::MalformedRecord`]: retrying
///   returns the same bytes.
pub(crate) fn is_retriable(err: &CollectError) -> bool {
    match err {
        CollectError::RateLimited { .. } => true,
        CollectError::UnexpectedStatus { status, .. } => *status >= 500,
        CollectError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        _ => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt | Sleep before next attempt        |
/// |---------|----------------------------------|
/// | 1       | 1 000 ms × 2⁰ ± 25 % jitter      |
/// | 2       | 1 000 ms × 2¹ ± 25 % jitter      |
/// | 3       | 1 000 ms × 2² ± 25 % jitter      |
///
/// Delay is capped at 60 s, except that a `Retry-After` hint from a
/// rate-limit response raises the floor to the hinted duration.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, CollectError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollectError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let mut delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                if let CollectError::RateLimited {
                    retry_after_secs, ..
                } = &err
                {
                    delay_ms = delay_ms.max(retry_after_secs.saturating_mul(1000));
                }
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
