//! Retry with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::AIError;

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or
/// `max_retries` retries have been spent. Delays double from `base_delay`.
pub(crate) async fn with_backoff<T, F, Fut>(
    provider: &str,
    max_retries: u32,
    base_delay: Duration,
    mut attempt: F,
) -> Result<T, AIError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AIError>>,
{
    let mut retry_count = 0;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() || retry_count >= max_retries => return Err(err),
            Err(err) => {
                let delay = base_delay.saturating_mul(1 << retry_count.min(16));
                tracing::warn!(
                    provider,
                    attempt = retry_count + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Retrying provider request"
                );
                sleep(delay).await;
                retry_count += 1;
            }
        }
    }
}
