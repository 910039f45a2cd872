//! Reactive backoff on server-signalled waits.
//!
//! A 202 ("not indexed yet") or 429 ("rate limited") reply is answered by
//! sleeping the advertised `retry_after` and re-issuing the identical request.
//! Every attempt, retries included, first passes through the [`RateLimitGate`],
//! so the two waits add up.

use std::future::Future;

use tokio::time::sleep;

use crate::api_client::ApiReply;
use crate::error::ApiError;
use crate::rate_limit::RateLimitGate;
use crate::run_log::RunLogs;
use crate::stats::RunStats;

/// Issues `call` until it yields a result or a terminal error.
///
/// With `max_retries == None` throttled calls are retried forever, which can
/// spin indefinitely under sustained throttling. `Some(n)` gives up with
/// [`ApiError::RetriesExhausted`] after `n` retries.
pub async fn call_with_backoff<T, F, Fut>(
    gate: &mut RateLimitGate,
    stats: &mut RunStats,
    logs: &mut RunLogs,
    max_retries: Option<u32>,
    operation: &str,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiReply<T>, ApiError>>,
{
    let mut retries: u32 = 0;

    loop {
        gate.acquire().await;

        let (wait, rate_limited) = match call().await? {
            ApiReply::Done(value) => return Ok(value),
            ApiReply::NotIndexed(wait) => (wait, false),
            ApiReply::RateLimited(wait) => (wait, true),
        };

        if let Some(max) = max_retries {
            if retries >= max {
                return Err(ApiError::RetriesExhausted {
                    attempts: retries + 1,
                });
            }
        }
        retries += 1;

        if rate_limited {
            stats.record_throttle(wait);
            logs.notice(&format!(
                "🐢 {}: rate limited, waiting {} ms (throttle #{})",
                operation,
                wait.as_millis(),
                stats.throttled
            ));
        } else {
            logs.event(&format!(
                "⏳ {}: search index not ready, retrying in {} ms",
                operation,
                wait.as_millis()
            ));
        }

        sleep(wait).await;
    }
}
