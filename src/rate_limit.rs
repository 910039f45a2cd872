use std::time::Duration;

use log::debug;
use tokio::time::{sleep_until, Instant};

/// Client-side pacing shared by every outbound API call.
///
/// Search and delete draw from the same clock: whatever the endpoint, two
/// calls are never issued less than `min_interval` apart.
#[derive(Debug)]
pub struct RateLimitGate {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimitGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Waits until the interval since the previous call has elapsed, then
    /// stamps the current instant as the time of the call about to be issued.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_call {
            let ready_at = last + self.min_interval;
            if ready_at > Instant::now() {
                debug!(
                    "Pacing: waiting {} ms before next call",
                    (ready_at - Instant::now()).as_millis()
                );
                sleep_until(ready_at).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_not_delayed() {
        let mut gate = RateLimitGate::new(Duration::from_millis(1000));
        let start = Instant::now();
        gate.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_calls_are_spaced() {
        let mut gate = RateLimitGate::new(Duration::from_millis(1000));
        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_time_counts_toward_interval() {
        let mut gate = RateLimitGate::new(Duration::from_millis(1000));
        gate.acquire().await;
        tokio::time::sleep(Duration::from_millis(700)).await;

        let before = Instant::now();
        gate.acquire().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(300));
        assert!(waited < Duration::from_millis(1000));
    }
}
