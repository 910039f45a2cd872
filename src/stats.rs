use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;

/// Counters for one deletion session
#[derive(Debug, Clone)]
pub struct RunStats {
    pub deleted: u64,
    pub failed: u64,
    pub throttled: u64,
    pub throttled_time: Duration,
    /// Latched from the first search page and never revised
    pub grand_total: Option<u64>,
    pub started_at: DateTime<Local>,
    started: Instant,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            deleted: 0,
            failed: 0,
            throttled: 0,
            throttled_time: Duration::ZERO,
            grand_total: None,
            started_at: Local::now(),
            started: Instant::now(),
        }
    }

    /// Sets the grand total if it has not been set yet. Returns the latched value.
    pub fn latch_grand_total(&mut self, total: u64) -> u64 {
        *self.grand_total.get_or_insert(total)
    }

    pub fn record_throttle(&mut self, wait: Duration) {
        self.throttled += 1;
        self.throttled_time += wait;
    }

    /// Progress before attempting the next deletion: "about to attempt the
    /// Nth of grand total", hence `deleted + 1`.
    pub fn progress_percent(&self) -> f64 {
        match self.grand_total {
            Some(total) if total > 0 => (self.deleted + 1) as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.grand_total, Some(total) if self.deleted >= total)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a duration as `Hh Mm Ss`
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}
