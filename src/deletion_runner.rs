use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use log::debug;
use tokio::time::sleep;

use crate::api_client::ChatApi;
use crate::config::{PacingConfig, TargetConfig};
use crate::error::ApiError;
use crate::models::{Message, SearchResult};
use crate::rate_limit::RateLimitGate;
use crate::retry::call_with_backoff;
use crate::run_log::RunLogs;
use crate::stats::{format_hms, RunStats};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The search reported no matching message at all
    NothingToDelete,
    /// Deleted count reached the grand total, or the search ran dry
    Completed,
    /// Several pages in a row produced no deletion, so the cursor could not move
    Stalled,
    /// The shutdown signal fired before the loop finished
    Interrupted,
}

/// Search-then-delete loop for one author in one channel.
pub struct DeletionRunner {
    api: Arc<dyn ChatApi>,
    channel_id: String,
    author_id: String,
    cursor: Option<String>,
    pacing: PacingConfig,
    dry_run: bool,
    gate: RateLimitGate,
    stats: RunStats,
    logs: RunLogs,
}

impl DeletionRunner {
    pub fn new(
        api: Arc<dyn ChatApi>,
        target: &TargetConfig,
        pacing: PacingConfig,
        logs: RunLogs,
    ) -> Self {
        DeletionRunner {
            api,
            channel_id: target.channel_id.clone(),
            author_id: target.author_id.clone(),
            cursor: target.before_message_id.clone(),
            gate: RateLimitGate::new(pacing.min_call_interval()),
            pacing,
            dry_run: false,
            stats: RunStats::new(),
            logs,
        }
    }

    /// Back up and count messages without ever calling delete
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Upper bound of the next search
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub async fn run(&mut self) -> Result<RunOutcome> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the session until it finishes or `shutdown` resolves.
    ///
    /// On shutdown the in-flight request or wait is dropped and the summary
    /// is still reported. Search failures are fatal: they are logged, the
    /// summary is reported, and the error is returned.
    pub async fn run_until<S>(&mut self, shutdown: S) -> Result<RunOutcome>
    where
        S: Future,
    {
        self.log_session_start()?;

        let result = tokio::select! {
            result = self.delete_all() => Some(result),
            _ = shutdown => None,
        };

        match result {
            None => {
                self.logs.notice("🛑 Interrupted, stopping session");
                self.report_summary();
                Ok(RunOutcome::Interrupted)
            }
            Some(Ok(outcome)) => {
                self.report_summary();
                Ok(outcome)
            }
            Some(Err(e)) => {
                self.logs.error(&format!("Fatal error while searching messages: {}", e));
                self.report_summary();
                Err(e).context("Deletion session aborted")
            }
        }
    }

    fn log_session_start(&mut self) -> Result<()> {
        self.logs.event(&format!(
            "🚀 Session started at {}{}",
            self.stats.started_at.format("%Y-%m-%d %H:%M:%S"),
            if self.dry_run { " (dry run)" } else { "" }
        ));
        self.logs.event(&format!("Channel: {}", self.channel_id));
        self.logs.event(&format!("Author: {}", self.author_id));
        if let Some(cursor) = &self.cursor {
            self.logs.event(&format!("Resuming before message: {}", cursor));
        }

        self.logs.write_backup_header(&self.channel_id, &self.author_id)
    }

    async fn delete_all(&mut self) -> Result<RunOutcome, ApiError> {
        let mut stalled_pages: u32 = 0;

        loop {
            let page = self.search_page().await?;

            if page.total_results == 0 || page.is_empty() {
                return Ok(if self.stats.grand_total.is_none() {
                    self.logs.event("No matching messages found, nothing to delete");
                    RunOutcome::NothingToDelete
                } else {
                    self.logs.event("Search returned no more messages");
                    RunOutcome::Completed
                });
            }

            if self.stats.grand_total.is_none() {
                self.logs.event(&format!(
                    "🔍 Found {} message(s) to delete",
                    page.total_results
                ));
            }
            self.stats.latch_grand_total(page.total_results);

            let progressed = self.process_page(&page).await;

            if self.stats.is_complete() {
                return Ok(RunOutcome::Completed);
            }
            if progressed {
                stalled_pages = 0;
            } else {
                stalled_pages += 1;
                if stalled_pages >= self.pacing.max_stalled_pages {
                    self.logs.notice(&format!(
                        "No message deleted in {} page(s) in a row, stopping to avoid searching the same page forever",
                        stalled_pages
                    ));
                    return Ok(RunOutcome::Stalled);
                }
                self.logs.notice(&format!(
                    "No message deleted from the last page ({}/{}), searching again",
                    stalled_pages, self.pacing.max_stalled_pages
                ));
            }

            sleep(self.pacing.search_delay()).await;
        }
    }

    async fn search_page(&mut self) -> Result<SearchResult, ApiError> {
        let api = self.api.as_ref();
        let channel_id = self.channel_id.as_str();
        let author_id = self.author_id.as_str();
        let cursor = self.cursor.as_deref();

        debug!("Searching messages before {:?}", cursor);

        call_with_backoff(
            &mut self.gate,
            &mut self.stats,
            &mut self.logs,
            self.pacing.max_retries,
            "search",
            || api.search_messages(channel_id, author_id, cursor),
        )
        .await
    }

    async fn delete_message(&mut self, message_id: &str) -> Result<(), ApiError> {
        let api = self.api.as_ref();
        let channel_id = self.channel_id.as_str();
        let operation = format!("delete {}", message_id);

        call_with_backoff(
            &mut self.gate,
            &mut self.stats,
            &mut self.logs,
            self.pacing.max_retries,
            &operation,
            || api.delete_message(channel_id, message_id),
        )
        .await
    }

    /// Handles every message of one page. Returns true if at least one
    /// message was deleted (or would have been, in dry-run mode).
    async fn process_page(&mut self, page: &SearchResult) -> bool {
        let mut progressed = false;

        for message in page.iter_messages() {
            if message.is_system() {
                debug!("Skipping system message {}", message.id);
                continue;
            }
            if !message.is_deletable_by(&self.author_id) {
                debug!("Skipping context message {}", message.id);
                continue;
            }

            if self.process_message(message).await {
                progressed = true;
            }
        }

        progressed
    }

    async fn process_message(&mut self, message: &Message) -> bool {
        let total = self.stats.grand_total.unwrap_or_default();
        self.logs.event(&format!(
            "[{:.2}%] Deleting message {} ({}/{})",
            self.stats.progress_percent(),
            message.id,
            self.stats.deleted + 1,
            total
        ));

        if let Err(e) = self.logs.backup(message) {
            self.logs.error(&format!("{:#}, message left untouched", e));
            self.stats.failed += 1;
            return false;
        }

        if self.dry_run {
            self.logs.event(&format!("🧪 Would delete message {}", message.id));
            self.stats.deleted += 1;
            self.advance_cursor(&message.id);
            return true;
        }

        match self.delete_message(&message.id).await {
            Ok(()) => {
                self.stats.deleted += 1;
                self.advance_cursor(&message.id);
                self.logs.event(&format!("✅ Deleted message {}", message.id));
                sleep(self.pacing.delete_delay()).await;
                true
            }
            Err(e) => {
                self.stats.failed += 1;
                self.logs.error(&format!("Failed to delete message {}: {}", message.id, e));
                false
            }
        }
    }

    /// Moves the cursor to `message_id` unless that would move it to a newer
    /// message. IDs that are not numeric snowflakes are taken as-is.
    fn advance_cursor(&mut self, message_id: &str) {
        let current = self.cursor.as_deref().and_then(|c| c.parse::<u64>().ok());
        let candidate = message_id.parse::<u64>().ok();

        match (current, candidate) {
            (Some(current), Some(candidate)) if candidate >= current => {
                debug!("Cursor kept at {} (message {} is newer)", current, message_id);
            }
            _ => self.cursor = Some(message_id.to_string()),
        }
    }

    /// Writes the end-of-session summary. Shared by normal completion,
    /// fatal errors and interruption.
    pub fn report_summary(&mut self) {
        let stats = &self.stats;
        let backup_path = self.logs.backup_path().display().to_string();

        self.logs.event(&format!("{} Session summary {}", "=".repeat(20), "=".repeat(20)));
        self.logs.event(&format!("End time: {}", Local::now().format("%Y-%m-%d %H:%M:%S")));
        self.logs.event(&format!("Total time: {}", format_hms(stats.elapsed())));
        self.logs.event(&format!(
            "Throttled: {} time(s), total wait {}",
            stats.throttled,
            format_hms(stats.throttled_time)
        ));
        if self.dry_run {
            self.logs.event(&format!("Would delete (dry run): {}", stats.deleted));
        } else {
            self.logs.event(&format!("Deleted: {}", stats.deleted));
        }
        self.logs.event(&format!("Failed: {}", stats.failed));
        self.logs.event(&format!("Backup file: {}", backup_path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::ApiReply;
    use async_trait::async_trait;

    struct NeverCalled;

    #[async_trait]
    impl ChatApi for NeverCalled {
        async fn search_messages(
            &self,
            _channel_id: &str,
            _author_id: &str,
            _max_id: Option<&str>,
        ) -> Result<ApiReply<SearchResult>, ApiError> {
            unreachable!()
        }

        async fn delete_message(
            &self,
            _channel_id: &str,
            _message_id: &str,
        ) -> Result<ApiReply<()>, ApiError> {
            unreachable!()
        }
    }

    fn runner(before: Option<&str>) -> (tempfile::TempDir, DeletionRunner) {
        let dir = tempfile::tempdir().unwrap();
        let logs = RunLogs::create(dir.path()).unwrap();
        let target = TargetConfig {
            channel_id: "1001".to_string(),
            author_id: "42".to_string(),
            before_message_id: before.map(str::to_string),
        };
        let runner = DeletionRunner::new(Arc::new(NeverCalled), &target, PacingConfig::default(), logs);
        (dir, runner)
    }

    #[test]
    fn test_cursor_only_moves_to_older_snowflakes() {
        let (_dir, mut runner) = runner(Some("500"));

        runner.advance_cursor("400");
        assert_eq!(runner.cursor(), Some("400"));

        runner.advance_cursor("450");
        assert_eq!(runner.cursor(), Some("400"));
    }

    #[test]
    fn test_cursor_starts_unset_and_accepts_any_id() {
        let (_dir, mut runner) = runner(None);
        assert_eq!(runner.cursor(), None);

        runner.advance_cursor("m1");
        assert_eq!(runner.cursor(), Some("m1"));
    }
}
