use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v9";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub target: TargetConfig,
    pub pacing: PacingConfig,
    pub log_dir: String,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub auth_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    pub channel_id: String,
    pub author_id: String,
    /// Only messages older than this ID are searched
    pub before_message_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PacingConfig {
    /// Minimum spacing between two outbound API calls, search and delete alike
    pub min_call_interval_ms: u64,
    pub delete_delay_ms: u64,
    pub search_delay_ms: u64,
    /// None retries 202/429 forever
    pub max_retries: Option<u32>,
    /// Consecutive pages without a single deletion before the run gives up
    pub max_stalled_pages: u32,
}

impl PacingConfig {
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    pub fn delete_delay(&self) -> Duration {
        Duration::from_millis(self.delete_delay_ms)
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_call_interval_ms: 1000,
            delete_delay_ms: 1000,
            search_delay_ms: 2000,
            max_retries: None,
            max_stalled_pages: 3,
        }
    }
}

const REQUIRED_VARS: [&str; 3] = ["AUTH_TOKEN", "AUTHOR_ID", "CHANNEL_ID"];

impl Config {
    /// Builds the configuration from any key/value source (the process
    /// environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Check the essential variables first
        Self::check_required_vars(&lookup)?;

        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = PacingConfig::default();

        Ok(Config {
            api: ApiConfig {
                base_url: optional("API_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
                auth_token: required("AUTH_TOKEN")?,
            },
            target: TargetConfig {
                channel_id: required("CHANNEL_ID")?,
                author_id: required("AUTHOR_ID")?,
                before_message_id: optional("BEFORE_MESSAGE_ID"),
            },
            pacing: PacingConfig {
                min_call_interval_ms: parse_or("MIN_CALL_INTERVAL_MS", optional("MIN_CALL_INTERVAL_MS"), defaults.min_call_interval_ms)?,
                delete_delay_ms: parse_or("DELETE_DELAY_MS", optional("DELETE_DELAY_MS"), defaults.delete_delay_ms)?,
                search_delay_ms: parse_or("SEARCH_DELAY_MS", optional("SEARCH_DELAY_MS"), defaults.search_delay_ms)?,
                max_retries: optional("MAX_RETRIES")
                    .map(|raw| {
                        raw.trim()
                            .parse()
                            .with_context(|| format!("MAX_RETRIES is not a valid number: {}", raw))
                    })
                    .transpose()?,
                max_stalled_pages: parse_or("MAX_STALLED_PAGES", optional("MAX_STALLED_PAGES"), defaults.max_stalled_pages)?,
            },
            log_dir: optional("LOG_DIR").unwrap_or_else(|| "./logs".to_string()),
            dry_run: parse_or("DRY_RUN", optional("DRY_RUN"), false)?,
        })
    }

    fn check_required_vars<F>(lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing_vars: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|var| lookup(*var).map_or(true, |v| v.trim().is_empty()))
            .collect();

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Missing environment variables: {}\n\
                 \n\
                 💡 Solutions:\n\
                 1. Create a .env file next to the binary:\n\
                    AUTH_TOKEN=...\n\
                    AUTHOR_ID=...\n\
                    CHANNEL_ID=...\n\
                 \n\
                 2. Or export them manually:\n\
                    export AUTH_TOKEN=your-token\n\
                    export AUTHOR_ID=123456789012345678\n\
                    export CHANNEL_ID=123456789012345678\n\
                    cargo run -- --check-config",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }

    /// Token with everything but the last four characters hidden, for display.
    pub fn masked_token(&self) -> String {
        let token = &self.api.auth_token;
        let visible: String = token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}{}", "*".repeat(token.chars().count().saturating_sub(4)), visible)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
