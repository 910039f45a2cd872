use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

use msgpurge::api_client::HttpChatApi;
use msgpurge::config::Config;
use msgpurge::deletion_runner::{DeletionRunner, RunOutcome};
use msgpurge::run_log::RunLogs;

#[derive(Parser)]
#[command(name = "msgpurge")]
#[command(about = "Bulk-delete your own messages from one chat channel, with a plain-text backup")]
#[command(version)]
struct Args {
    /// Channel to clean up (overrides CHANNEL_ID)
    #[arg(short, long)]
    channel: Option<String>,

    /// Author whose messages are deleted (overrides AUTHOR_ID)
    #[arg(short, long)]
    author: Option<String>,

    /// Only delete messages older than this message ID (overrides BEFORE_MESSAGE_ID)
    #[arg(short, long)]
    before: Option<String>,

    /// Directory for the operation, error and backup logs (overrides LOG_DIR)
    #[arg(short = 'o', long)]
    log_dir: Option<String>,

    /// Back up and count matching messages without deleting them
    #[arg(long)]
    dry_run: bool,

    /// Check the configuration without contacting the API
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_lookup(|key| {
        args.override_for(key)
            .or_else(|| std::env::var(key).ok())
    })?;

    if args.check_config {
        println!("✅ Configuration valid!");
        println!("🌐 API: {}", config.api.base_url);
        println!("🔑 Token: {}", config.masked_token());
        println!("💬 Channel: {}", config.target.channel_id);
        println!("👤 Author: {}", config.target.author_id);
        if let Some(before) = &config.target.before_message_id {
            println!("⏮️  Before message: {}", before);
        }
        println!(
            "⏱️  Pacing: {} ms between calls, {} ms after each delete, {} ms between searches",
            config.pacing.min_call_interval_ms,
            config.pacing.delete_delay_ms,
            config.pacing.search_delay_ms
        );
        match config.pacing.max_retries {
            Some(max) => println!("🔁 Throttle retries: at most {}", max),
            None => println!("🔁 Throttle retries: unbounded"),
        }
        println!("🧱 Stops after {} page(s) in a row without a deletion", config.pacing.max_stalled_pages);
        println!("📁 Log directory: {}", config.log_dir);
        return Ok(());
    }

    if config.dry_run {
        info!("🧪 Starting msgpurge in DRY-RUN mode, nothing will be deleted");
    } else {
        info!("🚀 Starting msgpurge");
    }

    let api = HttpChatApi::new(&config.api).context("Unable to build HTTP client")?;
    let logs = RunLogs::create(&config.log_dir)?;
    info!("📝 Operation log: {}", logs.operations_path().display());
    info!("📝 Error log: {}", logs.errors_path().display());
    info!("💾 Backup file: {}", logs.backup_path().display());

    let mut runner = DeletionRunner::new(Arc::new(api), &config.target, config.pacing.clone(), logs)
        .with_dry_run(config.dry_run);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match runner.run_until(shutdown).await {
        Ok(RunOutcome::Interrupted) => {
            info!("👋 Session interrupted, summary written");
            Ok(())
        }
        Ok(outcome) => {
            info!("✅ Session finished ({:?})", outcome);
            Ok(())
        }
        Err(e) => {
            error!("❌ Session failed: {:#}", e);
            Err(e)
        }
    }
}

impl Args {
    /// Command-line value standing in for the environment variable `key`
    fn override_for(&self, key: &str) -> Option<String> {
        match key {
            "CHANNEL_ID" => self.channel.clone(),
            "AUTHOR_ID" => self.author.clone(),
            "BEFORE_MESSAGE_ID" => self.before.clone(),
            "LOG_DIR" => self.log_dir.clone(),
            "DRY_RUN" if self.dry_run => Some("true".to_string()),
            _ => None,
        }
    }
}
