use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{error, info, warn};

use crate::models::Message;

/// The three append-only artifacts of a run: operation log, error log and
/// backup of every message considered for deletion.
pub struct RunLogs {
    operations: LogFile,
    errors: LogFile,
    backup: LogFile,
}

struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    fn create(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Unable to open log file {}", path.display()))?;
        Ok(LogFile { path, file })
    }

    fn write_block(&mut self, text: &str) -> std::io::Result<()> {
        self.file.write_all(text.as_bytes())?;
        self.file.flush()
    }
}

impl RunLogs {
    /// Creates `operations_<stamp>.log`, `errors_<stamp>.log` and
    /// `backup_<stamp>.txt` inside `dir`.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Unable to create log directory {}", dir.display()))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");

        Ok(RunLogs {
            operations: LogFile::create(dir.join(format!("operations_{}.log", stamp)))?,
            errors: LogFile::create(dir.join(format!("errors_{}.log", stamp)))?,
            backup: LogFile::create(dir.join(format!("backup_{}.txt", stamp)))?,
        })
    }

    pub fn operations_path(&self) -> &Path {
        &self.operations.path
    }

    pub fn errors_path(&self) -> &Path {
        &self.errors.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup.path
    }

    /// Appends a timestamped line to the operation log and echoes it to the console.
    pub fn event(&mut self, message: &str) {
        info!("{}", message);
        self.append_operation(message);
    }

    /// Same as [`RunLogs::event`] but echoed at warning level
    pub fn notice(&mut self, message: &str) {
        warn!("{}", message);
        self.append_operation(message);
    }

    /// Records an error in both the error log and the operation log.
    pub fn error(&mut self, message: &str) {
        error!("{}", message);
        let line = timestamped(message);
        if let Err(e) = self.errors.write_block(&line) {
            warn!("Unable to write to {}: {}", self.errors.path.display(), e);
        }
        self.append_operation(&format!("ERROR: {}", message));
    }

    fn append_operation(&mut self, message: &str) {
        let line = timestamped(message);
        if let Err(e) = self.operations.write_block(&line) {
            warn!("Unable to write to {}: {}", self.operations.path.display(), e);
        }
    }

    pub fn write_backup_header(&mut self, channel_id: &str, author_id: &str) -> Result<()> {
        let header = format!(
            "Message backup\nRun: {}\nChannel: {}\nAuthor: {}\n{}\n\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            channel_id,
            author_id,
            "=".repeat(60)
        );
        self.backup
            .write_block(&header)
            .with_context(|| format!("Unable to write backup header to {}", self.backup.path.display()))
    }

    /// Appends the full record of `message`. Must succeed before the message is deleted.
    pub fn backup(&mut self, message: &Message) -> Result<()> {
        let record = backup_record(message);
        self.backup
            .write_block(&record)
            .with_context(|| format!("Unable to back up message {}", message.id))
    }
}

fn timestamped(message: &str) -> String {
    format!("[{}] {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
}

fn human_date(timestamp: Option<&str>) -> String {
    match timestamp {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(date) => date.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
            Err(_) => raw.to_string(),
        },
        None => "Unknown date".to_string(),
    }
}

/// Plain-text backup entry for one message
pub fn backup_record(message: &Message) -> String {
    let mut record = format!(
        "Message ID: {}\nDate: {}\nAuthor: {}\n",
        message.id,
        human_date(message.timestamp.as_deref()),
        message.author.display_name()
    );

    match message.content.as_deref() {
        Some(content) if !content.is_empty() => {
            record.push_str(&format!("Content:\n{}\n", content));
        }
        _ => record.push_str("Content: [no content]\n"),
    }

    if !message.attachments.is_empty() {
        record.push_str("Attachments:\n");
        for (index, attachment) in message.attachments.iter().enumerate() {
            record.push_str(&format!("  {}. {}\n", index + 1, attachment.url));
        }
    }

    record.push_str(&format!("{}\n\n", "-".repeat(60)));
    record
}
