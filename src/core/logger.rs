//! Narration of every state transition of the locking protocol
//!
//! Events are handed to a background writer thread over a channel, so callers
//! can log while holding the lock table without blocking on I/O. The writer
//! prints colored lines to the console and/or appends JSON lines to a file.

use crate::core::types::{Events, InstanceId, ResourceId, TxnId};
use anyhow::{Context, Result};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const RESET: &str = "\x1b[0m";

/// Structure for a single log entry
#[derive(Debug, Serialize, Clone)]
pub struct LogEntry {
    /// Transaction the event is about (absent for detector-only events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<TxnId>,
    /// Instance of that transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceId>,
    /// Restart count of that instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// Resource involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceId>,
    /// Resource name, for narration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// Cycle members for deadlock events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Vec<TxnId>>,
    /// Type of event that occurred
    pub event: Events,
    /// Absolute timestamp of when the event occurred (seconds since Unix Epoch)
    pub timestamp: f64,
}

impl LogEntry {
    pub fn new(event: Events) -> Self {
        let now = Utc::now();
        let timestamp = now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0;
        LogEntry {
            txn_id: None,
            instance: None,
            attempt: None,
            resource: None,
            resource_name: None,
            cycle: None,
            event,
            timestamp,
        }
    }

    pub fn txn(mut self, id: TxnId, instance: InstanceId, attempt: u32) -> Self {
        self.txn_id = Some(id);
        self.instance = Some(instance);
        self.attempt = Some(attempt);
        self
    }

    pub fn resource(mut self, id: ResourceId, name: &str) -> Self {
        self.resource = Some(id);
        self.resource_name = Some(name.to_string());
        self
    }

    pub fn cycle(mut self, cycle: Vec<TxnId>) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Human readable line for the console
    pub fn narration(&self) -> String {
        let id = self
            .txn_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        let resource = self.resource_name.as_deref().unwrap_or("?");
        match self.event {
            Events::Started => format!(
                "Transaction [{id}] started (attempt {}).",
                self.attempt.unwrap_or(0)
            ),
            Events::Waiting => format!("Transaction [{id}] is waiting for resource {resource}."),
            Events::Acquired => format!("Transaction [{id}] acquired resource {resource}."),
            Events::AcquiredAfterWait => {
                format!("Transaction [{id}] acquired resource {resource} after waiting.")
            }
            Events::Released => format!("Transaction [{id}] released resource {resource}."),
            Events::Committed => format!("Transaction [{id}] committed successfully."),
            Events::DeadlockDetected => {
                let members = self
                    .cycle
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|t| format!("[{t}]"))
                    .collect::<Vec<_>>()
                    .join(" and ");
                format!("Deadlock detected between transactions {members}.")
            }
            Events::Aborted => format!("Aborting transaction [{id}]."),
            Events::AbortedMidFlight => format!("Transaction [{id}] aborted mid-execution."),
            Events::Restarting => format!("Restarting transaction [{id}]."),
            Events::RestartSkipped => {
                format!("Transaction [{id}] already committed, restart skipped.")
            }
            Events::GaveUp => format!(
                "Transaction [{id}] gave up after {} restarts.",
                self.attempt.unwrap_or(0)
            ),
        }
    }
}

/// Commands for controlling the async logger thread
#[derive(Debug)]
pub enum LoggerCommand {
    /// Write a log entry
    LogEntry(LogEntry),
    /// Flush all pending entries and signal completion
    Flush(Sender<()>),
}

/// Event logger for recording protocol transitions
///
/// With no sink configured the logger is disabled and `log` is a no-op.
pub struct EventLogger {
    sender: Option<Sender<LoggerCommand>>,
    path: Option<PathBuf>,
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("Warning: Failed to flush logs during EventLogger drop: {e:?}");
        }
    }
}

impl EventLogger {
    /// A logger that drops every event
    pub fn disabled() -> Self {
        EventLogger {
            sender: None,
            path: None,
        }
    }

    /// Create a logger with the given sinks
    ///
    /// # Arguments
    /// * `console` - Print colored narration to stdout
    /// * `path` - Optional JSON-lines log file. If the filename contains
    ///   "{timestamp}", it will be replaced with the current timestamp.
    ///
    /// # Errors
    /// Returns an error if the log directory or file cannot be created, or
    /// the writer thread cannot be spawned
    pub fn new<P: AsRef<Path>>(console: bool, path: Option<P>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(open_log_file(path.as_ref())?),
            None => None,
        };

        if !console && file.is_none() {
            return Ok(Self::disabled());
        }

        let path = file.as_ref().map(|(p, _)| p.clone());
        let (tx, rx) = unbounded::<LoggerCommand>();
        thread::Builder::new()
            .name("event-logger".into())
            .spawn(move || async_logger_thread(console, file.map(|(_, f)| f), rx))
            .context("Failed to spawn logger thread")?;

        Ok(EventLogger {
            sender: Some(tx),
            path,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Path of the JSON log file, after placeholder substitution
    pub fn log_file(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Hand an entry to the writer thread
    pub fn log(&self, entry: LogEntry) {
        if let Some(sender) = &self.sender
            && let Err(e) = sender.send(LoggerCommand::LogEntry(entry))
        {
            eprintln!("Failed to send log entry: {e:?}");
        }
    }

    /// Block until every entry sent so far has been written
    ///
    /// # Errors
    /// Returns an error if the writer thread is gone or does not answer
    pub fn flush(&self) -> Result<()> {
        let Some(sender) = &self.sender else {
            return Ok(());
        };
        let (flush_tx, flush_rx) = crossbeam_channel::bounded(1);
        sender
            .send(LoggerCommand::Flush(flush_tx))
            .context("Logger thread is gone")?;
        flush_rx
            .recv_timeout(Duration::from_secs(10))
            .context("Flush operation timed out")
    }
}

fn open_log_file(path: &Path) -> Result<(PathBuf, File)> {
    // Replace timestamp placeholder if present
    #[allow(clippy::literal_string_with_formatting_args)]
    let file_path = if path.to_string_lossy().contains("{timestamp}") {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(
            path.to_string_lossy()
                .replace("{timestamp}", &timestamp.to_string()),
        )
    } else {
        path.to_path_buf()
    };

    if let Some(parent) = file_path.parent()
        && parent.to_string_lossy() != ""
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&file_path)
        .with_context(|| format!("Failed to open log file {}", file_path.display()))?;
    Ok((file_path, file))
}

/// Writer thread: drains the channel until every sender is dropped
fn async_logger_thread(console: bool, file: Option<File>, rx: Receiver<LoggerCommand>) {
    let mut writer = file.map(BufWriter::new);

    while let Ok(cmd) = rx.recv() {
        match cmd {
            LoggerCommand::LogEntry(entry) => {
                if console {
                    println!("{}{}{RESET}", entry.event.color(), entry.narration());
                }
                if let Some(writer) = writer.as_mut()
                    && let Ok(json) = serde_json::to_string(&entry)
                    && let Err(e) = writeln!(writer, "{json}")
                {
                    eprintln!("Logger write error: {e:?}");
                }
            }
            LoggerCommand::Flush(responder) => {
                if let Some(writer) = writer.as_mut()
                    && let Err(e) = writer.flush()
                {
                    eprintln!("Logger flush error: {e:?}");
                }
                let _ = responder.send(());
            }
        }
    }

    if let Some(writer) = writer.as_mut()
        && let Err(e) = writer.flush()
    {
        eprintln!("Logger final flush error: {e:?}");
    }
}
