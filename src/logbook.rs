//! Run log sink used by the workflow engine

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// Severity of a run log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Fire-and-forget sink for run progress
///
/// Implementations must never fail or block the run.
pub trait RunLogger: Send + Sync {
    fn log(&self, message: &str, level: LogLevel);
}

fn emit(message: &str, level: LogLevel) {
    match level {
        LogLevel::Info => tracing::info!("{message}"),
        LogLevel::Success => tracing::info!(outcome = "success", "{message}"),
        LogLevel::Warn => tracing::warn!("{message}"),
        LogLevel::Error => tracing::error!("{message}"),
    }
}

/// Forwards run events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl RunLogger for TracingLogger {
    fn log(&self, message: &str, level: LogLevel) {
        emit(message, level);
    }
}

/// A recorded log event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

/// Bounded in-memory log, newest entry first
///
/// Entries are also forwarded to `tracing`.
#[derive(Debug)]
pub struct LogBook {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl LogBook {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Most recent entries first, optionally filtered by level
    pub fn entries(&self, level: Option<LogLevel>, limit: usize) -> Vec<LogEntry> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|e| level.is_none_or(|l| e.level == l))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for LogBook {
    fn default() -> Self {
        Self::new(500)
    }
}

impl RunLogger for LogBook {
    fn log(&self, message: &str, level: LogLevel) {
        emit(message, level);

        // A poisoned lock loses the entry rather than the run
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.push_front(LogEntry {
            timestamp: Local::now(),
            level,
            message: message.to_string(),
        });
        entries.truncate(self.capacity);
    }
}
