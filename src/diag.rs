//! In-memory diagnostic log ring.
//!
//! Records retryable transport failures and recoveries so the user can
//! inspect them with `/logs` without scrolling the chat. Fixed capacity,
//! FIFO eviction: when full, inserting drops the oldest entry. This is a
//! bound, not a priority structure.
//!
//! The ring is process-wide shared state mutated from every subscription
//! task; a plain mutex around the deque is all the coordination it needs.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Local};

/// Default number of entries the ring retains.
pub const LOG_CAPACITY: usize = 50;

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
    Critical,
    Success,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Success => write!(f, "SUCCESS"),
        }
    }
}

/// One diagnostic entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

/// Thread-safe fixed-capacity diagnostic log.
pub struct DiagnosticLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl DiagnosticLog {
    /// Create a ring with the default capacity of [`LOG_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    /// Create a ring with a custom capacity (must be non-zero).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, evicting the oldest if the ring is full.
    pub fn record(&self, severity: Severity, message: impl Into<String>) {
        let entry = LogEntry {
            severity,
            message: message.into(),
            timestamp: Local::now(),
        };
        match severity {
            Severity::Error | Severity::Critical => {
                tracing::warn!(severity = %severity, "{}", entry.message);
            }
            _ => tracing::debug!(severity = %severity, "{}", entry.message),
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The most recent `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}
