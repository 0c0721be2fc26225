//! Bounded, newest-first record of everything the user-facing surface shows.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local, SubsecRound};
use serde_json::Value;

pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    id: String,
    timestamp: DateTime<Local>,
    severity: Severity,
    message: String,
    raw_response: Option<Value>,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>, raw_response: Option<Value>) -> Self {
        let now = Local::now();
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{}-{seq}", now.timestamp_millis()),
            timestamp: now.trunc_subsecs(0),
            severity,
            message: message.into(),
            raw_response,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message, None)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn raw_response(&self) -> Option<&Value> {
        self.raw_response.as_ref()
    }
}

/// Observer notified after every append.
pub trait LogSink: Send + Sync {
    fn entry_appended(&self, entry: &LogEntry);
}

/// Cheap to clone; all clones share the same entries.
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
    sink: Option<Arc<dyn LogSink>>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity + 1))),
            capacity: capacity.max(1),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn append(&self, entry: LogEntry) {
        {
            let mut entries = self.lock();
            entries.push_front(entry.clone());
            entries.truncate(self.capacity);
        }
        if let Some(sink) = &self.sink {
            sink.entry_appended(&entry);
        }
    }

    pub fn push(&self, severity: Severity, message: impl Into<String>, raw_response: Option<Value>) {
        self.append(LogEntry::new(severity, message, raw_response));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(LogEntry::info(message));
    }

    pub fn clear(&self) {
        let notice = LogEntry::info("Logs cleared");
        {
            let mut entries = self.lock();
            entries.clear();
            entries.push_front(notice.clone());
        }
        if let Some(sink) = &self.sink {
            sink.entry_appended(&notice);
        }
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
