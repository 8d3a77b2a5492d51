// SPDX-License-Identifier: Apache-2.0 OR MIT
// Output sinks for log entries

use super::entry::LogEntry;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Output sink for log entries
///
/// Sinks are shared between every clone of a [`Logger`](super::Logger), and the
/// pipeline driver threads all log through the same sink, so writes take `&self`.
pub trait LogSink: Send + Sync {
    fn write_entry(&self, entry: &LogEntry);

    fn flush(&self) {}
}

/// Plain-text stderr sink
///
/// Format: `[SEVERITY] [Facility] message key1=value1 key2=value2`
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write_entry(&self, entry: &LogEntry) {
        let kvs = entry.get_kvs();
        let mut stderr = std::io::stderr().lock();
        if kvs.is_empty() {
            let _ = writeln!(
                stderr,
                "[{}] [{}] {}",
                entry.severity,
                entry.facility.as_str(),
                entry.get_message()
            );
        } else {
            let kv_str: Vec<String> = kvs.iter().map(|kv| format!("{:?}", kv)).collect();
            let _ = writeln!(
                stderr,
                "[{}] [{}] {} {}",
                entry.severity,
                entry.facility.as_str(),
                entry.get_message(),
                kv_str.join(" ")
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// JSON-lines stderr sink, one object per entry
pub struct StderrJsonSink;

impl LogSink for StderrJsonSink {
    fn write_entry(&self, entry: &LogEntry) {
        let mut log_msg = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": entry.severity.as_str(),
            "facility": entry.facility.as_str(),
            "message": entry.get_message(),
        });
        if let Some(name) = &entry.thread_name {
            log_msg["thread"] = serde_json::Value::from(name.as_str());
        }
        for kv in entry.get_kvs() {
            log_msg[kv.key()] = serde_json::Value::from(kv.value());
        }
        eprintln!("{}", log_msg);
    }
}

/// In-memory sink that keeps every entry; used by tests to assert on log output
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// True if any captured message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.get_message().contains(needle))
    }
}

impl LogSink for MemorySink {
    fn write_entry(&self, entry: &LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
    }
}
