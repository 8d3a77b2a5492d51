// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log entry structure

use super::{Facility, Severity};

/// Maximum message length kept in an entry
pub const MAX_MESSAGE_LEN: usize = 512;
/// Maximum number of key-value pairs kept in an entry
pub const MAX_KVS: usize = 2;

/// Key-value pair for structured logging
#[derive(Clone, PartialEq, Eq)]
pub struct KeyValue {
    key: String,
    value: String,
}

impl KeyValue {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A single log record as handed to a sink
#[derive(Clone)]
pub struct LogEntry {
    pub severity: Severity,
    pub facility: Facility,
    pub timestamp_ns: u64,
    pub thread_name: Option<String>,
    message: String,
    kvs: Vec<KeyValue>,
}

impl LogEntry {
    pub fn new(severity: Severity, facility: Facility, message: &str) -> Self {
        let mut entry = Self {
            severity,
            facility,
            timestamp_ns: monotonic_nanos(),
            thread_name: std::thread::current().name().map(str::to_string),
            message: String::new(),
            kvs: Vec::new(),
        };
        entry.set_message(message);
        entry
    }

    /// Set message, truncating on a char boundary at MAX_MESSAGE_LEN bytes
    fn set_message(&mut self, message: &str) {
        let mut end = message.len().min(MAX_MESSAGE_LEN);
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        self.message = message[..end].to_string();
    }

    pub fn get_message(&self) -> &str {
        &self.message
    }

    /// Add a key-value pair (max 2 pairs)
    pub fn add_kv(&mut self, key: &str, value: &str) {
        if self.kvs.len() < MAX_KVS {
            self.kvs.push(KeyValue::new(key, value));
        }
    }

    pub fn get_kvs(&self) -> &[KeyValue] {
        &self.kvs
    }
}

impl std::fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("LogEntry");
        debug
            .field("severity", &self.severity)
            .field("facility", &self.facility)
            .field("message", &self.get_message());

        if !self.kvs.is_empty() {
            debug.field("kvs", &self.get_kvs());
        }

        debug.finish()
    }
}

/// Get monotonic nanoseconds since the first log entry of the process
fn monotonic_nanos() -> u64 {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = LogEntry::new(Severity::Info, Facility::Controller, "Test message");
        assert_eq!(entry.severity, Severity::Info);
        assert_eq!(entry.facility, Facility::Controller);
        assert_eq!(entry.get_message(), "Test message");
    }

    #[test]
    fn test_message_truncation() {
        let very_long = "a".repeat(MAX_MESSAGE_LEN + 100);
        let entry = LogEntry::new(Severity::Info, Facility::Controller, &very_long);
        assert_eq!(entry.get_message().len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let mut msg = "a".repeat(MAX_MESSAGE_LEN - 1);
        msg.push('é');
        let entry = LogEntry::new(Severity::Info, Facility::Controller, &msg);
        assert_eq!(entry.get_message().len(), MAX_MESSAGE_LEN - 1);
    }

    #[test]
    fn test_max_kvs() {
        let mut entry = LogEntry::new(Severity::Info, Facility::Ingress, "Test");
        entry.add_kv("dev", "0");
        entry.add_kv("queue", "0");
        entry.add_kv("extra", "ignored");

        assert_eq!(entry.get_kvs().len(), 2);
        assert_eq!(entry.get_kvs()[0].key(), "dev");
        assert_eq!(entry.get_kvs()[1].value(), "0");
    }
}
