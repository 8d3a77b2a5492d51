// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger handle with global and per-facility level filtering

use super::entry::LogEntry;
use super::sink::{LogSink, MemorySink, StderrJsonSink, StderrSink};
use super::{Facility, Severity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

/// Logger handle for writing log entries
///
/// This is a lightweight handle that can be cloned and passed around; every
/// element of a pipeline and the controller hold one. Level filters are shared
/// between clones, so changing the level on one handle affects all of them.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    /// Global minimum log level (default: Info)
    global_min_level: Arc<AtomicU8>,
    /// Per-facility minimum log levels
    facility_min_levels: Arc<RwLock<HashMap<Facility, Severity>>>,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>, level: Severity) -> Self {
        Self {
            sink,
            global_min_level: Arc::new(AtomicU8::new(level as u8)),
            facility_min_levels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Logger writing one JSON object per line to stderr
    pub fn stderr_json(level: Severity) -> Self {
        Self::new(Arc::new(StderrJsonSink), level)
    }

    /// Logger writing plain text to stderr
    pub fn stderr(level: Severity) -> Self {
        Self::new(Arc::new(StderrSink), level)
    }

    /// Logger capturing entries in memory, returned alongside the capture sink
    pub fn memory(level: Severity) -> (Self, MemorySink) {
        let sink = MemorySink::new();
        (Self::new(Arc::new(sink.clone()), level), sink)
    }

    /// Check if a log message should be written based on severity filtering
    #[inline]
    fn should_log(&self, severity: Severity, facility: Facility) -> bool {
        // Facility-specific level, if set, overrides global
        if let Ok(levels) = self.facility_min_levels.read() {
            if let Some(&min_level) = levels.get(&facility) {
                return severity <= min_level;
            }
        }

        let global_min = self.global_min_level.load(Ordering::Relaxed);
        (severity as u8) <= global_min
    }

    #[inline]
    pub fn log(&self, severity: Severity, facility: Facility, message: &str) {
        if !self.should_log(severity, facility) {
            return;
        }
        self.sink.write_entry(&LogEntry::new(severity, facility, message));
    }

    /// Write a log entry with key-value pairs (at most two are kept)
    #[inline]
    pub fn log_kv(
        &self,
        severity: Severity,
        facility: Facility,
        message: &str,
        kvs: &[(&str, &str)],
    ) {
        if !self.should_log(severity, facility) {
            return;
        }

        let mut entry = LogEntry::new(severity, facility, message);
        for (key, value) in kvs.iter() {
            entry.add_kv(key, value);
        }
        self.sink.write_entry(&entry);
    }

    #[inline]
    pub fn emergency(&self, facility: Facility, message: &str) {
        self.log(Severity::Emergency, facility, message);
    }

    #[inline]
    pub fn alert(&self, facility: Facility, message: &str) {
        self.log(Severity::Alert, facility, message);
    }

    #[inline]
    pub fn critical(&self, facility: Facility, message: &str) {
        self.log(Severity::Critical, facility, message);
    }

    #[inline]
    pub fn error(&self, facility: Facility, message: &str) {
        self.log(Severity::Error, facility, message);
    }

    #[inline]
    pub fn warning(&self, facility: Facility, message: &str) {
        self.log(Severity::Warning, facility, message);
    }

    #[inline]
    pub fn notice(&self, facility: Facility, message: &str) {
        self.log(Severity::Notice, facility, message);
    }

    #[inline]
    pub fn info(&self, facility: Facility, message: &str) {
        self.log(Severity::Info, facility, message);
    }

    #[inline]
    pub fn debug(&self, facility: Facility, message: &str) {
        self.log(Severity::Debug, facility, message);
    }

    #[inline]
    pub fn trace(&self, facility: Facility, message: &str) {
        self.log(Severity::Trace, facility, message);
    }

    pub fn flush(&self) {
        self.sink.flush();
    }

    pub fn set_global_level(&self, level: Severity) {
        self.global_min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn global_level(&self) -> Severity {
        Severity::from_u8(self.global_min_level.load(Ordering::Relaxed)).unwrap_or(Severity::Info)
    }

    pub fn set_facility_level(&self, facility: Facility, level: Severity) {
        if let Ok(mut levels) = self.facility_min_levels.write() {
            levels.insert(facility, level);
        }
    }

    /// Clear the facility-specific log level (fall back to global)
    pub fn clear_facility_level(&self, facility: Facility) {
        if let Ok(mut levels) = self.facility_min_levels.write() {
            levels.remove(&facility);
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("global_level", &self.global_level())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_log_level_filtering() {
        let (logger, sink) = Logger::memory(Severity::Warning);
        logger.error(Facility::Test, "kept");
        logger.warning(Facility::Test, "kept too");
        logger.info(Facility::Test, "filtered");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert!(!sink.contains("filtered"));
    }

    #[test]
    fn test_facility_level_overrides_global() {
        let (logger, sink) = Logger::memory(Severity::Error);
        logger.set_facility_level(Facility::Ingress, Severity::Debug);

        logger.debug(Facility::Ingress, "ingress debug");
        logger.debug(Facility::Egress, "egress debug");
        assert!(sink.contains("ingress debug"));
        assert!(!sink.contains("egress debug"));

        logger.clear_facility_level(Facility::Ingress);
        logger.debug(Facility::Ingress, "after clear");
        assert!(!sink.contains("after clear"));
    }

    #[test]
    fn test_clones_share_levels() {
        let (logger, sink) = Logger::memory(Severity::Info);
        let clone = logger.clone();
        logger.set_global_level(Severity::Trace);
        clone.trace(Facility::Test, "trace via clone");
        assert!(sink.contains("trace via clone"));
        assert_eq!(clone.global_level(), Severity::Trace);
    }

    #[test]
    fn test_logger_with_kvs() {
        let (logger, sink) = Logger::memory(Severity::Info);
        logger.log_kv(
            Severity::Info,
            Facility::Test,
            "with context",
            &[("dev", "0"), ("queue", "0")],
        );
        let entries = sink.entries();
        assert_eq!(entries[0].get_kvs().len(), 2);
    }
}
