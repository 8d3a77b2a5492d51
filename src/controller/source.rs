// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Where pipeline configuration text comes from

use crate::log_warning;
use crate::logging::{Facility, Logger};
use std::path::PathBuf;

/// Compiled-in pipeline used when no configuration file can be read: reflect
/// every frame received on device 0 back out of it.
pub const DEFAULT_PIPELINE: &str = "\
define($DEV 0);

source :: FromDevice($DEV);
sink   :: ToDevice($DEV);

// swap MAC addresses and send it back
source -> rx :: Counter -> EtherMirror -> sink;
";

/// Supplies raw pipeline configuration text
pub trait ConfigSource: Send + Sync {
    fn config_text(&self) -> String;
}

/// Fixed text
#[derive(Debug, Clone)]
pub struct StaticSource {
    text: String,
}

impl StaticSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(DEFAULT_PIPELINE)
    }
}

impl ConfigSource for StaticSource {
    fn config_text(&self) -> String {
        self.text.clone()
    }
}

/// Text read from a file on every request, falling back to
/// [`DEFAULT_PIPELINE`] if the file cannot be read
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    logger: Logger,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, logger: Logger) -> Self {
        Self {
            path: path.into(),
            logger,
        }
    }
}

impl ConfigSource for FileSource {
    fn config_text(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                log_warning!(
                    self.logger,
                    Facility::Controller,
                    "could not read config {}: {}, using standard config",
                    self.path.display(),
                    e
                );
                DEFAULT_PIPELINE.to_string()
            }
        }
    }
}

/// Prefixes another source's text with the device MAC address preamble
pub struct PreambleSource<S> {
    preamble: String,
    inner: S,
}

impl<S: ConfigSource> PreambleSource<S> {
    pub fn new(preamble: String, inner: S) -> Self {
        Self { preamble, inner }
    }
}

impl<S: ConfigSource> ConfigSource for PreambleSource<S> {
    fn config_text(&self) -> String {
        let mut text = self.preamble.clone();
        text.push_str(&self.inner.config_text());
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Severity;
    use crate::pipeline::lang;
    use std::io::Write;

    #[test]
    fn test_default_pipeline_parses() {
        let prog = lang::parse(DEFAULT_PIPELINE).unwrap();
        let classes: Vec<_> = prog.declarations.iter().map(|d| d.class.as_str()).collect();
        assert_eq!(classes, vec!["FromDevice", "ToDevice", "Counter", "EtherMirror"]);
        assert_eq!(prog.connections.len(), 3);
    }

    #[test]
    fn test_file_source_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Idle -> Discard;").unwrap();
        let (logger, sink) = Logger::memory(Severity::Info);
        let src = FileSource::new(file.path(), logger);
        assert_eq!(src.config_text(), "Idle -> Discard;");
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_file_source_falls_back() {
        let (logger, sink) = Logger::memory(Severity::Info);
        let src = FileSource::new("/nonexistent/pipeline.click", logger);
        assert_eq!(src.config_text(), DEFAULT_PIPELINE);
        assert!(sink.contains("using standard config"));
    }

    #[test]
    fn test_preamble_is_prepended() {
        let src = PreambleSource::new(
            "define($MAC0 02:00:00:00:00:01);\n".to_string(),
            StaticSource::new("Print($MAC0) -> Discard;"),
        );
        let text = src.config_text();
        assert!(text.starts_with("define($MAC0"));
        let prog = lang::parse(&text).unwrap();
        assert_eq!(prog.declarations[0].args, vec!["02:00:00:00:00:01".to_string()]);
    }
}
