// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Bridge settings and their JSON5 file format.
//!
//! ```json5
//! {
//!   // RX buffer region size, head-room included
//!   rx_buffer_size: 2048,
//!   queue_depth: 256,
//!   // omit for unbounded TX retry
//!   max_tx_retries: 100000,
//!   pool: { small: 1024, standard: 1024, jumbo: 64 },
//!   idle_park_us: 500,
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::device::BufferSize;

/// Default RX buffer region size
pub const DEFAULT_RX_BUFFER_SIZE: usize = 2048;
/// Default RX/TX descriptor ring depth
pub const DEFAULT_QUEUE_DEPTH: u16 = 256;

/// Pre-allocated buffer counts per size class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolSettings {
    pub small: usize,
    pub standard: usize,
    pub jumbo: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            small: 1024,
            standard: 1024,
            jumbo: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeSettings {
    /// Size of each RX buffer region, head-room included
    pub rx_buffer_size: usize,

    /// Descriptor count for RX queue 0 and TX queue 0
    pub queue_depth: u16,

    /// Give up on a stalled TX queue after this many resubmissions and drop
    /// the packet. `None` retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tx_retries: Option<u64>,

    pub pool: PoolSettings,

    /// How long an idle driver parks before re-checking its tasks
    pub idle_park_us: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            rx_buffer_size: DEFAULT_RX_BUFFER_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_tx_retries: None,
            pool: PoolSettings::default(),
            idle_park_us: 500,
        }
    }
}

impl BridgeSettings {
    /// Load settings from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse settings from a JSON5 string. Missing fields take defaults.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        json5::from_str(content).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.rx_buffer_size == 0 {
            return Err(SettingsError::Invalid {
                field: "rx_buffer_size",
                reason: "must be non-zero".into(),
            });
        }
        if self.rx_buffer_size > BufferSize::Jumbo.size() {
            return Err(SettingsError::Invalid {
                field: "rx_buffer_size",
                reason: format!("exceeds the largest buffer class ({})", BufferSize::Jumbo.size()),
            });
        }
        if self.queue_depth == 0 {
            return Err(SettingsError::Invalid {
                field: "queue_depth",
                reason: "must be non-zero".into(),
            });
        }
        if self.max_tx_retries == Some(0) {
            return Err(SettingsError::Invalid {
                field: "max_tx_retries",
                reason: "must be non-zero when set".into(),
            });
        }
        let pool = self.pool;
        if pool.small + pool.standard + pool.jumbo == 0 {
            return Err(SettingsError::Invalid {
                field: "pool",
                reason: "at least one buffer class must be non-empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("failed to read settings file {0:?}: {1}")]
    Io(PathBuf, String),

    #[error("failed to parse settings: {0}")]
    Parse(String),

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
