// SPDX-License-Identifier: Apache-2.0 OR MIT
use chrono::{DateTime, Utc};

/// A packet owned by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
    timestamp: Option<DateTime<Utc>>,
}

impl Packet {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: None,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Arrival time annotation, set on the RX path
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, ts: DateTime<Utc>) {
        self.timestamp = Some(ts);
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
