// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging facilities (component identifiers)

use serde::{Deserialize, Serialize};

/// Logging facility - identifies which component generated the log message
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facility {
    /// Pipeline instance lifecycle (start, stop, registry)
    Controller = 0,
    /// Graph construction, element lifecycle, driver loop
    Pipeline = 1,

    // === Device bridge (runs on the pipeline driver thread) ===
    /// RX queue drain, FromDevice
    Ingress = 4,
    /// TX queue submit, ToDevice
    Egress = 5,
    /// Device buffer allocation/release
    BufferPool = 6,
    /// Device bring-up and queue configuration
    Device = 7,

    /// Metrics and statistics
    Stats = 9,

    /// Test harness and fixtures
    Test = 12,

    /// Fallback for uncategorized messages
    Unknown = 255,
}

impl Facility {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Facility::Controller => "Controller",
            Facility::Pipeline => "Pipeline",
            Facility::Ingress => "Ingress",
            Facility::Egress => "Egress",
            Facility::BufferPool => "BufferPool",
            Facility::Device => "Device",
            Facility::Stats => "Stats",
            Facility::Test => "Test",
            Facility::Unknown => "Unknown",
        }
    }

    /// Create from u8 value (returns Unknown if invalid)
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Facility::Controller,
            1 => Facility::Pipeline,
            4 => Facility::Ingress,
            5 => Facility::Egress,
            6 => Facility::BufferPool,
            7 => Facility::Device,
            9 => Facility::Stats,
            12 => Facility::Test,
            _ => Facility::Unknown,
        }
    }

    /// Check if this facility logs on the per-packet path
    pub const fn is_high_frequency(self) -> bool {
        matches!(self, Facility::Ingress | Facility::Egress)
    }
}

impl std::fmt::Display for Facility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_from_u8() {
        assert_eq!(Facility::from_u8(0), Facility::Controller);
        assert_eq!(Facility::from_u8(5), Facility::Egress);
        assert_eq!(Facility::from_u8(255), Facility::Unknown);
        assert_eq!(Facility::from_u8(99), Facility::Unknown);
    }

    #[test]
    fn test_facility_round_trip_codes() {
        for facility in [
            Facility::Controller,
            Facility::Pipeline,
            Facility::Ingress,
            Facility::Egress,
            Facility::BufferPool,
            Facility::Device,
            Facility::Stats,
            Facility::Test,
        ] {
            assert_eq!(Facility::from_u8(facility.as_u8()), facility);
        }
    }

    #[test]
    fn test_high_frequency() {
        assert!(Facility::Ingress.is_high_frequency());
        assert!(Facility::Egress.is_high_frequency());
        assert!(!Facility::Controller.is_high_frequency());
    }
}
