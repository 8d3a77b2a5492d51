// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Per-adapter counters, mirrored into the `metrics` registry

use metrics::{counter, describe_counter};

pub const RX_PACKETS: &str = "bridge_rx_packets_total";
pub const RX_BYTES: &str = "bridge_rx_bytes_total";
pub const RX_ALLOC_FAILURES: &str = "bridge_rx_alloc_failures_total";
pub const TX_PACKETS: &str = "bridge_tx_packets_total";
pub const TX_ALLOC_DROPS: &str = "bridge_tx_alloc_drops_total";
pub const TX_RETRY_DROPS: &str = "bridge_tx_retry_drops_total";
pub const TX_NOT_READY: &str = "bridge_tx_not_ready_total";

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!(RX_PACKETS, "Packets received from devices into pipelines");
    describe_counter!(RX_BYTES, "Bytes received from devices into pipelines");
    describe_counter!(RX_ALLOC_FAILURES, "RX buffer allocations that failed");
    describe_counter!(TX_PACKETS, "Packets accepted by device TX queues");
    describe_counter!(TX_ALLOC_DROPS, "Packets dropped for lack of a TX buffer");
    describe_counter!(TX_RETRY_DROPS, "Packets dropped after exhausting TX retries");
    describe_counter!(TX_NOT_READY, "TX submissions refused with queue full");
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressStats {
    pub packets: u64,
    pub bytes: u64,
    /// Drain passes, whether or not they found packets
    pub drains: u64,
    pub wakeups: u64,
}

impl IngressStats {
    pub fn record_packet(&mut self, device: &str, len: usize) {
        self.packets += 1;
        self.bytes += len as u64;
        counter!(RX_PACKETS, "device" => device.to_string()).increment(1);
        counter!(RX_BYTES, "device" => device.to_string()).increment(len as u64);
    }

    pub fn summary(&self, devid: usize) -> String {
        format!(
            "[STATS:Ingress FINAL] dev={} packets={} bytes={} drains={} wakeups={}",
            devid, self.packets, self.bytes, self.drains, self.wakeups
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EgressStats {
    pub packets: u64,
    pub bytes: u64,
    pub alloc_drops: u64,
    pub retry_drops: u64,
    pub not_ready: u64,
}

impl EgressStats {
    pub fn record_sent(&mut self, device: &str, len: usize) {
        self.packets += 1;
        self.bytes += len as u64;
        counter!(TX_PACKETS, "device" => device.to_string()).increment(1);
    }

    pub fn record_alloc_drop(&mut self, device: &str) {
        self.alloc_drops += 1;
        counter!(TX_ALLOC_DROPS, "device" => device.to_string()).increment(1);
    }

    pub fn record_retry_drop(&mut self, device: &str) {
        self.retry_drops += 1;
        counter!(TX_RETRY_DROPS, "device" => device.to_string()).increment(1);
    }

    pub fn record_not_ready(&mut self, device: &str, count: u64) {
        self.not_ready += count;
        counter!(TX_NOT_READY, "device" => device.to_string()).increment(count);
    }

    pub fn summary(&self, devid: usize) -> String {
        format!(
            "[STATS:Egress FINAL] dev={} packets={} bytes={} alloc_drops={} retry_drops={} not_ready={}",
            devid, self.packets, self.bytes, self.alloc_drops, self.retry_drops, self.not_ready
        )
    }
}
