// SPDX-License-Identifier: Apache-2.0 OR MIT
//! # Device Layer
//!
//! The queue-level interface the bridge drives: device lookup by index,
//! metadata, RX/TX queue configuration, start, per-queue interrupt control and
//! single-buffer receive/transmit primitives.
//!
//! Receive and transmit return a tri-state outcome (success with more pending,
//! success with nothing more, not ready) or a [`DeviceError`]. A
//! [`DeviceError::Hard`] from `rx_one`/`tx_one` means the device state can no
//! longer be trusted; callers treat it as fatal.

pub mod buffer;
pub mod sim;

pub use buffer::{BufferAllocator, BufferPool, BufferSize, DeviceBuffer, PoolStats};
pub use sim::{SimDevice, SimEvent, TxRecord};

use crate::logging::{Facility, Logger};
use crate::log_info;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by the device layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("hard device error in {op} (code {code})")]
    Hard { op: &'static str, code: i32 },

    #[error("queue {queue} does not exist")]
    InvalidQueue { queue: u16 },

    #[error("queue depth {requested} exceeds device maximum {max}")]
    QueueDepth { requested: u16, max: u16 },

    #[error("device is not configured")]
    NotConfigured,

    #[error("device is in the wrong state: {0}")]
    InvalidState(&'static str),
}

/// Hardware (MAC) address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HwAddr(pub [u8; 6]);

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Device metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub max_rx_queues: u16,
    pub max_tx_queues: u16,
    pub max_rx_desc: u16,
    pub max_tx_desc: u16,
    /// Required I/O alignment of buffer regions
    pub ioalign: usize,
    /// Head-room the device needs in RX buffers
    pub nb_encap_rx: usize,
    /// Head-room the device needs in TX buffers
    pub nb_encap_tx: usize,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            max_rx_queues: 1,
            max_tx_queues: 1,
            max_rx_desc: 256,
            max_tx_desc: 256,
            ioalign: 8,
            nb_encap_rx: 12,
            nb_encap_tx: 12,
        }
    }
}

/// Device-wide configuration applied once at early init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConf {
    pub nb_rx_queues: u16,
    pub nb_tx_queues: u16,
}

/// Result of starting a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    /// Started; RX interrupts can be armed right away
    Started,
    /// Started, but received packets are already queued; interrupts cannot be
    /// armed until the RX queue has been drained once
    RxPending,
}

/// Outcome of a single-buffer receive
#[derive(Debug)]
pub enum RxOutcome {
    /// A buffer was received; `more` is set when further buffers are queued
    Packet { buf: DeviceBuffer, more: bool },
    /// Nothing received
    NotReady,
}

/// Outcome of a single-buffer transmit
#[derive(Debug)]
pub enum TxOutcome {
    /// Accepted; the device owns the buffer now. `more` is set when the queue
    /// has room for further submissions.
    Sent { more: bool },
    /// Queue full; the buffer is handed back for a later retry
    NotReady(DeviceBuffer),
}

/// Supplies empty receive buffers to an RX queue on demand
pub trait RxBufferSupply: Send + Sync {
    /// Return up to `count` freshly allocated buffers
    fn alloc_rx(&self, count: usize) -> Vec<DeviceBuffer>;
}

/// Receive notification, called with the queue id from the device's
/// completion context
pub type RxCallback = Arc<dyn Fn(u16) + Send + Sync>;

/// RX queue configuration
pub struct RxQueueConf {
    pub supply: Arc<dyn RxBufferSupply>,
    pub callback: Option<RxCallback>,
}

/// TX queue configuration
pub struct TxQueueConf {
    pub alloc: Arc<dyn BufferAllocator>,
}

/// One network device
pub trait NetDevice: Send + Sync {
    fn name(&self) -> &str;
    fn info(&self) -> DeviceInfo;
    fn hwaddr(&self) -> HwAddr;
    fn configure(&self, conf: &DeviceConf) -> Result<(), DeviceError>;
    fn rxq_configure(&self, queue: u16, depth: u16, conf: RxQueueConf) -> Result<(), DeviceError>;
    fn txq_configure(&self, queue: u16, depth: u16, conf: TxQueueConf) -> Result<(), DeviceError>;
    fn start(&self) -> Result<StartStatus, DeviceError>;
    fn rxq_intr_enable(&self, queue: u16) -> Result<(), DeviceError>;
    fn rxq_intr_disable(&self, queue: u16) -> Result<(), DeviceError>;
    fn rx_one(&self, queue: u16) -> Result<RxOutcome, DeviceError>;
    fn tx_one(&self, queue: u16, buf: DeviceBuffer) -> Result<TxOutcome, DeviceError>;
}

/// All devices known to the process, indexed from 0
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Arc<dyn NetDevice>>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<Arc<dyn NetDevice>>) -> Self {
        Self { devices }
    }

    pub fn count(&self) -> usize {
        self.devices.len()
    }

    pub fn get(&self, index: usize) -> Option<Arc<dyn NetDevice>> {
        self.devices.get(index).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn NetDevice>> {
        self.devices.iter()
    }

    /// Configure every device with one RX and one TX queue, enough to query its
    /// hardware address before any pipeline exists.
    pub fn early_configure(&self, logger: &Logger) -> Result<(), DeviceError> {
        let conf = DeviceConf {
            nb_rx_queues: 1,
            nb_tx_queues: 1,
        };
        for (i, dev) in self.devices.iter().enumerate() {
            log_info!(logger, Facility::Device, "device {} ({}) early init", i, dev.name());
            dev.configure(&conf)?;
        }
        Ok(())
    }

    /// Build the `define($MACn ...)` preamble prepended to pipeline configs
    pub fn macaddr_preamble(&self) -> String {
        let mut acc = String::new();
        for (i, dev) in self.devices.iter().enumerate() {
            acc.push_str(&format!("define($MAC{} {});\n", i, dev.hwaddr()));
        }
        acc.push_str("/* End device-provided MAC preamble */\n");
        acc
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.devices.iter().map(|d| d.name().to_string()))
            .finish()
    }
}
