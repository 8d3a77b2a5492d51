// SPDX-License-Identifier: Apache-2.0 OR MIT
//! `ToDevice(DEVID)`: input port k → device TX queue 0 → output port k
//!
//! Each packet is copied into a device buffer laid out per the device's
//! `ioalign` and `nb_encap_tx`, then submitted. A full TX queue is retried in a
//! tight loop; the element never yields while a packet is in flight. The TX
//! queue itself is configured by the `FromDevice` bound to the same device.

use super::stats::EgressStats;
use super::{bind_device, fatal_device_error};
use crate::device::{BufferAllocator, DeviceBuffer, DeviceError, DeviceInfo, NetDevice, TxOutcome};
use crate::logging::{Facility, Logger};
use crate::pipeline::{CleanupStage, Element, ElementError, Environment, Output, Packet};
use crate::{log_critical, log_warning};
use std::sync::Arc;

const TX_QUEUE: u16 = 0;

/// What happened to one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submit {
    Sent { retries: u64 },
    GaveUp { retries: u64 },
}

pub struct ToDevice {
    devid: usize,
    dev: Option<Arc<dyn NetDevice>>,
    info: DeviceInfo,
    alloc: Option<Arc<dyn BufferAllocator>>,
    max_retries: Option<u64>,
    logger: Option<Logger>,
    stats: EgressStats,
}

impl ToDevice {
    pub fn new() -> Self {
        Self {
            devid: 0,
            dev: None,
            info: DeviceInfo::default(),
            alloc: None,
            max_retries: None,
            logger: None,
            stats: EgressStats::default(),
        }
    }

    pub fn stats(&self) -> &EgressStats {
        &self.stats
    }

    fn submit(&self, dev: &dyn NetDevice, mut buf: DeviceBuffer) -> Result<Submit, DeviceError> {
        let mut retries = 0u64;
        loop {
            match dev.tx_one(TX_QUEUE, buf)? {
                TxOutcome::Sent { .. } => return Ok(Submit::Sent { retries }),
                TxOutcome::NotReady(back) => {
                    retries += 1;
                    if self.max_retries.is_some_and(|max| retries > max) {
                        return Ok(Submit::GaveUp { retries });
                    }
                    buf = back;
                    std::hint::spin_loop();
                }
            }
        }
    }
}

impl Default for ToDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for ToDevice {
    fn class_name(&self) -> &'static str {
        "ToDevice"
    }

    fn configure(&mut self, args: &[String], env: &Environment) -> Result<(), ElementError> {
        let (devid, dev) = bind_device(args, env)?;
        self.devid = devid;
        self.info = dev.info();
        self.dev = Some(dev);
        self.alloc = Some(Arc::new(env.pool.clone()));
        self.max_retries = env.settings.max_tx_retries;
        self.logger = Some(env.logger.clone());
        Ok(())
    }

    fn push(&mut self, port: usize, packet: Packet, out: &mut Output) {
        let (Some(dev), Some(alloc)) = (self.dev.clone(), self.alloc.clone()) else {
            return;
        };
        let headroom = self.info.nb_encap_tx;
        let len = packet.len();

        let Some(mut buf) = alloc.alloc_buf(len + headroom, self.info.ioalign, headroom) else {
            if let Some(logger) = &self.logger {
                log_critical!(
                    logger,
                    Facility::Egress,
                    "device {}: no TX buffer for {}-byte packet, dropping",
                    self.devid,
                    len
                );
            }
            self.stats.record_alloc_drop(dev.name());
            return;
        };
        buf.copy_in(packet.data());

        match self.submit(dev.as_ref(), buf) {
            Ok(Submit::Sent { retries }) => {
                if retries > 0 {
                    self.stats.record_not_ready(dev.name(), retries);
                }
                self.stats.record_sent(dev.name(), len);
                out.push(port, packet);
            }
            Ok(Submit::GaveUp { retries }) => {
                self.stats.record_not_ready(dev.name(), retries);
                self.stats.record_retry_drop(dev.name());
                if let Some(logger) = &self.logger {
                    log_warning!(
                        logger,
                        Facility::Egress,
                        "device {}: TX queue still full after {} retries, dropping",
                        self.devid,
                        retries
                    );
                }
            }
            Err(e) => fatal_device_error(self.logger.as_ref(), Facility::Egress, self.devid, &e),
        }
    }

    fn cleanup(&mut self, stage: CleanupStage) {
        if stage >= CleanupStage::Initialized {
            if let Some(logger) = &self.logger {
                logger.info(Facility::Stats, &self.stats.summary(self.devid));
            }
        }
    }

    fn read_handler(&self, name: &str) -> Option<String> {
        match name {
            "count" => Some(self.stats.packets.to_string()),
            "alloc_drops" => Some(self.stats.alloc_drops.to_string()),
            "retry_drops" => Some(self.stats.retry_drops.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::test_support::sim_env;
    use crate::bridge::RxAllocator;
    use crate::device::{BufferPool, RxQueueConf, SimDevice, TxQueueConf};
    use crate::settings::BridgeSettings;

    /// A ToDevice bound to a started sim device
    fn setup(settings: BridgeSettings, pool: BufferPool) -> (ToDevice, Arc<SimDevice>) {
        let (env, dev, _) = sim_env(settings, pool.clone());
        let info = dev.info();
        dev.rxq_configure(
            0,
            4,
            RxQueueConf {
                supply: Arc::new(RxAllocator::new(Arc::new(pool.clone()), &info, 256, "sim0")),
                callback: None,
            },
        )
        .unwrap();
        dev.txq_configure(
            0,
            4,
            TxQueueConf {
                alloc: Arc::new(pool),
            },
        )
        .unwrap();
        dev.start().unwrap();

        let mut td = ToDevice::new();
        td.configure(&["0".to_string()], &env).unwrap();
        (td, dev)
    }

    #[test]
    fn test_push_copies_with_headroom() {
        let (mut td, dev) = setup(BridgeSettings::default(), BufferPool::new(16, 0, 0));
        let payload: Vec<u8> = (0..100).collect();
        let mut out = Output::new();
        td.push(0, Packet::new(payload.clone()), &mut out);

        let sent = dev.transmitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bytes, payload);
        assert_eq!(sent[0].headroom, 12);
        assert!(sent[0].capacity >= 100 + 12);
        assert!(sent[0].aligned);

        let items = out.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, 0);
        assert_eq!(items[0].1.data(), &payload[..]);
        assert_eq!(td.stats().packets, 1);
    }

    #[test]
    fn test_stalled_queue_is_retried() {
        let (mut td, dev) = setup(BridgeSettings::default(), BufferPool::new(16, 0, 0));
        dev.stall_tx(3);
        let mut out = Output::new();
        td.push(0, Packet::from_slice(&[1, 2, 3]), &mut out);

        assert_eq!(dev.transmitted().len(), 1);
        assert_eq!(td.stats().not_ready, 3);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_retry_bound_drops() {
        let settings = BridgeSettings {
            max_tx_retries: Some(2),
            ..Default::default()
        };
        let (mut td, dev) = setup(settings, BufferPool::new(16, 0, 0));
        dev.stall_tx(5);
        let mut out = Output::new();
        td.push(0, Packet::from_slice(&[1]), &mut out);

        assert!(dev.transmitted().is_empty());
        assert!(out.is_empty());
        assert_eq!(td.stats().retry_drops, 1);
        assert_eq!(td.read_handler("retry_drops").as_deref(), Some("1"));
    }

    #[test]
    fn test_allocation_failure_drops() {
        let pool = BufferPool::new(4, 0, 0);
        let (mut td, dev) = setup(BridgeSettings::default(), pool.clone());
        // Hold everything the RX ring left behind
        let mut held = Vec::new();
        while let Some(buf) = pool.alloc_buf(64, 8, 0) {
            held.push(buf);
        }

        let mut out = Output::new();
        td.push(0, Packet::from_slice(&[0; 64]), &mut out);
        assert!(out.is_empty());
        assert!(dev.transmitted().is_empty());
        assert_eq!(td.stats().alloc_drops, 1);
    }

    #[test]
    fn test_forwards_on_input_port() {
        let (mut td, _dev) = setup(BridgeSettings::default(), BufferPool::new(16, 0, 0));
        let mut out = Output::new();
        td.push(0, Packet::from_slice(&[5]), &mut out);
        assert_eq!(out.into_items()[0].0, 0);
    }

    #[test]
    fn test_configure_errors() {
        let (env, _, _) = sim_env(BridgeSettings::default(), BufferPool::new(1, 0, 0));
        let err = ToDevice::new()
            .configure(&["1".to_string()], &env)
            .unwrap_err();
        assert_eq!(err.to_string(), "No such device 1");
    }
}
