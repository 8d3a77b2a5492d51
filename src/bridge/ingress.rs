// SPDX-License-Identifier: Apache-2.0 OR MIT
//! `FromDevice(DEVID)`: device RX queue 0 → output port 0
//!
//! The receive callback only marks data available and reschedules the task;
//! packets are pulled off the device exclusively from the task (and once
//! during initialization if the device already holds packets at start).

use super::rx_alloc::RxAllocator;
use super::stats::IngressStats;
use super::{bind_device, fatal_device_error};
use crate::device::{
    DeviceError, DeviceInfo, NetDevice, RxCallback, RxOutcome, RxQueueConf, StartStatus,
    TxQueueConf,
};
use crate::logging::{Facility, Logger};
use crate::pipeline::{
    CleanupStage, Element, ElementError, Environment, InitContext, Output, Packet, TaskHandle,
};
use crate::{log_debug, log_info, log_warning};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const RX_QUEUE: u16 = 0;
const TX_QUEUE: u16 = 0;

pub struct FromDevice {
    devid: usize,
    dev: Option<Arc<dyn NetDevice>>,
    info: DeviceInfo,
    task: Option<TaskHandle>,
    /// Set by the receive callback, cleared when the task runs
    data_available: Arc<AtomicBool>,
    logger: Option<Logger>,
    stats: IngressStats,
}

impl FromDevice {
    pub fn new() -> Self {
        Self {
            devid: 0,
            dev: None,
            info: DeviceInfo::default(),
            task: None,
            data_available: Arc::new(AtomicBool::new(false)),
            logger: None,
            stats: IngressStats::default(),
        }
    }

    pub fn stats(&self) -> &IngressStats {
        &self.stats
    }

    /// Pull packets off RX queue 0 until the device reports nothing ready or
    /// a packet arrives without the more flag. Each buffer is copied into a
    /// timestamped packet on port 0 and released. Returns the packet count.
    pub fn take_packets(&mut self, out: &mut Output) -> Result<usize, DeviceError> {
        let Some(dev) = self.dev.clone() else {
            return Ok(0);
        };
        self.stats.drains += 1;
        let mut taken = 0;
        loop {
            match dev.rx_one(RX_QUEUE)? {
                RxOutcome::NotReady => break,
                RxOutcome::Packet { buf, more } => {
                    let mut packet = Packet::from_slice(buf.data());
                    packet.set_timestamp(Utc::now());
                    self.stats.record_packet(dev.name(), packet.len());
                    out.push(0, packet);
                    drop(buf);
                    taken += 1;
                    if !more {
                        break;
                    }
                }
            }
        }
        Ok(taken)
    }

    fn receive_callback(&self, task: TaskHandle) -> RxCallback {
        let data_available = Arc::clone(&self.data_available);
        Arc::new(move |_queue| {
            data_available.store(true, Ordering::Release);
            task.reschedule();
        })
    }
}

impl Default for FromDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for FromDevice {
    fn class_name(&self) -> &'static str {
        "FromDevice"
    }

    fn ninputs(&self) -> usize {
        0
    }

    fn configure(&mut self, args: &[String], env: &Environment) -> Result<(), ElementError> {
        let (devid, dev) = bind_device(args, env)?;
        self.devid = devid;
        self.dev = Some(dev);
        self.logger = Some(env.logger.clone());
        Ok(())
    }

    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ElementError> {
        let dev = self
            .dev
            .clone()
            .ok_or_else(|| ElementError::Init("no device bound".into()))?;
        let env = ctx.env().clone();
        self.info = dev.info();

        let depth = env.settings.queue_depth;
        let supply = RxAllocator::new(
            Arc::new(env.pool.clone()),
            &self.info,
            env.settings.rx_buffer_size,
            dev.name(),
        );
        let task = ctx.register_task();
        dev.rxq_configure(
            RX_QUEUE,
            depth,
            RxQueueConf {
                supply: Arc::new(supply),
                callback: Some(self.receive_callback(task.clone())),
            },
        )?;
        dev.txq_configure(
            TX_QUEUE,
            depth,
            TxQueueConf {
                alloc: Arc::new(env.pool.clone()),
            },
        )?;

        if dev.start()? == StartStatus::RxPending {
            // Interrupts cannot be armed while packets are queued
            let taken = match self.take_packets(ctx.output()) {
                Ok(n) => n,
                Err(e) => fatal_device_error(Some(&env.logger), Facility::Ingress, self.devid, &e),
            };
            log_debug!(
                env.logger,
                Facility::Ingress,
                "device {} had {} packets queued at start",
                self.devid,
                taken
            );
        }
        dev.rxq_intr_enable(RX_QUEUE)?;

        task.reschedule();
        self.task = Some(task);
        log_info!(
            env.logger,
            Facility::Ingress,
            "device {} ({}) up: depth={} ioalign={} encap_rx={} encap_tx={}",
            self.devid,
            dev.name(),
            depth,
            self.info.ioalign,
            self.info.nb_encap_rx,
            self.info.nb_encap_tx
        );
        Ok(())
    }

    fn run_task(&mut self, out: &mut Output) -> bool {
        if self.data_available.swap(false, Ordering::AcqRel) {
            self.stats.wakeups += 1;
        }
        let taken = match self.take_packets(out) {
            Ok(n) => n,
            Err(e) => fatal_device_error(self.logger.as_ref(), Facility::Ingress, self.devid, &e),
        };
        std::thread::yield_now();
        if let Some(task) = &self.task {
            task.reschedule();
        }
        taken > 0
    }

    fn cleanup(&mut self, stage: CleanupStage) {
        if stage >= CleanupStage::Initialized {
            if let Some(dev) = &self.dev {
                if let Err(e) = dev.rxq_intr_disable(RX_QUEUE) {
                    if let Some(logger) = &self.logger {
                        log_warning!(
                            logger,
                            Facility::Ingress,
                            "device {}: failed to disable RX interrupts: {}",
                            self.devid,
                            e
                        );
                    }
                }
            }
            if let Some(logger) = &self.logger {
                logger.info(Facility::Stats, &self.stats.summary(self.devid));
            }
        }
    }

    fn read_handler(&self, name: &str) -> Option<String> {
        match name {
            "count" => Some(self.stats.packets.to_string()),
            "byte_count" => Some(self.stats.bytes.to_string()),
            "wakeups" => Some(self.stats.wakeups.to_string()),
            _ => None,
        }
    }
}
