// SPDX-License-Identifier: Apache-2.0 OR MIT
//! In-memory network device
//!
//! `SimDevice` behaves like a single-queue paravirtual NIC: the RX ring is
//! filled from the configured buffer supply, injected frames land in posted
//! buffers, and transmitted buffers are captured for inspection. Failure modes
//! (TX stalls, hard errors, start/interrupt failures) can be scripted so the
//! bridge can be exercised end to end without hardware.

use super::{
    BufferAllocator, DeviceBuffer, DeviceConf, DeviceError, DeviceInfo, HwAddr, NetDevice,
    RxBufferSupply, RxCallback, RxOutcome, RxQueueConf, StartStatus, TxOutcome, TxQueueConf,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

const EIO: i32 = -5;

/// Device operations in call order, for sequencing assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Configured,
    RxqConfigured { depth: u16 },
    TxqConfigured { depth: u16 },
    Started(StartStatus),
    IntrEnabled,
    IntrDisabled,
    RxPoll,
    TxSubmit,
}

/// One transmitted buffer as the device saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub bytes: Vec<u8>,
    pub capacity: usize,
    pub headroom: usize,
    pub aligned: bool,
}

#[derive(Default)]
struct SimState {
    conf: Option<DeviceConf>,
    rx_depth: u16,
    rx_supply: Option<Arc<dyn RxBufferSupply>>,
    rx_callback: Option<RxCallback>,
    tx_alloc: Option<Arc<dyn BufferAllocator>>,
    started: bool,
    intr_enabled: bool,
    posted: VecDeque<DeviceBuffer>,
    received: VecDeque<DeviceBuffer>,
    backlog: VecDeque<Vec<u8>>,
    rx_dropped: u64,
    tx_stall: usize,
    fail_rx: bool,
    fail_tx: bool,
    fail_start: bool,
    fail_intr_enable: bool,
    transmitted: Vec<TxRecord>,
    events: Vec<SimEvent>,
}

impl SimState {
    fn refill(&mut self) {
        let want = usize::from(self.rx_depth).saturating_sub(self.posted.len() + self.received.len());
        if want == 0 {
            return;
        }
        if let Some(supply) = &self.rx_supply {
            let bufs = supply.alloc_rx(want);
            self.posted.extend(bufs);
        }
    }

    /// Copy a frame into the next posted buffer; false if the ring is empty
    fn land(&mut self, frame: &[u8]) -> bool {
        if self.posted.is_empty() {
            self.refill();
        }
        match self.posted.pop_front() {
            Some(mut buf) => {
                buf.copy_in(frame);
                self.received.push_back(buf);
                true
            }
            None => {
                self.rx_dropped += 1;
                false
            }
        }
    }
}

/// Simulated single-queue network device
pub struct SimDevice {
    name: String,
    hwaddr: HwAddr,
    info: DeviceInfo,
    state: Mutex<SimState>,
}

impl SimDevice {
    pub fn new(name: impl Into<String>, hwaddr: HwAddr) -> Self {
        Self::with_info(name, hwaddr, DeviceInfo::default())
    }

    pub fn with_info(name: impl Into<String>, hwaddr: HwAddr, info: DeviceInfo) -> Self {
        Self {
            name: name.into(),
            hwaddr,
            info,
            state: Mutex::new(SimState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panicking test thread must not wedge the device for the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver a frame from the wire. Before the device is started the frame
    /// waits in a backlog; afterwards it is copied into a posted RX buffer
    /// (or counted as dropped when none is available) and the receive
    /// callback fires if interrupts are enabled.
    pub fn inject(&self, frame: &[u8]) {
        let notify = {
            let mut st = self.lock();
            if !st.started {
                st.backlog.push_back(frame.to_vec());
                return;
            }
            let landed = st.land(frame);
            if landed && st.intr_enabled {
                st.rx_callback.clone()
            } else {
                None
            }
        };
        // Outside the lock: the callback may reschedule a task that polls us
        if let Some(cb) = notify {
            cb(0);
        }
    }

    /// Make the next `count` TX submissions report not-ready
    pub fn stall_tx(&self, count: usize) {
        self.lock().tx_stall = count;
    }

    /// Make the next `rx_one` fail with a hard error
    pub fn fail_next_rx(&self) {
        self.lock().fail_rx = true;
    }

    /// Make the next `tx_one` fail with a hard error
    pub fn fail_next_tx(&self) {
        self.lock().fail_tx = true;
    }

    /// Make the next `start` fail with a hard error
    pub fn fail_next_start(&self) {
        self.lock().fail_start = true;
    }

    /// Make the next `rxq_intr_enable` fail
    pub fn fail_next_intr_enable(&self) {
        self.lock().fail_intr_enable = true;
    }

    pub fn transmitted(&self) -> Vec<TxRecord> {
        self.lock().transmitted.clone()
    }

    pub fn take_transmitted(&self) -> Vec<TxRecord> {
        std::mem::take(&mut self.lock().transmitted)
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().events.clone()
    }

    /// Frames lost because no RX buffer was posted
    pub fn rx_dropped(&self) -> u64 {
        self.lock().rx_dropped
    }

    /// Received buffers not yet pulled with `rx_one`
    pub fn rx_pending(&self) -> usize {
        self.lock().received.len()
    }

    /// Empty buffers currently posted on the RX ring
    pub fn rx_posted(&self) -> usize {
        self.lock().posted.len()
    }

    pub fn intr_enabled(&self) -> bool {
        self.lock().intr_enabled
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    fn check_rxq(&self, st: &SimState, queue: u16) -> Result<(), DeviceError> {
        let conf = st.conf.ok_or(DeviceError::NotConfigured)?;
        if queue >= conf.nb_rx_queues {
            return Err(DeviceError::InvalidQueue { queue });
        }
        Ok(())
    }

    fn check_txq(&self, st: &SimState, queue: u16) -> Result<(), DeviceError> {
        let conf = st.conf.ok_or(DeviceError::NotConfigured)?;
        if queue >= conf.nb_tx_queues {
            return Err(DeviceError::InvalidQueue { queue });
        }
        Ok(())
    }
}

impl NetDevice for SimDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> DeviceInfo {
        self.info
    }

    fn hwaddr(&self) -> HwAddr {
        self.hwaddr
    }

    fn configure(&self, conf: &DeviceConf) -> Result<(), DeviceError> {
        if conf.nb_rx_queues > self.info.max_rx_queues {
            return Err(DeviceError::InvalidQueue {
                queue: conf.nb_rx_queues,
            });
        }
        if conf.nb_tx_queues > self.info.max_tx_queues {
            return Err(DeviceError::InvalidQueue {
                queue: conf.nb_tx_queues,
            });
        }
        let mut st = self.lock();
        st.conf = Some(*conf);
        st.events.push(SimEvent::Configured);
        Ok(())
    }

    fn rxq_configure(&self, queue: u16, depth: u16, conf: RxQueueConf) -> Result<(), DeviceError> {
        if depth > self.info.max_rx_desc {
            return Err(DeviceError::QueueDepth {
                requested: depth,
                max: self.info.max_rx_desc,
            });
        }
        let mut st = self.lock();
        self.check_rxq(&st, queue)?;
        st.rx_depth = depth;
        st.rx_supply = Some(conf.supply);
        st.rx_callback = conf.callback;
        st.intr_enabled = false;
        st.events.push(SimEvent::RxqConfigured { depth });
        Ok(())
    }

    fn txq_configure(&self, queue: u16, depth: u16, conf: TxQueueConf) -> Result<(), DeviceError> {
        if depth > self.info.max_tx_desc {
            return Err(DeviceError::QueueDepth {
                requested: depth,
                max: self.info.max_tx_desc,
            });
        }
        let mut st = self.lock();
        self.check_txq(&st, queue)?;
        st.tx_alloc = Some(conf.alloc);
        st.events.push(SimEvent::TxqConfigured { depth });
        Ok(())
    }

    fn start(&self) -> Result<StartStatus, DeviceError> {
        let mut st = self.lock();
        if st.conf.is_none() {
            return Err(DeviceError::NotConfigured);
        }
        if st.rx_supply.is_none() {
            return Err(DeviceError::InvalidState("RX queue not configured"));
        }
        if std::mem::take(&mut st.fail_start) {
            return Err(DeviceError::Hard { op: "start", code: EIO });
        }
        st.started = true;
        st.refill();
        while let Some(frame) = st.backlog.pop_front() {
            st.land(&frame);
        }
        let status = if st.received.is_empty() {
            StartStatus::Started
        } else {
            StartStatus::RxPending
        };
        st.events.push(SimEvent::Started(status));
        Ok(status)
    }

    fn rxq_intr_enable(&self, queue: u16) -> Result<(), DeviceError> {
        let mut st = self.lock();
        self.check_rxq(&st, queue)?;
        if std::mem::take(&mut st.fail_intr_enable) {
            return Err(DeviceError::Hard {
                op: "rxq_intr_enable",
                code: EIO,
            });
        }
        st.intr_enabled = true;
        st.events.push(SimEvent::IntrEnabled);
        Ok(())
    }

    fn rxq_intr_disable(&self, queue: u16) -> Result<(), DeviceError> {
        let mut st = self.lock();
        self.check_rxq(&st, queue)?;
        st.intr_enabled = false;
        st.events.push(SimEvent::IntrDisabled);
        Ok(())
    }

    fn rx_one(&self, queue: u16) -> Result<RxOutcome, DeviceError> {
        let mut st = self.lock();
        self.check_rxq(&st, queue)?;
        if std::mem::take(&mut st.fail_rx) {
            return Err(DeviceError::Hard { op: "rx_one", code: EIO });
        }
        if !st.started {
            return Err(DeviceError::InvalidState("device not started"));
        }
        st.events.push(SimEvent::RxPoll);
        let outcome = match st.received.pop_front() {
            Some(buf) => RxOutcome::Packet {
                buf,
                more: !st.received.is_empty(),
            },
            None => RxOutcome::NotReady,
        };
        st.refill();
        Ok(outcome)
    }

    fn tx_one(&self, queue: u16, buf: DeviceBuffer) -> Result<TxOutcome, DeviceError> {
        let mut st = self.lock();
        self.check_txq(&st, queue)?;
        if std::mem::take(&mut st.fail_tx) {
            return Err(DeviceError::Hard { op: "tx_one", code: EIO });
        }
        if !st.started {
            return Err(DeviceError::InvalidState("device not started"));
        }
        st.events.push(SimEvent::TxSubmit);
        if st.tx_stall > 0 {
            st.tx_stall -= 1;
            return Ok(TxOutcome::NotReady(buf));
        }
        st.transmitted.push(TxRecord {
            bytes: buf.data().to_vec(),
            capacity: buf.capacity(),
            headroom: buf.headroom(),
            aligned: buf.is_aligned(),
        });
        Ok(TxOutcome::Sent { more: true })
    }
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("name", &self.name)
            .field("hwaddr", &self.hwaddr.to_string())
            .finish()
    }
}
