// SPDX-License-Identifier: Apache-2.0 OR MIT
//! RX buffer supply bound to one device's layout requirements

use super::stats::RX_ALLOC_FAILURES;
use crate::device::{BufferAllocator, DeviceBuffer, DeviceInfo, RxBufferSupply};
use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands the device RX queue fixed-size buffers aligned to `ioalign` with
/// `nb_encap_rx` bytes of head-room
pub struct RxAllocator {
    alloc: Arc<dyn BufferAllocator>,
    buf_size: usize,
    align: usize,
    headroom: usize,
    device: String,
    failures: AtomicU64,
}

impl RxAllocator {
    pub fn new(alloc: Arc<dyn BufferAllocator>, info: &DeviceInfo, buf_size: usize, device: &str) -> Self {
        Self {
            alloc,
            buf_size,
            align: info.ioalign,
            headroom: info.nb_encap_rx,
            device: device.to_string(),
            failures: AtomicU64::new(0),
        }
    }

    /// Requests that came back short because an allocation failed
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl RxBufferSupply for RxAllocator {
    fn alloc_rx(&self, count: usize) -> Vec<DeviceBuffer> {
        let mut bufs = Vec::with_capacity(count);
        for _ in 0..count {
            match self.alloc.alloc_buf(self.buf_size, self.align, self.headroom) {
                Some(buf) => bufs.push(buf),
                None => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    counter!(RX_ALLOC_FAILURES, "device" => self.device.clone()).increment(1);
                    break;
                }
            }
        }
        bufs
    }
}
