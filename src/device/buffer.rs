// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Device Buffers and the pooled allocator behind them
//!
//! A [`DeviceBuffer`] is one packet's wire bytes in device-owned memory. The
//! region is aligned to the device's I/O alignment and starts with head-room
//! reserved for encapsulation (for instance a virtio-net header); payload bytes
//! live after the head-room.
//!
//! [`BufferPool`] pre-allocates backing memory in three size classes and keeps
//! the free lists in `crossbeam-queue` so the RX path (device layer, possibly
//! called from an interrupt-like context) and the TX path (pipeline driver
//! thread) can allocate and release without contention. Buffers return to their
//! pool when dropped.

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const SMALL_BUFFER_SIZE: usize = 2048;
const STANDARD_BUFFER_SIZE: usize = 4096;
const JUMBO_BUFFER_SIZE: usize = 9216;

/// Size classes for pooled backing memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSize {
    Small,
    Standard,
    Jumbo,
}

impl BufferSize {
    pub const fn size(self) -> usize {
        match self {
            BufferSize::Small => SMALL_BUFFER_SIZE,
            BufferSize::Standard => STANDARD_BUFFER_SIZE,
            BufferSize::Jumbo => JUMBO_BUFFER_SIZE,
        }
    }

    /// Smallest class able to hold `required` bytes
    pub fn for_len(required: usize) -> Option<Self> {
        if required <= SMALL_BUFFER_SIZE {
            Some(Self::Small)
        } else if required <= STANDARD_BUFFER_SIZE {
            Some(Self::Standard)
        } else if required <= JUMBO_BUFFER_SIZE {
            Some(Self::Jumbo)
        } else {
            None
        }
    }
}

/// Allocation/release primitives of the device layer
pub trait BufferAllocator: Send + Sync {
    /// Allocate a buffer whose region is `size` bytes long, aligned to `align`,
    /// with `headroom` bytes reserved at the front. The usable payload room is
    /// `size - headroom`. Returns `None` on memory exhaustion.
    fn alloc_buf(&self, size: usize, align: usize, headroom: usize) -> Option<DeviceBuffer>;
}

/// One packet's worth of device-owned memory
pub struct DeviceBuffer {
    mem: Box<[u8]>,
    /// Offset of the aligned region start inside `mem`
    base: usize,
    /// Region length as requested at allocation
    capacity: usize,
    headroom: usize,
    len: usize,
    align: usize,
    home: Option<(Arc<PoolShared>, BufferSize)>,
}

impl DeviceBuffer {
    /// Carve an aligned region out of `mem`; `None` if it does not fit
    fn carve(
        mem: Box<[u8]>,
        size: usize,
        align: usize,
        headroom: usize,
        home: Option<(Arc<PoolShared>, BufferSize)>,
    ) -> Result<Self, Box<[u8]>> {
        let align = align.max(1);
        let addr = mem.as_ptr() as usize;
        let base = (align - addr % align) % align;
        if headroom > size || base + size > mem.len() {
            return Err(mem);
        }
        Ok(Self {
            mem,
            base,
            capacity: size,
            headroom,
            len: 0,
            align,
            home,
        })
    }

    /// Allocate a standalone (unpooled) buffer
    pub fn unpooled(size: usize, align: usize, headroom: usize) -> Option<Self> {
        let align = align.max(1);
        let mem = vec![0u8; size + align - 1].into_boxed_slice();
        Self::carve(mem, size, align, headroom, None).ok()
    }

    /// Region length, head-room included
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn headroom(&self) -> usize {
        self.headroom
    }

    /// Maximum payload length
    pub fn room(&self) -> usize {
        self.capacity - self.headroom
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn align(&self) -> usize {
        self.align
    }

    /// True if the region start honours the alignment it was allocated with
    pub fn is_aligned(&self) -> bool {
        (self.mem.as_ptr() as usize + self.base) % self.align == 0
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        let start = self.base + self.headroom;
        &self.mem[start..start + self.len]
    }

    /// Whole payload area (up to `room()` bytes), for drivers filling the buffer
    pub fn payload_area_mut(&mut self) -> &mut [u8] {
        let start = self.base + self.headroom;
        &mut self.mem[start..self.base + self.capacity]
    }

    /// Declare the payload length
    ///
    /// # Panics
    /// Panics if `len` exceeds `room()`.
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.room(), "Buffer length exceeds room");
        self.len = len;
    }

    /// Copy `bytes` into the payload area and set the length accordingly.
    /// Returns the number of bytes copied (truncated to `room()`).
    pub fn copy_in(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.room());
        self.payload_area_mut()[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
        n
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if let Some((shared, class)) = self.home.take() {
            let mem = std::mem::replace(&mut self.mem, Box::new([]));
            shared.release(mem, class);
        }
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("capacity", &self.capacity)
            .field("headroom", &self.headroom)
            .field("len", &self.len)
            .field("align", &self.align)
            .finish()
    }
}

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocations_total: u64,
    pub allocations_failed: u64,
    pub releases_total: u64,
}

struct PoolShared {
    free_small: SegQueue<Box<[u8]>>,
    free_standard: SegQueue<Box<[u8]>>,
    free_jumbo: SegQueue<Box<[u8]>>,
    allocations_total: AtomicU64,
    allocations_failed: AtomicU64,
    releases_total: AtomicU64,
}

impl PoolShared {
    fn queue(&self, class: BufferSize) -> &SegQueue<Box<[u8]>> {
        match class {
            BufferSize::Small => &self.free_small,
            BufferSize::Standard => &self.free_standard,
            BufferSize::Jumbo => &self.free_jumbo,
        }
    }

    fn release(&self, mem: Box<[u8]>, class: BufferSize) {
        self.releases_total.fetch_add(1, Ordering::Relaxed);
        self.queue(class).push(mem);
    }
}

/// Pre-allocated, lock-free device buffer pool. Cheap to clone.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Creates a pool and pre-allocates every buffer.
    pub fn new(small_count: usize, standard_count: usize, jumbo_count: usize) -> Self {
        let shared = Arc::new(PoolShared {
            free_small: SegQueue::new(),
            free_standard: SegQueue::new(),
            free_jumbo: SegQueue::new(),
            allocations_total: AtomicU64::new(0),
            allocations_failed: AtomicU64::new(0),
            releases_total: AtomicU64::new(0),
        });

        for (class, count) in [
            (BufferSize::Small, small_count),
            (BufferSize::Standard, standard_count),
            (BufferSize::Jumbo, jumbo_count),
        ] {
            for _ in 0..count {
                shared
                    .queue(class)
                    .push(vec![0u8; class.size()].into_boxed_slice());
            }
        }

        Self { shared }
    }

    /// Number of free buffers in a size class
    pub fn available(&self, class: BufferSize) -> usize {
        self.shared.queue(class).len()
    }

    /// Bytes of backing memory currently free in the pool
    pub fn free_footprint(&self) -> usize {
        [BufferSize::Small, BufferSize::Standard, BufferSize::Jumbo]
            .iter()
            .map(|c| self.available(*c) * c.size())
            .sum()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocations_total: self.shared.allocations_total.load(Ordering::Relaxed),
            allocations_failed: self.shared.allocations_failed.load(Ordering::Relaxed),
            releases_total: self.shared.releases_total.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("small", &self.available(BufferSize::Small))
            .field("standard", &self.available(BufferSize::Standard))
            .field("jumbo", &self.available(BufferSize::Jumbo))
            .finish()
    }
}

impl BufferAllocator for BufferPool {
    fn alloc_buf(&self, size: usize, align: usize, headroom: usize) -> Option<DeviceBuffer> {
        self.shared.allocations_total.fetch_add(1, Ordering::Relaxed);
        let fail = || {
            self.shared.allocations_failed.fetch_add(1, Ordering::Relaxed);
            None
        };

        let Some(class) = BufferSize::for_len(size) else {
            return fail();
        };
        if headroom > size {
            return fail();
        }

        // Backing memory that already sits on the alignment is used as is;
        // otherwise the next class up absorbs the padding. Exhausted classes
        // fall through the same way.
        let classes = [BufferSize::Small, BufferSize::Standard, BufferSize::Jumbo];
        for candidate in classes.iter().copied().filter(|c| c.size() >= class.size()) {
            if let Some(mem) = self.shared.queue(candidate).pop() {
                let home = Some((Arc::clone(&self.shared), candidate));
                match DeviceBuffer::carve(mem, size, align, headroom, home) {
                    Ok(buf) => return Some(buf),
                    Err(mem) => self.shared.queue(candidate).push(mem),
                }
            }
        }
        fail()
    }
}
