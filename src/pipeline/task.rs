// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Task scheduling and stop signalling for one pipeline driver
//!
//! Each driver owns one [`DriverWake`]. Tasks and the stop handle share it so
//! that a reschedule from any thread (for example a device receive callback)
//! or a stop request unparks the driver thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::Thread;

#[derive(Debug, Default)]
pub(crate) struct DriverWake {
    thread: Mutex<Option<Thread>>,
}

impl DriverWake {
    /// Bind the calling thread as the driver to unpark
    pub(crate) fn bind_current(&self) {
        if let Ok(mut slot) = self.thread.lock() {
            *slot = Some(std::thread::current());
        }
    }

    fn wake(&self) {
        if let Ok(slot) = self.thread.lock() {
            if let Some(t) = slot.as_ref() {
                t.unpark();
            }
        }
    }
}

/// Thread-safe handle to one cooperative task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    scheduled: Arc<AtomicBool>,
    wake: Arc<DriverWake>,
}

impl TaskHandle {
    pub(crate) fn new(wake: Arc<DriverWake>) -> Self {
        Self {
            scheduled: Arc::new(AtomicBool::new(false)),
            wake,
        }
    }

    /// Mark the task runnable and wake the driver
    pub fn reschedule(&self) {
        self.scheduled.store(true, Ordering::Release);
        self.wake.wake();
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Consume the runnable mark
    pub(crate) fn take(&self) -> bool {
        self.scheduled.swap(false, Ordering::AcqRel)
    }
}

/// Requests a pipeline driver to return from its loop
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    wake: Arc<DriverWake>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(DriverWake::default()),
        }
    }

    pub fn please_stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.wake.wake();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(crate) fn wake(&self) -> Arc<DriverWake> {
        Arc::clone(&self.wake)
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}
