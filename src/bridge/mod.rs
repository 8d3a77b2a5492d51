// SPDX-License-Identifier: Apache-2.0 OR MIT
//! # Device Bridge
//!
//! Pipeline elements that move packets between a device's hardware queues and
//! the element graph:
//!
//! - [`FromDevice`] drains RX queue 0 of a device into output port 0.
//! - [`ToDevice`] copies packets into device buffers and submits them on TX
//!   queue 0, busy-retrying while the queue is full.
//! - [`RxAllocator`] keeps the RX ring supplied with correctly laid out buffers.
//!
//! A hard device error on the RX or TX path leaves the device in an unknown
//! state; both adapters log it at emergency severity and abort the process.

pub mod egress;
pub mod ingress;
pub mod rx_alloc;
pub mod stats;

pub use egress::ToDevice;
pub use ingress::FromDevice;
pub use rx_alloc::RxAllocator;
pub use stats::{EgressStats, IngressStats};

use crate::device::{DeviceError, NetDevice};
use crate::log_emergency;
use crate::logging::{Facility, Logger};
use crate::pipeline::{ElementError, Environment};
use std::sync::Arc;

/// Parse the optional `DEVID` argument and look the device up
pub(crate) fn bind_device(
    args: &[String],
    env: &Environment,
) -> Result<(usize, Arc<dyn NetDevice>), ElementError> {
    let raw = match args {
        [] => "0",
        [devid] => devid.trim(),
        _ => return Err(ElementError::Config("expected at most one argument, DEVID".into())),
    };
    let devid: i64 = raw
        .parse()
        .map_err(|_| ElementError::Config(format!("Device ID must be an integer, got '{}'", raw)))?;
    if devid < 0 {
        return Err(ElementError::Config("Device ID must be >= 0".into()));
    }
    let dev = usize::try_from(devid)
        .ok()
        .and_then(|i| env.devices.get(i))
        .ok_or_else(|| ElementError::Config(format!("No such device {}", devid)))?;
    Ok((devid as usize, dev))
}

/// The device can no longer be trusted; nothing sensible is left to do
pub(crate) fn fatal_device_error(
    logger: Option<&Logger>,
    facility: Facility,
    devid: usize,
    err: &DeviceError,
) -> ! {
    if let Some(logger) = logger {
        log_emergency!(logger, facility, "device {}: {}, aborting", devid, err);
        logger.flush();
    }
    std::process::abort()
}
