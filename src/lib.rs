// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Bridge between NIC hardware queues and a cooperative packet-processing
//! pipeline, plus the controller that runs pipeline instances on their own
//! threads.

pub mod bridge;
pub mod controller;
pub mod device;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod settings;

pub use controller::{Controller, InstanceExit, InstanceState, ShutdownReason};
pub use device::{DeviceRegistry, NetDevice, SimDevice};
pub use pipeline::{Packet, Router};
pub use settings::BridgeSettings;
