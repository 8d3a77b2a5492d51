// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The element contract
//!
//! An element is one node of the packet graph. The router calls `configure`
//! once with the element's arguments, `initialize` once in declaration order,
//! `push` for every packet arriving on an input port, `run_task` whenever the
//! element's task is scheduled, and `cleanup` exactly once at teardown.

use super::packet::Packet;
use super::task::{DriverWake, TaskHandle};
use crate::device::{BufferPool, DeviceError, DeviceRegistry};
use crate::logging::Logger;
use crate::settings::BridgeSettings;
use std::sync::Arc;
use thiserror::Error;

/// How far an element got before cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CleanupStage {
    Configured,
    Initialized,
}

/// Errors an element reports from `configure` or `initialize`
#[derive(Error, Debug)]
pub enum ElementError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("{0}")]
    Init(String),
}

/// Packets emitted by an element, tagged with their output port
#[derive(Debug, Default)]
pub struct Output {
    items: Vec<(usize, Packet)>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, port: usize, packet: Packet) {
        self.items.push((port, packet));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<(usize, Packet)> {
        self.items
    }
}

/// Process-wide resources elements may bind to
#[derive(Clone, Debug)]
pub struct Environment {
    pub devices: DeviceRegistry,
    pub pool: BufferPool,
    pub settings: BridgeSettings,
    pub logger: Logger,
}

/// Handed to `initialize`: task registration plus an output for packets the
/// element produces while initializing (delivered once every element is up)
pub struct InitContext<'a> {
    env: &'a Environment,
    wake: Arc<DriverWake>,
    task: Option<TaskHandle>,
    output: Output,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(env: &'a Environment, wake: Arc<DriverWake>) -> Self {
        Self {
            env,
            wake,
            task: None,
            output: Output::new(),
        }
    }

    pub fn env(&self) -> &Environment {
        self.env
    }

    /// Register this element's task. An element has at most one task; calling
    /// twice returns the same handle.
    pub fn register_task(&mut self) -> TaskHandle {
        self.task
            .get_or_insert_with(|| TaskHandle::new(Arc::clone(&self.wake)))
            .clone()
    }

    pub fn output(&mut self) -> &mut Output {
        &mut self.output
    }

    pub(crate) fn finish(self) -> (Option<TaskHandle>, Output) {
        (self.task, self.output)
    }
}

pub trait Element: Send {
    fn class_name(&self) -> &'static str;

    fn ninputs(&self) -> usize {
        1
    }

    fn noutputs(&self) -> usize {
        1
    }

    /// Parse arguments. Elements without arguments reject any.
    fn configure(&mut self, args: &[String], _env: &Environment) -> Result<(), ElementError> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(ElementError::Config(format!(
                "{} takes no arguments",
                self.class_name()
            )))
        }
    }

    fn initialize(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ElementError> {
        Ok(())
    }

    fn cleanup(&mut self, _stage: CleanupStage) {}

    /// Handle a packet arriving on `port`
    fn push(&mut self, _port: usize, _packet: Packet, _out: &mut Output) {}

    /// Run the element's task; returns true if it did any work
    fn run_task(&mut self, _out: &mut Output) -> bool {
        false
    }

    /// Read a named statistic (for example `count`)
    fn read_handler(&self, _name: &str) -> Option<String> {
        None
    }
}
