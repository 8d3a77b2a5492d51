// SPDX-License-Identifier: Apache-2.0 OR MIT
//! # Pipeline Instance Controller
//!
//! A fixed registry of [`MAX_INSTANCES`] slots. Each running slot owns one OS
//! thread named `pipeline-<id>` that builds, initializes and drives one
//! pipeline until asked to stop.
//!
//! ```text
//! STOPPED --start--> STARTING --built+initialized--> RUNNING
//!    ^                   |                              |
//!    |            build/init failure                  stop
//!    |                   v                              v
//!    +------------- driver exits <----------------- STOPPING
//! ```
//!
//! Only the driver thread moves a slot back to STOPPED, and it always does so
//! on exit (including when unwinding). Stop requests wait on the slot's
//! condition variable for that transition.

pub mod shutdown;
pub mod source;

pub use shutdown::ShutdownReason;
pub use source::{ConfigSource, FileSource, PreambleSource, StaticSource, DEFAULT_PIPELINE};

use crate::logging::{Facility, Logger};
use crate::pipeline::{ElementRegistry, Environment, PipelineError, Router, StopHandle};
use crate::{log_error, log_info, log_warning};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

/// Capacity of the instance registry
pub const MAX_INSTANCES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// How a driver thread ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceExit {
    /// Ran and was stopped
    Completed,
    BuildFailed(String),
    InitFailed(String),
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("instance id {0} out of range (capacity {MAX_INSTANCES})")]
    InvalidInstance(usize),

    #[error("instance {id} is {state:?}, not stopped")]
    NotStopped { id: usize, state: InstanceState },

    #[error("failed to spawn driver thread for instance {id}: {source}")]
    Spawn { id: usize, source: std::io::Error },

    #[error("instance {id} did not stop within {timeout:?}")]
    StopTimedOut { id: usize, timeout: Duration },
}

/// One runnable unit as the controller sees it
pub trait Pipeline: Send {
    fn initialize(&mut self) -> Result<(), PipelineError>;
    fn activate(&mut self);
    /// Run until the stop handle the pipeline was built with is signalled
    fn drive(&mut self);
    fn cleanup(&mut self);
}

impl Pipeline for Router {
    fn initialize(&mut self) -> Result<(), PipelineError> {
        Router::initialize(self)
    }

    fn activate(&mut self) {
        Router::activate(self)
    }

    fn drive(&mut self) {
        Router::drive(self)
    }

    fn cleanup(&mut self) {
        Router::cleanup(self)
    }
}

/// Builds the pipeline for an instance, on that instance's driver thread
pub trait PipelineFactory: Send + Sync {
    fn build(&self, id: usize, stop: StopHandle) -> Result<Box<dyn Pipeline>, PipelineError>;
}

/// Builds routers from a configuration source
pub struct RouterFactory {
    source: Arc<dyn ConfigSource>,
    registry: ElementRegistry,
    env: Environment,
}

impl RouterFactory {
    pub fn new(source: Arc<dyn ConfigSource>, registry: ElementRegistry, env: Environment) -> Self {
        Self {
            source,
            registry,
            env,
        }
    }
}

impl PipelineFactory for RouterFactory {
    fn build(&self, id: usize, stop: StopHandle) -> Result<Box<dyn Pipeline>, PipelineError> {
        let text = self.source.config_text();
        crate::log_debug!(
            self.env.logger,
            Facility::Controller,
            "instance {}: config ({} bytes):\n{}",
            id,
            text.len(),
            text
        );
        let router = Router::build(&text, &self.registry, self.env.clone(), stop)?;
        Ok(Box::new(router))
    }
}

struct SlotInner {
    state: InstanceState,
    stop: Option<StopHandle>,
    thread: Option<JoinHandle<()>>,
    last_exit: Option<InstanceExit>,
}

struct Slot {
    inner: Mutex<SlotInner>,
    changed: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: InstanceState::Stopped,
                stop: None,
                thread: None,
                last_exit: None,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Shared {
    slots: Vec<Slot>,
    factory: Arc<dyn PipelineFactory>,
    logger: Logger,
}

/// Marks the slot STOPPED when the driver thread leaves, however it leaves
struct ExitGuard<'a> {
    slot: &'a Slot,
    exit: InstanceExit,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.slot.lock();
        inner.state = InstanceState::Stopped;
        inner.stop = None;
        inner.last_exit = Some(self.exit.clone());
        self.slot.changed.notify_all();
    }
}

/// Handle to the instance registry. Cheap to clone.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

impl Controller {
    pub fn new(factory: Arc<dyn PipelineFactory>, logger: Logger) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: (0..MAX_INSTANCES).map(|_| Slot::new()).collect(),
                factory,
                logger,
            }),
        }
    }

    fn slot(&self, id: usize) -> Result<&Slot, ControllerError> {
        self.shared
            .slots
            .get(id)
            .ok_or(ControllerError::InvalidInstance(id))
    }

    /// Start instance `id` on a new driver thread
    pub fn start(&self, id: usize) -> Result<(), ControllerError> {
        let slot = self.slot(id)?;
        let mut inner = slot.lock();
        if inner.state != InstanceState::Stopped {
            return Err(ControllerError::NotStopped {
                id,
                state: inner.state,
            });
        }
        // A previous driver has already marked the slot stopped; reap it
        if let Some(old) = inner.thread.take() {
            let _ = old.join();
        }

        let stop = StopHandle::new();
        inner.state = InstanceState::Starting;
        inner.stop = Some(stop.clone());
        inner.last_exit = None;

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name(format!("pipeline-{}", id))
            .spawn(move || run_instance(&shared, id, stop));
        match spawned {
            Ok(handle) => {
                inner.thread = Some(handle);
                log_info!(self.shared.logger, Facility::Controller, "instance {} starting", id);
                Ok(())
            }
            Err(source) => {
                inner.state = InstanceState::Stopped;
                inner.stop = None;
                Err(ControllerError::Spawn { id, source })
            }
        }
    }

    /// Ask instance `id` to stop and wait until its driver has exited.
    /// Stopping a stopped instance does nothing.
    pub fn stop(&self, id: usize) -> Result<(), ControllerError> {
        let slot = self.slot(id)?;
        let Some(inner) = self.request_stop(slot, id) else {
            return Ok(());
        };
        let inner = slot
            .changed
            .wait_while(inner, |i| i.state != InstanceState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        self.reap(id, inner);
        Ok(())
    }

    /// Like [`stop`](Self::stop), but give up after `timeout`. The instance
    /// stays STOPPING and can be waited for again.
    pub fn stop_timeout(&self, id: usize, timeout: Duration) -> Result<(), ControllerError> {
        let slot = self.slot(id)?;
        let Some(inner) = self.request_stop(slot, id) else {
            return Ok(());
        };
        let (inner, result) = slot
            .changed
            .wait_timeout_while(inner, timeout, |i| i.state != InstanceState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            log_warning!(
                self.shared.logger,
                Facility::Controller,
                "instance {} still running after {:?}",
                id,
                timeout
            );
            return Err(ControllerError::StopTimedOut { id, timeout });
        }
        self.reap(id, inner);
        Ok(())
    }

    /// Stop every instance, highest id first
    pub fn stop_all(&self) -> Result<(), ControllerError> {
        for id in (0..MAX_INSTANCES).rev() {
            self.stop(id)?;
        }
        Ok(())
    }

    pub fn state(&self, id: usize) -> Result<InstanceState, ControllerError> {
        Ok(self.slot(id)?.lock().state)
    }

    /// Instances not currently STOPPED
    pub fn active(&self) -> Vec<usize> {
        self.shared
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.lock().state != InstanceState::Stopped)
            .map(|(id, _)| id)
            .collect()
    }

    /// Block until instance `id` is STOPPED, returning how its last driver
    /// ended (`None` if it never ran)
    pub fn wait(&self, id: usize) -> Result<Option<InstanceExit>, ControllerError> {
        let slot = self.slot(id)?;
        let inner = slot
            .changed
            .wait_while(slot.lock(), |i| i.state != InstanceState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        let exit = inner.last_exit.clone();
        let thread = Self::take_thread(inner);
        if let Some(handle) = thread {
            let _ = handle.join();
        }
        Ok(exit)
    }

    /// Mark the slot STOPPING and signal its driver. Returns the held lock,
    /// or `None` if the slot was already stopped.
    fn request_stop<'a>(&self, slot: &'a Slot, id: usize) -> Option<MutexGuard<'a, SlotInner>> {
        let mut inner = slot.lock();
        if inner.state == InstanceState::Stopped {
            return None;
        }
        inner.state = InstanceState::Stopping;
        if let Some(stop) = &inner.stop {
            stop.please_stop();
        }
        log_info!(self.shared.logger, Facility::Controller, "instance {} stopping", id);
        Some(inner)
    }

    fn take_thread(mut inner: MutexGuard<'_, SlotInner>) -> Option<JoinHandle<()>> {
        inner.thread.take()
    }

    fn reap(&self, id: usize, inner: MutexGuard<'_, SlotInner>) {
        if let Some(handle) = Self::take_thread(inner) {
            let _ = handle.join();
        }
        log_info!(self.shared.logger, Facility::Controller, "instance {} stopped", id);
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("active", &self.active())
            .finish()
    }
}

/// Driver thread body
fn run_instance(shared: &Shared, id: usize, stop: StopHandle) {
    let slot = &shared.slots[id];
    let logger = &shared.logger;
    let mut guard = ExitGuard {
        slot,
        exit: InstanceExit::Completed,
    };

    let mut pipeline = match shared.factory.build(id, stop.clone()) {
        Ok(p) => p,
        Err(e) => {
            log_error!(logger, Facility::Controller, "instance {}: build failed: {}", id, e);
            guard.exit = InstanceExit::BuildFailed(e.to_string());
            return;
        }
    };
    if let Err(e) = pipeline.initialize() {
        log_error!(logger, Facility::Controller, "instance {}: init failed: {}", id, e);
        pipeline.cleanup();
        guard.exit = InstanceExit::InitFailed(e.to_string());
        return;
    }

    {
        let mut inner = slot.lock();
        if inner.state == InstanceState::Starting {
            inner.state = InstanceState::Running;
        }
        slot.changed.notify_all();
    }
    log_info!(logger, Facility::Controller, "instance {} running", id);

    pipeline.activate();
    pipeline.drive();
    pipeline.cleanup();
}
