// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The router: an instantiated element graph plus its cooperative driver
//!
//! Lifecycle is `build` → `initialize` → `activate` → `drive` → `cleanup`.
//! Packets move through a FIFO work queue, so packets emitted by one element
//! reach their destination in the order they were emitted.

use super::element::{CleanupStage, Element, Environment, InitContext, Output};
use super::elements::ElementRegistry;
use super::lang;
use super::packet::Packet;
use super::task::{StopHandle, TaskHandle};
use super::PipelineError;
use crate::logging::Facility;
use crate::{log_debug, log_info};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

struct Node {
    name: String,
    element: Box<dyn Element>,
    /// Destination (node, input port) per output port
    outputs: Vec<Option<(usize, usize)>>,
    stage: CleanupStage,
}

pub struct Router {
    nodes: Vec<Node>,
    tasks: Vec<(usize, TaskHandle)>,
    queue: VecDeque<(usize, usize, Packet)>,
    stop: StopHandle,
    env: Environment,
    idle_park: Duration,
    initialized: bool,
    cleaned_up: bool,
    unconnected_drops: u64,
}

impl Router {
    /// Parse `text`, instantiate and configure every element, then connect
    /// them. Elements configured before a failure are cleaned up.
    pub fn build(
        text: &str,
        registry: &ElementRegistry,
        env: Environment,
        stop: StopHandle,
    ) -> Result<Self, PipelineError> {
        let program = lang::parse(text)?;
        let idle_park = Duration::from_micros(env.settings.idle_park_us);
        let mut router = Router {
            nodes: Vec::with_capacity(program.declarations.len()),
            tasks: Vec::new(),
            queue: VecDeque::new(),
            stop,
            env,
            idle_park,
            initialized: false,
            cleaned_up: false,
            unconnected_drops: 0,
        };

        let mut index = HashMap::new();
        for decl in &program.declarations {
            let mut element = registry
                .create(&decl.class)
                .ok_or_else(|| PipelineError::UnknownClass {
                    name: decl.name.clone(),
                    class: decl.class.clone(),
                    line: decl.line,
                })?;
            element
                .configure(&decl.args, &router.env)
                .map_err(|source| PipelineError::Element {
                    name: decl.name.clone(),
                    class: decl.class.clone(),
                    source,
                })?;
            let noutputs = element.noutputs();
            index.insert(decl.name.as_str(), router.nodes.len());
            router.nodes.push(Node {
                name: decl.name.clone(),
                element,
                outputs: vec![None; noutputs],
                stage: CleanupStage::Configured,
            });
        }

        for conn in &program.connections {
            let lookup = |name: &str| {
                index
                    .get(name)
                    .copied()
                    .ok_or_else(|| PipelineError::UnknownElement(name.to_string()))
            };
            let from = lookup(&conn.from)?;
            let to = lookup(&conn.to)?;

            if conn.to_port >= router.nodes[to].element.ninputs() {
                return Err(PipelineError::BadPort {
                    name: conn.to.clone(),
                    direction: "input",
                    port: conn.to_port,
                    line: conn.line,
                });
            }
            let node = &mut router.nodes[from];
            let Some(slot) = node.outputs.get_mut(conn.from_port) else {
                return Err(PipelineError::BadPort {
                    name: conn.from.clone(),
                    direction: "output",
                    port: conn.from_port,
                    line: conn.line,
                });
            };
            if slot.is_some() {
                return Err(PipelineError::PortInUse {
                    name: conn.from.clone(),
                    port: conn.from_port,
                    line: conn.line,
                });
            }
            *slot = Some((to, conn.to_port));
        }

        log_debug!(
            router.env.logger,
            Facility::Pipeline,
            "built pipeline: {} elements, {} connections",
            router.nodes.len(),
            program.connections.len()
        );
        Ok(router)
    }

    /// Initialize elements in declaration order. Packets produced during
    /// initialization are delivered after every element is up.
    pub fn initialize(&mut self) -> Result<(), PipelineError> {
        let mut produced = Vec::new();
        for i in 0..self.nodes.len() {
            let mut ctx = InitContext::new(&self.env, self.stop.wake());
            let result = self.nodes[i].element.initialize(&mut ctx);
            let (task, output) = ctx.finish();
            let node = &self.nodes[i];
            result.map_err(|source| PipelineError::Initialize {
                name: node.name.clone(),
                class: node.element.class_name(),
                source,
            })?;
            self.nodes[i].stage = CleanupStage::Initialized;
            if let Some(task) = task {
                self.tasks.push((i, task));
            }
            produced.push((i, output));
        }
        self.initialized = true;

        for (i, output) in produced {
            self.route(i, output);
        }
        self.deliver();
        Ok(())
    }

    pub fn activate(&mut self) {
        log_info!(
            self.env.logger,
            Facility::Pipeline,
            "pipeline active: {} elements, {} tasks",
            self.nodes.len(),
            self.tasks.len()
        );
    }

    /// Run every scheduled task once, in registration order, delivering each
    /// task's output before the next task runs. Returns true if any task ran.
    pub fn run_once(&mut self) -> bool {
        let mut ran = false;
        for t in 0..self.tasks.len() {
            let (node, ref handle) = self.tasks[t];
            if !handle.take() {
                continue;
            }
            ran = true;
            let mut out = Output::new();
            self.nodes[node].element.run_task(&mut out);
            self.route(node, out);
            self.deliver();
        }
        ran
    }

    /// Drive tasks until a stop is requested
    pub fn drive(&mut self) {
        self.stop.wake().bind_current();
        while !self.stop.stop_requested() {
            if !self.run_once() {
                std::thread::park_timeout(self.idle_park);
            }
        }
        log_debug!(self.env.logger, Facility::Pipeline, "driver loop exited");
    }

    /// Clean up every element in reverse declaration order. Idempotent.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        self.queue.clear();
        for node in self.nodes.iter_mut().rev() {
            node.element.cleanup(node.stage);
        }
        if self.unconnected_drops > 0 {
            log_debug!(
                self.env.logger,
                Facility::Pipeline,
                "{} packets dropped on unconnected ports",
                self.unconnected_drops
            );
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    pub fn element_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    /// Read a statistic from a named element
    pub fn read_handler(&self, element: &str, handler: &str) -> Option<String> {
        self.nodes
            .iter()
            .find(|n| n.name == element)
            .and_then(|n| n.element.read_handler(handler))
    }

    /// Inject a packet on an element's input port, then deliver until quiet
    pub fn push_to(&mut self, element: &str, port: usize, packet: Packet) -> Result<(), PipelineError> {
        let idx = self
            .nodes
            .iter()
            .position(|n| n.name == element)
            .ok_or_else(|| PipelineError::UnknownElement(element.to_string()))?;
        self.queue.push_back((idx, port, packet));
        self.deliver();
        Ok(())
    }

    pub fn unconnected_drops(&self) -> u64 {
        self.unconnected_drops
    }

    fn route(&mut self, from: usize, out: Output) {
        for (port, packet) in out.into_items() {
            match self.nodes[from].outputs.get(port).copied().flatten() {
                Some((to, to_port)) => self.queue.push_back((to, to_port, packet)),
                None => self.unconnected_drops += 1,
            }
        }
    }

    fn deliver(&mut self) {
        while let Some((to, port, packet)) = self.queue.pop_front() {
            let mut out = Output::new();
            self.nodes[to].element.push(port, packet, &mut out);
            self.route(to, out);
        }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("elements", &self.element_names().collect::<Vec<_>>())
            .field("tasks", &self.tasks.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests;
