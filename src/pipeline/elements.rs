// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Element classes and the registry that instantiates them by name

use super::element::{Element, ElementError, Environment, Output};
use super::packet::Packet;
use crate::bridge::{FromDevice, ToDevice};
use crate::logging::{Facility, Logger};
use crate::log_info;
use std::collections::HashMap;

pub type ElementCtor = fn() -> Box<dyn Element>;

/// Maps class names to constructors
#[derive(Clone)]
pub struct ElementRegistry {
    classes: HashMap<&'static str, ElementCtor>,
}

impl ElementRegistry {
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    /// Registry holding every built-in class
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register("FromDevice", || Box::new(FromDevice::new()));
        reg.register("ToDevice", || Box::new(ToDevice::new()));
        reg.register("Discard", || Box::new(Discard::default()));
        reg.register("Counter", || Box::new(Counter::default()));
        reg.register("Tee", || Box::new(Tee::default()));
        reg.register("EtherMirror", || Box::new(EtherMirror));
        reg.register("Print", || Box::new(Print::default()));
        reg.register("Idle", || Box::new(Idle));
        reg
    }

    pub fn register(&mut self, class: &'static str, ctor: ElementCtor) {
        self.classes.insert(class, ctor);
    }

    pub fn create(&self, class: &str) -> Option<Box<dyn Element>> {
        self.classes.get(class).map(|ctor| ctor())
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.classes.keys().collect();
        names.sort();
        f.debug_list().entries(names).finish()
    }
}

/// Parse a single optional unsigned argument
pub(crate) fn parse_count(args: &[String], class: &str, default: usize) -> Result<usize, ElementError> {
    match args {
        [] => Ok(default),
        [n] => n
            .parse::<usize>()
            .map_err(|_| ElementError::Config(format!("{}: expected a count, got '{}'", class, n))),
        _ => Err(ElementError::Config(format!("{}: too many arguments", class))),
    }
}

/// Drops every packet it receives
#[derive(Debug, Default)]
pub struct Discard {
    count: u64,
}

impl Element for Discard {
    fn class_name(&self) -> &'static str {
        "Discard"
    }

    fn noutputs(&self) -> usize {
        0
    }

    fn push(&mut self, _port: usize, _packet: Packet, _out: &mut Output) {
        self.count += 1;
    }

    fn read_handler(&self, name: &str) -> Option<String> {
        (name == "count").then(|| self.count.to_string())
    }
}

/// Counts packets and bytes passing through
#[derive(Debug, Default)]
pub struct Counter {
    count: u64,
    byte_count: u64,
}

impl Element for Counter {
    fn class_name(&self) -> &'static str {
        "Counter"
    }

    fn push(&mut self, _port: usize, packet: Packet, out: &mut Output) {
        self.count += 1;
        self.byte_count += packet.len() as u64;
        out.push(0, packet);
    }

    fn read_handler(&self, name: &str) -> Option<String> {
        match name {
            "count" => Some(self.count.to_string()),
            "byte_count" => Some(self.byte_count.to_string()),
            _ => None,
        }
    }
}

/// Copies each packet to every output
#[derive(Debug)]
pub struct Tee {
    outputs: usize,
}

impl Default for Tee {
    fn default() -> Self {
        Self { outputs: 2 }
    }
}

impl Element for Tee {
    fn class_name(&self) -> &'static str {
        "Tee"
    }

    fn noutputs(&self) -> usize {
        self.outputs
    }

    fn configure(&mut self, args: &[String], _env: &Environment) -> Result<(), ElementError> {
        self.outputs = parse_count(args, "Tee", 2)?;
        if self.outputs == 0 {
            return Err(ElementError::Config("Tee: needs at least one output".into()));
        }
        Ok(())
    }

    fn push(&mut self, _port: usize, packet: Packet, out: &mut Output) {
        for port in 1..self.outputs {
            out.push(port, packet.clone());
        }
        out.push(0, packet);
    }
}

/// Swaps Ethernet source and destination addresses
#[derive(Debug, Default)]
pub struct EtherMirror;

impl Element for EtherMirror {
    fn class_name(&self) -> &'static str {
        "EtherMirror"
    }

    fn push(&mut self, _port: usize, mut packet: Packet, out: &mut Output) {
        if packet.len() >= 12 {
            let (dst, rest) = packet.data_mut().split_at_mut(6);
            dst.swap_with_slice(&mut rest[..6]);
        }
        out.push(0, packet);
    }
}

/// Logs a one-line summary of each packet, then passes it on
#[derive(Debug)]
pub struct Print {
    label: String,
    max_bytes: usize,
    logger: Option<Logger>,
}

impl Default for Print {
    fn default() -> Self {
        Self {
            label: String::new(),
            max_bytes: 24,
            logger: None,
        }
    }
}

impl Element for Print {
    fn class_name(&self) -> &'static str {
        "Print"
    }

    fn configure(&mut self, args: &[String], env: &Environment) -> Result<(), ElementError> {
        let (label, rest) = match args {
            [] => (String::new(), &args[..]),
            [label, rest @ ..] => (label.trim_matches('"').to_string(), rest),
        };
        self.label = label;
        self.max_bytes = parse_count(rest, "Print", 24)?;
        self.logger = Some(env.logger.clone());
        Ok(())
    }

    fn push(&mut self, _port: usize, packet: Packet, out: &mut Output) {
        if let Some(logger) = &self.logger {
            let shown = packet.len().min(self.max_bytes);
            let hex: Vec<String> = packet.data()[..shown]
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect();
            log_info!(
                logger,
                Facility::Pipeline,
                "{}{}{:4} | {}",
                self.label,
                if self.label.is_empty() { "" } else { ": " },
                packet.len(),
                hex.join("")
            );
        }
        out.push(0, packet);
    }
}

/// Never emits, drops anything pushed to it
#[derive(Debug, Default)]
pub struct Idle;

impl Element for Idle {
    fn class_name(&self) -> &'static str {
        "Idle"
    }
}
