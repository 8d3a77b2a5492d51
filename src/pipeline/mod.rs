// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Packet-processing pipeline: elements, the configuration grammar, and the
//! router that builds and drives an element graph on one thread.

pub mod element;
pub mod elements;
pub mod lang;
pub mod packet;
pub mod router;
pub mod task;

pub use element::{CleanupStage, Element, ElementError, Environment, InitContext, Output};
pub use elements::ElementRegistry;
pub use lang::LangError;
pub use packet::Packet;
pub use router::Router;
pub use task::{StopHandle, TaskHandle};

use thiserror::Error;

/// Errors building or initializing a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Lang(#[from] LangError),

    #[error("line {line}: unknown element class '{class}' for '{name}'")]
    UnknownClass {
        name: String,
        class: String,
        line: usize,
    },

    #[error("{name} :: {class}: {source}")]
    Element {
        name: String,
        class: String,
        source: ElementError,
    },

    #[error("undeclared element '{0}'")]
    UnknownElement(String),

    #[error("line {line}: '{name}' has no {direction} port {port}")]
    BadPort {
        name: String,
        direction: &'static str,
        port: usize,
        line: usize,
    },

    #[error("line {line}: output port {port} of '{name}' is already connected")]
    PortInUse {
        name: String,
        port: usize,
        line: usize,
    },

    #[error("{name} :: {class}: initialization failed: {source}")]
    Initialize {
        name: String,
        class: &'static str,
        source: ElementError,
    },
}
