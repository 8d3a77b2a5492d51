// SPDX-License-Identifier: Apache-2.0 OR MIT
// Facility/severity logging for the bridge, the pipeline driver and the controller

mod entry;
mod facility;
mod logger;
#[macro_use]
mod macros;
mod severity;
mod sink;

pub use entry::{KeyValue, LogEntry};
pub use facility::Facility;
pub use logger::Logger;
pub use severity::Severity;
pub use sink::{LogSink, MemorySink, StderrJsonSink, StderrSink};
