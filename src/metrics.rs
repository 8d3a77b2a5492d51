// SPDX-License-Identifier: Apache-2.0 OR MIT
//! # Metrics Module
//!
//! Exposes the bridge counters (see [`crate::bridge::stats`]) to Prometheus.

use anyhow::Result;
use std::net::SocketAddr;

#[cfg(not(test))]
pub fn install_prometheus_recorder(prometheus_addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use socket2::{Domain, Socket, Type};

    // Probe the address with SO_REUSEADDR first so a port held in TIME_WAIT
    // by a previous run does not fail the exporter bind
    let socket = Socket::new(Domain::for_address(prometheus_addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&prometheus_addr.into())?;
    drop(socket);

    PrometheusBuilder::new()
        .with_http_listener(prometheus_addr)
        .install()
        .map_err(anyhow::Error::from)?;
    crate::bridge::stats::describe_metrics();
    Ok(())
}

#[cfg(test)]
pub fn install_prometheus_recorder(_prometheus_addr: SocketAddr) -> Result<()> {
    // No HTTP listener in tests
    Ok(())
}
