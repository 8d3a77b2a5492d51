// SPDX-License-Identifier: Apache-2.0 OR MIT
use anyhow::{Context, Result};
use clap::Parser;
use netdev_bridge::controller::{
    ConfigSource, Controller, FileSource, PreambleSource, RouterFactory, ShutdownReason,
    StaticSource,
};
use netdev_bridge::device::{BufferPool, DeviceRegistry, HwAddr, NetDevice, SimDevice};
use netdev_bridge::logging::{Facility, Logger, Severity};
use netdev_bridge::pipeline::{ElementRegistry, Environment};
use netdev_bridge::settings::BridgeSettings;
use netdev_bridge::{log_info, log_notice, log_warning, metrics};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline configuration; the built-in pipeline is used if it cannot be read
    #[arg(long)]
    pipeline: Option<PathBuf>,

    /// Bridge settings (JSON5)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Number of simulated devices
    #[arg(long, default_value_t = 1)]
    devices: u8,

    #[arg(long, default_value = "info")]
    log_level: Severity,

    /// Log one JSON object per line
    #[arg(long)]
    json_logs: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    prometheus_addr: Option<SocketAddr>,
}

fn sim_devices(count: u8) -> DeviceRegistry {
    DeviceRegistry::new(
        (0..count)
            .map(|i| {
                Arc::new(SimDevice::new(
                    format!("sim{}", i),
                    HwAddr([0x02, 0x00, 0x00, 0x00, 0x00, i]),
                )) as Arc<dyn NetDevice>
            })
            .collect(),
    )
}

/// Wait for instance 0 to exit on its own or for a shutdown signal.
/// SIGINT/SIGTERM mean poweroff, SIGHUP reboot, SIGUSR1 suspend.
async fn wait_for_shutdown(controller: &Controller, logger: &Logger) -> Result<ShutdownReason> {
    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut waiter = {
        let c = controller.clone();
        tokio::task::spawn_blocking(move || c.wait(0))
    };

    loop {
        let reason = tokio::select! {
            exit = &mut waiter => {
                let exit = exit.context("instance waiter panicked")??;
                log_notice!(logger, Facility::Controller, "instance 0 exited: {:?}", exit);
                return Ok(ShutdownReason::default());
            }
            _ = tokio::signal::ctrl_c() => ShutdownReason::Poweroff,
            _ = term.recv() => ShutdownReason::Poweroff,
            _ = hup.recv() => ShutdownReason::Reboot,
            _ = usr1.recv() => ShutdownReason::Suspend,
        };
        log_notice!(logger, Facility::Controller, "Requested shutdown reason={}", reason);
        if !reason.stops_pipelines() {
            log_warning!(logger, Facility::Controller, "suspend is not supported, ignoring");
            continue;
        }
        let c = controller.clone();
        tokio::task::spawn_blocking(move || c.stop_all())
            .await
            .context("stop_all panicked")??;
        return Ok(reason);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let logger = if args.json_logs {
        Logger::stderr_json(args.log_level)
    } else {
        Logger::stderr(args.log_level)
    };

    let settings = match &args.settings {
        Some(path) => BridgeSettings::load_from_file(path)?,
        None => BridgeSettings::default(),
    };
    settings.validate()?;

    if let Some(addr) = args.prometheus_addr {
        metrics::install_prometheus_recorder(addr)?;
        log_info!(logger, Facility::Stats, "Prometheus exporter on {}", addr);
    }

    let devices = sim_devices(args.devices);
    devices
        .early_configure(&logger)
        .context("device early init failed")?;
    let preamble = devices.macaddr_preamble();
    log_info!(logger, Facility::Device, "MAC address macros:\n{}", preamble);

    let pool = BufferPool::new(settings.pool.small, settings.pool.standard, settings.pool.jumbo);
    let env = Environment {
        devices,
        pool,
        settings,
        logger: logger.clone(),
    };
    let source: Arc<dyn ConfigSource> = match args.pipeline {
        Some(path) => Arc::new(PreambleSource::new(preamble, FileSource::new(path, logger.clone()))),
        None => Arc::new(PreambleSource::new(preamble, StaticSource::default())),
    };
    let factory = RouterFactory::new(source, ElementRegistry::with_builtins(), env);
    let controller = Controller::new(Arc::new(factory), logger.clone());

    controller.start(0)?;
    let reason = wait_for_shutdown(&controller, &logger).await?;
    log_info!(logger, Facility::Controller, "Shutting down...");
    logger.flush();
    std::process::exit(reason.code());
}
