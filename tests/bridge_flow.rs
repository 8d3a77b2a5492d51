// SPDX-License-Identifier: Apache-2.0 OR MIT
//! End-to-end bridge tests: simulated device → FromDevice → elements →
//! ToDevice → simulated device, both on a hand-driven router and under the
//! controller's driver thread.

use netdev_bridge::controller::{
    Controller, InstanceExit, InstanceState, PreambleSource, RouterFactory, StaticSource,
    DEFAULT_PIPELINE,
};
use netdev_bridge::device::{BufferPool, DeviceInfo, DeviceRegistry, HwAddr, NetDevice, SimDevice};
use netdev_bridge::logging::{Logger, MemorySink, Severity};
use netdev_bridge::pipeline::{ElementRegistry, Environment, Router, StopHandle};
use netdev_bridge::settings::BridgeSettings;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DST: [u8; 6] = [0x02, 0, 0, 0, 0, 0xaa];
const SRC: [u8; 6] = [0x02, 0, 0, 0, 0, 0xbb];

fn frame(seq: u8, len: usize) -> Vec<u8> {
    let mut f = Vec::with_capacity(len);
    f.extend_from_slice(&DST);
    f.extend_from_slice(&SRC);
    f.extend_from_slice(&[0x08, 0x00]);
    f.resize(len, seq);
    f
}

fn mirrored(seq: u8, len: usize) -> Vec<u8> {
    let mut f = frame(seq, len);
    f[..6].copy_from_slice(&SRC);
    f[6..12].copy_from_slice(&DST);
    f
}

fn settings() -> BridgeSettings {
    BridgeSettings {
        queue_depth: 32,
        rx_buffer_size: 1536,
        idle_park_us: 100,
        ..Default::default()
    }
}

fn environment() -> (Environment, Arc<SimDevice>, MemorySink) {
    let dev = Arc::new(SimDevice::with_info(
        "sim0",
        HwAddr([0x02, 0, 0, 0, 0, 0x01]),
        DeviceInfo {
            ioalign: 64,
            nb_encap_rx: 12,
            nb_encap_tx: 12,
            ..Default::default()
        },
    ));
    let (logger, sink) = Logger::memory(Severity::Debug);
    let devices = DeviceRegistry::new(vec![dev.clone() as Arc<dyn NetDevice>]);
    devices.early_configure(&logger).unwrap();
    let env = Environment {
        devices,
        pool: BufferPool::new(64, 0, 0),
        settings: settings(),
        logger,
    };
    (env, dev, sink)
}

fn default_router() -> (Router, Arc<SimDevice>, MemorySink) {
    let (env, dev, sink) = environment();
    let router = Router::build(
        DEFAULT_PIPELINE,
        &ElementRegistry::with_builtins(),
        env,
        StopHandle::new(),
    )
    .unwrap();
    (router, dev, sink)
}

#[test]
fn test_packets_queued_before_start_are_forwarded_at_init() {
    let (mut router, dev, _) = default_router();
    for seq in 0..3 {
        dev.inject(&frame(seq, 60));
    }

    router.initialize().unwrap();

    let sent: Vec<Vec<u8>> = dev.transmitted().into_iter().map(|r| r.bytes).collect();
    assert_eq!(sent, vec![mirrored(0, 60), mirrored(1, 60), mirrored(2, 60)]);
    assert!(dev.intr_enabled());
    assert_eq!(router.read_handler("rx", "count").as_deref(), Some("3"));
    router.cleanup();
}

#[test]
fn test_interrupt_driven_forwarding_preserves_order() {
    let (mut router, dev, _) = default_router();
    router.initialize().unwrap();
    router.activate();
    assert!(dev.transmitted().is_empty());

    for seq in 0..10 {
        dev.inject(&frame(seq, 64 + seq as usize));
    }
    for _ in 0..4 {
        router.run_once();
    }

    let sent = dev.transmitted();
    assert_eq!(sent.len(), 10);
    for (seq, rec) in sent.iter().enumerate() {
        assert_eq!(rec.bytes, mirrored(seq as u8, 64 + seq));
        assert_eq!(rec.headroom, 12);
        assert!(rec.aligned);
    }
    assert_eq!(router.read_handler("source", "count").as_deref(), Some("10"));
    assert_eq!(router.read_handler("sink", "count").as_deref(), Some("10"));
    let wakeups: u64 = router
        .read_handler("source", "wakeups")
        .unwrap()
        .parse()
        .unwrap();
    assert!(wakeups >= 1);
    router.cleanup();
}

#[test]
fn test_cleanup_reports_final_stats_and_disarms_device() {
    let (mut router, dev, sink) = default_router();
    router.initialize().unwrap();
    dev.inject(&frame(7, 100));
    router.run_once();
    router.cleanup();

    assert!(!dev.intr_enabled());
    assert!(sink.contains("[STATS:Ingress FINAL] dev=0 packets=1 bytes=100"));
    assert!(sink.contains("[STATS:Egress FINAL] dev=0 packets=1 bytes=100"));
}

#[test]
fn test_stalled_tx_queue_does_not_lose_packets() {
    let (mut router, dev, _) = default_router();
    router.initialize().unwrap();
    dev.stall_tx(50);
    for seq in 0..4 {
        dev.inject(&frame(seq, 60));
    }
    router.run_once();

    let sent: Vec<Vec<u8>> = dev.transmitted().into_iter().map(|r| r.bytes).collect();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[3], mirrored(3, 60));
    router.cleanup();
}

#[test]
fn test_device_start_failure_fails_initialization() {
    let (mut router, dev, _) = default_router();
    dev.fail_next_start();
    let err = router.initialize().unwrap_err();
    assert!(err.to_string().contains("source"), "{}", err);
    router.cleanup();
    assert!(!dev.intr_enabled());
}

#[test]
fn test_controller_runs_default_pipeline() {
    let (env, dev, sink) = environment();
    let preamble = env.devices.macaddr_preamble();
    let logger = env.logger.clone();
    let factory = RouterFactory::new(
        Arc::new(PreambleSource::new(preamble, StaticSource::default())),
        ElementRegistry::with_builtins(),
        env,
    );
    let controller = Controller::new(Arc::new(factory), logger);

    controller.start(0).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while controller.state(0).unwrap() != InstanceState::Running {
        assert!(Instant::now() < deadline, "instance never came up");
        std::thread::sleep(Duration::from_millis(1));
    }

    for seq in 0..20 {
        dev.inject(&frame(seq, 80));
    }
    assert_eq!(dev.rx_dropped(), 0);
    while dev.transmitted().len() < 20 {
        assert!(Instant::now() < deadline, "only {} frames forwarded", dev.transmitted().len());
        std::thread::sleep(Duration::from_millis(1));
    }

    controller.stop_all().unwrap();
    assert_eq!(controller.wait(0).unwrap(), Some(InstanceExit::Completed));
    let sent: Vec<Vec<u8>> = dev.transmitted().into_iter().map(|r| r.bytes).collect();
    let expected: Vec<Vec<u8>> = (0..20).map(|seq| mirrored(seq, 80)).collect();
    assert_eq!(sent, expected);
    assert!(!dev.intr_enabled());
    assert!(sink.contains("[STATS:Ingress FINAL] dev=0 packets=20"));
}

#[test]
fn test_custom_pipeline_with_tee() {
    let (env, dev, _) = environment();
    let text = format!(
        "{}{}",
        env.devices.macaddr_preamble(),
        "FromDevice(0) -> t :: Tee(2);\n\
         t[0] -> ToDevice(0);\n\
         t[1] -> c :: Counter -> Discard;\n"
    );
    let mut router = Router::build(&text, &ElementRegistry::with_builtins(), env, StopHandle::new()).unwrap();
    router.initialize().unwrap();
    dev.inject(&frame(1, 64));
    router.run_once();

    assert_eq!(dev.transmitted().len(), 1);
    assert_eq!(dev.transmitted()[0].bytes, frame(1, 64));
    assert_eq!(router.read_handler("c", "count").as_deref(), Some("1"));
    router.cleanup();
}
