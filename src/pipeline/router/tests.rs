use super::*;
use crate::device::{BufferPool, DeviceRegistry};
use crate::logging::{Logger, Severity};
use crate::pipeline::{ElementError, InitContext};
use crate::settings::BridgeSettings;
use std::cell::RefCell;
use std::time::Instant;

thread_local! {
    static CLEANUPS: RefCell<Vec<(&'static str, CleanupStage)>> = const { RefCell::new(Vec::new()) };
}

fn env() -> Environment {
    let (logger, _) = Logger::memory(Severity::Debug);
    Environment {
        devices: DeviceRegistry::default(),
        pool: BufferPool::new(4, 0, 0),
        settings: BridgeSettings::default(),
        logger,
    }
}

/// Emits one packet at init, then one per task run for three runs
#[derive(Default)]
struct Burst {
    task: Option<TaskHandle>,
    runs: u8,
}

impl Element for Burst {
    fn class_name(&self) -> &'static str {
        "Burst"
    }

    fn ninputs(&self) -> usize {
        0
    }

    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ElementError> {
        let task = ctx.register_task();
        task.reschedule();
        ctx.output().push(0, Packet::from_slice(&[0]));
        self.task = Some(task);
        Ok(())
    }

    fn run_task(&mut self, out: &mut Output) -> bool {
        self.runs += 1;
        out.push(0, Packet::from_slice(&[self.runs]));
        if self.runs < 3 {
            if let Some(task) = &self.task {
                task.reschedule();
            }
        }
        true
    }
}

#[derive(Default)]
struct Recorder;

impl Element for Recorder {
    fn class_name(&self) -> &'static str {
        "Recorder"
    }

    fn cleanup(&mut self, stage: CleanupStage) {
        CLEANUPS.with(|c| c.borrow_mut().push(("Recorder", stage)));
    }
}

#[derive(Default)]
struct FailInit;

impl Element for FailInit {
    fn class_name(&self) -> &'static str {
        "FailInit"
    }

    fn initialize(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ElementError> {
        Err(ElementError::Init("refusing to start".into()))
    }

    fn cleanup(&mut self, stage: CleanupStage) {
        CLEANUPS.with(|c| c.borrow_mut().push(("FailInit", stage)));
    }
}

fn registry() -> ElementRegistry {
    let mut reg = ElementRegistry::with_builtins();
    reg.register("Burst", || Box::new(Burst::default()));
    reg.register("Recorder", || Box::new(Recorder));
    reg.register("FailInit", || Box::new(FailInit));
    reg
}

fn build(text: &str) -> Result<Router, PipelineError> {
    Router::build(text, &registry(), env(), StopHandle::new())
}

#[test]
fn test_push_through_chain() {
    let mut router = build("c :: Counter; c -> d :: Discard;").unwrap();
    router.initialize().unwrap();
    for len in [10, 20, 30] {
        router.push_to("c", 0, Packet::new(vec![0; len])).unwrap();
    }
    assert_eq!(router.read_handler("c", "count").as_deref(), Some("3"));
    assert_eq!(router.read_handler("c", "byte_count").as_deref(), Some("60"));
    assert_eq!(router.read_handler("d", "count").as_deref(), Some("3"));
}

#[test]
fn test_unconnected_output_drops() {
    let mut router = build("c :: Counter;").unwrap();
    router.initialize().unwrap();
    router.push_to("c", 0, Packet::from_slice(&[1])).unwrap();
    assert_eq!(router.unconnected_drops(), 1);
}

#[test]
fn test_tee_fan_out_is_fifo() {
    let mut router =
        build("t :: Tee(2); t [0] -> a :: Counter -> Discard; t [1] -> b :: Counter -> Discard;")
            .unwrap();
    router.initialize().unwrap();
    router.push_to("t", 0, Packet::from_slice(&[1, 2])).unwrap();
    assert_eq!(router.read_handler("a", "count").as_deref(), Some("1"));
    assert_eq!(router.read_handler("b", "count").as_deref(), Some("1"));
}

#[test]
fn test_unknown_class() {
    let err = build("x :: NoSuchThing;").unwrap_err();
    assert!(matches!(err, PipelineError::UnknownClass { ref class, line: 1, .. } if class == "NoSuchThing"));
}

#[test]
fn test_bad_ports() {
    let err = build("d :: Discard; d -> Discard;").unwrap_err();
    assert!(matches!(err, PipelineError::BadPort { direction: "output", .. }));

    let err = build("Idle -> [1] Discard;").unwrap_err();
    assert!(matches!(err, PipelineError::BadPort { direction: "input", port: 1, .. }));
}

#[test]
fn test_output_port_connected_twice() {
    let err = build("i :: Idle; i -> Discard; i -> Discard;").unwrap_err();
    assert!(matches!(err, PipelineError::PortInUse { port: 0, .. }));
}

#[test]
fn test_configure_error_names_element() {
    let err = build("t :: Tee(x) -> Discard;").unwrap_err();
    assert!(matches!(err, PipelineError::Element { ref name, .. } if name == "t"));
}

#[test]
fn test_lang_error_passes_through() {
    let err = build("a :: Idle [0];").unwrap_err();
    assert!(matches!(err, PipelineError::Lang(_)));
}

#[test]
fn test_init_output_and_tasks() {
    let mut router = build("b :: Burst -> c :: Counter -> Discard;").unwrap();
    router.initialize().unwrap();
    assert!(router.is_initialized());
    assert_eq!(router.read_handler("c", "count").as_deref(), Some("1"));

    assert!(router.run_once());
    assert!(router.run_once());
    assert!(router.run_once());
    assert!(!router.run_once());
    assert_eq!(router.read_handler("c", "count").as_deref(), Some("4"));
}

#[test]
fn test_init_failure_cleanup_stages() {
    CLEANUPS.with(|c| c.borrow_mut().clear());
    let mut router = build("a :: Recorder; b :: FailInit; c :: Recorder;").unwrap();
    let err = router.initialize().unwrap_err();
    assert!(matches!(err, PipelineError::Initialize { class: "FailInit", .. }));
    assert!(!router.is_initialized());

    router.cleanup();
    router.cleanup();
    let seen = CLEANUPS.with(|c| c.borrow().clone());
    assert_eq!(
        seen,
        vec![
            ("Recorder", CleanupStage::Configured),
            ("FailInit", CleanupStage::Configured),
            ("Recorder", CleanupStage::Initialized),
        ]
    );
}

#[test]
fn test_drop_cleans_up_once() {
    CLEANUPS.with(|c| c.borrow_mut().clear());
    {
        let mut router = build("a :: Recorder;").unwrap();
        router.initialize().unwrap();
    }
    let seen = CLEANUPS.with(|c| c.borrow().clone());
    assert_eq!(seen, vec![("Recorder", CleanupStage::Initialized)]);
}

#[test]
fn test_drive_returns_on_stop() {
    let stop = StopHandle::new();
    let mut router = Router::build("Idle -> Discard;", &registry(), env(), stop.clone()).unwrap();
    router.initialize().unwrap();
    router.activate();

    let remote = stop.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        remote.please_stop();
    });
    let started = Instant::now();
    router.drive();
    stopper.join().unwrap();
    assert!(stop.stop_requested());
    assert!(started.elapsed() < Duration::from_secs(5));
}
