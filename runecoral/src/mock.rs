// SPDX-License-Identifier: Apache-2.0

//! Deterministic stand-ins for the engine and driver libraries.
//!
//! Every mock counts what it creates and what it releases, so tests can
//! assert that no native handle outlives its owner. Releases are also
//! appended to a shared journal to check teardown order.

use crate::{
    accel::{DeviceType, EdgeTpuDevice, EdgeTpuDriver, GpuDriver},
    engine::{Delegate, Engine, Interpreter, Model, RawDelegate, Status},
    tensor::{ElementType, TensorDescriptor},
    Config, Runtime,
};
use std::{
    ptr::NonNull,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

/// A serialized single-input, single-output `sin(x)` model.
pub(crate) const SINE_MODEL: &[u8] = b"SINE\x01\x00\x00\x00float32[1,1]->float32[1,1]";

const SINE_OP_COUNT: usize = 3;
pub(crate) const SINE_INPUT_NAME: &str = "serving_default_dense_input:0";
pub(crate) const SINE_OUTPUT_NAME: &str = "StatefulPartitionedCall:0";

/// Ordered record of released resources, shared by all mocks of a harness.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Create/release counters of an engine.
#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    models_created: AtomicUsize,
    models_dropped: AtomicUsize,
    interpreters_created: AtomicUsize,
    interpreters_dropped: AtomicUsize,
    delegates_applied: AtomicUsize,
    invocations: AtomicUsize,
}

impl EngineStats {
    pub(crate) fn models_created(&self) -> usize {
        self.models_created.load(Ordering::SeqCst)
    }

    pub(crate) fn models_live(&self) -> usize {
        self.models_created() - self.models_dropped.load(Ordering::SeqCst)
    }

    pub(crate) fn interpreters_created(&self) -> usize {
        self.interpreters_created.load(Ordering::SeqCst)
    }

    pub(crate) fn interpreters_live(&self) -> usize {
        self.interpreters_created() - self.interpreters_dropped.load(Ordering::SeqCst)
    }

    pub(crate) fn delegates_applied(&self) -> usize {
        self.delegates_applied.load(Ordering::SeqCst)
    }

    pub(crate) fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Shared {
    stats: EngineStats,
    journal: Journal,
    fail_interpreter: AtomicBool,
    fail_allocation: AtomicBool,
    invoke_status: Mutex<Status>,
    failing_delegates: Mutex<Vec<&'static str>>,
}

/// An engine that only understands [`SINE_MODEL`].
#[derive(Debug)]
pub(crate) struct MockEngine {
    shared: Arc<Shared>,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self::with_journal(Journal::default())
    }

    pub(crate) fn with_journal(journal: Journal) -> Self {
        MockEngine {
            shared: Arc::new(Shared {
                stats: EngineStats::default(),
                journal,
                fail_interpreter: AtomicBool::new(false),
                fail_allocation: AtomicBool::new(false),
                invoke_status: Mutex::new(Status::Ok),
                failing_delegates: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn stats(&self) -> &EngineStats {
        &self.shared.stats
    }

    pub(crate) fn fail_interpreter_build(&self) {
        self.shared.fail_interpreter.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_allocation(&self) {
        self.shared.fail_allocation.store(true, Ordering::SeqCst);
    }

    /// Makes every subsequent `invoke` return `status` without running.
    pub(crate) fn set_invoke_status(&self, status: Status) {
        *self.shared.invoke_status.lock().unwrap() = status;
    }

    /// Makes applying delegates created under `name` fail.
    pub(crate) fn fail_delegate_named(&self, name: &'static str) {
        self.shared.failing_delegates.lock().unwrap().push(name);
    }
}

impl Engine for MockEngine {
    unsafe fn build_model(&self, buffer: &[u8]) -> Option<Box<dyn Model>> {
        if buffer != SINE_MODEL {
            return None;
        }

        self.shared
            .stats
            .models_created
            .fetch_add(1, Ordering::SeqCst);
        Some(Box::new(MockModel {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockModel {
    shared: Arc<Shared>,
}

impl Model for MockModel {
    fn build_interpreter(&self) -> Option<Box<dyn Interpreter>> {
        if self.shared.fail_interpreter.load(Ordering::SeqCst) {
            return None;
        }

        self.shared
            .stats
            .interpreters_created
            .fetch_add(1, Ordering::SeqCst);
        Some(Box::new(MockInterpreter {
            shared: Arc::clone(&self.shared),
            input: Vec::new(),
            output: Vec::new(),
        }))
    }
}

impl Drop for MockModel {
    fn drop(&mut self) {
        self.shared
            .stats
            .models_dropped
            .fetch_add(1, Ordering::SeqCst);
        self.shared.journal.record("model");
    }
}

struct MockInterpreter {
    shared: Arc<Shared>,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl Interpreter for MockInterpreter {
    fn allocate_tensors(&mut self) -> Status {
        if self.shared.fail_allocation.load(Ordering::SeqCst) {
            return Status::Error;
        }

        self.input = vec![0; 4];
        self.output = vec![0; 4];
        Status::Ok
    }

    unsafe fn modify_graph_with_delegate(&mut self, delegate: NonNull<RawDelegate>) -> Status {
        let delegate = &*(delegate.as_ptr() as *const MockDelegate);
        if self
            .shared
            .failing_delegates
            .lock()
            .unwrap()
            .contains(&delegate.name)
        {
            return Status::DelegateError;
        }

        self.shared
            .stats
            .delegates_applied
            .fetch_add(1, Ordering::SeqCst);
        Status::Ok
    }

    fn input_count(&self) -> usize {
        1
    }

    fn output_count(&self) -> usize {
        1
    }

    fn input_descriptor(&self, index: usize) -> Option<TensorDescriptor<'static>> {
        (index == 0).then(|| {
            TensorDescriptor::new(ElementType::Float32, vec![1usize, 1]).with_name(SINE_INPUT_NAME)
        })
    }

    fn output_descriptor(&self, index: usize) -> Option<TensorDescriptor<'static>> {
        (index == 0).then(|| {
            TensorDescriptor::new(ElementType::Float32, vec![1usize, 1]).with_name(SINE_OUTPUT_NAME)
        })
    }

    fn input_data_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        if index == 0 && !self.input.is_empty() {
            Some(&mut self.input[..])
        } else {
            None
        }
    }

    fn output_data(&self, index: usize) -> Option<&[u8]> {
        if index == 0 && !self.output.is_empty() {
            Some(&self.output[..])
        } else {
            None
        }
    }

    fn invoke(&mut self) -> Status {
        self.shared.stats.invocations.fetch_add(1, Ordering::SeqCst);

        let status = *self.shared.invoke_status.lock().unwrap();
        if !status.is_ok() {
            return status;
        }

        let x = f32::from_ne_bytes(self.input[..4].try_into().unwrap());
        self.output.copy_from_slice(&x.sin().to_ne_bytes());
        Status::Ok
    }

    fn op_count(&self) -> usize {
        SINE_OP_COUNT
    }
}

impl Drop for MockInterpreter {
    fn drop(&mut self) {
        self.shared
            .stats
            .interpreters_dropped
            .fetch_add(1, Ordering::SeqCst);
        self.shared.journal.record("interpreter");
    }
}

/// The object a mock delegate pointer refers to.
struct MockDelegate {
    name: &'static str,
}

/// Create/release counters of a driver.
#[derive(Debug, Default)]
pub(crate) struct DriverStats {
    device_listings: AtomicUsize,
    delegates_created: AtomicUsize,
    delegates_freed: AtomicUsize,
}

impl DriverStats {
    pub(crate) fn device_listings(&self) -> usize {
        self.device_listings.load(Ordering::SeqCst)
    }

    pub(crate) fn delegates_created(&self) -> usize {
        self.delegates_created.load(Ordering::SeqCst)
    }

    pub(crate) fn delegates_live(&self) -> usize {
        self.delegates_created() - self.delegates_freed.load(Ordering::SeqCst)
    }
}

fn mock_delegate(name: &'static str, stats: &Arc<DriverStats>, journal: &Journal) -> Delegate {
    stats.delegates_created.fetch_add(1, Ordering::SeqCst);

    let raw = Box::into_raw(Box::new(MockDelegate { name })) as *mut RawDelegate;
    let stats = Arc::clone(stats);
    let journal = journal.clone();
    unsafe {
        Delegate::from_ptr_owned(NonNull::new(raw).unwrap(), name, move |ptr| {
            drop(Box::from_raw(ptr.as_ptr() as *mut MockDelegate));
            stats.delegates_freed.fetch_add(1, Ordering::SeqCst);
            journal.record(format!("{} delegate", name));
        })
    }
}

#[derive(Debug)]
pub(crate) struct MockEdgeTpu {
    devices: Vec<EdgeTpuDevice>,
    refuse_delegates: AtomicBool,
    stats: Arc<DriverStats>,
    journal: Journal,
}

impl MockEdgeTpu {
    pub(crate) fn with_devices(devices: Vec<EdgeTpuDevice>) -> Self {
        MockEdgeTpu {
            devices,
            refuse_delegates: AtomicBool::new(false),
            stats: Arc::default(),
            journal: Journal::default(),
        }
    }

    /// `count` PCI devices at `/dev/apex_N`.
    pub(crate) fn with_pci_devices(count: usize, journal: Journal) -> Self {
        let devices = (0..count)
            .map(|i| EdgeTpuDevice {
                device_type: DeviceType::Pci,
                path: format!("/dev/apex_{}", i),
            })
            .collect();

        MockEdgeTpu {
            journal,
            ..Self::with_devices(devices)
        }
    }

    pub(crate) fn refuse_delegates(&self) {
        self.refuse_delegates.store(true, Ordering::SeqCst);
    }

    pub(crate) fn stats(&self) -> &DriverStats {
        &self.stats
    }
}

impl EdgeTpuDriver for MockEdgeTpu {
    fn list_devices(&self) -> Vec<EdgeTpuDevice> {
        self.stats.device_listings.fetch_add(1, Ordering::SeqCst);
        self.devices.clone()
    }

    fn create_delegate(&self, device: &EdgeTpuDevice) -> Option<Delegate> {
        if self.refuse_delegates.load(Ordering::SeqCst) || !self.devices.contains(device) {
            return None;
        }

        Some(mock_delegate("edgetpu", &self.stats, &self.journal))
    }
}

#[derive(Debug)]
pub(crate) struct MockGpu {
    available: bool,
    stats: Arc<DriverStats>,
    journal: Journal,
}

impl MockGpu {
    pub(crate) fn new(available: bool) -> Self {
        MockGpu {
            available,
            stats: Arc::default(),
            journal: Journal::default(),
        }
    }

    pub(crate) fn stats(&self) -> &DriverStats {
        &self.stats
    }
}

impl GpuDriver for MockGpu {
    fn create_delegate(&self) -> Option<Delegate> {
        self.available
            .then(|| mock_delegate("gpu", &self.stats, &self.journal))
    }
}

/// A mock engine plus mock drivers sharing one journal.
pub(crate) struct Harness {
    pub(crate) engine: Arc<MockEngine>,
    pub(crate) edgetpu: Arc<MockEdgeTpu>,
    pub(crate) gpu: Arc<MockGpu>,
    pub(crate) journal: Journal,
    config: Config,
}

impl Harness {
    /// No EdgeTPU devices and no GPU.
    pub(crate) fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let journal = Journal::default();
        Harness {
            engine: Arc::new(MockEngine::with_journal(journal.clone())),
            edgetpu: Arc::new(MockEdgeTpu::with_pci_devices(0, journal.clone())),
            gpu: Arc::new(MockGpu {
                journal: journal.clone(),
                ..MockGpu::new(false)
            }),
            journal,
            config: Config::default(),
        }
    }

    pub(crate) fn with_edgetpu_devices(mut self, count: usize) -> Self {
        self.edgetpu = Arc::new(MockEdgeTpu::with_pci_devices(count, self.journal.clone()));
        self
    }

    pub(crate) fn with_gpu(mut self, available: bool) -> Self {
        self.gpu = Arc::new(MockGpu {
            journal: self.journal.clone(),
            ..MockGpu::new(available)
        });
        self
    }

    pub(crate) fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn runtime(&self) -> Runtime {
        Runtime::new(self.engine.clone())
            .with_edgetpu(self.edgetpu.clone())
            .with_gpu(self.gpu.clone())
            .with_config(self.config.clone())
    }

    /// True if every model, interpreter and delegate created so far has been
    /// released.
    pub(crate) fn all_released(&self) -> bool {
        self.engine.stats().models_live() == 0
            && self.engine.stats().interpreters_live() == 0
            && self.edgetpu.stats().delegates_live() == 0
            && self.gpu.stats().delegates_live() == 0
    }
}
