// SPDX-License-Identifier: Apache-2.0

use crate::{
    accel::{self, AccelerationBackend, Backend, EdgeTpuDriver, GpuDriver},
    engine::Engine,
    Config,
};
use log::debug;
use std::{fmt, sync::Arc};

/// The collaborators inference contexts are created against: an execution
/// engine, the accelerator drivers that are present and the policy knobs.
#[derive(Clone)]
pub struct Runtime {
    engine: Arc<dyn Engine>,
    edgetpu: Option<Arc<dyn EdgeTpuDriver>>,
    gpu: Option<Arc<dyn GpuDriver>>,
    config: Config,
}

impl Runtime {
    /// Creates a runtime without accelerator drivers.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Runtime {
            engine,
            edgetpu: None,
            gpu: None,
            config: Config::default(),
        }
    }

    /// Creates a runtime over the native TensorFlow Lite engine with both
    /// accelerator drivers, configured from the environment.
    #[cfg(feature = "tflite")]
    pub fn tflite() -> crate::Result<Self> {
        use crate::engine::tflite::{EdgeTpuApi, GpuApi, TfLiteEngine};

        Ok(Runtime::new(Arc::new(TfLiteEngine::new()))
            .with_edgetpu(Arc::new(EdgeTpuApi))
            .with_gpu(Arc::new(GpuApi))
            .with_config(Config::from_env()?))
    }

    pub fn with_edgetpu(mut self, driver: Arc<dyn EdgeTpuDriver>) -> Self {
        self.edgetpu = Some(driver);
        self
    }

    pub fn with_gpu(mut self, driver: Arc<dyn GpuDriver>) -> Self {
        self.gpu = Some(driver);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn engine(&self) -> &dyn Engine {
        &*self.engine
    }

    pub fn edgetpu_driver(&self) -> Option<Arc<dyn EdgeTpuDriver>> {
        self.edgetpu.clone()
    }

    pub fn gpu_driver(&self) -> Option<Arc<dyn GpuDriver>> {
        self.gpu.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Probes which acceleration backends could currently be used.
    ///
    /// Each probe constructs a transient backend and releases it before
    /// returning.
    pub fn available_backends(&self) -> AccelerationBackend {
        accel::PRIORITY
            .into_iter()
            .filter(|&kind| {
                let available = Backend::probe(kind, self).is_some_and(|b| b.is_available());
                debug!("{:?} available: {}", kind, available);
                available
            })
            .fold(AccelerationBackend::NONE, |mask, kind| mask | kind)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("edgetpu", &self.edgetpu.is_some())
            .field("gpu", &self.gpu.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Harness, MockEngine};

    #[test]
    fn no_drivers_means_cpu_only() {
        let runtime = Runtime::new(Arc::new(MockEngine::new()));
        assert_eq!(runtime.available_backends(), AccelerationBackend::NONE);
        assert!(runtime.edgetpu_driver().is_none());
    }

    #[test]
    fn every_available_backend_is_reported() {
        let harness = Harness::new().with_edgetpu_devices(2).with_gpu(true);
        assert_eq!(
            harness.runtime().available_backends(),
            AccelerationBackend::EDGETPU | AccelerationBackend::GPU
        );

        let harness = Harness::new().with_gpu(true);
        assert_eq!(
            harness.runtime().available_backends(),
            AccelerationBackend::GPU
        );
    }

    #[test]
    fn probing_releases_everything_it_acquires() {
        let harness = Harness::new().with_edgetpu_devices(1).with_gpu(true);
        harness.runtime().available_backends();

        assert_eq!(harness.gpu.stats().delegates_created(), 1);
        assert_eq!(harness.edgetpu.stats().device_listings(), 1);
        assert!(harness.all_released());
    }
}
