// SPDX-License-Identifier: Apache-2.0

use crate::engine::{Delegate, Interpreter};
use log::{debug, warn};

/// Access to the GPU delegate library.
pub trait GpuDriver: Send + Sync {
    /// Creates a delegate with the default options, or `None` if no usable
    /// GPU is present.
    fn create_delegate(&self) -> Option<Delegate>;
}

/// Accelerates inference on a general-purpose graphics processor.
///
/// The delegate is created up front; the backend is available iff that
/// succeeded.
#[derive(Debug)]
pub struct GpuBackend {
    delegate: Option<Delegate>,
}

impl GpuBackend {
    pub fn new(driver: std::sync::Arc<dyn GpuDriver>) -> Self {
        let delegate = driver.create_delegate();
        if delegate.is_none() {
            debug!("No GPU delegate could be created");
        }

        GpuBackend { delegate }
    }

    pub fn is_available(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn bind(&mut self, interpreter: &mut dyn Interpreter) -> bool {
        let delegate = match &self.delegate {
            Some(delegate) => delegate,
            None => return false,
        };

        match unsafe { interpreter.modify_graph_with_delegate(delegate.as_ptr()) } {
            status if status.is_ok() => true,
            status => {
                warn!("Applying the GPU delegate failed: {}", status);
                false
            }
        }
    }
}
