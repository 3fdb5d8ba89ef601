// SPDX-License-Identifier: Apache-2.0

//! Acceleration backends and the protocol for binding one to an interpreter.
//!
//! Candidates are tried in a fixed priority order (EdgeTPU, then GPU). The
//! first one that was requested, is available and binds successfully wins;
//! when none does, inference runs on the CPU.

use crate::{engine::Interpreter, Config, Runtime};
use bitflags::bitflags;
use log::{debug, info, warn};

pub mod edgetpu;
pub mod gpu;

pub use edgetpu::{DeviceType, EdgeTpuBackend, EdgeTpuDevice, EdgeTpuDriver};
pub use gpu::{GpuBackend, GpuDriver};

bitflags! {
    /// A set of acceleration backends.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccelerationBackend: u32 {
        const NONE = 0;
        const EDGETPU = 1 << 0;
        const GPU = 1 << 1;
    }
}

/// Candidates in the order they are attempted.
pub(crate) const PRIORITY: [AccelerationBackend; 2] =
    [AccelerationBackend::EDGETPU, AccelerationBackend::GPU];

/// A backend instance, owning whatever native handles it acquired.
#[derive(Debug, Default)]
pub enum Backend {
    /// Plain CPU execution.
    #[default]
    None,
    EdgeTpu(EdgeTpuBackend),
    Gpu(GpuBackend),
}

impl Backend {
    /// Constructs the backend of `kind`, acquiring its native resources.
    ///
    /// Returns `None` when the runtime has no driver for that kind.
    pub fn probe(kind: AccelerationBackend, runtime: &Runtime) -> Option<Backend> {
        if kind == AccelerationBackend::EDGETPU {
            let driver = runtime.edgetpu_driver()?;
            Some(Backend::EdgeTpu(EdgeTpuBackend::new(
                driver,
                runtime.config().edgetpu_device,
            )))
        } else if kind == AccelerationBackend::GPU {
            let driver = runtime.gpu_driver()?;
            Some(Backend::Gpu(GpuBackend::new(driver)))
        } else if kind.is_empty() {
            Some(Backend::None)
        } else {
            None
        }
    }

    /// Which backend this is.
    pub fn kind(&self) -> AccelerationBackend {
        match self {
            Backend::None => AccelerationBackend::NONE,
            Backend::EdgeTpu(_) => AccelerationBackend::EDGETPU,
            Backend::Gpu(_) => AccelerationBackend::GPU,
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Backend::None => true,
            Backend::EdgeTpu(backend) => backend.is_available(),
            Backend::Gpu(backend) => backend.is_available(),
        }
    }

    /// Attaches this backend's delegate to `interpreter`.
    ///
    /// On failure the backend keeps ownership of its delegate, so it is still
    /// released when the backend is dropped.
    pub fn bind(&mut self, interpreter: &mut dyn Interpreter) -> bool {
        match self {
            Backend::None => true,
            Backend::EdgeTpu(backend) => backend.bind(interpreter),
            Backend::Gpu(backend) => backend.bind(interpreter),
        }
    }
}

/// Outcome of backend selection.
#[derive(Debug)]
pub(crate) enum Selection {
    /// A backend is bound to the interpreter (possibly `Backend::None`).
    Bound(Backend),
    /// Acceleration was requested but nothing could be bound.
    Fallback,
    /// A requested, available backend failed to bind under strict mode.
    Failed,
}

/// Binds the highest priority backend in `requested` to `interpreter`.
pub(crate) fn select(
    requested: AccelerationBackend,
    runtime: &Runtime,
    interpreter: &mut dyn Interpreter,
) -> Selection {
    if requested.is_empty() {
        return Selection::Bound(Backend::None);
    }

    let config: &Config = runtime.config();
    for kind in PRIORITY {
        if !requested.contains(kind) {
            continue;
        }

        let mut candidate = match Backend::probe(kind, runtime) {
            Some(candidate) => candidate,
            None => {
                debug!("No driver for {:?}", kind);
                continue;
            }
        };

        if !candidate.is_available() {
            debug!("{:?} is not available", kind);
            continue;
        }

        if candidate.bind(interpreter) {
            info!("Bound {:?} acceleration backend", kind);
            return Selection::Bound(candidate);
        }

        if config.strict_acceleration {
            warn!("Could not bind {:?} and strict acceleration is set", kind);
            return Selection::Failed;
        }
        warn!("Could not bind {:?}, trying the next backend", kind);
    }

    warn!(
        "None of the requested backends ({:?}) could be used, falling back to the CPU",
        requested
    );
    Selection::Fallback
}
