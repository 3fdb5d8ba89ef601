// SPDX-License-Identifier: Apache-2.0

//! Hardware-acceleration-aware inference contexts for TensorFlow Lite
//! models.
//!
//! A [`Runtime`] bundles an execution engine with the accelerator drivers
//! that are present. [`InferenceContext::create`] loads a model against it,
//! binds the best requested [`AccelerationBackend`] and checks the model's
//! tensors against the caller's [`TensorDescriptor`]s; [`InferenceContext::infer`]
//! then copies tensors in, runs the graph and copies results out.
//!
//! The same operations are available over a C ABI in [`capi`].

#[macro_use]
mod macros;

pub mod accel;
pub mod capi;
pub mod config;
mod context;
pub mod engine;
mod error;
pub mod profiling;
mod runtime;
pub mod tensor;

#[cfg(test)]
mod mock;

pub use accel::AccelerationBackend;
pub use config::Config;
pub use context::InferenceContext;
pub use error::{Error, InferError, LoadError, Result};
pub use runtime::Runtime;
pub use tensor::{ElementType, Tensor, TensorDescriptor, TensorElement, TensorMut};

/// The only model format accepted by [`InferenceContext::create`].
pub const MIME_TYPE: &str = "application/tflite-model";

/// Returns the accepted model mimetype.
pub fn mimetype() -> &'static str {
    MIME_TYPE
}
