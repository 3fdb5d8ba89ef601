// SPDX-License-Identifier: Apache-2.0

//! The execution engine seam.
//!
//! An [`Engine`] parses a serialized model into a [`Model`], which builds an
//! [`Interpreter`] that owns tensor storage and executes the graph. The
//! native TensorFlow Lite implementation lives in [`tflite`] (feature
//! `tflite`); anything else implementing these traits can be plugged into a
//! [`Runtime`](crate::Runtime).

use crate::tensor::TensorDescriptor;
use derive_more::Display;
use log::warn;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::{fmt, ptr::NonNull};

mod delegate;
#[cfg(feature = "tflite")]
pub mod tflite;

pub use delegate::{Delegate, RawDelegate};

/// Status codes returned by engine operations, matching `TfLiteStatus`.
#[derive(Debug, Display, Clone, Copy, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Status {
    Ok = 0,
    Error = 1,
    DelegateError = 2,
    ApplicationError = 3,
    #[num_enum(catch_all)]
    #[display("Unknown({})", _0)]
    Unknown(u32),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        *self == Status::Ok
    }
}

/// Parses serialized models.
pub trait Engine: Send + Sync {
    /// Builds and verifies a model from `buffer`.
    ///
    /// Returns `None` if the buffer is not a valid model.
    ///
    /// # Safety
    ///
    /// The engine may keep pointers into `buffer`. The caller must keep the
    /// buffer alive, unmoved and unmodified until the returned model and
    /// every interpreter built from it have been dropped.
    unsafe fn build_model(&self, buffer: &[u8]) -> Option<Box<dyn Model>>;
}

/// A parsed model graph.
pub trait Model: Send {
    /// Builds an interpreter over this model.
    fn build_interpreter(&self) -> Option<Box<dyn Interpreter>>;
}

/// An executable session over a model, owning the tensor storage.
pub trait Interpreter: Send {
    /// Allocates backing storage for every tensor.
    fn allocate_tensors(&mut self) -> Status;

    /// Reroutes (part of) the graph through `delegate`.
    ///
    /// # Safety
    ///
    /// `delegate` must point to a live delegate that stays valid for as long
    /// as the interpreter executes the modified graph.
    unsafe fn modify_graph_with_delegate(&mut self, delegate: NonNull<RawDelegate>) -> Status;

    fn input_count(&self) -> usize;

    fn output_count(&self) -> usize;

    /// The contract of input `index` as seen by the engine.
    fn input_descriptor(&self, index: usize) -> Option<TensorDescriptor<'static>>;

    /// The contract of output `index` as seen by the engine.
    fn output_descriptor(&self, index: usize) -> Option<TensorDescriptor<'static>>;

    /// The engine's storage for input `index`.
    fn input_data_mut(&mut self, index: usize) -> Option<&mut [u8]>;

    /// The engine's storage for output `index`.
    fn output_data(&self, index: usize) -> Option<&[u8]>;

    /// Runs a single, blocking inference pass.
    fn invoke(&mut self) -> Status;

    /// Number of operators in the graph.
    fn op_count(&self) -> usize;
}

impl fmt::Debug for dyn Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("inputs", &self.input_count())
            .field("outputs", &self.output_count())
            .field("op_count", &self.op_count())
            .finish()
    }
}

impl fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").finish_non_exhaustive()
    }
}

/// Reads the actual contracts for `count` tensors using `describe`.
///
/// Returns `None` if the engine fails to describe any of them.
pub(crate) fn collect_descriptors(
    count: usize,
    describe: impl Fn(usize) -> Option<TensorDescriptor<'static>>,
) -> Option<Vec<TensorDescriptor<'static>>> {
    (0..count)
        .map(|i| {
            let descriptor = describe(i);
            if descriptor.is_none() {
                warn!("Engine could not describe tensor {}", i);
            }
            descriptor
        })
        .collect()
}
