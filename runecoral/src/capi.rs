// SPDX-License-Identifier: Apache-2.0

//! The C ABI.
//!
//! The functions at the top level work against any [`Runtime`]; with the
//! `tflite` feature they are exported under their C names (see [`exports`]),
//! bound to a process-wide TensorFlow Lite runtime.

use crate::{
    accel::AccelerationBackend,
    tensor::{ElementType, Tensor, TensorDescriptor, TensorMut},
    InferError, InferenceContext, LoadError, Runtime, MIME_TYPE,
};
use libc::{c_char, c_int, c_void, size_t};
use log::{error, warn};
use std::{
    borrow::Cow,
    ffi::{CStr, CString},
    ptr, slice,
    sync::OnceLock,
};

/// The accepted model mimetype, nul-terminated.
pub const RUNE_CORAL_MIME_TYPE_TFLITE: &CStr = c"application/tflite-model";

/// A row-major N-dimensional tensor as seen from C.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RuneCoralTensor {
    /// An `ElementType` discriminant.
    pub type_: u32,
    /// Opaque bytes containing the tensor's data.
    pub data: *mut c_void,
    /// The length of each of the tensor's dimensions.
    pub shape: *const c_int,
    pub rank: c_int,
    /// Optional nul-terminated tensor name.
    pub name: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuneCoralLoadResult {
    Ok = 0,
    IncorrectMimeType = 1,
    IncorrectArgumentTypes = 2,
    IncorrectArgumentSizes = 3,
    InternalError = 4,
}

impl From<LoadError> for RuneCoralLoadResult {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::IncorrectMimeType => RuneCoralLoadResult::IncorrectMimeType,
            LoadError::IncorrectArgumentTypes => RuneCoralLoadResult::IncorrectArgumentTypes,
            LoadError::IncorrectArgumentSizes => RuneCoralLoadResult::IncorrectArgumentSizes,
            LoadError::InternalError => RuneCoralLoadResult::InternalError,
        }
    }
}

/// Values match `TfLiteStatus`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuneCoralInferenceResult {
    Ok = 0,
    Error = 1,
    DelegateError = 2,
    ApplicationError = 3,
}

impl From<InferError> for RuneCoralInferenceResult {
    fn from(err: InferError) -> Self {
        match err {
            InferError::Interpreter => RuneCoralInferenceResult::Error,
            InferError::Delegate => RuneCoralInferenceResult::DelegateError,
            InferError::Application => RuneCoralInferenceResult::ApplicationError,
        }
    }
}

/// An inference context plus C views of its tensor contracts.
pub struct RuneCoralContext {
    context: InferenceContext,
    inputs: Vec<RuneCoralTensor>,
    outputs: Vec<RuneCoralTensor>,
    // Backing storage for the pointers in `inputs` and `outputs`
    _shapes: Vec<Box<[c_int]>>,
    _names: Vec<CString>,
}

impl RuneCoralContext {
    fn new(context: InferenceContext) -> Self {
        let mut shapes = Vec::new();
        let mut names = Vec::new();

        let mut describe = |descriptors: &[TensorDescriptor<'static>]| {
            descriptors
                .iter()
                .map(|descriptor| {
                    let shape: Box<[c_int]> = descriptor
                        .shape
                        .iter()
                        .map(|&d| c_int::try_from(d).unwrap_or(c_int::MAX))
                        .collect();
                    let name = descriptor
                        .name
                        .as_deref()
                        .and_then(|name| CString::new(name).ok());

                    let tensor = RuneCoralTensor {
                        type_: descriptor.element_type.into(),
                        data: ptr::null_mut(),
                        shape: shape.as_ptr(),
                        rank: shape.len() as c_int,
                        name: name.as_ref().map_or(ptr::null(), |name| name.as_ptr()),
                    };
                    shapes.push(shape);
                    names.extend(name);
                    tensor
                })
                .collect::<Vec<_>>()
        };

        let inputs = describe(context.inputs());
        let outputs = describe(context.outputs());

        RuneCoralContext {
            context,
            inputs,
            outputs,
            _shapes: shapes,
            _names: names,
        }
    }

    pub fn context(&self) -> &InferenceContext {
        &self.context
    }
}

/// Reads `len` elements from a C array; `None` for a null array with
/// elements.
unsafe fn c_slice<'a, T>(data: *const T, len: size_t) -> Option<&'a [T]> {
    if len == 0 {
        Some(&[])
    } else if data.is_null() {
        None
    } else {
        Some(unsafe { slice::from_raw_parts(data, len) })
    }
}

/// Converts a caller-declared C tensor into a contract.
unsafe fn descriptor_from_c(
    tensor: &RuneCoralTensor,
) -> Result<TensorDescriptor<'static>, LoadError> {
    let element_type = ElementType::try_from(tensor.type_).map_err(|_| {
        warn!("Unknown element type {}", tensor.type_);
        LoadError::IncorrectArgumentTypes
    })?;

    let rank = usize::try_from(tensor.rank).map_err(|_| LoadError::IncorrectArgumentSizes)?;
    let dims = unsafe { c_slice(tensor.shape, rank) }.ok_or(LoadError::IncorrectArgumentSizes)?;
    let shape = dims
        .iter()
        .map(|&d| usize::try_from(d).map_err(|_| LoadError::IncorrectArgumentSizes))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TensorDescriptor::new(element_type, shape))
}

unsafe fn descriptors_from_c(
    tensors: *const RuneCoralTensor,
    count: size_t,
) -> Result<Vec<TensorDescriptor<'static>>, LoadError> {
    unsafe { c_slice(tensors, count) }
        .ok_or(LoadError::IncorrectArgumentSizes)?
        .iter()
        .map(|tensor| unsafe { descriptor_from_c(tensor) })
        .collect()
}

/// Creates a context, storing it in `*context` (null on failure).
///
/// # Safety
///
/// `mimetype` must be null or a nul-terminated string. `model` must point
/// to `model_len` readable bytes, and `inputs`/`outputs` to `num_inputs` /
/// `num_outputs` tensors whose `shape` arrays hold `rank` elements.
/// `context` must be null or writable.
#[allow(clippy::too_many_arguments)]
pub unsafe fn create_inference_context(
    runtime: &Runtime,
    mimetype: *const c_char,
    model: *const c_void,
    model_len: size_t,
    inputs: *const RuneCoralTensor,
    num_inputs: size_t,
    outputs: *const RuneCoralTensor,
    num_outputs: size_t,
    backends: u32,
    context: *mut *mut RuneCoralContext,
) -> RuneCoralLoadResult {
    let known_mimetype = !mimetype.is_null()
        && unsafe { CStr::from_ptr(mimetype) }.to_bytes() == MIME_TYPE.as_bytes();
    if let Some(context) = unsafe { context.as_mut() } {
        *context = ptr::null_mut();
    }

    if !known_mimetype {
        return RuneCoralLoadResult::IncorrectMimeType;
    }
    if context.is_null() {
        return RuneCoralLoadResult::InternalError;
    }

    let model = match unsafe { c_slice(model.cast::<u8>(), model_len) } {
        Some(model) => model,
        None => return RuneCoralLoadResult::InternalError,
    };

    let created = unsafe { descriptors_from_c(inputs, num_inputs) }.and_then(|inputs| {
        let outputs = unsafe { descriptors_from_c(outputs, num_outputs) }?;
        InferenceContext::create(
            runtime,
            MIME_TYPE,
            model,
            &inputs,
            &outputs,
            AccelerationBackend::from_bits_truncate(backends),
        )
    });

    match created {
        Ok(created) => {
            unsafe { *context = Box::into_raw(Box::new(RuneCoralContext::new(created))) };
            RuneCoralLoadResult::Ok
        }
        Err(err) => err.into(),
    }
}

/// Number of operators in the model; 0 for a null context.
///
/// # Safety
///
/// `context` must be null or a live context.
pub unsafe fn inference_context_op_count(context: *const RuneCoralContext) -> c_int {
    match unsafe { context.as_ref() } {
        Some(context) => c_int::try_from(context.context.op_count()).unwrap_or(c_int::MAX),
        None => 0,
    }
}

unsafe fn tensors_out(tensors: &[RuneCoralTensor], out: *mut *const RuneCoralTensor) -> size_t {
    if let Some(out) = unsafe { out.as_mut() } {
        *out = tensors.as_ptr();
    }
    tensors.len()
}

/// Stores the input contracts in `*tensors` and returns their count.
///
/// The array is owned by the context and valid until it is destroyed.
///
/// # Safety
///
/// `context` must be null or a live context, `tensors` null or writable.
pub unsafe fn inference_context_inputs(
    context: *const RuneCoralContext,
    tensors: *mut *const RuneCoralTensor,
) -> size_t {
    match unsafe { context.as_ref() } {
        Some(context) => unsafe { tensors_out(&context.inputs, tensors) },
        None => unsafe { tensors_out(&[], tensors) },
    }
}

/// Stores the output contracts in `*tensors` and returns their count.
///
/// # Safety
///
/// See [`inference_context_inputs`].
pub unsafe fn inference_context_outputs(
    context: *const RuneCoralContext,
    tensors: *mut *const RuneCoralTensor,
) -> size_t {
    match unsafe { context.as_ref() } {
        Some(context) => unsafe { tensors_out(&context.outputs, tensors) },
        None => unsafe { tensors_out(&[], tensors) },
    }
}

/// Runs inference, copying the interpreter's byte length for each tensor.
///
/// # Safety
///
/// `context` must be null or a live context. Each tensor's `data` must
/// hold at least as many bytes as the corresponding context tensor; sizes
/// are not checked.
pub unsafe fn infer(
    context: *mut RuneCoralContext,
    inputs: *const RuneCoralTensor,
    num_inputs: size_t,
    outputs: *mut RuneCoralTensor,
    num_outputs: size_t,
) -> RuneCoralInferenceResult {
    let context = match unsafe { context.as_mut() } {
        Some(context) => &mut context.context,
        None => return RuneCoralInferenceResult::Error,
    };

    if num_inputs != context.inputs().len() || num_outputs != context.outputs().len() {
        error!(
            "Got {} inputs and {} outputs, the model has {} and {}",
            num_inputs,
            num_outputs,
            context.inputs().len(),
            context.outputs().len()
        );
        return RuneCoralInferenceResult::Error;
    }

    let (c_inputs, c_outputs) = match unsafe {
        (
            c_slice(inputs, num_inputs),
            c_slice(outputs.cast_const(), num_outputs),
        )
    } {
        (Some(inputs), Some(outputs)) => (inputs, outputs),
        _ => return RuneCoralInferenceResult::Error,
    };

    let mut input_tensors = Vec::with_capacity(num_inputs);
    for (i, tensor) in c_inputs.iter().enumerate() {
        let element_type = context.inputs()[i].element_type;
        let buffer = match context.input_byte_len(i) {
            Some(len) => unsafe { c_slice(tensor.data.cast_const().cast::<u8>(), len) },
            None => None,
        };
        match buffer {
            Some(buffer) => input_tensors.push(Tensor {
                element_type,
                buffer,
                shape: Cow::Borrowed(&[]),
            }),
            None => return RuneCoralInferenceResult::Error,
        }
    }

    let mut output_tensors = Vec::with_capacity(num_outputs);
    for (i, tensor) in c_outputs.iter().enumerate() {
        let element_type = context.outputs()[i].element_type;
        let len = match context.output_byte_len(i) {
            Some(len) => len,
            None => return RuneCoralInferenceResult::Error,
        };
        if len > 0 && tensor.data.is_null() {
            return RuneCoralInferenceResult::Error;
        }
        let buffer: &mut [u8] = if len == 0 {
            &mut []
        } else {
            unsafe { slice::from_raw_parts_mut(tensor.data.cast::<u8>(), len) }
        };
        output_tensors.push(TensorMut {
            element_type,
            buffer,
            shape: Cow::Borrowed(&[]),
        });
    }

    match context.infer(&input_tensors, &mut output_tensors) {
        Ok(()) => RuneCoralInferenceResult::Ok,
        Err(err) => err.into(),
    }
}

/// Destroys `*context` and nulls it. Null pointers are ignored.
///
/// # Safety
///
/// `context` must be null or point to null or a live context.
pub unsafe fn destroy_inference_context(context: *mut *mut RuneCoralContext) {
    if let Some(context) = unsafe { context.as_mut() } {
        if !context.is_null() {
            unsafe { drop(Box::from_raw(*context)) };
            *context = ptr::null_mut();
        }
    }
}

/// Bitmask of the acceleration backends usable right now.
pub fn available_acceleration_backends(runtime: &Runtime) -> u32 {
    runtime.available_backends().bits()
}

/// Returns the value in `cell`, running `init` on every call until it
/// succeeds once. Failures are not cached.
#[cfg_attr(not(feature = "tflite"), allow(dead_code))]
fn get_or_try_init<T, E>(cell: &OnceLock<T>, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }

    // A concurrent caller may win the race; its value is kept and ours dropped
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}

/// `#[no_mangle]` symbols bound to the native TensorFlow Lite runtime.
///
/// The runtime is set up on first use from the `RUNECORAL_*` environment
/// variables. If that fails (e.g. `RUNECORAL_EDGETPU_DEVICE` is malformed),
/// the failing call logs the error and returns `InternalError` (or `0` from
/// `available_acceleration_backends`); the next call tries again.
#[cfg(feature = "tflite")]
pub mod exports {
    use super::*;
    use env_logger::Env;

    static RUNTIME: OnceLock<Runtime> = OnceLock::new();

    fn runtime() -> Option<&'static Runtime> {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .try_init();

        match get_or_try_init(&RUNTIME, Runtime::tflite) {
            Ok(runtime) => Some(runtime),
            Err(e) => {
                error!("Could not set up the runtime: {}", e);
                None
            }
        }
    }

    #[no_mangle]
    pub extern "C" fn runecoral_mimetype() -> *const c_char {
        RUNE_CORAL_MIME_TYPE_TFLITE.as_ptr()
    }

    #[no_mangle]
    pub extern "C" fn available_acceleration_backends() -> u32 {
        runtime().map_or(0, super::available_acceleration_backends)
    }

    /// # Safety
    ///
    /// See [`super::create_inference_context`].
    #[no_mangle]
    #[allow(clippy::too_many_arguments)]
    pub unsafe extern "C" fn create_inference_context(
        mimetype: *const c_char,
        model: *const c_void,
        model_len: size_t,
        inputs: *const RuneCoralTensor,
        num_inputs: size_t,
        outputs: *const RuneCoralTensor,
        num_outputs: size_t,
        backends: u32,
        context: *mut *mut RuneCoralContext,
    ) -> RuneCoralLoadResult {
        let runtime = match runtime() {
            Some(runtime) => runtime,
            None => return RuneCoralLoadResult::InternalError,
        };

        unsafe {
            super::create_inference_context(
                runtime,
                mimetype,
                model,
                model_len,
                inputs,
                num_inputs,
                outputs,
                num_outputs,
                backends,
                context,
            )
        }
    }

    /// # Safety
    ///
    /// `context` must be null or a live context.
    #[no_mangle]
    pub unsafe extern "C" fn inference_context_op_count(context: *const RuneCoralContext) -> c_int {
        unsafe { super::inference_context_op_count(context) }
    }

    /// # Safety
    ///
    /// See [`super::inference_context_inputs`].
    #[no_mangle]
    pub unsafe extern "C" fn inference_context_inputs(
        context: *const RuneCoralContext,
        tensors: *mut *const RuneCoralTensor,
    ) -> size_t {
        unsafe { super::inference_context_inputs(context, tensors) }
    }

    /// # Safety
    ///
    /// See [`super::inference_context_outputs`].
    #[no_mangle]
    pub unsafe extern "C" fn inference_context_outputs(
        context: *const RuneCoralContext,
        tensors: *mut *const RuneCoralTensor,
    ) -> size_t {
        unsafe { super::inference_context_outputs(context, tensors) }
    }

    /// # Safety
    ///
    /// See [`super::infer`].
    #[no_mangle]
    pub unsafe extern "C" fn infer(
        context: *mut RuneCoralContext,
        inputs: *const RuneCoralTensor,
        num_inputs: size_t,
        outputs: *mut RuneCoralTensor,
        num_outputs: size_t,
    ) -> RuneCoralInferenceResult {
        unsafe { super::infer(context, inputs, num_inputs, outputs, num_outputs) }
    }

    /// # Safety
    ///
    /// See [`super::destroy_inference_context`].
    #[no_mangle]
    pub unsafe extern "C" fn destroy_inference_context(context: *mut *mut RuneCoralContext) {
        unsafe { super::destroy_inference_context(context) }
    }
}
