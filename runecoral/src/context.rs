// SPDX-License-Identifier: Apache-2.0

use crate::{
    accel::{self, AccelerationBackend, Backend, Selection},
    engine::{self, Interpreter, Model},
    profiling::{Profiler, ProfilerScope},
    tensor::{Tensor, TensorDescriptor, TensorMut},
    InferError, LoadError, Runtime, MIME_TYPE,
};
use log::{debug, error, warn};
use std::fmt;

/// A loaded model, ready to run inference.
///
/// A context owns a private copy of the model bytes, the interpreter built
/// over them and the acceleration backend bound to that interpreter. Its
/// tensor contracts and backend are fixed at creation.
///
/// `InferenceContext` is `Send` but not `Sync`: every [`infer`] call
/// overwrites the interpreter's tensor storage, so calls on one context must
/// be serialized (e.g. behind a `Mutex`). Independent contexts share nothing.
///
/// [`infer`]: InferenceContext::infer
pub struct InferenceContext {
    // Fields are dropped in declaration order: the backend (and its delegate)
    // goes first, then the interpreter, then the model, and the model bytes
    // they point into go last.
    backend: Backend,
    interpreter: Box<dyn Interpreter>,
    model: Box<dyn Model>,
    buffer: Box<[u8]>,
    inputs: Vec<TensorDescriptor<'static>>,
    outputs: Vec<TensorDescriptor<'static>>,
    profiler: Profiler,
}

impl InferenceContext {
    /// Loads `model` and validates it against the expected tensor contracts.
    ///
    /// The highest priority backend in `backends` that is available and binds
    /// is used. When none does, inference runs on the CPU unless
    /// `Config::strict_acceleration` is set, in which case a backend that was
    /// available but failed to bind is an [`LoadError::InternalError`].
    ///
    /// On any error everything acquired so far is released before returning.
    pub fn create(
        runtime: &Runtime,
        mimetype: &str,
        model: &[u8],
        inputs: &[TensorDescriptor<'_>],
        outputs: &[TensorDescriptor<'_>],
        backends: AccelerationBackend,
    ) -> Result<Self, LoadError> {
        let mut profiler = Profiler::new("runecoral", runtime.config().profiling);
        profiler.start("load");

        let mut context = Self::load(
            runtime, mimetype, model, inputs, outputs, backends, profiler,
        )?;
        context.profiler.stop("load");

        debug!(
            "Created inference context ({} inputs, {} outputs, backend {:?})",
            context.inputs.len(),
            context.outputs.len(),
            context.acceleration_backend()
        );
        Ok(context)
    }

    fn load(
        runtime: &Runtime,
        mimetype: &str,
        model: &[u8],
        inputs: &[TensorDescriptor<'_>],
        outputs: &[TensorDescriptor<'_>],
        backends: AccelerationBackend,
        profiler: Profiler,
    ) -> Result<Self, LoadError> {
        if mimetype != MIME_TYPE {
            warn!("Unsupported mimetype {:?}, expected {:?}", mimetype, MIME_TYPE);
            return Err(LoadError::IncorrectMimeType);
        }

        // Locals are released in reverse order on every early return
        let buffer: Box<[u8]> = model.into();

        // SAFETY: the buffer is heap allocated, never written to, and is
        // dropped after the model and interpreter (see the field order).
        let model = unsafe { runtime.engine().build_model(&buffer) }.ok_or_else(|| {
            error!("Could not build a model from {} bytes", buffer.len());
            LoadError::InternalError
        })?;

        let mut interpreter = model.build_interpreter().ok_or_else(|| {
            error!("Could not build an interpreter");
            LoadError::InternalError
        })?;

        let backend = match accel::select(backends, runtime, &mut *interpreter) {
            Selection::Bound(backend) => backend,
            Selection::Fallback => Backend::None,
            Selection::Failed => return Err(LoadError::InternalError),
        };

        let status = interpreter.allocate_tensors();
        if !status.is_ok() {
            error!("Could not allocate tensors: {}", status);
            return Err(LoadError::InternalError);
        }

        if interpreter.input_count() != inputs.len() || interpreter.output_count() != outputs.len()
        {
            warn!(
                "Model has {} inputs and {} outputs, caller declared {} and {}",
                interpreter.input_count(),
                interpreter.output_count(),
                inputs.len(),
                outputs.len()
            );
            return Err(LoadError::IncorrectArgumentSizes);
        }

        let actual_inputs =
            engine::collect_descriptors(inputs.len(), |i| interpreter.input_descriptor(i))
                .ok_or(LoadError::InternalError)?;
        let actual_outputs =
            engine::collect_descriptors(outputs.len(), |i| interpreter.output_descriptor(i))
                .ok_or(LoadError::InternalError)?;

        validate("input", inputs, &actual_inputs)?;
        validate("output", outputs, &actual_outputs)?;

        Ok(InferenceContext {
            backend,
            interpreter,
            model,
            buffer,
            inputs: actual_inputs,
            outputs: actual_outputs,
            profiler,
        })
    }

    /// Runs a single inference pass.
    ///
    /// Each input buffer is copied into the interpreter, the graph is
    /// executed and each output is copied back. Outputs are left untouched
    /// when execution fails, and the context stays usable.
    ///
    /// Tensors are not re-validated on each call: they must match
    /// [`inputs`](Self::inputs) and [`outputs`](Self::outputs) in count and
    /// byte size. Buffers shorter than the interpreter's tensors panic.
    pub fn infer(
        &mut self,
        inputs: &[Tensor<'_>],
        outputs: &mut [TensorMut<'_>],
    ) -> Result<(), InferError> {
        let _scope = ProfilerScope::new(&mut self.profiler, "infer");

        debug_assert_eq!(inputs.len(), self.inputs.len());
        debug_assert_eq!(outputs.len(), self.outputs.len());

        for (i, input) in inputs.iter().enumerate() {
            let storage = self.interpreter.input_data_mut(i).ok_or_else(|| {
                error!("Interpreter has no storage for input {}", i);
                InferError::Interpreter
            })?;
            let len = storage.len();
            debug_assert_eq!(input.buffer.len(), len, "input {} size", i);
            storage.copy_from_slice(&input.buffer[..len]);
        }

        InferError::check(self.interpreter.invoke())?;

        for (i, output) in outputs.iter_mut().enumerate() {
            let storage = self.interpreter.output_data(i).ok_or_else(|| {
                error!("Interpreter has no storage for output {}", i);
                InferError::Interpreter
            })?;
            debug_assert_eq!(output.buffer.len(), storage.len(), "output {} size", i);
            output.buffer[..storage.len()].copy_from_slice(storage);
        }

        Ok(())
    }

    /// The input contracts as reported by the engine.
    pub fn inputs(&self) -> &[TensorDescriptor<'static>] {
        &self.inputs
    }

    /// The output contracts as reported by the engine.
    pub fn outputs(&self) -> &[TensorDescriptor<'static>] {
        &self.outputs
    }

    /// Number of operators in the model graph.
    pub fn op_count(&self) -> usize {
        self.interpreter.op_count()
    }

    /// The backend the model runs on; `NONE` if every requested accelerator
    /// was unavailable.
    pub fn acceleration_backend(&self) -> AccelerationBackend {
        self.backend.kind()
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Byte length of the interpreter's storage for input `index`.
    pub(crate) fn input_byte_len(&mut self, index: usize) -> Option<usize> {
        self.interpreter.input_data_mut(index).map(|data| data.len())
    }

    /// Byte length of the interpreter's storage for output `index`.
    pub(crate) fn output_byte_len(&self, index: usize) -> Option<usize> {
        self.interpreter.output_data(index).map(<[u8]>::len)
    }
}

fn validate(
    kind: &str,
    expected: &[TensorDescriptor<'_>],
    actual: &[TensorDescriptor<'static>],
) -> Result<(), LoadError> {
    for (i, (expected, actual)) in expected.iter().zip(actual).enumerate() {
        if let Err(mismatch) = expected.check(actual) {
            warn!(
                "{} {} mismatch ({:?}): expected {} {:?}, model has {} {:?}",
                kind,
                i,
                mismatch,
                expected.element_type,
                expected.shape,
                actual.element_type,
                actual.shape
            );
            return Err(mismatch.into());
        }
    }

    Ok(())
}

impl fmt::Debug for InferenceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceContext")
            .field("backend", &self.backend)
            .field("interpreter", &self.interpreter)
            .field("model", &self.model)
            .field("model_bytes", &self.buffer.len())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl Drop for InferenceContext {
    fn drop(&mut self) {
        debug!(
            "Releasing inference context ({:?} backend)",
            self.backend.kind()
        );
        if self.profiler.is_enabled() && !self.profiler.is_empty() {
            debug!("Profiling:\n{}", self.profiler.format_all_totals());
        }
    }
}
