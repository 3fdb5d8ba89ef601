// SPDX-License-Identifier: Apache-2.0

use crate::engine::Status;
use log::warn;
use thiserror::Error as ThisError;

/// Reasons an [`InferenceContext`](crate::InferenceContext) could not be
/// created.
///
/// Resource failures (model parsing, interpreter construction, tensor
/// allocation) all collapse onto [`LoadError::InternalError`].
#[derive(ThisError, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Incorrect mimetype")]
    IncorrectMimeType,

    #[error("Tensor element types do not match the model")]
    IncorrectArgumentTypes,

    #[error("Tensor counts or shapes do not match the model")]
    IncorrectArgumentSizes,

    #[error("Internal error")]
    InternalError,
}

/// Errors reported by the engine while running inference.
#[derive(ThisError, Debug, Copy, Clone, PartialEq, Eq)]
pub enum InferError {
    /// Generally referring to an error in the runtime (i.e. interpreter).
    #[error("The TensorFlow Lite interpreter encountered an error")]
    Interpreter,

    /// Generally referring to an error from a delegate itself.
    #[error("A delegate returned an error")]
    Delegate,

    // Returned when a delegate could not be applied because the runtime and
    // the delegate are incompatible, e.g. the graph is already immutable.
    #[error("Invalid model graph or incompatibility between runtime and delegates")]
    Application,
}

impl InferError {
    /// Converts an engine status into an inference result.
    pub fn check(status: Status) -> std::result::Result<(), InferError> {
        match status {
            Status::Ok => Ok(()),
            Status::Error => Err(InferError::Interpreter),
            Status::DelegateError => Err(InferError::Delegate),
            Status::ApplicationError => Err(InferError::Application),
            Status::Unknown(code) => {
                warn!("Engine returned unknown status {}", code);
                Err(InferError::Interpreter)
            }
        }
    }
}

/// The crate level error variants.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unable to load the model: {0}")]
    Load(#[from] LoadError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
