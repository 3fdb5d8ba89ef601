// SPDX-License-Identifier: Apache-2.0

pub mod descriptor;
pub mod types;
pub mod view;

pub use descriptor::{Mismatch, TensorDescriptor};
pub use types::{ElementType, TensorElement};
pub use view::{Tensor, TensorMut};
