// SPDX-License-Identifier: Apache-2.0

use super::{ElementType, TensorDescriptor, TensorElement};
use std::borrow::Cow;

/// An immutable reference to a caller-owned tensor buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<'a> {
    pub element_type: ElementType,
    pub buffer: &'a [u8],
    pub shape: Cow<'a, [usize]>,
}

impl<'a> Tensor<'a> {
    /// Creates a new `Tensor` backed by a typed slice.
    pub fn from_slice<E: TensorElement>(slice: &'a [E], dimensions: &[usize]) -> Self {
        Tensor {
            element_type: E::ELEMENT_TYPE,
            buffer: bytemuck::cast_slice(slice),
            shape: Cow::Owned(dimensions.to_vec()),
        }
    }

    /// Creates a new `Tensor` from raw bytes.
    pub fn from_bytes(
        element_type: ElementType,
        buffer: &'a [u8],
        shape: impl Into<Cow<'a, [usize]>>,
    ) -> Self {
        Tensor {
            element_type,
            buffer,
            shape: shape.into(),
        }
    }

    /// Gets a [`TensorDescriptor`] that describes this tensor.
    pub fn descriptor(&self) -> TensorDescriptor<'_> {
        TensorDescriptor::new(self.element_type, &*self.shape)
    }
}

/// A mutable reference to a caller-owned tensor buffer.
#[derive(Debug, PartialEq)]
pub struct TensorMut<'a> {
    pub element_type: ElementType,
    pub buffer: &'a mut [u8],
    pub shape: Cow<'a, [usize]>,
}

impl<'a> TensorMut<'a> {
    /// Creates a new `TensorMut` backed by a typed slice.
    pub fn from_slice<E: TensorElement>(slice: &'a mut [E], dimensions: &[usize]) -> Self {
        TensorMut {
            element_type: E::ELEMENT_TYPE,
            buffer: bytemuck::cast_slice_mut(slice),
            shape: Cow::Owned(dimensions.to_vec()),
        }
    }

    /// Creates a new `TensorMut` from raw bytes.
    pub fn from_bytes(
        element_type: ElementType,
        buffer: &'a mut [u8],
        shape: impl Into<Cow<'a, [usize]>>,
    ) -> Self {
        TensorMut {
            element_type,
            buffer,
            shape: shape.into(),
        }
    }

    /// Gets a [`TensorDescriptor`] that describes this tensor.
    pub fn descriptor(&self) -> TensorDescriptor<'_> {
        TensorDescriptor::new(self.element_type, &*self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_slices_are_viewed_as_bytes() {
        let data = [1.0_f32, -2.5];
        let tensor = Tensor::from_slice(&data, &[1, 2]);

        assert_eq!(tensor.element_type, ElementType::Float32);
        assert_eq!(tensor.buffer.len(), 8);
        assert_eq!(&tensor.buffer[..4], &1.0_f32.to_ne_bytes());
        assert_eq!(
            tensor.descriptor(),
            TensorDescriptor::new(ElementType::Float32, vec![1usize, 2])
        );
    }

    #[test]
    fn writes_through_a_mutable_view_reach_the_slice() {
        let mut data = [0_i16; 2];
        {
            let tensor = TensorMut::from_slice(&mut data, &[2]);
            tensor.buffer[..2].copy_from_slice(&7_i16.to_ne_bytes());
        }

        assert_eq!(data, [7, 0]);
    }
}
