// SPDX-License-Identifier: Apache-2.0

use super::ElementType;
use crate::LoadError;
use std::borrow::Cow;

/// The element type and shape of a tensor.
///
/// Used both for the contract a caller expects when creating a context and
/// for the contract the engine actually reports. The rank is the length of
/// `shape`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor<'a> {
    pub element_type: ElementType,
    pub shape: Cow<'a, [usize]>,
    pub name: Option<Cow<'a, str>>,
}

/// Why two tensor contracts are incompatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    Type {
        expected: ElementType,
        actual: ElementType,
    },
    Shape,
}

impl From<Mismatch> for LoadError {
    fn from(mismatch: Mismatch) -> Self {
        match mismatch {
            Mismatch::Type { .. } => LoadError::IncorrectArgumentTypes,
            Mismatch::Shape => LoadError::IncorrectArgumentSizes,
        }
    }
}

impl<'a> TensorDescriptor<'a> {
    pub fn new(element_type: ElementType, shape: impl Into<Cow<'a, [usize]>>) -> Self {
        TensorDescriptor {
            element_type,
            shape: shape.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<Cow<'a, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements described by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of bytes a buffer for this tensor must hold, if the element
    /// type has a fixed width.
    pub fn byte_size(&self) -> Option<usize> {
        self.element_type
            .byte_width()
            .map(|width| width * self.element_count())
    }

    /// Checks this (expected) contract against the `actual` one.
    ///
    /// Element types must be identical and checked first; then ranks and
    /// every dimension must agree. Names are not compared.
    pub fn check(&self, actual: &TensorDescriptor<'_>) -> Result<(), Mismatch> {
        if self.element_type != actual.element_type {
            return Err(Mismatch::Type {
                expected: self.element_type,
                actual: actual.element_type,
            });
        }

        if self.shape != actual.shape {
            return Err(Mismatch::Shape);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_tensor(shape: &[usize]) -> TensorDescriptor<'_> {
        TensorDescriptor::new(ElementType::Float32, shape)
    }

    #[test]
    fn identical_contracts_match() {
        let expected = f32_tensor(&[1, 1]);
        let actual = f32_tensor(&[1, 1]).with_name("serving_default_dense_input:0");

        assert_eq!(expected.check(&actual), Ok(()));
    }

    #[test]
    fn element_type_is_checked_before_shape() {
        let expected = TensorDescriptor::new(ElementType::Int32, &[1usize][..]);
        let actual = f32_tensor(&[1, 1]);

        assert_eq!(
            expected.check(&actual),
            Err(Mismatch::Type {
                expected: ElementType::Int32,
                actual: ElementType::Float32,
            })
        );
    }

    #[test]
    fn no_implicit_widening() {
        let expected = TensorDescriptor::new(ElementType::Float64, &[1usize][..]);
        let actual = f32_tensor(&[1]);

        assert_eq!(
            LoadError::from(expected.check(&actual).unwrap_err()),
            LoadError::IncorrectArgumentTypes
        );
    }

    #[test]
    fn rank_and_dimension_mismatches_are_shape_errors() {
        let actual = f32_tensor(&[1, 1]);

        assert_eq!(f32_tensor(&[1]).check(&actual), Err(Mismatch::Shape));
        assert_eq!(f32_tensor(&[1, 1, 1]).check(&actual), Err(Mismatch::Shape));
        assert_eq!(f32_tensor(&[1, 2]).check(&actual), Err(Mismatch::Shape));
        assert_eq!(
            LoadError::from(Mismatch::Shape),
            LoadError::IncorrectArgumentSizes
        );
    }

    #[test]
    fn byte_size_follows_shape_and_width() {
        assert_eq!(f32_tensor(&[2, 3]).byte_size(), Some(24));
        assert_eq!(f32_tensor(&[]).byte_size(), Some(4));
        assert_eq!(
            TensorDescriptor::new(ElementType::String, &[4usize][..]).byte_size(),
            None
        );
    }
}
