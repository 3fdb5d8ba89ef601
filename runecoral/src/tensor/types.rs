// SPDX-License-Identifier: Apache-2.0

use derive_more::Display;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Element types a tensor may contain.
///
/// The discriminants match `TfLiteType`, so values can cross the C boundary
/// unchanged. Only add to this enum.
#[derive(Debug, Display, Clone, Copy, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum ElementType {
    NoType = 0,
    Float32 = 1,
    Int32 = 2,
    UInt8 = 3,
    Int64 = 4,
    String = 5,
    Bool = 6,
    Int16 = 7,
    Complex64 = 8,
    Int8 = 9,
    Float16 = 10,
    Float64 = 11,
    Complex128 = 12,
}

impl ElementType {
    /// Size of a single element in bytes.
    ///
    /// Returns `None` for types without a fixed width (`NoType`, `String`).
    pub fn byte_width(&self) -> Option<usize> {
        match self {
            ElementType::NoType | ElementType::String => None,
            ElementType::Bool | ElementType::UInt8 | ElementType::Int8 => Some(1),
            ElementType::Int16 | ElementType::Float16 => Some(2),
            ElementType::Int32 | ElementType::Float32 => Some(4),
            ElementType::Int64 | ElementType::Float64 | ElementType::Complex64 => Some(8),
            ElementType::Complex128 => Some(16),
        }
    }
}

/// A Rust type that can be used as the element of a tensor.
///
/// Implemented for the fixed-width numeric types that have a direct Rust
/// counterpart.
pub trait TensorElement: bytemuck::Pod {
    const ELEMENT_TYPE: ElementType;
}

impl_tensor_elements! {
    ElementType;
    u8 => UInt8,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    half::f16 => Float16,
    f32 => Float32,
    f64 => Float64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_outside_the_enum_are_rejected() {
        assert_eq!(ElementType::try_from(1u32).ok(), Some(ElementType::Float32));
        assert_eq!(
            ElementType::try_from(12u32).ok(),
            Some(ElementType::Complex128)
        );
        assert!(ElementType::try_from(13u32).is_err());
        assert_eq!(u32::from(ElementType::Int8), 9);
    }

    #[test]
    fn element_widths_match_rust_types() {
        assert_eq!(
            ElementType::Float32.byte_width(),
            Some(std::mem::size_of::<f32>())
        );
        assert_eq!(
            ElementType::Float16.byte_width(),
            Some(std::mem::size_of::<half::f16>())
        );
        assert_eq!(ElementType::Complex64.byte_width(), Some(8));
        assert_eq!(ElementType::String.byte_width(), None);
        assert_eq!(<i64 as TensorElement>::ELEMENT_TYPE, ElementType::Int64);
        assert_eq!(ElementType::Float64.type_name(), "f64");
        assert!(!ElementType::Bool.has_type());
    }
}
