// SPDX-License-Identifier: Apache-2.0

/// Implements `TensorElement` for plain-old-data Rust types and generates the
/// reverse lookup from an `ElementType` to the Rust type name.
macro_rules! impl_tensor_elements {
    ($enum_type:ty; $($type:ty => $variant:ident),* $(,)?) => {
        $(
            impl TensorElement for $type {
                const ELEMENT_TYPE: $enum_type = <$enum_type>::$variant;
            }
        )*

        impl $enum_type {
            /// Returns the name of the corresponding Rust type
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(<$enum_type>::$variant => stringify!($type),)*
                    _ => "unknown",
                }
            }

            /// Returns true if there is a corresponding Rust type
            pub fn has_type(&self) -> bool {
                match self {
                    $(<$enum_type>::$variant => true,)*
                    _ => false,
                }
            }
        }
    };
}
