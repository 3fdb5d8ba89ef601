// SPDX-License-Identifier: Apache-2.0

use log::debug;
use std::{fmt, ptr::NonNull};

/// Opaque native delegate object (`TfLiteDelegate`).
#[repr(C)]
pub struct RawDelegate {
    _private: [u8; 0],
}

type Deleter = Box<dyn FnOnce(NonNull<RawDelegate>) + Send>;

/// An owned native delegate.
///
/// The delegate is released exactly once, through the deleter supplied by the
/// driver that created it, when this value is dropped.
pub struct Delegate {
    inner: NonNull<RawDelegate>,
    deleter: Option<Deleter>,
    name: &'static str,
}

// The delegate pointer is only reachable through this wrapper, which hands it
// to a single interpreter at a time.
unsafe impl Send for Delegate {}

impl Delegate {
    /// Takes ownership of a native delegate.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live delegate that nothing else frees, and `deleter`
    /// must be the matching release function.
    pub unsafe fn from_ptr_owned<F>(
        ptr: NonNull<RawDelegate>,
        name: &'static str,
        deleter: F,
    ) -> Self
    where
        F: FnOnce(NonNull<RawDelegate>) + Send + 'static,
    {
        Delegate {
            inner: ptr,
            deleter: Some(Box::new(deleter)),
            name,
        }
    }

    /// Returns the raw pointer for FFI calls.
    pub fn as_ptr(&self) -> NonNull<RawDelegate> {
        self.inner
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

impl Drop for Delegate {
    fn drop(&mut self) {
        if let Some(deleter) = self.deleter.take() {
            debug!("Releasing {} delegate", self.name);
            deleter(self.inner);
        }
    }
}
