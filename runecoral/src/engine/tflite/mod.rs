// SPDX-License-Identifier: Apache-2.0

//! The native TensorFlow Lite engine and the EdgeTPU / GPU delegate drivers.

use super::{Delegate, Engine, Interpreter, Model, RawDelegate, Status};
use crate::{
    accel::{DeviceType, EdgeTpuDevice, EdgeTpuDriver, GpuDriver},
    tensor::{ElementType, TensorDescriptor},
};
use log::{debug, warn};
use std::{
    ffi::{CStr, CString},
    ptr::{self, NonNull},
    slice,
};

pub mod ffi;
mod flatbuffer;

/// Builds models through the TensorFlow Lite C API.
#[derive(Debug, Default)]
pub struct TfLiteEngine;

impl TfLiteEngine {
    pub fn new() -> Self {
        TfLiteEngine
    }
}

impl Engine for TfLiteEngine {
    unsafe fn build_model(&self, buffer: &[u8]) -> Option<Box<dyn Model>> {
        let op_count = match flatbuffer::operator_count(buffer) {
            Some(count) => count,
            None => {
                warn!("Model buffer is not a valid flatbuffer");
                return None;
            }
        };

        let raw = unsafe { ffi::TfLiteModelCreate(buffer.as_ptr().cast(), buffer.len()) };
        let inner = NonNull::new(raw)?;
        Some(Box::new(TfLiteModel { inner, op_count }))
    }
}

struct TfLiteModel {
    inner: NonNull<ffi::TfLiteModel>,
    op_count: usize,
}

// The model is immutable once built and only freed by its owner.
unsafe impl Send for TfLiteModel {}

impl Model for TfLiteModel {
    fn build_interpreter(&self) -> Option<Box<dyn Interpreter>> {
        let inner = unsafe {
            let options = ffi::TfLiteInterpreterOptionsCreate();
            let interpreter = ffi::TfLiteInterpreterCreate(self.inner.as_ptr(), options);
            ffi::TfLiteInterpreterOptionsDelete(options);
            interpreter
        };

        Some(Box::new(TfLiteInterpreter {
            inner: NonNull::new(inner)?,
            op_count: self.op_count,
        }))
    }
}

impl Drop for TfLiteModel {
    fn drop(&mut self) {
        unsafe { ffi::TfLiteModelDelete(self.inner.as_ptr()) };
    }
}

struct TfLiteInterpreter {
    inner: NonNull<ffi::TfLiteInterpreter>,
    op_count: usize,
}

unsafe impl Send for TfLiteInterpreter {}

impl TfLiteInterpreter {
    fn input_tensor(&self, index: usize) -> Option<*const ffi::TfLiteTensor> {
        let index = i32::try_from(index).ok()?;
        let tensor = unsafe { ffi::TfLiteInterpreterGetInputTensor(self.inner.as_ptr(), index) };
        (!tensor.is_null()).then_some(tensor.cast_const())
    }

    fn output_tensor(&self, index: usize) -> Option<*const ffi::TfLiteTensor> {
        let index = i32::try_from(index).ok()?;
        let tensor = unsafe { ffi::TfLiteInterpreterGetOutputTensor(self.inner.as_ptr(), index) };
        (!tensor.is_null()).then_some(tensor)
    }
}

/// Reads the contract of a live tensor.
unsafe fn describe(tensor: *const ffi::TfLiteTensor) -> Option<TensorDescriptor<'static>> {
    let raw_type = unsafe { ffi::TfLiteTensorType(tensor) };
    let element_type = match u32::try_from(raw_type)
        .ok()
        .and_then(|t| ElementType::try_from(t).ok())
    {
        Some(element_type) => element_type,
        None => {
            warn!("Unsupported tensor type {}", raw_type);
            return None;
        }
    };

    let shape = (0..unsafe { ffi::TfLiteTensorNumDims(tensor) })
        .map(|dim| usize::try_from(unsafe { ffi::TfLiteTensorDim(tensor, dim) }).ok())
        .collect::<Option<Vec<_>>>()?;

    let descriptor = TensorDescriptor::new(element_type, shape);
    let name = unsafe { ffi::TfLiteTensorName(tensor) };
    if name.is_null() {
        return Some(descriptor);
    }

    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
    Some(descriptor.with_name(name))
}

/// The data of a live tensor as bytes.
unsafe fn tensor_bytes<'a>(tensor: *const ffi::TfLiteTensor) -> Option<&'a mut [u8]> {
    let data = unsafe { ffi::TfLiteTensorData(tensor) };
    let size = unsafe { ffi::TfLiteTensorByteSize(tensor) };
    if data.is_null() {
        return None;
    }

    Some(unsafe { slice::from_raw_parts_mut(data.cast::<u8>(), size) })
}

impl Interpreter for TfLiteInterpreter {
    fn allocate_tensors(&mut self) -> Status {
        Status::from(unsafe { ffi::TfLiteInterpreterAllocateTensors(self.inner.as_ptr()) } as u32)
    }

    unsafe fn modify_graph_with_delegate(&mut self, delegate: NonNull<RawDelegate>) -> Status {
        let delegate = delegate.as_ptr().cast::<ffi::TfLiteDelegate>();
        let status =
            unsafe { ffi::TfLiteInterpreterModifyGraphWithDelegate(self.inner.as_ptr(), delegate) };
        Status::from(status as u32)
    }

    fn input_count(&self) -> usize {
        let count = unsafe { ffi::TfLiteInterpreterGetInputTensorCount(self.inner.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    fn output_count(&self) -> usize {
        let count = unsafe { ffi::TfLiteInterpreterGetOutputTensorCount(self.inner.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    fn input_descriptor(&self, index: usize) -> Option<TensorDescriptor<'static>> {
        unsafe { describe(self.input_tensor(index)?) }
    }

    fn output_descriptor(&self, index: usize) -> Option<TensorDescriptor<'static>> {
        unsafe { describe(self.output_tensor(index)?) }
    }

    fn input_data_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        unsafe { tensor_bytes(self.input_tensor(index)?) }
    }

    fn output_data(&self, index: usize) -> Option<&[u8]> {
        unsafe { tensor_bytes(self.output_tensor(index)?) }.map(|data| &*data)
    }

    fn invoke(&mut self) -> Status {
        Status::from(unsafe { ffi::TfLiteInterpreterInvoke(self.inner.as_ptr()) } as u32)
    }

    fn op_count(&self) -> usize {
        self.op_count
    }
}

impl Drop for TfLiteInterpreter {
    fn drop(&mut self) {
        unsafe { ffi::TfLiteInterpreterDelete(self.inner.as_ptr()) };
    }
}

/// The EdgeTPU runtime library (`libedgetpu`).
#[derive(Debug, Default)]
pub struct EdgeTpuApi;

impl EdgeTpuDriver for EdgeTpuApi {
    fn list_devices(&self) -> Vec<EdgeTpuDevice> {
        let mut count: usize = 0;
        let list = unsafe { ffi::edgetpu_list_devices(&mut count) };
        if list.is_null() {
            return Vec::new();
        }

        let devices = unsafe { slice::from_raw_parts(list, count) }
            .iter()
            .filter_map(|device| {
                let device_type = match device.type_ {
                    ffi::EDGETPU_APEX_PCI => DeviceType::Pci,
                    ffi::EDGETPU_APEX_USB => DeviceType::Usb,
                    other => {
                        warn!("Skipping EdgeTPU of unknown type {}", other);
                        return None;
                    }
                };
                let path = if device.path.is_null() {
                    String::new()
                } else {
                    unsafe { CStr::from_ptr(device.path) }
                        .to_string_lossy()
                        .into_owned()
                };

                Some(EdgeTpuDevice { device_type, path })
            })
            .collect();

        unsafe { ffi::edgetpu_free_devices(list) };
        devices
    }

    fn create_delegate(&self, device: &EdgeTpuDevice) -> Option<Delegate> {
        let device_type = match device.device_type {
            DeviceType::Pci => ffi::EDGETPU_APEX_PCI,
            DeviceType::Usb => ffi::EDGETPU_APEX_USB,
        };
        let path = CString::new(device.path.as_str()).ok()?;

        let raw =
            unsafe { ffi::edgetpu_create_delegate(device_type, path.as_ptr(), ptr::null(), 0) };
        let raw = NonNull::new(raw.cast::<RawDelegate>())?;
        debug!("Created EdgeTPU delegate for {}", device.path);

        Some(unsafe {
            Delegate::from_ptr_owned(raw, "edgetpu", |delegate| {
                ffi::edgetpu_free_delegate(delegate.as_ptr().cast())
            })
        })
    }
}

/// The TensorFlow Lite GPU delegate library.
#[derive(Debug, Default)]
pub struct GpuApi;

impl GpuDriver for GpuApi {
    fn create_delegate(&self) -> Option<Delegate> {
        // Null options select the defaults
        let raw = unsafe { ffi::TfLiteGpuDelegateV2Create(ptr::null()) };
        let raw = NonNull::new(raw.cast::<RawDelegate>())?;

        Some(unsafe {
            Delegate::from_ptr_owned(raw, "gpu", |delegate| {
                ffi::TfLiteGpuDelegateV2Delete(delegate.as_ptr().cast())
            })
        })
    }
}
