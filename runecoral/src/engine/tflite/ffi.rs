// SPDX-License-Identifier: Apache-2.0

//! Bindings to the TensorFlow Lite C API, the EdgeTPU C API and the GPU
//! delegate (V2), generated by `bindgen` from `wrapper.h`.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]

include!(concat!(env!("OUT_DIR"), "/tflite_bindings.rs"));
