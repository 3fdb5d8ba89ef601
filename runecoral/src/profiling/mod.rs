// SPDX-License-Identifier: Apache-2.0

pub mod profiler;
pub mod region;
pub mod sample;

pub use profiler::{Profiler, ProfilerScope};
pub use region::{Region, RegionStats};
pub use sample::Sample;

/// Checks if profiling is enabled at both compile-time and runtime.
#[inline]
fn is_profiling_enabled(requested: bool) -> bool {
    cfg!(feature = "profiling") && requested
}
