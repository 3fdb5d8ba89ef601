// SPDX-License-Identifier: Apache-2.0

use super::{is_profiling_enabled, Region};
use std::{collections::BTreeMap, ops::Deref};

/// Named profiling regions recorded for one component (e.g. a context).
///
/// A disabled profiler accepts every call and records nothing.
#[derive(Debug, Clone)]
pub struct Profiler {
    regions: BTreeMap<String, Region>,
    component_name: String,
    enabled: bool,
}

impl Profiler {
    pub fn new(component_name: impl Into<String>, enabled: bool) -> Self {
        Self {
            regions: BTreeMap::new(),
            component_name: component_name.into(),
            enabled: is_profiling_enabled(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn full_region_name(&self, region_name: &str) -> String {
        format!("[{}] {}", self.component_name, region_name)
    }

    /// Starts a sample for the given region.
    pub fn start(&mut self, region_name: &str) {
        if !self.enabled {
            return;
        }

        let full_name = self.full_region_name(region_name);
        self.regions.entry(full_name).or_default().start_sample();
    }

    /// Stops the running sample of the given region.
    pub fn stop(&mut self, region_name: &str) {
        if !self.enabled {
            return;
        }

        let full_name = self.full_region_name(region_name);
        if let Some(region) = self.regions.get_mut(&full_name) {
            region.stop_sample();
        }
    }

    /// Returns a region by name (applies the component prefix).
    pub fn get(&self, region_name: &str) -> Option<&Region> {
        self.regions.get(&self.full_region_name(region_name))
    }

    /// Total timings of every region, one per line.
    pub fn format_all_totals(&self) -> String {
        self.regions
            .iter()
            .map(|(name, region)| format!("{}: {}", name, region.stats()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Deref for Profiler {
    type Target = BTreeMap<String, Region>;

    fn deref(&self) -> &Self::Target {
        &self.regions
    }
}

/// RAII guard that stops its region when dropped, including on early
/// returns.
pub struct ProfilerScope<'a> {
    profiler: &'a mut Profiler,
    region_name: &'static str,
}

impl<'a> ProfilerScope<'a> {
    pub fn new(profiler: &'a mut Profiler, region_name: &'static str) -> Self {
        profiler.start(region_name);
        Self {
            profiler,
            region_name,
        }
    }
}

impl Drop for ProfilerScope<'_> {
    fn drop(&mut self) {
        self.profiler.stop(self.region_name);
    }
}
