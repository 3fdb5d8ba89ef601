// SPDX-License-Identifier: Apache-2.0

use super::sample::{ActiveSample, Sample};
use derive_more::Display;
use std::time::Duration;

/// Aggregated timings of a profiling region.
#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq)]
#[display(
    "total: {} nsec, count: {}, avg: {} nsec",
    self.total_time.as_nanos(),
    self.count,
    self.avg_time.as_nanos()
)]
pub struct RegionStats {
    pub total_time: Duration,
    pub count: usize,
    pub avg_time: Duration,
    pub min_time: Duration,
    pub max_time: Duration,
}

impl RegionStats {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut durations = samples.iter().map(Sample::duration);
        let first = match durations.next() {
            Some(first) => first,
            None => return Self::default(),
        };

        let (total_time, min_time, max_time) = durations.fold(
            (first, first, first),
            |(total, min, max), d| (total + d, min.min(d), max.max(d)),
        );
        let count = samples.len();

        Self {
            total_time,
            count,
            avg_time: total_time / count as u32,
            min_time,
            max_time,
        }
    }
}

/// The samples recorded for one named region.
#[derive(Debug, Default, Clone)]
pub struct Region {
    samples: Vec<Sample>,
    active: Option<ActiveSample>,
}

impl Region {
    /// Starts a new sample, completing a still running one first.
    pub fn start_sample(&mut self) {
        self.stop_sample();
        self.active = Some(ActiveSample::start_now());
    }

    /// Completes the running sample, if any.
    pub fn stop_sample(&mut self) {
        if let Some(active) = self.active.take() {
            self.samples.push(active.finish());
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn stats(&self) -> RegionStats {
        RegionStats::from_samples(&self.samples)
    }
}
