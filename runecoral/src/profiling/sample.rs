// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

/// Represents a completed profiling sample.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    duration: Duration,
}

impl Sample {
    /// Creates a new completed sample.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Returns the duration of this sample.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Represents an active profiling sample that hasn't been completed yet.
#[derive(Debug, Clone, Copy)]
pub struct ActiveSample {
    start: Instant,
}

impl ActiveSample {
    /// Creates a new active sample starting now.
    pub fn start_now() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Completes the sample, returning a finished `Sample`.
    pub fn finish(self) -> Sample {
        Sample::new(self.start.elapsed())
    }
}
