// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Per-step invocation statistics

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Aggregated wall-time statistics of one step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilingStats {
    /// Number of invocations
    pub calls: u64,
    /// Sum of wall times, in seconds
    pub total_secs: f64,
    /// Longest single invocation, in seconds
    pub max_secs: f64,
}

impl ProfilingStats {
    /// Mean wall time per invocation, in seconds
    pub fn mean_secs(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_secs / self.calls as f64
        }
    }

    fn record(&mut self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        self.calls += 1;
        self.total_secs += secs;
        if secs > self.max_secs {
            self.max_secs = secs;
        }
    }
}

/// Collects profiling samples from concurrent invocations
#[derive(Debug, Default)]
pub struct Profiler {
    stats: Mutex<IndexMap<String, ProfilingStats>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation of `step`
    pub fn record(&self, step: &str, elapsed: Duration) {
        let mut stats = match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stats.entry(step.to_string()).or_default().record(elapsed);
    }

    /// Snapshot of the statistics, in order of first invocation
    pub fn snapshot(&self) -> IndexMap<String, ProfilingStats> {
        match self.stats.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn reset(&self) {
        match self.stats.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}
