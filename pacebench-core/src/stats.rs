// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Reduction of per-worker mean latencies into summary statistics.

use serde::{Deserialize, Serialize};

/// Median of a sample. Sorts `values` in place.
///
/// Odd counts return the middle value, even counts the average of the two
/// middle values. An empty sample yields 0.0.
pub fn median(values: &mut [f64]) -> f64 {
    let len = values.len();
    if len == 0 {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    if len % 2 == 0 {
        (values[len / 2] + values[len / 2 - 1]) / 2.0
    } else {
        values[len / 2]
    }
}

/// Mean, min, max and median of per-worker mean latencies, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl LatencySummary {
    /// Reduce per-worker means. The slice is reordered by the median.
    pub fn from_worker_means(means: &mut [f64]) -> Self {
        if means.is_empty() {
            return Self::default();
        }

        let sum: f64 = means.iter().sum();
        let min = means.iter().copied().fold(f64::INFINITY, f64::min);
        let max = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // rounding can push the quotient a hair outside [min, max]
        let mean = (sum / means.len() as f64).max(min).min(max);

        Self {
            mean,
            min,
            max,
            median: median(means),
        }
    }

    /// All four statistics collapsed onto one value, as for single-worker runs.
    pub fn single(value: f64) -> Self {
        Self {
            mean: value,
            min: value,
            max: value,
            median: value,
        }
    }
}
