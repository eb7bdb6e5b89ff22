// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for harness inputs.
//!
//! Types that carry an invariant validate it at creation time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidConfigurationError;

/// Identifies one execution unit of a run, `0..num_workers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerSlot(usize);

impl WorkerSlot {
    /// The slot paced benchmarks run on.
    pub const FIRST: WorkerSlot = WorkerSlot(0);

    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Index into per-worker resources.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated target frequency in Hz.
/// Must be at least 1 Hz, anything lower cannot fill a one-second window.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct TargetFrequency(f64);

impl TargetFrequency {
    /// Create a new TargetFrequency with validation.
    pub fn new(hz: f64) -> Result<Self, InvalidConfigurationError> {
        if !hz.is_finite() || hz < 1.0 {
            return Err(InvalidConfigurationError::FrequencyTooLow { frequency: hz });
        }
        Ok(Self(hz))
    }

    /// Get the inner value in Hz.
    pub fn hz(&self) -> f64 {
        self.0
    }

    /// Number of iterations that make up one second at this frequency.
    pub fn target_iterations(&self) -> u32 {
        self.0.ceil() as u32
    }
}

impl fmt::Display for TargetFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}Hz", self.0)
    }
}

impl TryFrom<f64> for TargetFrequency {
    type Error = InvalidConfigurationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetFrequency> for f64 {
    fn from(freq: TargetFrequency) -> Self {
        freq.0
    }
}

/// How a paced benchmark waits between iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Recompute the pause every iteration and yield to the scheduler.
    #[default]
    Sleep,
    /// Recompute the pause every iteration and busy-wait on the clock.
    Spin,
    /// Sleep one precomputed interval after each iteration.
    FixedInterval,
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pacing::Sleep => write!(f, "sleep"),
            Pacing::Spin => write!(f, "spin"),
            Pacing::FixedInterval => write!(f, "fixed"),
        }
    }
}

impl FromStr for Pacing {
    type Err = InvalidConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sleep" => Ok(Pacing::Sleep),
            "spin" => Ok(Pacing::Spin),
            "fixed" | "fixed_interval" => Ok(Pacing::FixedInterval),
            _ => Err(InvalidConfigurationError::InvalidFieldValue {
                field: "pacing",
                value: s.to_string(),
                reason: "Expected one of: sleep, spin, fixed".to_string(),
            }),
        }
    }
}
