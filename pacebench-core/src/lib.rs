// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! pacebench Core Library
//!
//! Building blocks shared by the benchmark engine and the driver programs:
//! error taxonomy, validated inputs, configuration lookup, wall-clock and
//! CPU-time sampling, accounting-source resolution and summary statistics.

pub mod accounting;
pub mod clock;
pub mod config;
pub mod error;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use accounting::{AccountingSources, CpuSnapshot, TickSample, TimestampPair};
pub use clock::{CpuMicros, CpuTime, Timestamp};
pub use config::{BenchConfig, ConfigSource, DirectoryConfig, MapConfig};
pub use error::{BenchError, BenchResult, InvalidConfigurationError};
pub use stats::{median, LatencySummary};
pub use types::{Pacing, TargetFrequency, WorkerSlot};
