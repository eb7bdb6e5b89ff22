// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! pacebench benchmark engine
//!
//! Measures the per-iteration latency and CPU cost of small operations.
//!
//! # Pieces
//!
//! - **Benchmark**: fixed-count runs over N workers, or paced runs at a
//!   target frequency (adaptive sleep, adaptive spin, fixed interval)
//! - **Write target**: per-worker files for I/O-backed operations
//! - **Batches**: fixed-count, peak (paused) and frequency sweeps
//! - **Reports**: camelCase JSON documents to a file or stdout
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pacebench_benchmark::{operation, Batch, Benchmark};
//! use pacebench_core::AccountingSources;
//!
//! let sources = Arc::new(AccountingSources::default());
//! let mut bench = Benchmark::new(operation::getppid, sources).executions(1000).workers(2);
//! let mut batch = Batch::new(10);
//! batch.run(&mut bench).unwrap();
//! println!("{:?}", batch.document());
//! ```

pub mod batch;
pub mod harness;
pub mod io;
pub mod metrics;
pub mod operation;
pub mod pacing;
pub mod probes;
pub mod reporter;

pub use batch::{Batch, FrequencySweep};
pub use harness::{Benchmark, Mode, Operation, RunContext};
pub use io::WriteTarget;
pub use metrics::{
    BatchDocument, BatchKind, BatchReport, ReportMetadata, RunResult, SweepDocument, SystemInfo,
};
pub use pacing::{PacedOutcome, Pacer};
pub use reporter::{JsonReporter, ReportTarget, ReporterError};
