// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Frequency drivers: `sweep` and `low-workload`.

use anyhow::Context;

use pacebench_benchmark::{operation, BatchReport, FrequencySweep, ReportMetadata};
use pacebench_core::Pacing;

use super::Session;
use crate::Cli;

/// Paced one-byte writes from the minimum to the maximum frequency.
pub fn sweep(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    let min = session.config.min_frequency()?;
    let max = session.config.max_frequency()?;
    let pacing = session.config.pacing()?;
    run_sweep(&session, min, max, pacing)
}

/// The same low frequency sampled repeatedly. Fixed-interval pacing keeps
/// the per-iteration bookkeeping out of the CPU time being measured.
pub fn low_workload(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    let frequency = session.config.min_frequency()?;
    run_sweep(&session, frequency, frequency, Pacing::FixedInterval)
}

fn run_sweep(session: &Session, min: f64, max: f64, pacing: Pacing) -> anyhow::Result<()> {
    let mut template = session
        .benchmark(operation::positioned_write)?
        .paced(pacing)
        .write_target(1);
    let mut sweep = FrequencySweep::new(session.config.num_samples()?, min, max);

    tracing::info!(min_hz = min, max_hz = max, pacing = %pacing, "Running frequency sweep");

    let outcome = sweep.run(&mut template).map(|_| ());
    if template.prepared_target().is_some() {
        template.teardown()?;
    }
    outcome?;

    let document = sweep.document().context("sweep produced no document")?;
    session.report(&BatchReport::new(document, ReportMetadata::capture()))
}
