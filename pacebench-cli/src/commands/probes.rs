// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `clock-gaps` and `mutex-overhead`.
//!
//! Both print a bare JSON array of microsecond gaps.

use pacebench_benchmark::probes;

use super::Session;
use crate::Cli;

pub fn clock_gaps(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    let gaps = probes::clock_gaps(probes::NUM_SAMPLES);
    session.report(&gaps)
}

pub fn mutex_overhead(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    tracing::info!(threads = probes::MUTEX_THREADS, "Measuring mutex hand-over");
    let gaps = probes::mutex_overhead(
        probes::MUTEX_THREADS,
        probes::NUM_SAMPLES,
        probes::MUTEX_OFFSET,
        probes::MUTEX_PAUSE,
    );
    session.report(&gaps)
}
