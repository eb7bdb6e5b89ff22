// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fixed-count batch drivers: `getppid`, `read`, `write`, `poll`, `peak`
//! and `block-test`.

use std::fs::File;
use std::io::Write;
use std::net::TcpListener;
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Context;
use nix::poll::{poll as sys_poll, PollFd, PollFlags, PollTimeout};
use nix::sys::uio::pread;

use pacebench_benchmark::{operation, Batch, BatchReport, Benchmark, ReportMetadata, RunContext};
use pacebench_core::WorkerSlot;

use super::Session;
use crate::Cli;

const READ_CONTENT: &[u8] = b"This is a benchmark file, please ignore me!\n";

/// Busy rounds after every poll in the `poll` driver.
const POLL_SPIN_ROUNDS: u32 = 40_000;

/// Buffer size of the one-byte write drivers.
const SMALL_WRITE: usize = 1;

pub fn getppid(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    let mut bench = session.benchmark(operation::getppid)?;
    run_batch(&session, &mut bench, ReportMetadata::capture())
}

pub fn read(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;

    // unlinked from the start, nothing to clean up
    let mut file = tempfile::tempfile().context("creating read benchmark file")?;
    file.write_all(READ_CONTENT).context("filling read benchmark file")?;
    file.sync_all().context("syncing read benchmark file")?;

    let mut bench = session.benchmark(move |_: &RunContext<'_>, _: WorkerSlot| read_first_byte(&file))?;
    run_batch(&session, &mut bench, ReportMetadata::capture())
}

fn read_first_byte(file: &File) {
    let mut byte = [0u8; 1];
    match pread(file, &mut byte, 0) {
        Ok(_) if byte[0] != READ_CONTENT[0] => {
            tracing::warn!("Buffer did not match the content of the file");
        }
        Ok(_) => {}
        Err(errno) => tracing::error!(error = %errno, "Could not read file"),
    }
}

pub fn write(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    let buffer_size = session.config.buffer_size()?;
    let mut bench = session
        .benchmark(operation::positioned_write)?
        .write_target(buffer_size);

    bench.setup()?;
    let outcome = run_batch(
        &session,
        &mut bench,
        ReportMetadata::capture().with_buffer_size(buffer_size),
    );
    bench.teardown()?;
    outcome
}

pub fn poll(cli: &Cli, port: u16) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    let listener = listen(port)?;

    let mut bench = session.benchmark(move |_: &RunContext<'_>, _: WorkerSlot| {
        let mut fds = [PollFd::new(listener.as_fd(), PollFlags::POLLIN)];
        if let Err(errno) = sys_poll(&mut fds, PollTimeout::from(1u8)) {
            tracing::error!(error = %errno, "Could not poll");
        }
        for _ in 0..POLL_SPIN_ROUNDS {
            std::hint::spin_loop();
        }
    })?;
    run_batch(&session, &mut bench, ReportMetadata::capture())
}

pub fn peak(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    let mut bench = session
        .benchmark(operation::positioned_write)?
        .write_target(SMALL_WRITE);
    let pause = session.config.peak_sleep(bench.num_executions)?;
    let mut batch = Batch::peak(session.config.num_batches()?, pause);

    tracing::info!(
        executions = bench.num_executions,
        batches = batch.num_batches(),
        workers = bench.num_workers,
        pause_us = pause.as_micros() as u64,
        "Running peak benchmark"
    );

    bench.setup()?;
    let outcome = batch.run(&mut bench).map(|_| ());
    bench.teardown()?;
    outcome?;

    let metadata = ReportMetadata::capture()
        .with_buffer_size(SMALL_WRITE)
        .with_sleep_time(pause.as_secs_f64() * 1e6);
    write_batch(&session, &batch, metadata)
}

pub fn block_test(cli: &Cli, port: u16) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    let listener = listen(port)?;
    let mut bench = session
        .benchmark(operation::positioned_write)?
        .write_target(SMALL_WRITE);
    let blockers = bench.num_workers;
    let running = AtomicBool::new(true);

    bench.setup()?;
    let mut batch = Batch::new(session.config.num_batches()?);
    let outcome = thread::scope(|scope| {
        for _ in 0..blockers {
            scope.spawn(|| block_in_poll(&listener, &running));
        }
        tracing::info!(threads = blockers, "Blocking threads are ready");

        let outcome = batch.run(&mut bench).map(|_| ());
        running.store(false, Ordering::Relaxed);
        outcome
    });
    bench.teardown()?;
    outcome?;

    write_batch(
        &session,
        &batch,
        ReportMetadata::capture().with_buffer_size(SMALL_WRITE),
    )
}

fn block_in_poll(listener: &TcpListener, running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        let mut fds = [PollFd::new(listener.as_fd(), PollFlags::POLLIN)];
        if let Err(errno) = sys_poll(&mut fds, PollTimeout::from(5u8)) {
            tracing::error!(error = %errno, "Could not poll");
            return;
        }
    }
}

fn listen(port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", port)).with_context(|| format!("listening on port {}", port))
}

/// Run a plain batch with the configured batch count and report it.
fn run_batch(session: &Session, bench: &mut Benchmark, metadata: ReportMetadata) -> anyhow::Result<()> {
    let mut batch = Batch::new(session.config.num_batches()?);
    tracing::info!(
        executions = bench.num_executions,
        batches = batch.num_batches(),
        workers = bench.num_workers,
        "Running benchmark"
    );
    batch.run(bench)?;
    write_batch(session, &batch, metadata)
}

fn write_batch(session: &Session, batch: &Batch, metadata: ReportMetadata) -> anyhow::Result<()> {
    let document = batch.document().context("batch produced no document")?;
    session.report(&BatchReport::new(document, metadata))
}
