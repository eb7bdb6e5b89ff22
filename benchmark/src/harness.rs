// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The benchmark engine.
//!
//! A [`Benchmark`] is an operation plus an execution mode. Fixed-count runs
//! start one OS thread per worker except the last, whose loop runs on the
//! thread calling [`Benchmark::run`]. Paced runs execute on worker 0 only
//! and are driven by a [`Pacer`]. An optional write target gives every
//! worker its own output file for I/O-backed operations.
//!
//! Wall-clock and CPU-time snapshots bracket the whole spawn/join region,
//! so the spawn and join cost shows up in the totals as a constant bias.

use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pacebench_core::{
    AccountingSources, BenchResult, InvalidConfigurationError, LatencySummary, Pacing,
    TargetFrequency, Timestamp, TimestampPair, WorkerSlot,
};

use crate::io::{WriteTarget, DEFAULT_REMOVE_TIMEOUT};
use crate::metrics::RunResult;
use crate::pacing::Pacer;

/// Default iterations per worker.
pub const DEFAULT_NUM_EXECUTIONS: u32 = 100_000;

/// Default amount subtracted from every computed pause, in microseconds.
pub const DEFAULT_TIMING_CORRECTION: f64 = 5.0;

/// Default wall-clock budget of a paced run.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(1);

/// What an operation may look at while it runs.
///
/// Borrowed for the duration of one call only.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    write_target: Option<&'a WriteTarget>,
    num_workers: usize,
}

impl<'a> RunContext<'a> {
    pub fn write_target(&self) -> Option<&'a WriteTarget> {
        self.write_target
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }
}

/// The timed unit of work.
pub trait Operation: Send + Sync {
    fn call(&self, ctx: &RunContext<'_>, slot: WorkerSlot);
}

impl<F> Operation for F
where
    F: Fn(&RunContext<'_>, WorkerSlot) + Send + Sync,
{
    #[inline]
    fn call(&self, ctx: &RunContext<'_>, slot: WorkerSlot) {
        self(ctx, slot)
    }
}

/// How `run()` bounds its work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Every worker performs `num_executions` iterations.
    #[default]
    FixedCount,
    /// One worker, at most `ceil(target_frequency)` iterations inside the
    /// time budget.
    Paced(Pacing),
}

#[derive(Debug, Clone)]
struct IoPolicy {
    buffer_size: usize,
    dir: PathBuf,
    target: Option<Arc<WriteTarget>>,
}

/// A configured benchmark and the result of its last run.
///
/// Cloning shares the operation, accounting sources and any prepared
/// write target.
#[derive(Clone)]
pub struct Benchmark {
    pub operation: Arc<dyn Operation>,
    pub num_executions: u32,
    pub num_workers: usize,
    pub mode: Mode,
    /// Hz, only read by paced runs
    pub target_frequency: f64,
    /// Microseconds subtracted from every pause
    pub timing_correction: f64,
    pub time_budget: Duration,
    io: Option<IoPolicy>,
    sources: Arc<AccountingSources>,
    result: RunResult,
    executed: bool,
}

impl std::fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Benchmark")
            .field("num_executions", &self.num_executions)
            .field("num_workers", &self.num_workers)
            .field("mode", &self.mode)
            .field("target_frequency", &self.target_frequency)
            .field("buffer_size", &self.buffer_size())
            .field("executed", &self.executed)
            .finish_non_exhaustive()
    }
}

impl Benchmark {
    /// Create a fixed-count, single-worker benchmark with default settings.
    pub fn new(operation: impl Operation + 'static, sources: Arc<AccountingSources>) -> Self {
        Self {
            operation: Arc::new(operation),
            num_executions: DEFAULT_NUM_EXECUTIONS,
            num_workers: 1,
            mode: Mode::FixedCount,
            target_frequency: 1.0,
            timing_correction: DEFAULT_TIMING_CORRECTION,
            time_budget: DEFAULT_TIME_BUDGET,
            io: None,
            sources,
            result: RunResult::default(),
            executed: false,
        }
    }

    /// Set the iterations per worker.
    pub fn executions(mut self, n: u32) -> Self {
        self.num_executions = n;
        self
    }

    /// Set the number of workers of fixed-count runs.
    pub fn workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    /// Switch to paced execution.
    pub fn paced(mut self, pacing: Pacing) -> Self {
        self.mode = Mode::Paced(pacing);
        self
    }

    /// Target frequency of paced runs, in Hz.
    pub fn frequency(mut self, hz: f64) -> Self {
        self.target_frequency = hz;
        self
    }

    /// Microseconds subtracted from every pacing pause.
    pub fn timing_correction(mut self, micros: f64) -> Self {
        self.timing_correction = micros;
        self
    }

    /// Wall-clock budget of a paced run.
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// Give every worker a file to write `buffer_size` bytes into. Files
    /// are created in the system temp directory unless [`Self::write_dir`]
    /// says otherwise.
    pub fn write_target(mut self, buffer_size: usize) -> Self {
        let dir = self
            .io
            .take()
            .map(|io| io.dir)
            .unwrap_or_else(std::env::temp_dir);
        self.io = Some(IoPolicy {
            buffer_size,
            dir,
            target: None,
        });
        self
    }

    /// Directory the write target's files live in.
    pub fn write_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match self.io.as_mut() {
            Some(io) => io.dir = dir,
            None => {
                tracing::warn!("write_dir without a write target, ignoring");
            }
        }
        self
    }

    pub fn sources(&self) -> &Arc<AccountingSources> {
        &self.sources
    }

    pub fn buffer_size(&self) -> Option<usize> {
        self.io.as_ref().map(|io| io.buffer_size)
    }

    /// The write target, once set up.
    pub fn prepared_target(&self) -> Option<&WriteTarget> {
        self.io.as_ref().and_then(|io| io.target.as_deref())
    }

    /// Open the write target ahead of time so that file creation is not
    /// part of the first run.
    pub fn setup(&mut self) -> BenchResult<()> {
        let workers = self.workers_needed();
        let Some(io) = self.io.as_mut() else {
            tracing::warn!("setup called on a benchmark without write target");
            return Ok(());
        };
        if io.target.is_some() {
            tracing::warn!("Benchmark was already set up");
            return Ok(());
        }
        io.target = Some(Arc::new(WriteTarget::open(&io.dir, workers, io.buffer_size)?));
        Ok(())
    }

    /// Delete the write target's files and wait until they are gone.
    pub fn teardown(&mut self) -> BenchResult<()> {
        let Some(target) = self.io.as_mut().and_then(|io| io.target.take()) else {
            tracing::warn!("teardown called without setup");
            return Ok(());
        };
        target.remove(DEFAULT_REMOVE_TIMEOUT)
    }

    /// Execute the benchmark once, replacing the previous result.
    ///
    /// Configuration mistakes are reported before anything is measured and
    /// leave the executed flag untouched.
    pub fn run(&mut self) -> BenchResult<RunResult> {
        match self.mode {
            Mode::FixedCount => self.run_fixed()?,
            Mode::Paced(pacing) => self.run_paced(pacing)?,
        }
        self.executed = true;
        Ok(self.result)
    }

    pub fn was_executed(&self) -> bool {
        self.executed
    }

    /// Result of the last run, `None` before the first one.
    pub fn result(&self) -> Option<&RunResult> {
        if !self.executed {
            tracing::warn!("Benchmark has not been executed yet");
            return None;
        }
        Some(&self.result)
    }

    /// Human-readable results block of the last run.
    pub fn summary(&self) -> Option<String> {
        self.result().map(RunResult::summary)
    }

    /// JSON document of the last run.
    pub fn document(&self) -> Option<serde_json::Value> {
        let result = self.result()?;
        match serde_json::to_value(result) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, "Could not serialize run result");
                None
            }
        }
    }

    fn workers_needed(&self) -> usize {
        match self.mode {
            Mode::FixedCount => self.num_workers,
            Mode::Paced(_) => 1,
        }
    }

    /// The write target for a run over `workers` slots, opened on first use.
    ///
    /// A target that cannot be opened is logged and the run goes ahead
    /// without one, so every write of that run fails and is logged.
    fn ensure_target(&mut self, workers: usize) -> Option<Arc<WriteTarget>> {
        let io = self.io.as_mut()?;
        if let Some(target) = &io.target {
            if target.num_files() >= workers {
                return Some(Arc::clone(target));
            }
            tracing::warn!(
                files = target.num_files(),
                workers = workers,
                "Write target has fewer files than workers, reopening"
            );
        }
        // the successor reuses the same file names
        if let Some(stale) = io.target.take() {
            if let Err(e) = stale.remove(DEFAULT_REMOVE_TIMEOUT) {
                tracing::error!(error = %e, "Could not release previous write target");
            }
        }
        match WriteTarget::open(&io.dir, workers, io.buffer_size) {
            Ok(target) => {
                let target = Arc::new(target);
                io.target = Some(Arc::clone(&target));
                Some(target)
            }
            Err(e) => {
                tracing::error!(error = %e, dir = %io.dir.display(), "Running without write target");
                None
            }
        }
    }

    fn run_fixed(&mut self) -> BenchResult<()> {
        let workers = self.num_workers;
        if workers == 0 {
            tracing::error!("Must at least run in 1 thread");
            return Err(InvalidConfigurationError::NoWorkers.into());
        }
        let target = self.ensure_target(workers);
        let ctx = RunContext {
            write_target: target.as_deref(),
            num_workers: workers,
        };
        let operation = &*self.operation;
        let executions = self.num_executions;

        tracing::debug!(workers, executions, "Starting fixed-count run");

        let before = TimestampPair::before(&self.sources);
        let mut means = thread::scope(|scope| {
            let ctx = &ctx;
            let handles: Vec<_> = (0..workers - 1)
                .map(|i| scope.spawn(move || measure_worker(operation, ctx, WorkerSlot::new(i), executions)))
                .collect();

            let last = measure_worker(operation, ctx, WorkerSlot::new(workers - 1), executions);

            let mut means: Vec<f64> = handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .collect();
            means.push(last);
            means
        });
        let after = TimestampPair::after(&self.sources);

        let (wall, cpu) = before.micros_until(&after);
        let latency = LatencySummary::from_worker_means(&mut means);
        self.result = RunResult {
            num_executions: executions,
            num_threads: workers,
            full_duration: wall,
            full_cpu_time: cpu.total(),
            sys_cpu_time: cpu.system,
            usr_cpu_time: cpu.user,
            runtime_mean: latency.mean,
            runtime_min: latency.min,
            runtime_max: latency.max,
            runtime_median: latency.median,
            target_frequency: None,
            buffer_size: self.buffer_size(),
        };
        Ok(())
    }

    fn run_paced(&mut self, pacing: Pacing) -> BenchResult<()> {
        let frequency = TargetFrequency::new(self.target_frequency).map_err(|e| {
            tracing::error!(frequency = self.target_frequency, "The frequency must be at least one");
            e
        })?;
        let pacer = Pacer::new(pacing, frequency, self.time_budget, self.timing_correction);
        let target = self.ensure_target(1);
        let ctx = RunContext {
            write_target: target.as_deref(),
            num_workers: 1,
        };
        let operation = &*self.operation;

        tracing::debug!(frequency = %frequency, pacing = %pacing, "Starting paced run");

        let before = TimestampPair::before(&self.sources);
        let outcome = pacer.drive(|| operation.call(&ctx, WorkerSlot::FIRST));
        let after = TimestampPair::after(&self.sources);

        if outcome.fell_short(pacer.target_iterations()) {
            tracing::info!(
                frequency = %frequency,
                iterations = outcome.iterations,
                target = pacer.target_iterations(),
                "Target frequency could not be sustained"
            );
        }

        let (wall, cpu) = before.micros_until(&after);
        let latency = LatencySummary::single(outcome.mean_micros());
        self.result = RunResult {
            num_executions: outcome.iterations,
            num_threads: 1,
            full_duration: wall,
            full_cpu_time: cpu.total(),
            sys_cpu_time: cpu.system,
            usr_cpu_time: cpu.user,
            runtime_mean: latency.mean,
            runtime_min: latency.min,
            runtime_max: latency.max,
            runtime_median: latency.median,
            target_frequency: Some(frequency.hz()),
            buffer_size: self.buffer_size(),
        };
        Ok(())
    }
}

/// Mean wall time per iteration of one worker's loop.
fn measure_worker(operation: &dyn Operation, ctx: &RunContext<'_>, slot: WorkerSlot, executions: u32) -> f64 {
    if executions == 0 {
        return 0.0;
    }
    let start = Timestamp::now();
    for _ in 0..executions {
        operation.call(ctx, slot);
    }
    start.elapsed_micros() / f64::from(executions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn sources() -> Arc<AccountingSources> {
        Arc::new(AccountingSources::default())
    }

    #[test]
    fn test_fixed_run_counts_every_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut bench = Benchmark::new(
            move |_: &RunContext<'_>, _: WorkerSlot| {
                counter.fetch_add(1, Ordering::Relaxed);
            },
            sources(),
        )
        .executions(250)
        .workers(4);

        let result = bench.run().unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1_000);
        assert_eq!(result.num_executions, 250);
        assert_eq!(result.num_threads, 4);
        assert!(result.runtime_min <= result.runtime_mean);
        assert!(result.runtime_mean <= result.runtime_max);
        assert!(bench.was_executed());
    }

    #[test]
    fn test_every_slot_is_used() {
        let seen: Arc<Vec<AtomicUsize>> = Arc::new((0..3).map(|_| AtomicUsize::new(0)).collect());
        let seen_op = Arc::clone(&seen);
        let mut bench = Benchmark::new(
            move |_: &RunContext<'_>, slot: WorkerSlot| {
                seen_op[slot.index()].fetch_add(1, Ordering::Relaxed);
            },
            sources(),
        )
        .executions(10)
        .workers(3);

        bench.run().unwrap();
        assert!(seen.iter().all(|c| c.load(Ordering::Relaxed) == 10));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let mut bench = Benchmark::new(crate::operation::noop, sources()).workers(0);
        let err = bench.run().unwrap_err();
        assert_eq!(
            err.as_invalid_configuration(),
            Some(&InvalidConfigurationError::NoWorkers)
        );
        assert!(!bench.was_executed());
        assert!(bench.result().is_none());
        assert!(bench.summary().is_none());
    }

    #[test]
    fn test_sub_hertz_frequency_is_rejected() {
        let mut bench = Benchmark::new(crate::operation::noop, sources())
            .paced(Pacing::Sleep)
            .frequency(0.5);
        let err = bench.run().unwrap_err();
        assert!(matches!(
            err.as_invalid_configuration(),
            Some(InvalidConfigurationError::FrequencyTooLow { .. })
        ));
        assert!(!bench.was_executed());
    }

    #[test]
    fn test_paced_run_reports_single_worker() {
        let mut bench = Benchmark::new(crate::operation::noop, sources())
            .workers(8)
            .paced(Pacing::Spin)
            .frequency(200.0)
            .time_budget(Duration::from_millis(100));

        let result = bench.run().unwrap();
        assert_eq!(result.num_threads, 1);
        assert_eq!(result.num_executions, 200);
        assert_eq!(result.target_frequency, Some(200.0));
        assert_eq!(result.runtime_min, result.runtime_max);
        assert_eq!(result.runtime_mean, result.runtime_median);
    }

    #[test]
    fn test_rerun_replaces_result() {
        let mut bench = Benchmark::new(crate::operation::noop, sources()).executions(10);
        bench.run().unwrap();
        bench.num_executions = 20;
        let second = bench.run().unwrap();
        assert_eq!(second.num_executions, 20);
        assert_eq!(bench.result().unwrap().num_executions, 20);
    }

    #[test]
    fn test_document_before_and_after_run() {
        let mut bench = Benchmark::new(crate::operation::noop, sources()).executions(5);
        assert!(bench.document().is_none());
        bench.run().unwrap();
        let doc = bench.document().unwrap();
        assert_eq!(doc["numExecutions"], 5);
        assert!(bench.summary().unwrap().contains("Executions:    5"));
    }

    #[test]
    fn test_setup_and_teardown_misuse() {
        let dir = TempDir::new().unwrap();
        let mut bench = Benchmark::new(crate::operation::positioned_write, sources())
            .workers(2)
            .write_target(16)
            .write_dir(dir.path());

        // teardown before setup is a no-op
        bench.teardown().unwrap();

        bench.setup().unwrap();
        let paths = bench.prepared_target().unwrap().paths().to_vec();
        bench.setup().unwrap();
        assert_eq!(bench.prepared_target().unwrap().paths(), &paths[..]);

        bench.teardown().unwrap();
        assert!(paths.iter().all(|p| !p.exists()));
        assert!(bench.prepared_target().is_none());
        bench.teardown().unwrap();
    }

    #[test]
    fn test_write_target_opened_lazily() {
        let dir = TempDir::new().unwrap();
        let mut bench = Benchmark::new(crate::operation::positioned_write, sources())
            .executions(10)
            .workers(2)
            .write_target(32)
            .write_dir(dir.path());
        assert!(bench.prepared_target().is_none());

        let result = bench.run().unwrap();
        assert_eq!(result.buffer_size, Some(32));
        let target = bench.prepared_target().unwrap();
        assert_eq!(target.num_files(), 2);
        for path in target.paths() {
            assert_eq!(std::fs::metadata(path).unwrap().len(), 32);
        }
        bench.teardown().unwrap();
    }

    #[test]
    fn test_more_workers_than_prepared_files() {
        let dir = TempDir::new().unwrap();
        let mut bench = Benchmark::new(crate::operation::positioned_write, sources())
            .executions(5)
            .workers(2)
            .write_target(8)
            .write_dir(dir.path());
        bench.setup().unwrap();

        bench.num_workers = 4;
        bench.run().unwrap();

        let target = bench.prepared_target().unwrap();
        assert_eq!(target.num_files(), 4);
        for path in target.paths() {
            assert!(path.exists(), "{} was unlinked", path.display());
            assert_eq!(std::fs::metadata(path).unwrap().len(), 8);
        }

        let paths = target.paths().to_vec();
        bench.teardown().unwrap();
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_missing_write_dir_still_runs() {
        let dir = TempDir::new().unwrap();
        let mut bench = Benchmark::new(crate::operation::positioned_write, sources())
            .executions(10)
            .workers(2)
            .write_target(16)
            .write_dir(dir.path().join("missing"));

        assert!(bench.setup().is_err());

        let result = bench.run().unwrap();
        assert_eq!(result.num_threads, 2);
        assert_eq!(result.num_executions, 10);
        assert!(bench.was_executed());
        assert!(bench.prepared_target().is_none());
    }
}
