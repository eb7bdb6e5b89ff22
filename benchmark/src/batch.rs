// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Batch runners.
//!
//! A [`Batch`] repeats one benchmark a fixed number of times after an
//! untimed warm-up run, optionally pausing between recorded runs (peak
//! batch). A [`FrequencySweep`] runs clones of a paced template at evenly
//! spaced target frequencies.
//!
//! Both replace their collection wholesale on every `run()`.

use std::thread;
use std::time::Duration;

use pacebench_core::{BenchResult, InvalidConfigurationError, TargetFrequency};

use crate::harness::{Benchmark, Mode};
use crate::metrics::{BatchDocument, RunResult, SweepDocument};

/// Fixed-count batch, with an optional pause between runs.
#[derive(Debug, Clone)]
pub struct Batch {
    num_batches: u32,
    pause: Option<Duration>,
    runs: Vec<RunResult>,
    executed: bool,
}

impl Batch {
    pub fn new(num_batches: u32) -> Self {
        Self {
            num_batches,
            pause: None,
            runs: Vec::new(),
            executed: false,
        }
    }

    /// A batch that sleeps `pause` between successive recorded runs, letting
    /// load left behind by the previous run settle.
    pub fn peak(num_batches: u32, pause: Duration) -> Self {
        Self {
            pause: Some(pause),
            ..Self::new(num_batches)
        }
    }

    pub fn num_batches(&self) -> u32 {
        self.num_batches
    }

    pub fn pause(&self) -> Option<Duration> {
        self.pause
    }

    /// One warm-up run, then `num_batches` recorded runs.
    pub fn run(&mut self, benchmark: &mut Benchmark) -> BenchResult<&[RunResult]> {
        if self.num_batches < 1 {
            tracing::error!("Must at least run one batch");
            return Err(InvalidConfigurationError::NoBatches.into());
        }

        self.runs = Vec::with_capacity(self.num_batches as usize);
        self.executed = false;

        // first-touch costs land here
        benchmark.run()?;

        for i in 0..self.num_batches {
            if i > 0 {
                if let Some(pause) = self.pause {
                    thread::sleep(pause);
                }
            }
            let result = benchmark.run()?;
            tracing::debug!(run = i, mean = result.runtime_mean, "Recorded run");
            self.runs.push(result);
        }

        self.executed = true;
        tracing::info!(runs = self.runs.len(), "Batch finished");
        Ok(&self.runs)
    }

    pub fn runs(&self) -> &[RunResult] {
        &self.runs
    }

    pub fn was_executed(&self) -> bool {
        self.executed
    }

    /// Per-run arrays, `None` before the batch ran.
    pub fn document(&self) -> Option<BatchDocument> {
        if !self.executed {
            tracing::warn!("Batch has not been executed yet");
            return None;
        }
        Some(BatchDocument::from_runs(&self.runs))
    }
}

/// Paced runs at `num_samples` evenly spaced frequencies from `min` to
/// `max`, endpoints included.
#[derive(Debug, Clone)]
pub struct FrequencySweep {
    num_samples: u32,
    min_frequency: f64,
    max_frequency: f64,
    runs: Vec<RunResult>,
    executed: bool,
}

impl FrequencySweep {
    pub fn new(num_samples: u32, min_frequency: f64, max_frequency: f64) -> Self {
        Self {
            num_samples,
            min_frequency,
            max_frequency,
            runs: Vec::new(),
            executed: false,
        }
    }

    /// Frequencies the sweep visits, in order.
    pub fn frequencies(&self) -> BenchResult<Vec<f64>> {
        if self.num_samples < 2 {
            return Err(InvalidConfigurationError::TooFewSamples {
                samples: self.num_samples,
            }
            .into());
        }
        let step = (self.max_frequency - self.min_frequency) / f64::from(self.num_samples - 1);
        let frequencies: Vec<f64> = (0..self.num_samples)
            .map(|i| self.min_frequency + f64::from(i) * step)
            .collect();
        for &hz in &frequencies {
            TargetFrequency::new(hz)?;
        }
        Ok(frequencies)
    }

    /// Run a clone of `template` at every frequency. Everything but the
    /// target frequency is taken from the template.
    pub fn run(&mut self, template: &mut Benchmark) -> BenchResult<&[RunResult]> {
        if !matches!(template.mode, Mode::Paced(_)) {
            tracing::error!("Frequency sweep template is not paced");
            return Err(InvalidConfigurationError::NotPaced.into());
        }
        let frequencies = self.frequencies().map_err(|e| {
            tracing::error!(error = %e, "Invalid sweep");
            e
        })?;

        self.runs = Vec::with_capacity(frequencies.len());
        self.executed = false;

        // clones share the template's files
        if template.buffer_size().is_some() && template.prepared_target().is_none() {
            template.setup()?;
        }

        for hz in frequencies {
            let mut benchmark = template.clone().frequency(hz);
            let result = benchmark.run()?;
            tracing::debug!(
                frequency = hz,
                iterations = result.num_executions,
                "Recorded sweep sample"
            );
            self.runs.push(result);
        }

        self.executed = true;
        tracing::info!(samples = self.runs.len(), "Frequency sweep finished");
        Ok(&self.runs)
    }

    pub fn runs(&self) -> &[RunResult] {
        &self.runs
    }

    pub fn was_executed(&self) -> bool {
        self.executed
    }

    /// The sweep's run documents, `None` before the sweep ran.
    pub fn document(&self) -> Option<SweepDocument> {
        if !self.executed {
            tracing::warn!("Frequency sweep has not been executed yet");
            return None;
        }
        Some(SweepDocument::from_runs(&self.runs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::noop;
    use pacebench_core::AccountingSources;
    use std::sync::Arc;

    fn bench() -> Benchmark {
        Benchmark::new(noop, Arc::new(AccountingSources::default())).executions(10)
    }

    #[test]
    fn test_zero_batches_rejected() {
        let mut batch = Batch::new(0);
        let err = batch.run(&mut bench()).unwrap_err();
        assert_eq!(
            err.as_invalid_configuration(),
            Some(&InvalidConfigurationError::NoBatches)
        );
        assert!(batch.document().is_none());
    }

    #[test]
    fn test_batch_collects_runs() {
        let mut batch = Batch::new(5);
        assert_eq!(batch.run(&mut bench()).unwrap().len(), 5);
        let doc = batch.document().unwrap();
        assert_eq!(doc.runtimes_microseconds.len(), 5);
        assert_eq!(doc.num_executions, 10);
    }

    #[test]
    fn test_rerun_replaces_collection() {
        let mut batch = Batch::new(3);
        let mut b = bench();
        batch.run(&mut b).unwrap();
        batch.run(&mut b).unwrap();
        assert_eq!(batch.runs().len(), 3);
    }

    #[test]
    fn test_peak_pauses_between_runs_only() {
        let mut batch = Batch::peak(3, Duration::from_millis(20));
        let start = std::time::Instant::now();
        batch.run(&mut bench()).unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(40));
        assert_eq!(batch.pause(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_sweep_frequencies_are_uniform() {
        let sweep = FrequencySweep::new(10, 100_000.0, 1_000_000.0);
        let expected: Vec<f64> = (1..=10).map(|i| f64::from(i) * 100_000.0).collect();
        assert_eq!(sweep.frequencies().unwrap(), expected);
    }

    #[test]
    fn test_sweep_needs_two_samples() {
        let mut sweep = FrequencySweep::new(1, 10.0, 20.0);
        let mut template = bench().paced(pacebench_core::Pacing::Sleep);
        let err = sweep.run(&mut template).unwrap_err();
        assert_eq!(
            err.as_invalid_configuration(),
            Some(&InvalidConfigurationError::TooFewSamples { samples: 1 })
        );
        assert!(!sweep.was_executed());
    }

    #[test]
    fn test_sweep_needs_paced_template() {
        let mut sweep = FrequencySweep::new(2, 10.0, 20.0);
        let err = sweep.run(&mut bench()).unwrap_err();
        assert_eq!(
            err.as_invalid_configuration(),
            Some(&InvalidConfigurationError::NotPaced)
        );
    }

    #[test]
    fn test_sweep_rejects_sub_hertz_minimum() {
        let sweep = FrequencySweep::new(3, 0.0, 10.0);
        assert!(matches!(
            sweep.frequencies().unwrap_err().as_invalid_configuration(),
            Some(InvalidConfigurationError::FrequencyTooLow { .. })
        ));
    }
}
