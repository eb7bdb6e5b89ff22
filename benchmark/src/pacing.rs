// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Frequency pacing loops.
//!
//! A paced run performs at most `ceil(F)` iterations inside a time budget
//! (one second unless overridden). It stops as soon as either limit is hit,
//! so an operation too slow for the target simply ends up with fewer
//! iterations.
//!
//! Adaptive pacing recomputes the pause after every iteration from the
//! budget still left, which pulls the end of the run toward the end of the
//! budget regardless of per-iteration jitter. Fixed-interval pacing
//! computes one pause up front and is cheaper per iteration.

use std::thread;
use std::time::Duration;

use pacebench_core::clock::spin_for;
use pacebench_core::{Pacing, TargetFrequency, Timestamp};

/// Pause after an iteration under adaptive pacing, in microseconds.
///
/// `budget_left / (iterations_left + 1) - correction`, never negative.
#[inline]
pub fn adaptive_pause(budget_left: f64, iterations_left: u32, correction: f64) -> f64 {
    (budget_left / (f64::from(iterations_left) + 1.0) - correction).max(0.0)
}

/// The one pause used by fixed-interval pacing, in microseconds.
pub fn fixed_interval(budget: f64, target_iterations: u32, correction: f64) -> f64 {
    if target_iterations < 2 {
        return 0.0;
    }
    (budget / f64::from(target_iterations - 1) - correction).max(0.0)
}

/// What a paced loop achieved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacedOutcome {
    pub iterations: u32,
    pub elapsed_micros: f64,
}

impl PacedOutcome {
    /// Mean wall time per iteration, pauses included.
    pub fn mean_micros(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.elapsed_micros / f64::from(self.iterations)
        }
    }

    /// Whether the budget ran out before the target was reached.
    pub fn fell_short(&self, target_iterations: u32) -> bool {
        self.iterations < target_iterations
    }
}

/// Drives an operation at a target frequency.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    pacing: Pacing,
    target_iterations: u32,
    budget_micros: f64,
    correction_micros: f64,
}

impl Pacer {
    pub fn new(pacing: Pacing, frequency: TargetFrequency, budget: Duration, correction_micros: f64) -> Self {
        Self {
            pacing,
            target_iterations: frequency.target_iterations(),
            budget_micros: budget.as_secs_f64() * 1e6,
            correction_micros,
        }
    }

    pub fn target_iterations(&self) -> u32 {
        self.target_iterations
    }

    /// Run `op` until the target count is reached or the budget is spent.
    pub fn drive<F: FnMut()>(&self, op: F) -> PacedOutcome {
        match self.pacing {
            Pacing::Sleep | Pacing::Spin => self.drive_adaptive(op),
            Pacing::FixedInterval => self.drive_fixed(op),
        }
    }

    fn drive_adaptive<F: FnMut()>(&self, mut op: F) -> PacedOutcome {
        let start = Timestamp::now();
        let mut iterations = 0u32;

        while iterations < self.target_iterations {
            op();
            iterations += 1;

            let now = Timestamp::now();
            let elapsed = start.micros_until(now);
            if elapsed >= self.budget_micros {
                break;
            }

            let pause = adaptive_pause(
                self.budget_micros - elapsed,
                self.target_iterations - iterations,
                self.correction_micros,
            );
            self.wait(now, pause);
        }

        PacedOutcome {
            iterations,
            elapsed_micros: start.elapsed_micros(),
        }
    }

    fn drive_fixed<F: FnMut()>(&self, mut op: F) -> PacedOutcome {
        let interval = fixed_interval(self.budget_micros, self.target_iterations, self.correction_micros);
        let pause = Duration::from_secs_f64(interval / 1e6);
        let start = Timestamp::now();
        let mut iterations = 0u32;

        while iterations < self.target_iterations {
            op();
            iterations += 1;

            if start.elapsed_micros() >= self.budget_micros {
                break;
            }
            // the last two iterations run back to back
            if iterations + 1 < self.target_iterations && !pause.is_zero() {
                thread::sleep(pause);
            }
        }

        PacedOutcome {
            iterations,
            elapsed_micros: start.elapsed_micros(),
        }
    }

    #[inline]
    fn wait(&self, from: Timestamp, micros: f64) {
        if micros <= 0.0 {
            return;
        }
        match self.pacing {
            Pacing::Spin => spin_for(from, micros),
            _ => thread::sleep(Duration::from_secs_f64(micros / 1e6)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacer(pacing: Pacing, hz: f64, budget_ms: u64, correction: f64) -> Pacer {
        Pacer::new(
            pacing,
            TargetFrequency::new(hz).unwrap(),
            Duration::from_millis(budget_ms),
            correction,
        )
    }

    #[test]
    fn test_adaptive_pause_formula() {
        assert_eq!(adaptive_pause(1_000.0, 9, 0.0), 100.0);
        assert_eq!(adaptive_pause(1_000.0, 9, 5.0), 95.0);
        assert_eq!(adaptive_pause(10.0, 9, 5.0), 0.0);
        assert_eq!(adaptive_pause(-50.0, 0, 5.0), 0.0);
    }

    #[test]
    fn test_fixed_interval_formula() {
        assert_eq!(fixed_interval(1_000_000.0, 11, 5.0), 99_995.0);
        assert_eq!(fixed_interval(1_000_000.0, 1, 5.0), 0.0);
        assert_eq!(fixed_interval(10.0, 100, 5.0), 0.0);
    }

    #[test]
    fn test_fast_operation_hits_target_count() {
        for pacing in [Pacing::Sleep, Pacing::Spin, Pacing::FixedInterval] {
            let mut calls = 0u32;
            // generous correction absorbs sleep overshoot
            let outcome = pacer(pacing, 50.0, 200, 500.0).drive(|| calls += 1);
            assert_eq!(outcome.iterations, 50, "{:?}", pacing);
            assert_eq!(calls, 50);
            assert!(!outcome.fell_short(50));
        }
    }

    #[test]
    fn test_adaptive_run_fills_budget() {
        let outcome = pacer(Pacing::Sleep, 20.0, 100, 5.0).drive(|| {});
        assert_eq!(outcome.iterations, 20);
        // the final pause stretches the run toward the budget
        assert!(outcome.elapsed_micros >= 90_000.0, "{}", outcome.elapsed_micros);
    }

    #[test]
    fn test_slow_operation_ends_early() {
        let outcome = pacer(Pacing::Sleep, 1_000.0, 50, 5.0).drive(|| thread::sleep(Duration::from_millis(5)));
        assert!(outcome.iterations < 1_000);
        assert!(outcome.iterations >= 1);
        assert!(outcome.fell_short(1_000));
    }

    #[test]
    fn test_fixed_interval_skips_final_pause() {
        // 3 Hz over 400ms: one 200ms pause, then two back-to-back iterations
        let outcome = pacer(Pacing::FixedInterval, 3.0, 400, 0.0).drive(|| {});
        assert_eq!(outcome.iterations, 3);
        assert!(outcome.elapsed_micros >= 200_000.0, "{}", outcome.elapsed_micros);
        assert!(outcome.elapsed_micros < 350_000.0, "{}", outcome.elapsed_micros);
    }

    #[test]
    fn test_spin_pacing_fills_budget() {
        let outcome = pacer(Pacing::Spin, 10.0, 50, 0.0).drive(|| {});
        assert_eq!(outcome.iterations, 10);
        assert!(outcome.elapsed_micros >= 45_000.0, "{}", outcome.elapsed_micros);
    }

    #[test]
    fn test_mean_of_empty_outcome() {
        let outcome = PacedOutcome {
            iterations: 0,
            elapsed_micros: 10.0,
        };
        assert_eq!(outcome.mean_micros(), 0.0);
    }
}
