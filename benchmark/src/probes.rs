// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Clock and lock probes.
//!
//! These do not use the benchmark engine. They record raw monotonic
//! timestamps and return the gaps between consecutive samples.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use pacebench_core::Timestamp;

/// Samples taken by both probes.
pub const NUM_SAMPLES: usize = 1000;

/// Samples the mutex probe discards while threads ramp up.
pub const MUTEX_OFFSET: usize = 500;

pub const MUTEX_THREADS: usize = 64;

/// Pause after releasing the lock, standing in for a system call.
pub const MUTEX_PAUSE: Duration = Duration::from_micros(5);

/// Microsecond gaps between consecutive samples.
pub fn gaps(samples: &[Timestamp]) -> Vec<f64> {
    samples
        .windows(2)
        .map(|pair| pair[0].micros_until(pair[1]))
        .collect()
}

/// Back-to-back reads of the monotonic clock.
pub fn clock_gaps(num_samples: usize) -> Vec<f64> {
    let mut samples = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        samples.push(Timestamp::now());
    }
    gaps(&samples)
}

struct Recorder {
    next: usize,
    samples: Vec<Timestamp>,
}

/// Hand-over latency of a contended mutex.
///
/// `num_threads` threads take turns on one lock. The holder draws a ticket,
/// records a timestamp for it and sleeps `pause` after unlocking. The
/// first `offset` tickets are thrown away.
pub fn mutex_overhead(num_threads: usize, num_samples: usize, offset: usize, pause: Duration) -> Vec<f64> {
    let recorder = Arc::new(Mutex::new(Recorder {
        next: 0,
        samples: Vec::with_capacity(num_samples),
    }));
    let total = num_samples + offset;

    thread::scope(|scope| {
        for _ in 0..num_threads {
            let recorder = Arc::clone(&recorder);
            scope.spawn(move || loop {
                {
                    let mut guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
                    let ticket = guard.next;
                    guard.next += 1;
                    if ticket >= total {
                        break;
                    }
                    let now = Timestamp::now();
                    if ticket >= offset {
                        guard.samples.push(now);
                    }
                }
                thread::sleep(pause);
            });
        }
    });

    let guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
    gaps(&guard.samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_gaps_count_and_sign() {
        let gaps = clock_gaps(NUM_SAMPLES);
        assert_eq!(gaps.len(), NUM_SAMPLES - 1);
        assert!(gaps.iter().all(|&g| g >= 0.0));
    }

    #[test]
    fn test_gaps_of_short_inputs() {
        assert!(gaps(&[]).is_empty());
        assert!(gaps(&[Timestamp::now()]).is_empty());
    }

    #[test]
    fn test_mutex_overhead_small() {
        let gaps = mutex_overhead(4, 50, 10, Duration::from_micros(5));
        assert_eq!(gaps.len(), 49);
        assert!(gaps.iter().all(|&g| g >= 0.0));
    }
}
