// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Wall-clock and CPU-time sampling.
//!
//! Wall time comes from the monotonic clock. CPU time is available either
//! for the calling process (`getrusage`) or, through
//! [`AccountingSources`](crate::accounting::AccountingSources), aggregated
//! over externally exposed accounting records.

use std::time::{Duration, Instant};

use nix::sys::resource::{getrusage, UsageWho};
use nix::sys::time::TimeValLike;

/// A monotonic instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(Instant);

impl Timestamp {
    /// Sample the monotonic clock.
    #[inline(always)]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Signed microseconds from `self` to `later`.
    /// Negative when `later` was taken before `self`.
    #[inline]
    pub fn micros_until(&self, later: Timestamp) -> f64 {
        if later.0 >= self.0 {
            later.0.duration_since(self.0).as_nanos() as f64 / 1e3
        } else {
            -(self.0.duration_since(later.0).as_nanos() as f64 / 1e3)
        }
    }

    /// Microseconds elapsed since this instant.
    #[inline]
    pub fn elapsed_micros(&self) -> f64 {
        self.micros_until(Timestamp::now())
    }

    /// This instant shifted forward by `micros`.
    pub fn after_micros(&self, micros: f64) -> Timestamp {
        Self(self.0 + Duration::from_nanos((micros.max(0.0) * 1e3) as u64))
    }
}

/// CPU time split into user and system components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTime {
    pub user: Duration,
    pub system: Duration,
}

impl CpuTime {
    /// CPU time consumed so far by the calling process.
    ///
    /// `getrusage(RUSAGE_SELF)` cannot fail for the calling process with a
    /// valid `who`, a failure is logged and reads as zero.
    pub fn now() -> Self {
        match getrusage(UsageWho::RUSAGE_SELF) {
            Ok(usage) => Self {
                user: Duration::from_micros(usage.user_time().num_microseconds().max(0) as u64),
                system: Duration::from_micros(
                    usage.system_time().num_microseconds().max(0) as u64,
                ),
            },
            Err(errno) => {
                tracing::error!(error = %errno, "getrusage failed");
                Self::default()
            }
        }
    }

    /// User plus system time.
    pub fn total(&self) -> Duration {
        self.user + self.system
    }

    /// Signed user/system microseconds from `self` to `later`.
    pub fn micros_until(&self, later: &CpuTime) -> CpuMicros {
        CpuMicros {
            user: signed_micros(self.user, later.user),
            system: signed_micros(self.system, later.system),
        }
    }
}

/// A CPU-time difference in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuMicros {
    pub user: f64,
    pub system: f64,
}

impl CpuMicros {
    pub fn total(&self) -> f64 {
        self.user + self.system
    }
}

fn signed_micros(from: Duration, to: Duration) -> f64 {
    (to.as_nanos() as f64 - from.as_nanos() as f64) / 1e3
}

/// Busy-wait until `micros` have passed since `start`.
///
/// Emits the CPU's spin-loop hint on every round, which keeps a sibling
/// hyperthread usable while waiting.
#[inline]
pub fn spin_for(start: Timestamp, micros: f64) {
    let deadline = start.after_micros(micros);
    while Timestamp::now() < deadline {
        std::hint::spin_loop();
    }
}
