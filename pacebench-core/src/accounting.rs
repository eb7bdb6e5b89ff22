// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CPU accounting sources.
//!
//! An accounting source is a `/proc/<pid>/stat`-style record whose 14th and
//! 15th whitespace-separated fields hold cumulative user and system clock
//! ticks. A set of sources is resolved once, from a single file or from every
//! non-hidden entry of a directory, and then shared read-only by every
//! benchmark that needs CPU time.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::clock::{CpuMicros, CpuTime, Timestamp};
use crate::error::{BenchError, BenchResult};

/// Clock ticks per second of the accounting records.
pub const TICKS_PER_SECOND: u64 = 100;

/// How long [`AccountingSources::resolve`] waits for its path to appear.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(3);

/// How long [`AccountingSources::wait_for`] waits for a single record.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Zero-based position of the user tick field, system ticks follow it.
const UTIME_FIELD: usize = 13;

/// Convert a tick count into microseconds.
pub fn ticks_to_micros(ticks: u64) -> f64 {
    (ticks * (1_000_000 / TICKS_PER_SECOND)) as f64
}

/// Extract `(utime, stime)` ticks from one accounting record.
///
/// When the record carries a parenthesised command name (as `/proc` does),
/// fields are counted after the closing parenthesis so that names with
/// spaces cannot shift the positions.
pub fn parse_stat_times(record: &str) -> Option<(u64, u64)> {
    let (fields, offset) = match record.rfind(')') {
        // pid and comm precede the closing parenthesis
        Some(close) => (&record[close + 1..], 2),
        None => (record, 0),
    };

    let mut fields = fields.split_whitespace().skip(UTIME_FIELD - offset);
    let utime = fields.next()?.parse().ok()?;
    let stime = fields.next()?.parse().ok()?;
    Some((utime, stime))
}

/// Per-source user and system ticks taken at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSample {
    pub user: Vec<u64>,
    pub system: Vec<u64>,
}

impl TickSample {
    /// Microseconds of user and system time between two samples, summed
    /// over every source.
    pub fn micros_until(&self, later: &TickSample) -> CpuMicros {
        if self.user.len() != later.user.len() || self.system.len() != later.system.len() {
            tracing::error!(
                earlier = self.user.len(),
                later = later.user.len(),
                "Tried to diff tick samples taken over different source counts"
            );
            return CpuMicros::default();
        }

        let diff = |a: &[u64], b: &[u64]| -> f64 {
            a.iter()
                .zip(b)
                .map(|(t1, t2)| ticks_to_micros(t2.saturating_sub(*t1)))
                .sum()
        };

        CpuMicros {
            user: diff(&self.user, &later.user),
            system: diff(&self.system, &later.system),
        }
    }

    pub fn total_ticks(&self) -> u64 {
        self.user.iter().chain(&self.system).sum()
    }
}

/// CPU time as seen at one instant, either per accounting source or, when
/// no sources were resolved, for the calling process.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuSnapshot {
    Ticks(TickSample),
    Process(CpuTime),
}

impl CpuSnapshot {
    /// User and system microseconds between two snapshots.
    pub fn micros_until(&self, later: &CpuSnapshot) -> CpuMicros {
        match (self, later) {
            (CpuSnapshot::Ticks(a), CpuSnapshot::Ticks(b)) => a.micros_until(b),
            (CpuSnapshot::Process(a), CpuSnapshot::Process(b)) => a.micros_until(b),
            _ => {
                tracing::error!("Tried to diff CPU snapshots of different kinds");
                CpuMicros::default()
            }
        }
    }
}

/// A wall-clock and CPU-time snapshot taken together.
#[derive(Debug, Clone)]
pub struct TimestampPair {
    pub wall: Timestamp,
    pub cpu: CpuSnapshot,
}

impl TimestampPair {
    /// Sample CPU time first, then the wall clock.
    pub fn before(sources: &AccountingSources) -> Self {
        let cpu = sources.snapshot();
        Self {
            wall: Timestamp::now(),
            cpu,
        }
    }

    /// Sample the wall clock first, then CPU time.
    pub fn after(sources: &AccountingSources) -> Self {
        let wall = Timestamp::now();
        Self {
            wall,
            cpu: sources.snapshot(),
        }
    }

    /// Wall microseconds and CPU microseconds from `self` to `later`.
    pub fn micros_until(&self, later: &TimestampPair) -> (f64, CpuMicros) {
        (
            self.wall.micros_until(later.wall),
            self.cpu.micros_until(&later.cpu),
        )
    }
}

/// A resolved, immutable list of accounting records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountingSources {
    paths: Vec<PathBuf>,
}

impl AccountingSources {
    /// Use the given records as they are, without checking them.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve `path` into a list of records.
    ///
    /// A regular file is used directly. A directory contributes every entry
    /// whose name does not start with a dot. A path that does not exist yet
    /// is polled for until `timeout` passes.
    pub fn resolve(path: impl AsRef<Path>, timeout: Duration) -> BenchResult<Self> {
        let path = path.as_ref();
        let start = Instant::now();

        loop {
            if let Ok(meta) = fs::metadata(path) {
                if meta.is_dir() {
                    return Self::from_directory(path);
                }
                if meta.is_file() {
                    tracing::info!(path = %path.display(), "Found accounting source");
                    return Ok(Self::from_paths([path]));
                }
            }

            if start.elapsed() > timeout {
                tracing::warn!(
                    path = %path.display(),
                    "Reached the timeout while waiting for the accounting source(s) to exist"
                );
                return Err(BenchError::AccountingSourceTimeout {
                    path: path.to_path_buf(),
                    waited: timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn from_directory(dir: &Path) -> BenchResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| BenchError::Io {
            context: "listing accounting source directory",
            source: e,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BenchError::Io {
                context: "reading accounting source directory entry",
                source: e,
            })?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            tracing::info!(path = %path.display(), "Found accounting source");
            paths.push(path);
        }
        paths.sort();

        Ok(Self { paths })
    }

    /// Block until a single record exists, without resolving it.
    pub fn wait_for(path: impl AsRef<Path>, timeout: Duration) -> BenchResult<()> {
        let path = path.as_ref();
        let start = Instant::now();
        while !path.exists() {
            if start.elapsed() > timeout {
                tracing::warn!(
                    path = %path.display(),
                    "Reached the timeout while waiting for the accounting source to exist"
                );
                return Err(BenchError::AccountingSourceTimeout {
                    path: path.to_path_buf(),
                    waited: timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Read the current tick counts of every source.
    ///
    /// A source that cannot be read or parsed is logged and counts as zero.
    pub fn sample(&self) -> TickSample {
        let mut sample = TickSample {
            user: vec![0; self.paths.len()],
            system: vec![0; self.paths.len()],
        };

        for (i, path) in self.paths.iter().enumerate() {
            let record = match fs::read_to_string(path) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Could not read accounting source"
                    );
                    continue;
                }
            };
            match parse_stat_times(&record) {
                Some((utime, stime)) => {
                    sample.user[i] = utime;
                    sample.system[i] = stime;
                }
                None => tracing::error!(
                    path = %path.display(),
                    "Accounting source has no user/system tick fields"
                ),
            }
        }

        sample
    }

    /// Per-source ticks, or the calling process' own CPU time when the
    /// list is empty.
    pub fn snapshot(&self) -> CpuSnapshot {
        if self.paths.is_empty() {
            CpuSnapshot::Process(CpuTime::now())
        } else {
            CpuSnapshot::Ticks(self.sample())
        }
    }

    /// Aggregate CPU time over all sources.
    pub fn cpu_time(&self) -> CpuTime {
        let sample = self.sample();
        let to_duration = |ticks: &[u64]| -> Duration {
            let ticks: u64 = ticks.iter().sum();
            Duration::from_nanos(ticks * (1_000_000_000 / TICKS_PER_SECOND))
        };
        CpuTime {
            user: to_duration(&sample.user),
            system: to_duration(&sample.system),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(utime: u64, stime: u64) -> String {
        format!(
            "1234 (bench) R 1 1234 1234 0 -1 4194304 100 0 0 0 {} {} 0 0 20 0 1 0 100 0 0\n",
            utime, stime
        )
    }

    #[test]
    fn test_parse_stat_times() {
        assert_eq!(parse_stat_times(&record(17, 4)), Some((17, 4)));
    }

    #[test]
    fn test_parse_command_with_spaces() {
        let line = "99 (my bench prog) S 1 99 99 0 -1 0 0 0 0 0 250 31 0 0";
        assert_eq!(parse_stat_times(line), Some((250, 31)));
    }

    #[test]
    fn test_parse_plain_fields() {
        let line = "a b c d e f g h i j k l m 8 9 z";
        assert_eq!(parse_stat_times(line), Some((8, 9)));
    }

    #[test]
    fn test_parse_truncated_record() {
        assert_eq!(parse_stat_times("1 (x) R 1 2 3"), None);
        assert_eq!(parse_stat_times(""), None);
    }

    #[test]
    fn test_resolve_directory_skips_hidden() {
        let dir = TempDir::new().unwrap();
        for name in ["cpu0", "cpu1", "cpu2", ".hidden"] {
            fs::write(dir.path().join(name), record(1, 1)).unwrap();
        }

        let sources = AccountingSources::resolve(dir.path(), Duration::from_millis(100)).unwrap();
        assert_eq!(sources.len(), 3);
        assert!(sources
            .paths()
            .iter()
            .all(|p| !p.file_name().unwrap().to_string_lossy().starts_with('.')));
    }

    #[test]
    fn test_resolve_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stat");
        fs::write(&path, record(1, 1)).unwrap();

        let sources = AccountingSources::resolve(&path, Duration::from_millis(100)).unwrap();
        assert_eq!(sources.paths(), &[path]);
    }

    #[test]
    fn test_resolve_times_out() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("never");

        let err = AccountingSources::resolve(&missing, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, BenchError::AccountingSourceTimeout { .. }));
    }

    #[test]
    fn test_resolve_waits_for_late_producer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late");
        let producer_path = path.clone();

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            fs::write(producer_path, record(2, 3)).unwrap();
        });

        let sources = AccountingSources::resolve(&path, Duration::from_secs(3)).unwrap();
        producer.join().unwrap();
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn test_sample_and_diff() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, record(10, 5)).unwrap();
        fs::write(&b, record(20, 1)).unwrap();

        let sources = AccountingSources::from_paths([&a, &b]);
        let before = sources.sample();
        assert_eq!(before.user, vec![10, 20]);
        assert_eq!(before.total_ticks(), 36);

        fs::write(&a, record(12, 6)).unwrap();
        fs::write(&b, record(21, 1)).unwrap();
        let after = sources.sample();

        let diff = before.micros_until(&after);
        assert_eq!(diff.user, 30_000.0);
        assert_eq!(diff.system, 10_000.0);
    }

    #[test]
    fn test_unreadable_source_contributes_zero() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present");
        fs::write(&present, record(3, 4)).unwrap();
        let sources = AccountingSources::from_paths([present, dir.path().join("gone")]);

        let sample = sources.sample();
        assert_eq!(sample.user, vec![3, 0]);
        assert_eq!(sample.system, vec![4, 0]);

        let cpu = sources.cpu_time();
        assert_eq!(cpu.user, Duration::from_millis(30));
        assert_eq!(cpu.system, Duration::from_millis(40));
    }

    #[test]
    fn test_mismatched_samples_yield_zero() {
        let short = TickSample {
            user: vec![1],
            system: vec![1],
        };
        let long = TickSample {
            user: vec![5, 5],
            system: vec![5, 5],
        };
        assert_eq!(short.micros_until(&long), CpuMicros::default());
    }

    #[test]
    fn test_empty_sources_fall_back_to_process() {
        let sources = AccountingSources::default();
        assert!(matches!(sources.snapshot(), CpuSnapshot::Process(_)));

        let before = TimestampPair::before(&sources);
        let after = TimestampPair::after(&sources);
        let (wall, cpu) = before.micros_until(&after);
        assert!(wall >= 0.0);
        assert!(cpu.total() >= 0.0);
    }

    #[test]
    fn test_mixed_snapshots_yield_zero() {
        let ticks = CpuSnapshot::Ticks(TickSample::default());
        let process = CpuSnapshot::Process(CpuTime::default());
        assert_eq!(ticks.micros_until(&process), CpuMicros::default());
    }

    #[test]
    fn test_wait_for_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stat");
        fs::write(&path, record(0, 0)).unwrap();
        assert!(AccountingSources::wait_for(&path, Duration::from_millis(10)).is_ok());
        assert!(AccountingSources::wait_for(dir.path().join("nope"), Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_proc_self_stat_parses() {
        let path = Path::new("/proc/self/stat");
        if !path.exists() {
            return;
        }
        let record = fs::read_to_string(path).unwrap();
        assert!(parse_stat_times(&record).is_some());
    }
}
