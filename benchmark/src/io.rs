// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Per-worker write targets for I/O-backed benchmarks.
//!
//! Every worker owns one output file and all workers share one read-only
//! buffer. The timed operation writes the whole buffer to offset 0 of its
//! worker's file, so the file never grows past the buffer size.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::uio::pwrite;
use rand::Rng;

use pacebench_core::{BenchError, BenchResult, InvalidConfigurationError, WorkerSlot};

/// How long [`WriteTarget::remove`] waits for the filesystem to drop the files.
pub const DEFAULT_REMOVE_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Open benchmark files plus the buffer written into them.
#[derive(Debug)]
pub struct WriteTarget {
    files: Vec<File>,
    paths: Vec<PathBuf>,
    buffer: Vec<u8>,
}

impl WriteTarget {
    /// Name of the file written by `slot`.
    pub fn file_name(slot: WorkerSlot) -> String {
        format!("write-benchmark-{}.bin", slot)
    }

    /// Open one file per worker below `dir` and fill a buffer of
    /// `buffer_size` random bytes.
    pub fn open(dir: impl AsRef<Path>, num_workers: usize, buffer_size: usize) -> BenchResult<Self> {
        if buffer_size < 1 {
            return Err(InvalidConfigurationError::ZeroBufferSize.into());
        }
        let dir = dir.as_ref();

        let mut files = Vec::with_capacity(num_workers);
        let mut paths = Vec::with_capacity(num_workers);
        for slot in (0..num_workers).map(WorkerSlot::new) {
            let path = dir.join(Self::file_name(slot));
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| {
                    tracing::error!(path = %path.display(), error = %e, "Could not open benchmark file");
                    BenchError::Io {
                        context: "opening benchmark file",
                        source: e,
                    }
                })?;
            files.push(file);
            paths.push(path);
        }

        // content does not matter, it only has to be something
        let mut buffer = vec![0u8; buffer_size];
        rand::thread_rng().fill(&mut buffer[..]);

        tracing::debug!(
            dir = %dir.display(),
            workers = num_workers,
            buffer_size = buffer_size,
            "Opened benchmark files"
        );

        Ok(Self {
            files,
            paths,
            buffer,
        })
    }

    /// Positioned write of the whole buffer to the slot's file.
    #[inline]
    pub fn write_slot(&self, slot: WorkerSlot) -> Result<usize, Errno> {
        let file = self.files.get(slot.index()).ok_or(Errno::EBADF)?;
        pwrite(file, &self.buffer, 0)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Whether the file at `paths[i]` is still the one this target opened.
    fn owns(&self, i: usize) -> bool {
        match (self.files[i].metadata(), fs::metadata(&self.paths[i])) {
            (Ok(ours), Ok(on_disk)) => ours.dev() == on_disk.dev() && ours.ino() == on_disk.ino(),
            _ => false,
        }
    }

    /// Unlink every file and wait until none of them is visible anymore.
    ///
    /// Paths that a newer target has reopened in the meantime are left alone.
    pub fn remove(&self, timeout: Duration) -> BenchResult<()> {
        let owned: Vec<&PathBuf> = (0..self.paths.len())
            .filter(|&i| self.owns(i))
            .map(|i| &self.paths[i])
            .collect();

        for path in &owned {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::error!(path = %path.display(), error = %e, "Could not delete benchmark file");
                }
            }
        }

        let start = Instant::now();
        for path in &owned {
            while path.exists() {
                if start.elapsed() > timeout {
                    return Err(BenchError::TargetFileTimeout {
                        path: path.to_path_buf(),
                        waited: timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
        }

        tracing::debug!(files = owned.len(), "Removed benchmark files");
        Ok(())
    }
}

impl Drop for WriteTarget {
    fn drop(&mut self) {
        // teardown normally got here first
        for i in 0..self.paths.len() {
            if self.owns(i) {
                let _ = fs::remove_file(&self.paths[i]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_write_remove() {
        let dir = TempDir::new().unwrap();
        let target = WriteTarget::open(dir.path(), 3, 64).unwrap();
        assert_eq!(target.num_files(), 3);
        assert_eq!(target.buffer_size(), 64);

        for slot in 0..3 {
            assert_eq!(target.write_slot(WorkerSlot::new(slot)).unwrap(), 64);
        }
        // repeated writes land on the same offset
        target.write_slot(WorkerSlot::new(1)).unwrap();
        let len = fs::metadata(dir.path().join("write-benchmark-1.bin")).unwrap().len();
        assert_eq!(len, 64);

        target.remove(Duration::from_secs(1)).unwrap();
        assert!(target.paths().iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_write_to_unknown_slot() {
        let dir = TempDir::new().unwrap();
        let target = WriteTarget::open(dir.path(), 1, 8).unwrap();
        assert_eq!(target.write_slot(WorkerSlot::new(5)), Err(Errno::EBADF));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let dir = TempDir::new().unwrap();
        let err = WriteTarget::open(dir.path(), 1, 0).unwrap_err();
        assert_eq!(
            err.as_invalid_configuration(),
            Some(&InvalidConfigurationError::ZeroBufferSize)
        );
    }

    #[test]
    fn test_open_in_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = WriteTarget::open(dir.path().join("missing"), 1, 8).unwrap_err();
        assert!(matches!(err, BenchError::Io { .. }));
    }

    #[test]
    fn test_drop_cleans_up() {
        let dir = TempDir::new().unwrap();
        let paths = {
            let target = WriteTarget::open(dir.path(), 2, 8).unwrap();
            target.paths().to_vec()
        };
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_stale_target_leaves_successor_files() {
        let dir = TempDir::new().unwrap();
        let stale = WriteTarget::open(dir.path(), 2, 4).unwrap();
        stale.remove(DEFAULT_REMOVE_TIMEOUT).unwrap();

        let successor = WriteTarget::open(dir.path(), 2, 4).unwrap();
        drop(stale);
        assert!(successor.paths().iter().all(|p| p.exists()));

        successor.remove(DEFAULT_REMOVE_TIMEOUT).unwrap();
        assert!(successor.paths().iter().all(|p| !p.exists()));
    }
}
