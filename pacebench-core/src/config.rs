// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Key/value configuration with documented defaults.
//!
//! Every key is looked up at the moment its accessor is called. A missing
//! key is not an error: a diagnostic is logged and the default is used.
//! A key that is present but cannot be parsed is an
//! [`InvalidConfigurationError::InvalidFieldValue`].

use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BenchError, BenchResult, InvalidConfigurationError};
use crate::types::Pacing;

/// Directory holding one file per configuration key.
pub const DEFAULT_CONFIG_DIR: &str = "/tmp/benchmarks_config";

/// Environment variables with this prefix are echoed into result documents.
pub const ENV_PASSTHROUGH_PREFIX: &str = "SCONE_";

/// Accounting source used when none is configured.
pub const DEFAULT_STAT_FILE: &str = "/proc/self/stat";

pub const KEY_NUM_THREADS: &str = "BM_NUM_THREADS";
pub const KEY_NUM_EXECUTIONS: &str = "BM_NUM_EXECUTIONS";
pub const KEY_STAT_FILES: &str = "BM_STAT_FILES";
pub const KEY_NUM_BATCHES: &str = "BM_NUM_BATCHES";
pub const KEY_BUFFER_SIZE: &str = "BM_BUFFER_SIZE";
pub const KEY_NUM_SAMPLES: &str = "BM_NUM_SAMPLES";
pub const KEY_MIN_FREQUENCY: &str = "BM_MIN_FREQUENCY";
pub const KEY_MAX_FREQUENCY: &str = "BM_MAX_FREQUENCY";
pub const KEY_PACING: &str = "BM_PACING";
pub const KEY_PEAK_SLEEP_MICROS: &str = "BM_PEAK_SLEEP_MICROS";
pub const KEY_DATA_FILEPATH: &str = "BM_DATA_FILEPATH";
pub const KEY_TIMING_CORRECTION_MICROS: &str = "BM_TIMING_CORRECTION_MICROS";

/// A lookup from parameter name to string value.
pub trait ConfigSource {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for Box<T> {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

/// One file per key inside a directory. The value is the first
/// whitespace-delimited token of the file.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    dir: PathBuf,
}

impl DirectoryConfig {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_DIR)
    }
}

impl ConfigSource for DirectoryConfig {
    fn lookup(&self, key: &str) -> Option<String> {
        let path = self.dir.join(key);
        tracing::debug!(path = %path.display(), "Opening config file");
        let content = std::fs::read_to_string(&path).ok()?;
        content.split_whitespace().next().map(str::to_string)
    }
}

/// An in-memory key/value map.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, returning the map for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    /// Load a flat YAML mapping. Scalars are stringified, nulls are skipped.
    pub fn from_yaml_str(content: &str) -> BenchResult<Self> {
        let raw: HashMap<String, serde_yaml::Value> =
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        let mut values = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let value = match value {
                serde_yaml::Value::Null => continue,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::String(s) => s,
                _ => {
                    return Err(BenchError::ConfigParse {
                        message: format!("Value of '{}' must be a scalar", key),
                    })
                }
            };
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }
}

impl ConfigSource for MapConfig {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Typed accessors over a [`ConfigSource`].
#[derive(Debug, Clone)]
pub struct BenchConfig<S> {
    source: S,
}

impl<S: ConfigSource> BenchConfig<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Raw value of a key, logging when it is absent.
    pub fn raw(&self, key: &str) -> Option<String> {
        let value = self.source.lookup(key);
        if value.is_none() {
            tracing::warn!(key = key, "No config found for parameter");
        }
        value
    }

    fn parsed<T>(&self, key: &'static str, default: impl FnOnce() -> T) -> BenchResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.raw(key) {
            None => Ok(default()),
            Some(value) => value.parse().map_err(|e: T::Err| {
                InvalidConfigurationError::InvalidFieldValue {
                    field: key,
                    value: value.clone(),
                    reason: e.to_string(),
                }
                .into()
            }),
        }
    }

    /// Worker count, defaulting to the available hardware parallelism.
    pub fn num_workers(&self) -> BenchResult<usize> {
        self.parsed(KEY_NUM_THREADS, num_cpus::get)
    }

    pub fn num_executions(&self) -> BenchResult<u32> {
        self.parsed(KEY_NUM_EXECUTIONS, || 100_000)
    }

    /// Path (file or directory) of the accounting sources.
    pub fn stat_files(&self) -> PathBuf {
        self.raw(KEY_STAT_FILES)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STAT_FILE))
    }

    pub fn num_batches(&self) -> BenchResult<u32> {
        self.parsed(KEY_NUM_BATCHES, || 100)
    }

    /// Write buffer size in bytes.
    pub fn buffer_size(&self) -> BenchResult<usize> {
        self.parsed(KEY_BUFFER_SIZE, || 4096)
    }

    pub fn num_samples(&self) -> BenchResult<u32> {
        self.parsed(KEY_NUM_SAMPLES, || 100)
    }

    pub fn min_frequency(&self) -> BenchResult<f64> {
        self.parsed(KEY_MIN_FREQUENCY, || 100_000.0)
    }

    pub fn max_frequency(&self) -> BenchResult<f64> {
        self.parsed(KEY_MAX_FREQUENCY, || 1_000_000.0)
    }

    pub fn pacing(&self) -> BenchResult<Pacing> {
        self.parsed(KEY_PACING, Pacing::default)
    }

    /// Pause between peak batch runs, five microseconds per execution unless set.
    pub fn peak_sleep(&self, num_executions: u32) -> BenchResult<Duration> {
        let micros = self.parsed(KEY_PEAK_SLEEP_MICROS, || u64::from(num_executions) * 5)?;
        Ok(Duration::from_micros(micros))
    }

    /// Where to write the result document. `None` means standard output.
    pub fn data_filepath(&self) -> Option<PathBuf> {
        self.raw(KEY_DATA_FILEPATH)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    /// Microseconds subtracted from every computed pacing pause.
    pub fn timing_correction(&self) -> BenchResult<f64> {
        self.parsed(KEY_TIMING_CORRECTION_MICROS, || 5.0)
    }
}

/// `NAME=value` strings of every variable whose name starts with `prefix`.
pub fn environment_passthrough<I>(vars: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .map(|(name, value)| format!("{}={}", name, value))
        .collect()
}

/// Passthrough of the current process environment.
pub fn recognized_environment() -> Vec<String> {
    let vars = std::env::vars_os().map(|(name, value)| {
        (
            name.to_string_lossy().into_owned(),
            value.to_string_lossy().into_owned(),
        )
    });
    environment_passthrough(vars, ENV_PASSTHROUGH_PREFIX)
}
