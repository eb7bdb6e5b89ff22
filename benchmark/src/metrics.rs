// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Result types and the documents they serialize into.
//!
//! All durations are microseconds with sub-microsecond precision. Field
//! names are camelCase because the plotting scripts downstream read them
//! that way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use pacebench_core::config::recognized_environment;
use pacebench_core::LatencySummary;

/// Statistics of one `run()` of a benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Iterations performed per worker
    pub num_executions: u32,
    pub num_threads: usize,
    /// Wall-clock time of the whole run
    pub full_duration: f64,
    /// User plus system CPU time
    pub full_cpu_time: f64,
    pub sys_cpu_time: f64,
    pub usr_cpu_time: f64,
    pub runtime_mean: f64,
    pub runtime_min: f64,
    pub runtime_max: f64,
    /// Median of the per-worker means
    pub runtime_median: f64,
    /// Frequency a paced run was asked to sustain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
}

impl RunResult {
    pub fn latency(&self) -> LatencySummary {
        LatencySummary {
            mean: self.runtime_mean,
            min: self.runtime_min,
            max: self.runtime_max,
            median: self.runtime_median,
        }
    }

    /// Human-readable results block.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("Results:\n");
        out.push_str(&format!("  Executions:    {}\n", self.num_executions));
        out.push_str(&format!("  Threads:       {}\n", self.num_threads));
        if let Some(freq) = self.target_frequency {
            out.push_str(&format!("  Target:        {:.2}Hz\n", freq));
        }
        if let Some(size) = self.buffer_size {
            out.push_str(&format!("  Buffer size:   {}B\n", size));
        }
        out.push_str(&format!("  Duration:      {}\n", format_micros(self.full_duration)));
        out.push_str(&format!(
            "  CPU time:      {} (usr {}, sys {})\n",
            format_micros(self.full_cpu_time),
            format_micros(self.usr_cpu_time),
            format_micros(self.sys_cpu_time)
        ));
        out.push_str(&format!(
            "  Latency:       mean {} | min {} | max {} | median {}\n",
            format_micros(self.runtime_mean),
            format_micros(self.runtime_min),
            format_micros(self.runtime_max),
            format_micros(self.runtime_median)
        ));
        out
    }
}

/// Format a microsecond value, auto-selecting ns/μs/ms/s.
pub fn format_micros(micros: f64) -> String {
    let abs = micros.abs();
    if abs < 1.0 {
        format!("{:.1}ns", micros * 1_000.0)
    } else if abs < 1_000.0 {
        format!("{:.3}μs", micros)
    } else if abs < 1_000_000.0 {
        format!("{:.3}ms", micros / 1_000.0)
    } else {
        format!("{:.3}s", micros / 1_000_000.0)
    }
}

/// Discriminator of batch documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchKind {
    /// Fixed-count and peak batches. The spelling is what consumers match on.
    #[serde(rename = "TROUGHPUT-BENCHMARK")]
    Throughput,
    #[serde(rename = "FREQUENCY-BENCHMARK")]
    Frequency,
}

/// Per-run arrays of a fixed-count or peak batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDocument {
    pub runtimes_microseconds: Vec<f64>,
    pub cpu_times_microseconds: Vec<f64>,
    pub sys_cpu_times_microseconds: Vec<f64>,
    pub usr_cpu_times_microseconds: Vec<f64>,
    pub num_threads: usize,
    pub num_executions: u32,
    #[serde(rename = "type")]
    pub kind: BatchKind,
}

impl BatchDocument {
    /// Collect the per-run arrays. CPU times are normalized by the first
    /// run's execution count.
    pub fn from_runs(runs: &[RunResult]) -> Self {
        let first = runs.first().copied().unwrap_or_default();
        let per_exec = f64::from(first.num_executions.max(1));

        Self {
            runtimes_microseconds: runs.iter().map(|r| r.runtime_mean).collect(),
            cpu_times_microseconds: runs.iter().map(|r| r.full_cpu_time / per_exec).collect(),
            sys_cpu_times_microseconds: runs.iter().map(|r| r.sys_cpu_time / per_exec).collect(),
            usr_cpu_times_microseconds: runs.iter().map(|r| r.usr_cpu_time / per_exec).collect(),
            num_threads: first.num_threads,
            num_executions: first.num_executions,
            kind: BatchKind::Throughput,
        }
    }
}

/// Run documents of a frequency sweep, in sweep order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepDocument {
    pub benchmarks: Vec<RunResult>,
    pub num_threads: usize,
    #[serde(rename = "type")]
    pub kind: BatchKind,
}

impl SweepDocument {
    pub fn from_runs(runs: &[RunResult]) -> Self {
        Self {
            benchmarks: runs.to_vec(),
            num_threads: runs.first().map(|r| r.num_threads).unwrap_or_default(),
            kind: BatchKind::Frequency,
        }
    }
}

/// System information captured at benchmark time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    /// Kernel version (Linux)
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Fields every batch report carries next to its document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// `NAME=value` for every recognized environment variable
    pub environment_variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    /// Pause between peak runs, microseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_time: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub system_info: SystemInfo,
}

impl ReportMetadata {
    /// Capture the process environment and host information now.
    pub fn capture() -> Self {
        Self {
            environment_variables: recognized_environment(),
            buffer_size: None,
            sleep_time: None,
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
        }
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn with_sleep_time(mut self, micros: f64) -> Self {
        self.sleep_time = Some(micros);
        self
    }
}

/// A batch document together with its metadata, flattened into one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport<D> {
    #[serde(flatten)]
    pub document: D,
    #[serde(flatten)]
    pub metadata: ReportMetadata,
}

impl<D> BatchReport<D> {
    pub fn new(document: D, metadata: ReportMetadata) -> Self {
        Self { document, metadata }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(mean: f64, cpu: f64, execs: u32) -> RunResult {
        RunResult {
            num_executions: execs,
            num_threads: 2,
            full_duration: mean * f64::from(execs),
            full_cpu_time: cpu,
            sys_cpu_time: cpu / 4.0,
            usr_cpu_time: cpu * 3.0 / 4.0,
            runtime_mean: mean,
            runtime_min: mean,
            runtime_max: mean,
            runtime_median: mean,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_result_camel_case() {
        let json = serde_json::to_value(run(1.5, 100.0, 10)).unwrap();
        assert_eq!(json["numExecutions"], 10);
        assert_eq!(json["runtimeMedian"], 1.5);
        assert_eq!(json["usrCpuTime"], 75.0);
        assert!(json.get("targetFrequency").is_none());
    }

    #[test]
    fn test_batch_document_normalizes_cpu_times() {
        let runs = [run(1.0, 400.0, 100), run(2.0, 800.0, 100)];
        let doc = BatchDocument::from_runs(&runs);

        assert_eq!(doc.runtimes_microseconds, vec![1.0, 2.0]);
        assert_eq!(doc.cpu_times_microseconds, vec![4.0, 8.0]);
        assert_eq!(doc.sys_cpu_times_microseconds, vec![1.0, 2.0]);
        assert_eq!(doc.num_executions, 100);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "TROUGHPUT-BENCHMARK");
    }

    #[test]
    fn test_empty_batch_document() {
        let doc = BatchDocument::from_runs(&[]);
        assert!(doc.runtimes_microseconds.is_empty());
        assert_eq!(doc.num_threads, 0);
    }

    #[test]
    fn test_sweep_document_type() {
        let mut paced = run(10.0, 5.0, 1000);
        paced.target_frequency = Some(1000.0);
        let doc = SweepDocument::from_runs(&[paced]);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "FREQUENCY-BENCHMARK");
        assert_eq!(json["benchmarks"][0]["targetFrequency"], 1000.0);
    }

    #[test]
    fn test_report_flattens_metadata() {
        let report = BatchReport::new(
            BatchDocument::from_runs(&[run(1.0, 1.0, 1)]),
            ReportMetadata::capture().with_buffer_size(4096),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["bufferSize"], 4096);
        assert!(json["environmentVariables"].is_array());
        assert!(json["systemInfo"]["cpuCores"].is_number());
        assert!(json.get("sleepTime").is_none());
    }

    #[test]
    fn test_format_micros() {
        assert_eq!(format_micros(0.5), "500.0ns");
        assert_eq!(format_micros(1.5), "1.500μs");
        assert_eq!(format_micros(1_500.0), "1.500ms");
        assert_eq!(format_micros(1_500_000.0), "1.500s");
    }

    #[test]
    fn test_system_info_collect() {
        let info = SystemInfo::collect();
        assert!(!info.os.is_empty());
        assert!(info.cpu_cores > 0);
    }
}
