// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Driver commands and the state they share.

pub mod fixed;
pub mod probes;
pub mod sweep;

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use pacebench_benchmark::{Benchmark, JsonReporter, Operation, ReportTarget};
use pacebench_core::accounting::DEFAULT_RESOLVE_TIMEOUT;
use pacebench_core::{AccountingSources, BenchConfig, ConfigSource, DirectoryConfig, MapConfig};

use crate::Cli;

/// Port the socket-based drivers listen on.
pub const DEFAULT_PORT: u16 = 18273;

/// Configuration lookup and the result sink.
pub struct Session {
    pub config: BenchConfig<Box<dyn ConfigSource>>,
    pub reporter: JsonReporter,
}

impl Session {
    pub fn open(cli: &Cli) -> anyhow::Result<Self> {
        let source: Box<dyn ConfigSource> = match &cli.config {
            Some(path) => Box::new(
                MapConfig::from_yaml_file(path)
                    .with_context(|| format!("loading {}", path.display()))?,
            ),
            None => Box::new(DirectoryConfig::new(&cli.config_dir)),
        };
        let config = BenchConfig::new(source);

        let data_filepath = config.data_filepath();
        if data_filepath.is_none() {
            tracing::warn!("No filepath for the benchmark results specified, writing to stdout");
        }
        let reporter = JsonReporter::new(ReportTarget::from_option(data_filepath));

        Ok(Self { config, reporter })
    }

    /// Resolve the accounting sources. Failing here ends the program.
    pub fn sources(&self) -> anyhow::Result<Arc<AccountingSources>> {
        let path = self.config.stat_files();
        let sources = AccountingSources::resolve(&path, DEFAULT_RESOLVE_TIMEOUT)
            .with_context(|| format!("resolving accounting sources at {}", path.display()))?;
        tracing::info!(sources = sources.len(), "Accounting sources resolved");
        Ok(Arc::new(sources))
    }

    /// A fixed-count benchmark with the configured executions and workers.
    pub fn benchmark(&self, operation: impl Operation + 'static) -> anyhow::Result<Benchmark> {
        let executions = self.config.num_executions()?;
        let workers = self.config.num_workers()?;
        Ok(Benchmark::new(operation, self.sources()?)
            .executions(executions)
            .workers(workers)
            .timing_correction(self.config.timing_correction()?))
    }

    pub fn report<T: Serialize + ?Sized>(&self, document: &T) -> anyhow::Result<()> {
        self.reporter.write(document).context("writing result document")
    }
}
