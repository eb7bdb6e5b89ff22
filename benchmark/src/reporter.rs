// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! JSON output of benchmark documents.
//!
//! Documents go either to a named file or to standard output, always
//! pretty-printed.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Failed to write report: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where a document ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTarget {
    File(PathBuf),
    Stdout,
}

impl ReportTarget {
    /// A file when a path is configured, standard output otherwise.
    pub fn from_option(path: Option<PathBuf>) -> Self {
        path.map(ReportTarget::File).unwrap_or(ReportTarget::Stdout)
    }
}

/// JSON reporter for benchmark documents.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    target: ReportTarget,
}

impl JsonReporter {
    pub fn new(target: ReportTarget) -> Self {
        Self { target }
    }

    pub fn stdout() -> Self {
        Self::new(ReportTarget::Stdout)
    }

    pub fn target(&self) -> &ReportTarget {
        &self.target
    }

    /// Write `document` to the target.
    pub fn write<T: Serialize + ?Sized>(&self, document: &T) -> Result<(), ReporterError> {
        match &self.target {
            ReportTarget::File(path) => {
                let file = File::create(path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, document)?;
                writer.write_all(b"\n")?;
                writer.flush()?;
                tracing::info!(path = %path.display(), "Report written");
            }
            ReportTarget::Stdout => {
                let stdout = io::stdout();
                let mut writer = stdout.lock();
                serde_json::to_writer_pretty(&mut writer, document)?;
                writer.write_all(b"\n")?;
                writer.flush()?;
            }
        }
        Ok(())
    }

    /// Load a document written earlier.
    pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ReporterError> {
        let file = File::open(path)?;
        let document = serde_json::from_reader(io::BufReader::new(file))?;
        Ok(document)
    }
}
