// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for pacebench.
//!
//! Configuration mistakes get their own enum so callers can match on the
//! exact kind instead of parsing messages. I/O failures and polling
//! timeouts are separate top-level variants.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the harness.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Raised Before Any Measurement
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] InvalidConfigurationError),

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Polling Timeouts
    // =========================================================================
    #[error("Accounting source {path} did not appear within {waited:?}")]
    AccountingSourceTimeout { path: PathBuf, waited: Duration },

    #[error("Benchmark file {path} was not removed within {waited:?}")]
    TargetFileTimeout { path: PathBuf, waited: Duration },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Programmer or configuration mistakes. A run that hits one of these
/// performs no measurement.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidConfigurationError {
    #[error("Must at least run in 1 thread")]
    NoWorkers,

    #[error("Must at least run one batch")]
    NoBatches,

    #[error("Must at least run two samples, got {samples}")]
    TooFewSamples { samples: u32 },

    #[error("The frequency must be at least one, got {frequency}")]
    FrequencyTooLow { frequency: f64 },

    #[error("The buffer size must be at least one")]
    ZeroBufferSize,

    #[error("A frequency sweep needs a paced benchmark template")]
    NotPaced,

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

impl BenchError {
    /// Returns the configuration error kind, if this is one.
    pub fn as_invalid_configuration(&self) -> Option<&InvalidConfigurationError> {
        match self {
            BenchError::InvalidConfiguration(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_display() {
        let err = InvalidConfigurationError::InvalidFieldValue {
            field: "BM_NUM_THREADS",
            value: "many".to_string(),
            reason: "not an unsigned integer".to_string(),
        };
        assert!(err.to_string().contains("BM_NUM_THREADS"));
        assert!(err.to_string().contains("many"));
    }

    #[test]
    fn test_error_chain() {
        let err: BenchError = InvalidConfigurationError::NoWorkers.into();
        assert!(matches!(err, BenchError::InvalidConfiguration(_)));
        assert_eq!(
            err.as_invalid_configuration(),
            Some(&InvalidConfigurationError::NoWorkers)
        );
    }

    #[test]
    fn test_io_error_is_not_configuration() {
        let err = BenchError::Io {
            context: "opening benchmark file",
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.as_invalid_configuration().is_none());
        assert!(err.to_string().contains("opening benchmark file"));
    }
}
