use std::io;
use thiserror::Error;

/// Boxed failure returned by a fallible scan operator.
pub type OperatorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a scan did not produce a result.
///
/// Precondition and resource errors are reported before any element is
/// written. Operator failures are reported after every worker has been
/// joined, and leave the output in an unspecified state.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("input holds {len} elements but the scan needs {needed}")]
    InputTooShort { needed: usize, len: usize },

    #[error("output holds {len} elements but the scan needs {needed}")]
    OutputTooShort { needed: usize, len: usize },

    #[error("could not allocate a carry table for {workers} workers")]
    CarryAllocation { workers: usize },

    #[error("could not spawn scan worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    #[error("operator failed on {}", worker_label(.worker))]
    Operator {
        /// `None` when the calling thread was running the operator.
        worker: Option<usize>,
        #[source]
        source: OperatorError,
    },

    #[error("operator panicked on {}: {message}", worker_label(.worker))]
    OperatorPanicked {
        worker: Option<usize>,
        message: String,
    },
}

impl ScanError {
    /// True for failures raised by the operator rather than by the engine.
    pub fn is_operator_failure(&self) -> bool {
        matches!(
            self,
            ScanError::Operator { .. } | ScanError::OperatorPanicked { .. }
        )
    }
}

fn worker_label(worker: &Option<usize>) -> String {
    match worker {
        Some(id) => format!("worker {id}"),
        None => "the calling thread".to_string(),
    }
}

/// Why a [`crate::ScanConfig`] could not be built from its overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// The override that was rejected.
    pub fn key(&self) -> &str {
        match self {
            ConfigError::InvalidValue { key, .. } => key,
        }
    }
}
