//! Error types for pore network generation and permeability simulation.
//!
//! Only conditions that terminate an operation live here. Recoverable conditions are
//! reported as data instead:
//! - solver non-convergence is flagged on [`crate::solver::SolveReport`]
//! - degenerate geometry is flagged on [`crate::simulation::ResultValidity`]

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PoreNetworkError>;

/// Unified error type for pore network operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoreNetworkError {
    /// The network cannot be simulated (no pores, no throats, dangling ids, ...).
    #[error("invalid pore network model: {0}")]
    InvalidModel(String),

    /// The caller cancelled the operation through its `CancellationToken`.
    #[error("operation cancelled")]
    Cancelled,

    /// No GPU device could be obtained. Recovered by falling back to the CPU solver.
    #[error("GPU unavailable: {0}")]
    GpuUnavailable(String),

    /// The GPU solver failed mid-run. Recovered by falling back to the CPU solver.
    #[error("GPU solver failure: {0}")]
    GpuSolverFailure(String),

    /// A configuration value is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the configuration struct
        name: &'static str,
        /// Human readable constraint violation
        reason: String,
    },

    /// The label volume or particle list handed over by particle separation is malformed.
    #[error("invalid input volume: {0}")]
    InvalidVolume(String),

    /// Worker pool or worker thread could not be created.
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl PoreNetworkError {
    /// Build an `InvalidParameter` error.
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether the failure belongs to the GPU path and can be retried on the CPU.
    #[must_use]
    pub fn is_gpu_failure(&self) -> bool {
        matches!(self, Self::GpuUnavailable(_) | Self::GpuSolverFailure(_))
    }
}

/// Reject non-finite or non-positive values.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PoreNetworkError::invalid_parameter(
            name,
            format!("must be finite and positive, got {value}"),
        ))
    }
}

/// Reject non-finite or negative values.
pub(crate) fn require_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PoreNetworkError::invalid_parameter(
            name,
            format!("must be finite and non-negative, got {value}"),
        ))
    }
}
