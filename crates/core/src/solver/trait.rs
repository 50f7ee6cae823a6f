//! Linear solver trait definition
//!
//! This module defines the `LinearSystemSolver` trait, the backend-agnostic interface for
//! the pressure system. Both the CPU Gauss-Seidel and the GPU Jacobi implementations
//! implement it and share the assembly in [`super::system`].

use super::system::LinearSystem;
use crate::control::CancellationToken;
use crate::error::{require_positive, PoreNetworkError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which implementation produced a solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverBackend {
    /// In-place Gauss-Seidel sweeps in f64
    CpuGaussSeidel,
    /// Double-buffered Jacobi iterations in f32 compute shaders
    GpuJacobi,
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuGaussSeidel => f.write_str("CPU Gauss-Seidel"),
            Self::GpuJacobi => f.write_str("GPU Jacobi"),
        }
    }
}

/// Convergence contract of one backend
///
/// Convergence is reached when the max-norm of one iteration's pressure update, divided
/// by the system's pressure scale, drops to `tolerance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Relative update tolerance
    pub tolerance: f64,
    /// Iteration cap
    pub max_iterations: u32,
}

impl SolverSettings {
    /// Defaults for the CPU Gauss-Seidel backend.
    pub const CPU: Self = Self {
        tolerance: 1e-10,
        max_iterations: 10_000,
    };

    /// Defaults for the GPU Jacobi backend. f32 arithmetic cannot resolve the CPU tolerance.
    pub const GPU: Self = Self {
        tolerance: 1e-6,
        max_iterations: 5_000,
    };

    /// Check the tolerance and the iteration cap.
    ///
    /// # Errors
    /// `InvalidParameter` for a non-positive tolerance or a zero iteration cap.
    pub fn validate(&self, name: &'static str) -> Result<()> {
        require_positive(name, self.tolerance)?;
        if self.max_iterations == 0 {
            return Err(PoreNetworkError::invalid_parameter(name, "max_iterations must be at least 1"));
        }
        Ok(())
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::CPU
    }
}

/// Convergence record of one solve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    /// Backend that produced the solution
    pub backend: SolverBackend,
    /// Iterations performed
    pub iterations: u32,
    /// Final relative update norm
    pub residual: f64,
    /// Whether `residual ≤ tolerance` was reached within the cap
    pub converged: bool,
}

/// Pressure field and its convergence record
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// One value per unknown, in Pa
    pub pressures: Vec<f64>,
    /// Convergence record
    pub report: SolveReport,
}

/// Backend-agnostic interface for the pore pressure system
///
/// Hitting the iteration cap is not an error: the best iterate is returned with
/// `converged == false`.
pub trait LinearSystemSolver: Send + Sync {
    /// Solve `system`, polling `cancel` between iterations.
    ///
    /// # Errors
    /// - `Cancelled` if the token fires
    /// - `GpuUnavailable` / `GpuSolverFailure` from the GPU backend
    fn solve(&self, system: &LinearSystem, cancel: &CancellationToken) -> Result<Solution>;

    /// Backend identifier.
    fn backend(&self) -> SolverBackend;

    /// Check if this is the GPU backend
    ///
    /// # Returns
    ///
    /// `true` if GPU-accelerated, `false` if CPU-only
    fn is_gpu_accelerated(&self) -> bool {
        self.backend() == SolverBackend::GpuJacobi
    }
}
