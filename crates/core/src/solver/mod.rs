//! Pressure-system solvers and compute resources
//!
//! This module provides a unified GPU/CPU abstraction for the pore pressure system.
//! The core abstraction is the `LinearSystemSolver` trait, which has a CPU Gauss-Seidel
//! and a GPU Jacobi implementation sharing the assembly in [`LinearSystem`].
//!
//! # Feature Flags
//!
//! - `gpu` (default): Enables GPU acceleration via wgpu. Disable with `--no-default-features`
//!   for environments without GPU access.
//!
//! # Backend Selection
//!
//! 1. Try GPU (if requested, the `gpu` feature is enabled and a device was initialized)
//! 2. Fall back to CPU (always available), also when the GPU fails mid-solve
//!
//! # Example
//!
//! ```rust,ignore
//! use pore_network_core::solver::{create_linear_solver, ComputeContext, SolverSettings};
//!
//! let context = ComputeContext::cpu_only()?;
//! let guard = context.accelerator();
//! let solver = create_linear_solver(Some(&guard), SolverSettings::CPU, SolverSettings::GPU, 100, 400);
//! ```

mod context;
mod cpu;
pub mod profiler;
pub mod system;
#[allow(clippy::module_name_repetitions)]
mod r#trait;

#[cfg(feature = "gpu")]
mod gpu;

// Re-exports
pub use context::{AcceleratorGuard, ComputeContext, ComputeOptions, GpuInitResult};
pub use cpu::GaussSeidelSolver;
pub use profiler::ProfilerScope;
pub use r#trait::{LinearSystemSolver, Solution, SolveReport, SolverBackend, SolverSettings};
pub use system::{LinearSystem, RowKind};

#[cfg(feature = "gpu")]
pub use context::GpuDevice;
#[cfg(feature = "gpu")]
pub use gpu::GpuJacobiSolver;

use crate::control::CancellationToken;
use crate::error::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, warn};

/// Create a linear solver with automatic backend selection
///
/// Passing `None` for `accelerator` selects the CPU directly. Otherwise the GPU backend
/// is used when a device is present and can hold `rows` unknowns with `nnz`
/// off-diagonal entries.
///
/// # Returns
///
/// A boxed `LinearSystemSolver` trait object using the best available backend
pub fn create_linear_solver<'a>(
    accelerator: Option<&'a AcceleratorGuard<'_>>,
    cpu: SolverSettings,
    gpu: SolverSettings,
    rows: usize,
    nnz: usize,
) -> Box<dyn LinearSystemSolver + 'a> {
    #[cfg(feature = "gpu")]
    if let Some(guard) = accelerator {
        match guard.init_result() {
            Some(GpuInitResult::Success(device)) => {
                if device.can_allocate(rows, nnz) {
                    info!(
                        "Using GPU backend: {} ({} unknowns, {} entries)",
                        device.adapter_name(),
                        rows,
                        nnz
                    );
                    return Box::new(GpuJacobiSolver::new(device, gpu));
                }
                warn!(
                    "GPU limits too small for {} unknowns / {} entries, falling back to CPU",
                    rows, nnz
                );
            }
            Some(GpuInitResult::NoGpuFound) => {
                info!("No GPU found, using CPU backend");
            }
            Some(GpuInitResult::InitFailed { adapter_name, error }) => {
                warn!(
                    "GPU '{}' found but failed to initialize: {}. Falling back to CPU.",
                    adapter_name, error
                );
            }
            Some(GpuInitResult::Disabled) => {
                info!("GPU disabled, using CPU backend");
            }
            None => {
                info!("GPU released by shutdown, using CPU backend");
            }
        }
    }

    #[cfg(not(feature = "gpu"))]
    {
        let _ = (accelerator, gpu, rows, nnz);
        info!("GPU feature disabled, using CPU backend");
    }

    Box::new(GaussSeidelSolver::new(cpu))
}

/// Solve with `primary`, retrying on the CPU if a GPU backend fails or panics.
///
/// GPU failure is the only retried condition; cancellation and every other error
/// propagate unchanged.
///
/// # Errors
/// `Cancelled`, or the error of a CPU-only solve.
pub fn solve_with_fallback(
    primary: &dyn LinearSystemSolver,
    system: &LinearSystem,
    cancel: &CancellationToken,
    cpu: SolverSettings,
) -> Result<Solution> {
    if !primary.is_gpu_accelerated() {
        return primary.solve(system, cancel);
    }
    match catch_unwind(AssertUnwindSafe(|| primary.solve(system, cancel))) {
        Ok(Err(e)) if e.is_gpu_failure() => {
            warn!("{}. Falling back to CPU Gauss-Seidel.", e);
        }
        Ok(result) => return result,
        Err(_) => {
            warn!("GPU solver panicked. Falling back to CPU Gauss-Seidel.");
        }
    }
    GaussSeidelSolver::new(cpu).solve(system, cancel)
}
