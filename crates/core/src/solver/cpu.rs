//! CPU-based linear solver implementation
//!
//! In-place Gauss-Seidel sweeps in f64. This backend is always available and serves as
//! the fallback when GPU acceleration is not available or fails.

use super::r#trait::{LinearSystemSolver, Solution, SolveReport, SolverBackend, SolverSettings};
use super::system::LinearSystem;
use crate::control::CancellationToken;
use crate::error::Result;
use tracing::debug;

/// Sequential Gauss-Seidel solver
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussSeidelSolver {
    settings: SolverSettings,
}

impl GaussSeidelSolver {
    /// Create a solver with the given convergence contract.
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Convergence contract.
    pub fn settings(&self) -> SolverSettings {
        self.settings
    }
}

impl LinearSystemSolver for GaussSeidelSolver {
    fn solve(&self, system: &LinearSystem, cancel: &CancellationToken) -> Result<Solution> {
        let n = system.len();
        let mut x = system.initial_guess().to_vec();
        let mut report = SolveReport {
            backend: SolverBackend::CpuGaussSeidel,
            iterations: 0,
            residual: 0.0,
            converged: n == 0,
        };
        if n == 0 {
            return Ok(Solution { pressures: x, report });
        }

        let (row_ptr, col_idx, values) = (system.row_ptr(), system.col_idx(), system.values());
        let (diagonal, rhs) = (system.diagonal(), system.rhs());
        let scale = system.pressure_scale();

        for iteration in 1..=self.settings.max_iterations {
            cancel.check()?;
            let mut max_delta: f64 = 0.0;
            for i in 0..n {
                let mut sigma = rhs[i];
                for k in row_ptr[i]..row_ptr[i + 1] {
                    sigma -= values[k] * x[col_idx[k]];
                }
                let next = sigma / diagonal[i];
                max_delta = max_delta.max((next - x[i]).abs());
                x[i] = next;
            }

            report.iterations = iteration;
            report.residual = max_delta / scale;
            if !report.residual.is_finite() {
                debug!("Gauss-Seidel diverged at iteration {}", iteration);
                break;
            }
            if report.residual <= self.settings.tolerance {
                report.converged = true;
                break;
            }
        }

        debug!(
            "Gauss-Seidel: {} iterations, residual {:.3e}, converged {}",
            report.iterations, report.residual, report.converged
        );
        Ok(Solution { pressures: x, report })
    }

    fn backend(&self) -> SolverBackend {
        SolverBackend::CpuGaussSeidel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::system::RowKind;
    use crate::PoreNetworkError;
    use approx::assert_relative_eq;

    fn chain(len: usize) -> LinearSystem {
        let mut rows = vec![RowKind::Free; len];
        rows[0] = RowKind::Fixed(100.0);
        rows[len - 1] = RowKind::Fixed(0.0);
        let conduits: Vec<(usize, usize, f64)> = (0..len - 1).map(|i| (i, i + 1, 1.0)).collect();
        LinearSystem::assemble(&rows, &conduits, vec![0.0; len], 100.0)
    }

    #[test]
    fn test_uniform_chain_is_linear() {
        let system = chain(11);
        let solution = GaussSeidelSolver::default().solve(&system, &CancellationToken::new()).unwrap();
        assert!(solution.report.converged);
        assert_eq!(solution.report.backend, SolverBackend::CpuGaussSeidel);
        for (i, p) in solution.pressures.iter().enumerate() {
            assert_relative_eq!(*p, 100.0 - 10.0 * i as f64, epsilon = 1e-6);
        }
        assert!(system.relative_residual(&solution.pressures) < 1e-8);
    }

    #[test]
    fn test_iteration_cap_returns_best_iterate() {
        let system = chain(50);
        let solver = GaussSeidelSolver::new(SolverSettings {
            tolerance: 1e-12,
            max_iterations: 3,
        });
        let solution = solver.solve(&system, &CancellationToken::new()).unwrap();
        assert!(!solution.report.converged);
        assert_eq!(solution.report.iterations, 3);
        assert_eq!(solution.pressures[0], 100.0);
    }

    #[test]
    fn test_cancellation_aborts() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = GaussSeidelSolver::default().solve(&chain(5), &cancel);
        assert_eq!(result, Err(PoreNetworkError::Cancelled));
    }
}
