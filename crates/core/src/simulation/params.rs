//! Permeability simulation parameters

use crate::core_types::FlowAxis;
use crate::error::{require_positive, PoreNetworkError, Result};
use crate::solver::SolverSettings;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Inputs of one permeability simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Axis along which the pressure drop is applied
    pub flow_axis: FlowAxis,
    /// Dynamic viscosity in Pa·s
    pub viscosity: f64,
    /// Pressure held on inlet pores, Pa
    pub input_pressure: f64,
    /// Pressure held on outlet pores, Pa
    pub output_pressure: f64,
    /// Prefer the GPU Jacobi backend when a device is available
    pub use_gpu: bool,
    /// Share of pores (by axis coordinate) fixed on each side, at least one pore each
    pub boundary_fraction: f64,
    /// Gauss-Seidel convergence contract
    pub cpu: SolverSettings,
    /// Jacobi convergence contract
    pub gpu: SolverSettings,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            flow_axis: FlowAxis::Z,
            viscosity: 0.001,
            input_pressure: 2000.0,
            output_pressure: 1000.0,
            use_gpu: true,
            boundary_fraction: 0.1,
            cpu: SolverSettings::CPU,
            gpu: SolverSettings::GPU,
        }
    }
}

impl SimulationParams {
    /// Default parameters driving flow along `axis`.
    pub fn along(axis: FlowAxis) -> Self {
        Self {
            flow_axis: axis,
            ..Self::default()
        }
    }

    /// Inlet minus outlet pressure in Pa.
    pub fn pressure_drop(&self) -> f64 {
        self.input_pressure - self.output_pressure
    }

    /// Check every parameter range.
    ///
    /// An equal inlet and outlet pressure is accepted; the result is then flagged
    /// `ZeroPressureDrop` instead of failing.
    ///
    /// # Errors
    /// `InvalidParameter` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        require_positive("viscosity", self.viscosity)?;
        if !self.input_pressure.is_finite() {
            return Err(PoreNetworkError::invalid_parameter(
                "input_pressure",
                format!("must be finite, got {}", self.input_pressure),
            ));
        }
        if !self.output_pressure.is_finite() {
            return Err(PoreNetworkError::invalid_parameter(
                "output_pressure",
                format!("must be finite, got {}", self.output_pressure),
            ));
        }
        if !(self.boundary_fraction > 0.0 && self.boundary_fraction <= 0.5) {
            return Err(PoreNetworkError::invalid_parameter(
                "boundary_fraction",
                format!("must lie in (0, 0.5], got {}", self.boundary_fraction),
            ));
        }
        self.cpu.validate("cpu")?;
        self.gpu.validate("gpu")?;

        if self.use_gpu && self.gpu.tolerance > self.cpu.tolerance {
            warn!(
                "GPU tolerance {:.1e} is looser than CPU tolerance {:.1e}; GPU results are less precise",
                self.gpu.tolerance, self.cpu.tolerance
            );
        }
        Ok(())
    }
}
