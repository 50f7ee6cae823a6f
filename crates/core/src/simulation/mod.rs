//! Single-phase permeability simulation
//!
//! `PermeabilitySimulator` drives one steady-state, incompressible Darcy simulation over an
//! immutable [`PoreNetworkModel`]:
//! - fixes the lowest/highest share of pores along the flow axis at the boundary pressures
//! - assembles Hagen-Poiseuille conductances into the pressure system
//! - solves on the GPU (Jacobi) or CPU (Gauss-Seidel), falling back to the CPU on GPU failure
//! - derives throat flow rates, the inlet boundary flow and Darcy permeability
//!
//! Degenerate geometry never fails a simulation; it is reported through
//! [`ResultValidity`] with `permeability: None`.

pub mod flow;
mod params;

pub use flow::{PoreRole, ResultValidity};
pub use params::SimulationParams;

use crate::control::{CancellationToken, ProgressSink, ProgressTracker};
use crate::core_types::{FlowAxis, Permeability, METERS_PER_MICROMETER};
use crate::error::{PoreNetworkError, Result};
use crate::network::boundary::fraction_boundaries;
use crate::network::PoreNetworkModel;
use crate::solver::{
    create_linear_solver, solve_with_fallback, ComputeContext, LinearSystem, LinearSystemSolver, ProfilerScope,
    RowKind, SolveReport, SolverBackend,
};
use flow::{
    boundary_flow_rate, darcy_permeability, hagen_poiseuille, linear_initial_guess, pore_roles, throat_flow_rates,
};
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle of one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationPhase {
    /// Inputs validated
    Configured,
    /// Building the pressure system
    Assembling,
    /// Iterating on the given backend
    Solving(SolverBackend),
    /// Pressures known, flow rates derived
    FlowComputed,
    /// Result produced or run aborted
    Terminal,
}

impl fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured => f.write_str("Configured"),
            Self::Assembling => f.write_str("Assembling"),
            Self::Solving(backend) => write!(f, "Solving({backend})"),
            Self::FlowComputed => f.write_str("FlowComputed"),
            Self::Terminal => f.write_str("Terminal"),
        }
    }
}

struct PhaseLog {
    current: SimulationPhase,
}

impl PhaseLog {
    fn start() -> Self {
        debug!("Simulation phase: {}", SimulationPhase::Configured);
        Self {
            current: SimulationPhase::Configured,
        }
    }

    fn enter(&mut self, next: SimulationPhase) {
        debug!("Simulation phase: {} -> {}", self.current, next);
        self.current = next;
    }
}

impl Drop for PhaseLog {
    fn drop(&mut self) {
        if self.current != SimulationPhase::Terminal {
            debug!("Simulation phase: {} -> {} (aborted)", self.current, SimulationPhase::Terminal);
        }
    }
}

/// Outcome of one permeability simulation
#[derive(Debug, Clone)]
pub struct PermeabilitySimulationResult {
    /// Network the simulation ran on
    pub model: Arc<PoreNetworkModel>,
    /// Flow axis
    pub flow_axis: FlowAxis,
    /// Dynamic viscosity, Pa·s
    pub viscosity: f64,
    /// Inlet pressure, Pa
    pub input_pressure: f64,
    /// Outlet pressure, Pa
    pub output_pressure: f64,
    /// Pressure per pore in model order, Pa
    pub pore_pressures: Vec<f64>,
    /// Flow per throat from `pore_id1` to `pore_id2` in model order, m³/s
    pub throat_flow_rates: Vec<f64>,
    /// Flow leaving the inlet pores, m³/s
    pub total_flow_rate: f64,
    /// Bounding-box length along the flow axis, m
    pub sample_length: f64,
    /// Bounding-box face orthogonal to the flow axis, m²
    pub cross_sectional_area: f64,
    /// Darcy permeability, `None` unless `validity` is `Valid`
    pub permeability: Option<Permeability>,
    /// Why the permeability is or is not defined
    pub validity: ResultValidity,
    /// Fixed-pressure inlet pores, ascending id
    pub inlet_pore_ids: Vec<u32>,
    /// Fixed-pressure outlet pores, ascending id
    pub outlet_pore_ids: Vec<u32>,
    /// Convergence record of the solve
    pub solve: SolveReport,
}

impl PermeabilitySimulationResult {
    /// Pressure of pore `id` in Pa.
    pub fn pressure_of(&self, id: u32) -> Option<f64> {
        self.model.index_of(id).map(|i| self.pore_pressures[i])
    }

    /// Permeability in m², if defined.
    pub fn permeability_m2(&self) -> Option<f64> {
        self.permeability.map(Permeability::square_meters)
    }

    /// Permeability in Darcy, if defined.
    pub fn permeability_darcy(&self) -> Option<f64> {
        self.permeability.map(Permeability::darcy)
    }

    /// Permeability in milliDarcy, if defined.
    pub fn permeability_millidarcy(&self) -> Option<f64> {
        self.permeability.map(Permeability::millidarcy)
    }

    /// Inlet minus outlet pressure in Pa.
    pub fn pressure_drop(&self) -> f64 {
        self.input_pressure - self.output_pressure
    }

    /// Whether the permeability is defined.
    pub fn is_valid(&self) -> bool {
        self.validity == ResultValidity::Valid
    }
}

/// Pressure system plus what is needed to turn its solution into flow
struct Assembly {
    system: LinearSystem,
    roles: Vec<PoreRole>,
    ends: Vec<(usize, usize)>,
    conductances: Vec<f64>,
    inlet_pore_ids: Vec<u32>,
    outlet_pore_ids: Vec<u32>,
}

/// Runs permeability simulations on a [`ComputeContext`]
pub struct PermeabilitySimulator<'ctx> {
    context: &'ctx ComputeContext,
}

impl<'ctx> PermeabilitySimulator<'ctx> {
    /// Create a simulator using `context`'s worker pool and accelerator.
    pub fn new(context: &'ctx ComputeContext) -> Self {
        Self { context }
    }

    /// Simulate with automatic backend selection.
    ///
    /// The accelerator is held for the whole solve when `params.use_gpu` is set, so
    /// concurrent simulations take turns on the device.
    ///
    /// Progress milestones: 10, 20, 30, 40, 50, 70, 80, 90, 100.
    ///
    /// # Errors
    /// - `InvalidModel` if the model has no pores or no throats
    /// - `InvalidParameter` if `params` fails validation
    /// - `Cancelled` if the token fires
    pub fn simulate(
        &self,
        model: Arc<PoreNetworkModel>,
        params: &SimulationParams,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PermeabilitySimulationResult> {
        let tracker = ProgressTracker::new(progress);
        let mut phase = PhaseLog::start();
        let assembly = self.prepare(&model, params, &tracker, &mut phase, cancel)?;

        let guard = params.use_gpu.then(|| self.context.accelerator());
        let solver = create_linear_solver(
            guard.as_ref(),
            params.cpu,
            params.gpu,
            assembly.system.len(),
            assembly.system.nnz(),
        );
        self.finish(model, params, assembly, solver.as_ref(), &tracker, &mut phase, cancel)
    }

    /// Simulate with a caller-supplied primary solver.
    ///
    /// GPU failures of `solver` still fall back to the CPU.
    ///
    /// # Errors
    /// As [`Self::simulate`].
    pub fn simulate_with_solver(
        &self,
        model: Arc<PoreNetworkModel>,
        params: &SimulationParams,
        solver: &dyn LinearSystemSolver,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PermeabilitySimulationResult> {
        let tracker = ProgressTracker::new(progress);
        let mut phase = PhaseLog::start();
        let assembly = self.prepare(&model, params, &tracker, &mut phase, cancel)?;
        self.finish(model, params, assembly, solver, &tracker, &mut phase, cancel)
    }

    /// Run [`Self::simulate`] on a dedicated thread.
    ///
    /// # Errors
    /// `InvalidParameter` for bad params, `WorkerPool` if the thread cannot be spawned.
    pub fn spawn(
        context: Arc<ComputeContext>,
        model: Arc<PoreNetworkModel>,
        params: SimulationParams,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<PermeabilitySimulationResult>>> {
        params.validate()?;
        std::thread::Builder::new()
            .name("pnm-simulate".into())
            .spawn(move || {
                PermeabilitySimulator::new(&context).simulate(model, &params, progress.as_ref(), &cancel)
            })
            .map_err(|e| PoreNetworkError::WorkerPool(e.to_string()))
    }

    fn prepare(
        &self,
        model: &PoreNetworkModel,
        params: &SimulationParams,
        tracker: &ProgressTracker<'_>,
        phase: &mut PhaseLog,
        cancel: &CancellationToken,
    ) -> Result<Assembly> {
        if model.pores().is_empty() {
            return Err(PoreNetworkError::InvalidModel("network has no pores".into()));
        }
        if model.throats().is_empty() {
            return Err(PoreNetworkError::InvalidModel("network has no throats".into()));
        }
        params.validate()?;
        cancel.check()?;
        info!(
            "Simulating permeability along {} ({} pores, {} throats, ΔP = {} Pa)",
            params.flow_axis,
            model.pores().len(),
            model.throats().len(),
            params.pressure_drop()
        );
        tracker.milestone(10);

        phase.enter(SimulationPhase::Assembling);
        let _scope = ProfilerScope::new("assemble_pressure_system");
        let pores = model.pores();
        let zones = fraction_boundaries(pores, params.flow_axis, params.boundary_fraction);
        let roles = pore_roles(&zones, pores.len());
        let inlet_pore_ids: Vec<u32> = zones.inlet.iter().map(|&i| pores[i].id).collect();
        let outlet_pore_ids: Vec<u32> = zones.outlet.iter().map(|&i| pores[i].id).collect();
        debug!(
            "{} inlet pores, {} outlet pores",
            inlet_pore_ids.len(),
            outlet_pore_ids.len()
        );
        tracker.milestone(20);

        let mut ends = Vec::with_capacity(model.throats().len());
        let mut conductances = Vec::with_capacity(model.throats().len());
        for throat in model.throats() {
            let (Some(a), Some(b)) = (model.index_of(throat.pore_id1), model.index_of(throat.pore_id2)) else {
                return Err(PoreNetworkError::InvalidModel(format!(
                    "throat {} references a missing pore",
                    throat.id
                )));
            };
            ends.push((a, b));
            conductances.push(hagen_poiseuille(throat.radius, throat.length, params.viscosity));
        }

        let rows: Vec<RowKind> = roles
            .iter()
            .map(|role| role.row_kind(params.input_pressure, params.output_pressure))
            .collect();
        let conduits: Vec<(usize, usize, f64)> = ends.iter().zip(&conductances).map(|(&(a, b), &g)| (a, b, g)).collect();
        let guess = linear_initial_guess(
            pores,
            &roles,
            params.flow_axis,
            params.input_pressure,
            params.output_pressure,
        );
        let scale = params.input_pressure.abs().max(params.output_pressure.abs());
        let system = LinearSystem::assemble(&rows, &conduits, guess, scale);
        cancel.check()?;
        tracker.milestone(30);

        Ok(Assembly {
            system,
            roles,
            ends,
            conductances,
            inlet_pore_ids,
            outlet_pore_ids,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        model: Arc<PoreNetworkModel>,
        params: &SimulationParams,
        assembly: Assembly,
        solver: &dyn LinearSystemSolver,
        tracker: &ProgressTracker<'_>,
        phase: &mut PhaseLog,
        cancel: &CancellationToken,
    ) -> Result<PermeabilitySimulationResult> {
        tracker.milestone(40);
        phase.enter(SimulationPhase::Solving(solver.backend()));
        tracker.milestone(50);

        let solution = {
            let _scope = ProfilerScope::new("solve_pressure_system");
            let system = &assembly.system;
            self.context
                .install(|| solve_with_fallback(solver, system, cancel, params.cpu))
                .inspect_err(|e| {
                    if *e == PoreNetworkError::Cancelled {
                        info!("Permeability simulation cancelled");
                    }
                })?
        };
        let report = solution.report;
        if report.backend != solver.backend() {
            phase.enter(SimulationPhase::Solving(report.backend));
        }
        if report.converged {
            info!(
                "{} converged in {} iterations (residual {:.3e})",
                report.backend, report.iterations, report.residual
            );
        } else {
            warn!(
                "{} did not converge after {} iterations (residual {:.3e}); using best iterate",
                report.backend, report.iterations, report.residual
            );
        }
        tracker.milestone(70);

        let pressures = solution.pressures;
        let flows = throat_flow_rates(&assembly.ends, &assembly.conductances, &pressures);
        let total_flow_rate = boundary_flow_rate(&assembly.ends, &flows, &assembly.roles);
        phase.enter(SimulationPhase::FlowComputed);
        tracker.milestone(80);

        let (sample_length, cross_sectional_area) = model.bounding_box().map_or((0.0, 0.0), |bounds| {
            (
                bounds.length_along(params.flow_axis) * METERS_PER_MICROMETER,
                bounds.cross_section(params.flow_axis) * METERS_PER_MICROMETER * METERS_PER_MICROMETER,
            )
        });
        let (permeability, validity) = darcy_permeability(
            total_flow_rate,
            params.viscosity,
            sample_length,
            cross_sectional_area,
            params.pressure_drop(),
        );
        tracker.milestone(90);

        if let Some(k) = permeability {
            info!("Permeability along {}: {}", params.flow_axis, k);
        }
        phase.enter(SimulationPhase::Terminal);
        tracker.milestone(100);

        Ok(PermeabilitySimulationResult {
            model,
            flow_axis: params.flow_axis,
            viscosity: params.viscosity,
            input_pressure: params.input_pressure,
            output_pressure: params.output_pressure,
            pore_pressures: pressures,
            throat_flow_rates: flows,
            total_flow_rate,
            sample_length,
            cross_sectional_area,
            permeability,
            validity,
            inlet_pore_ids: assembly.inlet_pore_ids,
            outlet_pore_ids: assembly.outlet_pore_ids,
            solve: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::NoProgress;
    use crate::core_types::{Pore, Throat, Vec3};
    use approx::assert_relative_eq;

    fn chain() -> Arc<PoreNetworkModel> {
        let pores: Vec<Pore> = (0..4)
            .map(|i| Pore::sphere(i + 1, 5.0, Vec3::new(0.0, 0.0, f64::from(i) * 20.0)))
            .collect();
        let throats: Vec<Throat> = (0..3)
            .filter_map(|i| Throat::between(i as u32, &pores[i], &pores[i + 1], 0.4, 0.1))
            .collect();
        Arc::new(PoreNetworkModel::new(pores, throats, 1e-6).unwrap())
    }

    fn cpu_params() -> SimulationParams {
        SimulationParams {
            use_gpu: false,
            ..SimulationParams::default()
        }
    }

    #[test]
    fn test_uniform_chain_pressures() {
        let context = ComputeContext::cpu_only().unwrap();
        let result = PermeabilitySimulator::new(&context)
            .simulate(chain(), &cpu_params(), &NoProgress, &CancellationToken::new())
            .unwrap();

        assert!(result.solve.converged);
        assert_eq!(result.solve.backend, SolverBackend::CpuGaussSeidel);
        assert_eq!(result.inlet_pore_ids, vec![1]);
        assert_eq!(result.outlet_pore_ids, vec![4]);
        assert_relative_eq!(result.pressure_of(2).unwrap(), 2000.0 - 1000.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(result.pressure_of(3).unwrap(), 2000.0 - 2000.0 / 3.0, epsilon = 1e-6);

        // Equal conductances carry the same flow everywhere
        for q in &result.throat_flow_rates {
            assert_relative_eq!(*q, result.total_flow_rate, max_relative = 1e-6);
        }
        assert!(result.is_valid());
        assert!(result.permeability_m2().unwrap() > 0.0);
    }

    #[test]
    fn test_zero_pressure_drop_is_flagged() {
        let context = ComputeContext::cpu_only().unwrap();
        let params = SimulationParams {
            input_pressure: 1500.0,
            output_pressure: 1500.0,
            ..cpu_params()
        };
        let result = PermeabilitySimulator::new(&context)
            .simulate(chain(), &params, &NoProgress, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.validity, ResultValidity::ZeroPressureDrop);
        assert!(result.permeability.is_none());
        assert_relative_eq!(result.total_flow_rate, 0.0);
    }

    #[test]
    fn test_flat_cross_section_is_flagged() {
        let context = ComputeContext::cpu_only().unwrap();
        let pores = vec![
            Pore::new(1, 1.0, 1.0, 0.0, Vec3::new(0.0, 0.0, 0.0)),
            Pore::new(2, 1.0, 1.0, 0.0, Vec3::new(0.0, 0.0, 10.0)),
        ];
        let throat = Throat {
            id: 0,
            pore_id1: 1,
            pore_id2: 2,
            radius: 1.0,
            length: 10.0,
            volume: 0.0,
        };
        let model = Arc::new(PoreNetworkModel::new(pores, vec![throat], 1e-6).unwrap());
        let result = PermeabilitySimulator::new(&context)
            .simulate(model, &cpu_params(), &NoProgress, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.validity, ResultValidity::ZeroCrossSection);
        assert_eq!(result.permeability_darcy(), None);
    }

    #[test]
    fn test_empty_throats_rejected() {
        let context = ComputeContext::cpu_only().unwrap();
        let pores = vec![Pore::sphere(1, 5.0, Vec3::zeros()), Pore::sphere(2, 5.0, Vec3::new(0.0, 0.0, 100.0))];
        let model = Arc::new(PoreNetworkModel::new(pores, Vec::new(), 1e-6).unwrap());
        let result =
            PermeabilitySimulator::new(&context).simulate(model, &cpu_params(), &NoProgress, &CancellationToken::new());
        assert!(matches!(result, Err(PoreNetworkError::InvalidModel(_))));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(
            SimulationPhase::Solving(SolverBackend::GpuJacobi).to_string(),
            "Solving(GPU Jacobi)"
        );
    }
}
