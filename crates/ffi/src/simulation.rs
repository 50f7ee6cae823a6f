use pore_network_core::{
    CancellationToken, ComputeContext, NoProgress, PermeabilitySimulationResult, PermeabilitySimulator,
    ResultValidity, SimulationParams, SolverBackend,
};
use std::ptr;

use crate::error::{DefaultPnmError, PnmErrorCode};
use crate::helpers::{guard_panic, track_error, track_result, write_array, write_out};
use crate::network::{network_from_ptr, PnmFlowAxis, PnmNetwork};

/// Simulation inputs. Obtain defaults from `pnm_simulation_params_default`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PnmSimulationParams {
    /// Flow axis.
    pub flow_axis: PnmFlowAxis,
    /// Dynamic viscosity (Pa·s).
    pub viscosity: f64,
    /// Inlet pressure (Pa).
    pub input_pressure: f64,
    /// Outlet pressure (Pa).
    pub output_pressure: f64,
    /// Prefer the GPU solver when a device is available.
    pub use_gpu: bool,
    /// Share of pores fixed on each side along the axis.
    pub boundary_fraction: f64,
}

impl From<&PnmSimulationParams> for SimulationParams {
    fn from(p: &PnmSimulationParams) -> Self {
        SimulationParams {
            flow_axis: p.flow_axis.into(),
            viscosity: p.viscosity,
            input_pressure: p.input_pressure,
            output_pressure: p.output_pressure,
            use_gpu: p.use_gpu,
            boundary_fraction: p.boundary_fraction,
            ..SimulationParams::default()
        }
    }
}

/// Default simulation parameters (Z axis, water, 2000 → 1000 Pa, GPU preferred).
#[no_mangle]
pub extern "C" fn pnm_simulation_params_default() -> PnmSimulationParams {
    let p = SimulationParams::default();
    PnmSimulationParams {
        flow_axis: p.flow_axis.into(),
        viscosity: p.viscosity,
        input_pressure: p.input_pressure,
        output_pressure: p.output_pressure,
        use_gpu: p.use_gpu,
        boundary_fraction: p.boundary_fraction,
    }
}

/// Whether the permeability in a summary is defined.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnmResultValidity {
    /// Permeability is finite.
    Valid = 0,
    /// Zero cross-section orthogonal to the flow axis.
    ZeroCrossSection = 1,
    /// Zero sample length along the flow axis.
    ZeroSampleLength = 2,
    /// Equal inlet and outlet pressure.
    ZeroPressureDrop = 3,
    /// Non-finite flow or permeability.
    NonFinite = 4,
}

impl From<ResultValidity> for PnmResultValidity {
    fn from(validity: ResultValidity) -> Self {
        match validity {
            ResultValidity::Valid => Self::Valid,
            ResultValidity::ZeroCrossSection => Self::ZeroCrossSection,
            ResultValidity::ZeroSampleLength => Self::ZeroSampleLength,
            ResultValidity::ZeroPressureDrop => Self::ZeroPressureDrop,
            ResultValidity::NonFinite => Self::NonFinite,
        }
    }
}

/// Solver that produced the pressure field.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnmSolverBackend {
    /// CPU Gauss-Seidel.
    CpuGaussSeidel = 0,
    /// GPU Jacobi.
    GpuJacobi = 1,
}

impl From<SolverBackend> for PnmSolverBackend {
    fn from(backend: SolverBackend) -> Self {
        match backend {
            SolverBackend::CpuGaussSeidel => Self::CpuGaussSeidel,
            SolverBackend::GpuJacobi => Self::GpuJacobi,
        }
    }
}

/// Scalar outputs of a simulation.
///
/// Permeability fields are NaN unless `validity` is `Valid`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnmSimulationSummary {
    /// Permeability (m²).
    pub permeability_m2: f64,
    /// Permeability (Darcy).
    pub permeability_darcy: f64,
    /// Permeability (milliDarcy).
    pub permeability_millidarcy: f64,
    /// Flow leaving the inlet pores (m³/s).
    pub total_flow_rate: f64,
    /// Sample length along the axis (m).
    pub sample_length: f64,
    /// Cross-section orthogonal to the axis (m²).
    pub cross_sectional_area: f64,
    /// Permeability validity.
    pub validity: PnmResultValidity,
    /// Backend that produced the pressures.
    pub backend: PnmSolverBackend,
    /// Solver iterations.
    pub iterations: u32,
    /// Final relative update norm.
    pub residual: f64,
    /// Whether the solver reached its tolerance.
    pub converged: bool,
}

/// A completed permeability simulation. Immutable.
pub struct PnmSimulation {
    result: PermeabilitySimulationResult,
    summary: PnmSimulationSummary,
}

impl PnmSimulation {
    fn new(result: PermeabilitySimulationResult) -> Box<Self> {
        let summary = PnmSimulationSummary {
            permeability_m2: result.permeability_m2().unwrap_or(f64::NAN),
            permeability_darcy: result.permeability_darcy().unwrap_or(f64::NAN),
            permeability_millidarcy: result.permeability_millidarcy().unwrap_or(f64::NAN),
            total_flow_rate: result.total_flow_rate,
            sample_length: result.sample_length,
            cross_sectional_area: result.cross_sectional_area,
            validity: result.validity.into(),
            backend: result.solve.backend.into(),
            iterations: result.solve.iterations,
            residual: result.solve.residual,
            converged: result.solve.converged,
        };
        Box::new(Self { result, summary })
    }
}

fn simulation_from_ptr<'a>(ptr: *const PnmSimulation) -> Result<&'a PnmSimulation, DefaultPnmError> {
    // SAFETY: non-null pointers come from `pnm_simulation_run` per the API contract.
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultPnmError::null_pointer("simulation"))
}

/// Run a permeability simulation on `network` and return it via out-parameter.
///
/// Blocks until the solve finishes. Concurrent calls are allowed; they take turns on the GPU.
///
/// Returns
/// - `PnmErrorCode::Ok` on success (check `validity` in the summary)
/// - `InvalidModel` if the network has no throats
/// - `NullPointer`, `InvalidParameter`, `WorkerPool` or `Panic` otherwise
///
/// # Safety
/// - `network` must be a live handle from `pnm_network_create`.
/// - `params` must be null (defaults) or point to a valid `PnmSimulationParams`.
/// - `out_simulation` must be writable. The caller MUST call `pnm_simulation_destroy` once.
#[no_mangle]
pub unsafe extern "C" fn pnm_simulation_run(
    network: *const PnmNetwork,
    params: *const PnmSimulationParams,
    out_simulation: *mut *mut PnmSimulation,
) -> PnmErrorCode {
    if out_simulation.is_null() {
        return track_error(&DefaultPnmError::null_pointer("out_simulation"));
    }

    let result = guard_panic("permeability simulation", || {
        let network = network_from_ptr(network)?;
        // SAFETY: caller contract on `params`.
        let params = unsafe { params.as_ref() }.map_or_else(SimulationParams::default, SimulationParams::from);
        let context = ComputeContext::shared()?;
        let result = PermeabilitySimulator::new(context).simulate(
            network.model.clone(),
            &params,
            &NoProgress,
            &CancellationToken::new(),
        )?;
        Ok(PnmSimulation::new(result))
    });

    match track_result(result) {
        Ok(simulation) => {
            unsafe {
                *out_simulation = Box::into_raw(simulation);
            }
            PnmErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                *out_simulation = ptr::null_mut();
            }
            code
        }
    }
}

/// Destroys a simulation created by `pnm_simulation_run`. Null is a no-op.
///
/// # Safety
/// The pointer MUST come from `pnm_simulation_run` and not have been freed already.
#[no_mangle]
pub unsafe extern "C" fn pnm_simulation_destroy(ptr: *mut PnmSimulation) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: created by `Box::into_raw` in `pnm_simulation_run` and not yet freed.
    unsafe {
        drop(Box::from_raw(ptr));
    }
}

/// Copy the scalar outputs into `out_summary`.
///
/// # Safety
/// `simulation` must be null or a live handle; `out_summary` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_simulation_summary(
    simulation: *const PnmSimulation,
    out_summary: *mut PnmSimulationSummary,
) -> PnmErrorCode {
    match track_result(simulation_from_ptr(simulation)) {
        Ok(simulation) => unsafe { write_out(out_summary, simulation.summary, "out_summary") },
        Err(code) => code,
    }
}

/// Borrow pore pressures (Pa) in the network's pore order. **DO NOT FREE.**
///
/// # Safety
/// `simulation` must be null or a live handle; `out_len`/`out_array` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_simulation_get_pressures(
    simulation: *const PnmSimulation,
    out_len: *mut usize,
    out_array: *mut *const f64,
) -> PnmErrorCode {
    match track_result(simulation_from_ptr(simulation)) {
        Ok(simulation) => unsafe { write_array(&simulation.result.pore_pressures, out_len, out_array) },
        Err(code) => code,
    }
}

/// Borrow throat flow rates (m³/s, from `pore_id1` to `pore_id2`) in throat order. **DO NOT FREE.**
///
/// # Safety
/// `simulation` must be null or a live handle; `out_len`/`out_array` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_simulation_get_flow_rates(
    simulation: *const PnmSimulation,
    out_len: *mut usize,
    out_array: *mut *const f64,
) -> PnmErrorCode {
    match track_result(simulation_from_ptr(simulation)) {
        Ok(simulation) => unsafe { write_array(&simulation.result.throat_flow_rates, out_len, out_array) },
        Err(code) => code,
    }
}

/// Borrow the inlet pore ids (ascending). **DO NOT FREE.**
///
/// # Safety
/// `simulation` must be null or a live handle; `out_len`/`out_array` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_simulation_get_inlet_ids(
    simulation: *const PnmSimulation,
    out_len: *mut usize,
    out_array: *mut *const u32,
) -> PnmErrorCode {
    match track_result(simulation_from_ptr(simulation)) {
        Ok(simulation) => unsafe { write_array(&simulation.result.inlet_pore_ids, out_len, out_array) },
        Err(code) => code,
    }
}

/// Borrow the outlet pore ids (ascending). **DO NOT FREE.**
///
/// # Safety
/// `simulation` must be null or a live handle; `out_len`/`out_array` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_simulation_get_outlet_ids(
    simulation: *const PnmSimulation,
    out_len: *mut usize,
    out_array: *mut *const u32,
) -> PnmErrorCode {
    match track_result(simulation_from_ptr(simulation)) {
        Ok(simulation) => unsafe { write_array(&simulation.result.outlet_pore_ids, out_len, out_array) },
        Err(code) => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::pnm_network_destroy;
    use crate::network::tests::two_sphere_network;

    #[test]
    fn test_run_and_read_back() {
        let network = two_sphere_network();
        let mut params = pnm_simulation_params_default();
        params.flow_axis = PnmFlowAxis::X;
        params.use_gpu = false;

        let mut simulation = ptr::null_mut();
        assert_eq!(
            unsafe { pnm_simulation_run(network, &params, &mut simulation) },
            PnmErrorCode::Ok
        );
        // The simulation shares the model and outlives the network handle
        unsafe { pnm_network_destroy(network) };

        let mut summary = std::mem::MaybeUninit::<PnmSimulationSummary>::uninit();
        assert_eq!(
            unsafe { pnm_simulation_summary(simulation, summary.as_mut_ptr()) },
            PnmErrorCode::Ok
        );
        let summary = unsafe { summary.assume_init() };
        assert_eq!(summary.validity, PnmResultValidity::Valid);
        assert_eq!(summary.backend, PnmSolverBackend::CpuGaussSeidel);
        assert!(summary.permeability_m2 > 0.0);

        let mut len = 0usize;
        let mut pressures: *const f64 = ptr::null();
        assert_eq!(
            unsafe { pnm_simulation_get_pressures(simulation, &mut len, &mut pressures) },
            PnmErrorCode::Ok
        );
        let pressures = unsafe { std::slice::from_raw_parts(pressures, len) };
        assert_eq!(pressures, &[2000.0, 1000.0]);

        let mut ids: *const u32 = ptr::null();
        assert_eq!(
            unsafe { pnm_simulation_get_inlet_ids(simulation, &mut len, &mut ids) },
            PnmErrorCode::Ok
        );
        assert_eq!(unsafe { std::slice::from_raw_parts(ids, len) }, &[1]);

        unsafe { pnm_simulation_destroy(simulation) };
    }

    #[test]
    fn test_null_network() {
        let mut simulation = ptr::null_mut();
        let code = unsafe { pnm_simulation_run(ptr::null(), ptr::null(), &mut simulation) };
        assert_eq!(code, PnmErrorCode::NullPointer);
        assert!(simulation.is_null());
    }
}
