//! Conductance, boundary roles and Darcy evaluation
//!
//! Geometry arrives in µm; everything leaving this module is SI.

use crate::core_types::{FlowAxis, Permeability, Pore, METERS_PER_MICROMETER};
use crate::network::boundary::{center_extent, BoundaryZones};
use crate::solver::RowKind;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use tracing::warn;

/// Hagen-Poiseuille conductance `π·r⁴ / (8·μ·L)` in m³/(Pa·s).
///
/// `radius` and `length` are in µm, `viscosity` in Pa·s.
pub fn hagen_poiseuille(radius: f64, length: f64, viscosity: f64) -> f64 {
    let r = radius * METERS_PER_MICROMETER;
    let l = length * METERS_PER_MICROMETER;
    PI * r.powi(4) / (8.0 * viscosity * l)
}

/// Boundary role of one pore in a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoreRole {
    /// Free pressure
    Interior,
    /// Held at the input pressure
    Inlet,
    /// Held at the output pressure
    Outlet,
    /// Selected on both sides (single-pore axis); held at the input pressure
    InletOutlet,
}

impl PoreRole {
    /// Whether the pore belongs to the inlet zone.
    pub fn is_inlet(self) -> bool {
        matches!(self, Self::Inlet | Self::InletOutlet)
    }

    /// Whether the pore belongs to the inlet zone only.
    pub fn is_inlet_only(self) -> bool {
        self == Self::Inlet
    }

    /// Row kind for the given boundary pressures.
    pub fn row_kind(self, input_pressure: f64, output_pressure: f64) -> RowKind {
        match self {
            Self::Interior => RowKind::Free,
            Self::Inlet | Self::InletOutlet => RowKind::Fixed(input_pressure),
            Self::Outlet => RowKind::Fixed(output_pressure),
        }
    }
}

/// Per-pore roles from inlet/outlet zones over `pore_count` dense indices.
pub fn pore_roles(zones: &BoundaryZones, pore_count: usize) -> Vec<PoreRole> {
    let mut roles = vec![PoreRole::Interior; pore_count];
    for &i in &zones.inlet {
        roles[i] = PoreRole::Inlet;
    }
    for &i in &zones.outlet {
        roles[i] = if roles[i] == PoreRole::Inlet {
            PoreRole::InletOutlet
        } else {
            PoreRole::Outlet
        };
    }
    roles
}

/// Pressures interpolated linearly along `axis` between the center extremes.
///
/// Fixed pores start at their boundary value.
pub fn linear_initial_guess(
    pores: &[Pore],
    roles: &[PoreRole],
    axis: FlowAxis,
    input_pressure: f64,
    output_pressure: f64,
) -> Vec<f64> {
    let span = center_extent(pores, axis);
    pores
        .iter()
        .zip(roles)
        .map(|(pore, role)| match role.row_kind(input_pressure, output_pressure) {
            RowKind::Fixed(p) => p,
            RowKind::Free => match span {
                Some((lo, hi)) if hi > lo => {
                    let t = (axis.component(&pore.center) - lo) / (hi - lo);
                    input_pressure + (output_pressure - input_pressure) * t
                }
                _ => 0.5 * (input_pressure + output_pressure),
            },
        })
        .collect()
}

/// Flow through each throat from `pore_id1` to `pore_id2`, `Q = g·(p1 − p2)`.
///
/// `ends` holds the dense pore indices of each throat.
pub fn throat_flow_rates(ends: &[(usize, usize)], conductances: &[f64], pressures: &[f64]) -> Vec<f64> {
    ends.iter()
        .zip(conductances)
        .map(|(&(a, b), &g)| g * (pressures[a] - pressures[b]))
        .collect()
}

/// Flow leaving the inlet face.
///
/// A throat counts when one end is an inlet-only pore and the other end is not an inlet,
/// so every path through the face is counted once.
pub fn boundary_flow_rate(ends: &[(usize, usize)], flows: &[f64], roles: &[PoreRole]) -> f64 {
    ends.iter()
        .zip(flows)
        .map(|(&(a, b), &q)| {
            if roles[a].is_inlet_only() && !roles[b].is_inlet() {
                q
            } else if roles[b].is_inlet_only() && !roles[a].is_inlet() {
                -q
            } else {
                0.0
            }
        })
        .sum()
}

/// Whether a simulation produced a usable permeability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultValidity {
    /// Permeability is finite
    Valid,
    /// Cross-section orthogonal to the flow axis is zero
    ZeroCrossSection,
    /// Sample length along the flow axis is zero
    ZeroSampleLength,
    /// Inlet and outlet pressures are equal
    ZeroPressureDrop,
    /// The flow rate or the permeability is not finite
    NonFinite,
}

impl fmt::Display for ResultValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Valid => "valid",
            Self::ZeroCrossSection => "zero cross-sectional area",
            Self::ZeroSampleLength => "zero sample length",
            Self::ZeroPressureDrop => "zero pressure drop",
            Self::NonFinite => "non-finite flow",
        };
        f.write_str(text)
    }
}

/// Darcy's law `k = Q·μ·L / (A·ΔP)` in SI units.
///
/// Degenerate geometry yields `None` with the reason; a zero flow rate is a valid
/// zero permeability.
pub fn darcy_permeability(
    flow_rate: f64,
    viscosity: f64,
    sample_length: f64,
    cross_section: f64,
    pressure_drop: f64,
) -> (Option<Permeability>, ResultValidity) {
    let validity = if !(cross_section.is_finite() && cross_section > 0.0) {
        ResultValidity::ZeroCrossSection
    } else if !(sample_length.is_finite() && sample_length > 0.0) {
        ResultValidity::ZeroSampleLength
    } else if pressure_drop == 0.0 {
        ResultValidity::ZeroPressureDrop
    } else if !flow_rate.is_finite() {
        ResultValidity::NonFinite
    } else {
        let k = flow_rate * viscosity * sample_length / (cross_section * pressure_drop);
        if k.is_finite() {
            if flow_rate == 0.0 {
                warn!("No flow leaves the inlet pores; permeability is zero");
            }
            return (Some(Permeability::from_square_meters(k)), ResultValidity::Valid);
        }
        ResultValidity::NonFinite
    };
    warn!("Permeability undefined: {}", validity);
    (None, validity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn test_hagen_poiseuille_si() {
        let g = hagen_poiseuille(4.0, 0.1, 0.001);
        let expected = PI * 4.0e-6_f64.powi(4) / (8.0 * 0.001 * 1.0e-7);
        assert_relative_eq!(g, expected, max_relative = 1e-12);
        assert_relative_eq!(hagen_poiseuille(4.0, 0.2, 0.001), expected / 2.0, max_relative = 1e-12);
    }

    #[test]
    fn test_roles_and_rows() {
        let zones = BoundaryZones {
            inlet: vec![0],
            outlet: vec![0, 2],
        };
        let roles = pore_roles(&zones, 3);
        assert_eq!(roles, vec![PoreRole::InletOutlet, PoreRole::Interior, PoreRole::Outlet]);
        assert_eq!(roles[0].row_kind(10.0, 1.0), RowKind::Fixed(10.0));
        assert_eq!(roles[1].row_kind(10.0, 1.0), RowKind::Free);
        assert_eq!(roles[2].row_kind(10.0, 1.0), RowKind::Fixed(1.0));
        assert!(roles[0].is_inlet() && !roles[0].is_inlet_only());
    }

    #[test]
    fn test_initial_guess_is_linear() {
        let pores: Vec<Pore> = (0..5)
            .map(|i| Pore::sphere(i + 1, 1.0, Vec3::new(0.0, 0.0, f64::from(i) * 10.0)))
            .collect();
        let roles = pore_roles(
            &BoundaryZones {
                inlet: vec![0],
                outlet: vec![4],
            },
            5,
        );
        let guess = linear_initial_guess(&pores, &roles, FlowAxis::Z, 2000.0, 1000.0);
        assert_eq!(guess, vec![2000.0, 1750.0, 1500.0, 1250.0, 1000.0]);
    }

    #[test]
    fn test_boundary_flow_counts_each_path_once() {
        // 0 inlet, 1 inlet, 2 interior, 3 outlet
        let roles = vec![PoreRole::Inlet, PoreRole::Inlet, PoreRole::Interior, PoreRole::Outlet];
        let ends = vec![(0, 1), (0, 2), (2, 1), (1, 3), (2, 3)];
        let flows = vec![5.0, 3.0, -2.0, 4.0, 5.0];
        // inlet-inlet ignored, 0→2 = 3, 1→2 = 2, 1→3 = 4, interior→outlet ignored
        assert_relative_eq!(boundary_flow_rate(&ends, &flows, &roles), 9.0);
    }

    #[test]
    fn test_throat_flow_direction() {
        let flows = throat_flow_rates(&[(0, 1), (1, 0)], &[2.0, 2.0], &[10.0, 4.0]);
        assert_eq!(flows, vec![12.0, -12.0]);
    }

    #[test]
    fn test_darcy_guards() {
        let (k, validity) = darcy_permeability(1e-12, 0.001, 1e-4, 1e-8, 1000.0);
        assert_eq!(validity, ResultValidity::Valid);
        assert_relative_eq!(k.unwrap().square_meters(), 1e-12 * 0.001 * 1e-4 / (1e-8 * 1000.0));

        assert_eq!(darcy_permeability(1.0, 0.001, 1.0, 0.0, 1.0), (None, ResultValidity::ZeroCrossSection));
        assert_eq!(darcy_permeability(1.0, 0.001, 0.0, 1.0, 1.0), (None, ResultValidity::ZeroSampleLength));
        assert_eq!(darcy_permeability(1.0, 0.001, 1.0, 1.0, 0.0), (None, ResultValidity::ZeroPressureDrop));
        assert_eq!(darcy_permeability(f64::NAN, 0.001, 1.0, 1.0, 1.0), (None, ResultValidity::NonFinite));

        let (k, validity) = darcy_permeability(0.0, 0.001, 1.0, 1.0, 1.0);
        assert_eq!(validity, ResultValidity::Valid);
        assert_eq!(k.map(Permeability::square_meters), Some(0.0));
    }
}
