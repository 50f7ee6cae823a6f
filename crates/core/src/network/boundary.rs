//! Inlet/outlet boundary selection
//!
//! Two flavours are used:
//! - zone selection (flow-path check, tortuosity): pores within `2 · mean radius` of the
//!   min/max center coordinate along the axis
//! - fraction selection (permeability solver): the lowest/highest fraction of pores
//!   ordered by axis coordinate, at least one pore each

use crate::core_types::{FlowAxis, Pore};

/// Inlet and outlet pores as dense indices, both ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryZones {
    /// Pores on the low side of the axis
    pub inlet: Vec<usize>,
    /// Pores on the high side of the axis
    pub outlet: Vec<usize>,
}

impl BoundaryZones {
    /// Whether either side is empty.
    pub fn is_incomplete(&self) -> bool {
        self.inlet.is_empty() || self.outlet.is_empty()
    }
}

/// Arithmetic mean of pore radii (0 for an empty list).
pub fn mean_radius(pores: &[Pore]) -> f64 {
    if pores.is_empty() {
        return 0.0;
    }
    pores.iter().map(|p| p.radius).sum::<f64>() / pores.len() as f64
}

/// Min and max center coordinate along `axis`, or `None` for an empty list.
pub fn center_extent(pores: &[Pore], axis: FlowAxis) -> Option<(f64, f64)> {
    pores.iter().map(|p| axis.component(&p.center)).fold(None, |acc, c| match acc {
        None => Some((c, c)),
        Some((lo, hi)) => Some((lo.min(c), hi.max(c))),
    })
}

/// Pores within `2 · mean radius` of either end of the center extent.
pub fn zone_boundaries(pores: &[Pore], axis: FlowAxis) -> BoundaryZones {
    let Some((lo, hi)) = center_extent(pores, axis) else {
        return BoundaryZones::default();
    };
    let margin = 2.0 * mean_radius(pores);

    let mut zones = BoundaryZones::default();
    for (i, pore) in pores.iter().enumerate() {
        let c = axis.component(&pore.center);
        if c <= lo + margin {
            zones.inlet.push(i);
        }
        if c >= hi - margin {
            zones.outlet.push(i);
        }
    }
    zones
}

/// The lowest and highest `fraction` of pores by axis coordinate (at least one each).
///
/// Ties in the coordinate are broken by pore id so the split is deterministic.
pub fn fraction_boundaries(pores: &[Pore], axis: FlowAxis, fraction: f64) -> BoundaryZones {
    let n = pores.len();
    if n == 0 {
        return BoundaryZones::default();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        axis.component(&pores[a].center)
            .total_cmp(&axis.component(&pores[b].center))
            .then_with(|| pores[a].id.cmp(&pores[b].id))
    });

    let count = ((n as f64 * fraction).floor() as usize).clamp(1, n);
    let mut inlet = order[..count].to_vec();
    let mut outlet = order[n - count..].to_vec();
    inlet.sort_unstable();
    outlet.sort_unstable();
    BoundaryZones { inlet, outlet }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;

    fn column(n: u32) -> Vec<Pore> {
        (0..n)
            .map(|i| Pore::sphere(i + 1, 2.0, Vec3::new(0.0, 0.0, f64::from(i) * 10.0)))
            .collect()
    }

    #[test]
    fn test_zone_margin_is_two_mean_radii() {
        let pores = column(6); // z = 0, 10, ..., 50; margin = 4
        let zones = zone_boundaries(&pores, FlowAxis::Z);
        assert_eq!(zones.inlet, vec![0]);
        assert_eq!(zones.outlet, vec![5]);

        let wide: Vec<Pore> = pores
            .iter()
            .map(|p| Pore::sphere(p.id, 6.0, p.center))
            .collect(); // margin = 12
        let zones = zone_boundaries(&wide, FlowAxis::Z);
        assert_eq!(zones.inlet, vec![0, 1]);
        assert_eq!(zones.outlet, vec![4, 5]);
    }

    #[test]
    fn test_fraction_has_minimum_one() {
        let pores = column(5);
        let zones = fraction_boundaries(&pores, FlowAxis::Z, 0.1);
        assert_eq!(zones.inlet, vec![0]);
        assert_eq!(zones.outlet, vec![4]);

        let pores = column(30);
        let zones = fraction_boundaries(&pores, FlowAxis::Z, 0.1);
        assert_eq!(zones.inlet, vec![0, 1, 2]);
        assert_eq!(zones.outlet, vec![27, 28, 29]);
    }

    #[test]
    fn test_empty_pores() {
        assert!(zone_boundaries(&[], FlowAxis::X).is_incomplete());
        assert!(fraction_boundaries(&[], FlowAxis::X, 0.1).is_incomplete());
        assert_eq!(mean_radius(&[]), 0.0);
    }
}
