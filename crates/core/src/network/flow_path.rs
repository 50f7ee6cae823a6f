//! Flow-path enforcement
//!
//! When no inlet pore reaches an outlet pore, the network's components are bridged in
//! size order: the largest component absorbs the next one through its closest admissible
//! pore pair until every component has been visited. The merged set is a flat work list,
//! so component count never affects stack depth.

use super::boundary::zone_boundaries;
use super::config::GenerationConfig;
use super::graph::ThroatGraph;
use crate::control::CancellationToken;
use crate::core_types::{Pore, Throat};
use crate::error::Result;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

/// Outcome of one enforcement pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowPathReport {
    /// Inlet and outlet were already connected
    pub already_connected: bool,
    /// Connected components before bridging
    pub components: usize,
    /// Synthetic throats added
    pub bridges_added: usize,
    /// Components left unbridged because every candidate endpoint was at the degree cap
    pub skipped_components: usize,
}

/// Bridge components until inlet and outlet zones along `config.flow_path_axis` connect.
///
/// New throats take the next free ids after the existing ones and update
/// `connection_count` on both ends.
///
/// Connection is not guaranteed: a bridge needs an endpoint below `max_connections` on each
/// side, so a component whose pores are all at the degree cap is left unbridged, logged at
/// `warn` and counted in [`FlowPathReport::skipped_components`].
///
/// # Errors
/// `Cancelled` if the token fires between components.
pub fn enforce_flow_path(
    pores: &mut [Pore],
    throats: &mut Vec<Throat>,
    config: &GenerationConfig,
    cancel: &CancellationToken,
) -> Result<FlowPathReport> {
    let axis = config.flow_path_axis;
    let zones = zone_boundaries(pores, axis);
    if zones.is_incomplete() {
        warn!("No boundary pores along {}, flow path not enforced", axis);
        return Ok(FlowPathReport::default());
    }

    let index: FxHashMap<u32, usize> = pores.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
    let graph = ThroatGraph::build(pores.len(), &index, throats);
    if graph.connects(&zones.inlet, &zones.outlet) {
        debug!("Inlet and outlet already connected along {}", axis);
        return Ok(FlowPathReport {
            already_connected: true,
            components: graph.components().len(),
            ..FlowPathReport::default()
        });
    }

    let components = graph.components();
    let mut report = FlowPathReport {
        components: components.len(),
        ..FlowPathReport::default()
    };
    info!(
        "Inlet and outlet disconnected along {}: bridging {} components",
        axis,
        components.len()
    );

    let cap = config.max_connections as u32;
    let mut core: Vec<usize> = components[0].clone();
    let mut next_id = throats.iter().map(|t| t.id + 1).max().unwrap_or(0);

    for component in &components[1..] {
        cancel.check()?;
        let Some((a, b)) = closest_admissible_pair(pores, &core, component, cap) else {
            warn!(
                "Component of {} pores left unbridged: every candidate pore is at the degree cap",
                component.len()
            );
            report.skipped_components += 1;
            continue;
        };
        let Some(throat) = Throat::between(
            next_id,
            &pores[a],
            &pores[b],
            config.throat_radius_factor,
            config.min_throat_length,
        ) else {
            continue;
        };
        debug!(
            "Bridging pores {} and {} (length {:.3} µm)",
            throat.pore_id1, throat.pore_id2, throat.length
        );
        next_id += 1;
        pores[a].connection_count += 1;
        pores[b].connection_count += 1;
        throats.push(throat);
        core.extend_from_slice(component);
        report.bridges_added += 1;
    }

    info!(
        "Flow path enforcement added {} throats ({} components skipped)",
        report.bridges_added, report.skipped_components
    );
    Ok(report)
}

/// Closest pair (one end in each set) with both ends below the degree cap.
///
/// Ties break on the lower pore id, then the higher one.
fn closest_admissible_pair(pores: &[Pore], core: &[usize], other: &[usize], cap: u32) -> Option<(usize, usize)> {
    let mut best: Option<(f64, u32, u32, usize, usize)> = None;
    for &a in core.iter().filter(|&&a| pores[a].connection_count < cap) {
        for &b in other.iter().filter(|&&b| pores[b].connection_count < cap) {
            let d = pores[a].distance_to(&pores[b]);
            let lo = pores[a].id.min(pores[b].id);
            let hi = pores[a].id.max(pores[b].id);
            let better = match best {
                None => true,
                Some((bd, blo, bhi, _, _)) => d.total_cmp(&bd).then(lo.cmp(&blo)).then(hi.cmp(&bhi)).is_lt(),
            };
            if better {
                best = Some((d, lo, hi, a, b));
            }
        }
    }
    best.map(|(_, _, _, a, b)| (a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{FlowAxis, Vec3};

    fn config() -> GenerationConfig {
        GenerationConfig {
            flow_path_axis: FlowAxis::Z,
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_bridges_isolated_pore() {
        let mut pores = vec![
            Pore::sphere(1, 10.0, Vec3::new(0.0, 0.0, 0.0)),
            Pore::sphere(2, 10.0, Vec3::new(0.0, 0.0, 15.0)),
            Pore::sphere(3, 10.0, Vec3::new(0.0, 0.0, 80.0)),
        ];
        let mut throats = vec![Throat::between(0, &pores[0], &pores[1], 0.4, 0.1).unwrap()];
        pores[0].connection_count = 1;
        pores[1].connection_count = 1;

        let report = enforce_flow_path(&mut pores, &mut throats, &config(), &CancellationToken::new()).unwrap();
        assert!(!report.already_connected);
        assert_eq!(report.components, 2);
        assert_eq!(report.bridges_added, 1);
        assert_eq!(throats.len(), 2);

        let bridge = &throats[1];
        assert_eq!(bridge.id, 1);
        assert_eq!((bridge.pore_id1, bridge.pore_id2), (2, 3));
        assert_eq!(pores[2].connection_count, 1);
        assert_eq!(pores[1].connection_count, 2);
    }

    #[test]
    fn test_connected_network_untouched() {
        let mut pores = vec![
            Pore::sphere(1, 10.0, Vec3::new(0.0, 0.0, 0.0)),
            Pore::sphere(2, 10.0, Vec3::new(0.0, 0.0, 15.0)),
        ];
        let mut throats = vec![Throat::between(0, &pores[0], &pores[1], 0.4, 0.1).unwrap()];
        let report = enforce_flow_path(&mut pores, &mut throats, &config(), &CancellationToken::new()).unwrap();
        assert!(report.already_connected);
        assert_eq!(throats.len(), 1);
    }

    #[test]
    fn test_capped_component_is_skipped() {
        let mut pores = vec![
            Pore::sphere(1, 1.0, Vec3::new(0.0, 0.0, 0.0)),
            Pore::sphere(2, 1.0, Vec3::new(0.0, 0.0, 50.0)),
        ];
        pores[1].connection_count = 6;
        let mut throats = Vec::new();
        let report = enforce_flow_path(&mut pores, &mut throats, &config(), &CancellationToken::new()).unwrap();
        assert_eq!(report.bridges_added, 0);
        assert_eq!(report.skipped_components, 1);
        assert!(throats.is_empty());
    }

    #[test]
    fn test_many_components_bridged_iteratively() {
        let mut pores: Vec<Pore> = (0..200)
            .map(|i| Pore::sphere(i + 1, 1.0, Vec3::new(0.0, 0.0, f64::from(i) * 10.0)))
            .collect();
        let mut throats = Vec::new();
        let report = enforce_flow_path(&mut pores, &mut throats, &config(), &CancellationToken::new()).unwrap();
        assert_eq!(report.components, 200);
        assert_eq!(report.bridges_added, 199);
        assert!(pores.iter().all(|p| p.connection_count <= 6));
    }
}
