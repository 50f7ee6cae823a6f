//! Bulk porosity and directional tortuosity
//!
//! Tortuosity runs one Dijkstra per inlet pore on the rayon pool; each inlet keeps its
//! full distance map so every outlet is read from the same search.

use super::boundary::{center_extent, mean_radius, zone_boundaries};
use super::graph::ThroatGraph;
use super::model::{BoundingBox, DirectionalTortuosity};
use crate::control::CancellationToken;
use crate::core_types::{FlowAxis, Pore, Throat};
use crate::error::Result;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Bounding-box volumes at or below this (µm³) are treated as degenerate.
const DEGENERATE_VOLUME: f64 = 1e-12;

/// Paths at or beyond this multiple of the straight length are discarded.
const RUNAWAY_PATH_FACTOR: f64 = 15.0;

/// `min(1, (Σ pore volume + Σ throat volume) / bounding box volume)`.
///
/// A degenerate box falls back to a cube of side `4 · mean radius · n^(1/3)`.
pub fn porosity(pores: &[Pore], throats: &[Throat]) -> f64 {
    if pores.is_empty() {
        return 0.0;
    }
    let void: f64 = pores.iter().map(|p| p.volume).sum::<f64>() + throats.iter().map(|t| t.volume).sum::<f64>();

    let mut bulk = BoundingBox::of_pores(pores).map_or(0.0, |b| b.volume());
    if bulk <= DEGENERATE_VOLUME {
        let side = 4.0 * mean_radius(pores) * (pores.len() as f64).cbrt();
        bulk = side.powi(3);
        debug!("Degenerate bounding box, porosity uses estimated cube of side {:.3} µm", side);
    }
    if !(bulk > DEGENERATE_VOLUME) {
        return 0.0;
    }

    let phi = void / bulk;
    if phi.is_finite() {
        phi.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Upper tortuosity bound for a network with the given mean pore connectivity.
pub fn max_tortuosity(mean_connectivity: f64) -> f64 {
    if mean_connectivity >= 4.0 {
        5.0
    } else if mean_connectivity >= 3.0 {
        6.5
    } else if mean_connectivity >= 2.0 {
        8.0
    } else {
        11.0
    }
}

/// Tortuosity along X, Y and Z.
///
/// Dijkstra runs over centroid distances; throats with a dangling end are never traversed.
///
/// # Errors
/// `Cancelled` if the token fires during a shortest-path search.
pub fn directional_tortuosity(
    pores: &[Pore],
    throats: &[Throat],
    graph: &ThroatGraph,
    cancel: &CancellationToken,
) -> Result<DirectionalTortuosity> {
    // Edges weigh the centroid-to-centroid distance, which never drops below the throat length.
    let by_id: FxHashMap<u32, &Pore> = pores.iter().map(|p| (p.id, p)).collect();
    let weights: Vec<f64> = throats
        .iter()
        .map(|t| match (by_id.get(&t.pore_id1), by_id.get(&t.pore_id2)) {
            (Some(a), Some(b)) => a.distance_to(b),
            _ => f64::INFINITY,
        })
        .collect();
    directional_tortuosity_weighted(pores, &weights, graph, cancel)
}

/// Same as [`directional_tortuosity`] with precomputed per-throat edge weights (µm).
fn directional_tortuosity_weighted(
    pores: &[Pore],
    weights: &[f64],
    graph: &ThroatGraph,
    cancel: &CancellationToken,
) -> Result<DirectionalTortuosity> {
    let mean_connectivity = if pores.is_empty() {
        0.0
    } else {
        2.0 * weights.len() as f64 / pores.len() as f64
    };
    let ceiling = max_tortuosity(mean_connectivity);

    let mut values = [f64::INFINITY; 3];
    for axis in FlowAxis::ALL {
        values[axis.index()] = axis_tortuosity(pores, weights, graph, axis, ceiling, cancel)?;
        debug!("Tortuosity along {}: {}", axis, values[axis.index()]);
    }
    Ok(DirectionalTortuosity {
        x: values[0],
        y: values[1],
        z: values[2],
    })
}

fn axis_tortuosity(
    pores: &[Pore],
    weights: &[f64],
    graph: &ThroatGraph,
    axis: FlowAxis,
    ceiling: f64,
    cancel: &CancellationToken,
) -> Result<f64> {
    let Some((lo, hi)) = center_extent(pores, axis) else {
        return Ok(f64::INFINITY);
    };
    let straight = hi - lo;
    if !(straight > 0.0) {
        return Ok(f64::INFINITY);
    }
    let zones = zone_boundaries(pores, axis);
    if zones.is_incomplete() {
        return Ok(f64::INFINITY);
    }

    let per_inlet: Vec<Vec<f64>> = zones
        .inlet
        .par_iter()
        .map(|&source| {
            cancel.check()?;
            let dist = shortest_paths(graph, weights, source);
            Ok(zones
                .outlet
                .iter()
                .map(|&target| dist[target])
                .filter(|&d| d >= straight && d < RUNAWAY_PATH_FACTOR * straight)
                .collect())
        })
        .collect::<Result<_>>()?;

    let mut lengths: Vec<f64> = per_inlet.into_iter().flatten().collect();
    let Some(median) = median(&mut lengths) else {
        return Ok(f64::INFINITY);
    };
    Ok((median / straight).clamp(1.0, ceiling))
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(0.5 * (values[mid - 1] + values[mid]))
    } else {
        Some(values[mid])
    }
}

#[derive(Clone, Copy, PartialEq)]
struct State {
    cost: f64,
    node: usize,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for a min-heap
        other.cost.total_cmp(&self.cost).then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-source Dijkstra; unreachable nodes stay at `+∞`.
pub(crate) fn shortest_paths(graph: &ThroatGraph, weights: &[f64], source: usize) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; graph.len()];
    let mut heap = BinaryHeap::new();
    dist[source] = 0.0;
    heap.push(State { cost: 0.0, node: source });

    while let Some(State { cost, node }) = heap.pop() {
        if cost > dist[node] {
            continue;
        }
        for edge in graph.neighbors(node) {
            let next = cost + weights[edge.throat];
            if next < dist[edge.to] {
                dist[edge.to] = next;
                heap.push(State { cost: next, node: edge.to });
            }
        }
    }
    dist
}
