//! Candidate pore pairs and throat selection
//!
//! Pairs farther apart than the maximum throat length can never connect, so the pair
//! table only holds pairs found through the spatial hash. Rows are ranked in parallel;
//! acceptance is sequential because degree caps update as throats are accepted.

use super::config::GenerationConfig;
use super::spatial::SpatialIndex;
use crate::control::CancellationToken;
use crate::core_types::{Pore, Throat};
use crate::error::Result;
use rayon::prelude::*;
use tracing::debug;

/// One neighbour of a pore within the maximum throat length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEntry {
    /// Dense index of the neighbour
    pub neighbor: usize,
    /// Centroid distance in µm
    pub distance: f64,
    /// Whether the pair passes the overlap criterion
    pub connectible: bool,
}

/// Symmetric neighbour table over dense pore indices
///
/// Each row is ordered by (distance, neighbour index). Pores are id-sorted, so the
/// neighbour index order equals the neighbour id order.
#[derive(Debug, Clone, Default)]
pub struct PairTable {
    rows: Vec<Vec<PairEntry>>,
    max_length: f64,
}

impl PairTable {
    /// Rank every pair within `mean radius · max_throat_length_factor`.
    ///
    /// # Errors
    /// `Cancelled` if the token fires while rows are built.
    pub fn build(pores: &[Pore], config: &GenerationConfig, cancel: &CancellationToken) -> Result<Self> {
        let max_length = max_throat_length(pores, config);
        let Some(index) = SpatialIndex::build(pores.iter().map(|p| p.center), max_length) else {
            debug!("Maximum throat length {} µm admits no pairs", max_length);
            return Ok(Self {
                rows: vec![Vec::new(); pores.len()],
                max_length,
            });
        };
        debug!(
            "Pair search: max length {:.3} µm, {} occupied cells",
            max_length,
            index.occupied_cells()
        );

        let rows = (0..pores.len())
            .into_par_iter()
            .map(|i| {
                cancel.check()?;
                let pore = &pores[i];
                let mut row: Vec<PairEntry> = index
                    .query_neighborhood(&pore.center)
                    .into_iter()
                    .filter(|&j| j != i)
                    .filter_map(|j| {
                        let distance = pore.distance_to(&pores[j]);
                        (distance <= max_length).then(|| PairEntry {
                            neighbor: j,
                            distance,
                            connectible: is_connectible(pore, &pores[j], distance, config.min_overlap_factor),
                        })
                    })
                    .collect();
                row.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.neighbor.cmp(&b.neighbor)));
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rows, max_length })
    }

    /// Ranked neighbours of pore `i`.
    pub fn row(&self, i: usize) -> &[PairEntry] {
        &self.rows[i]
    }

    /// Distance threshold the table was built with (µm).
    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    /// Number of stored (directed) entries.
    pub fn entry_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// `mean radius · max_throat_length_factor`.
pub fn max_throat_length(pores: &[Pore], config: &GenerationConfig) -> f64 {
    super::boundary::mean_radius(pores) * config.max_throat_length_factor
}

/// Overlap criterion: `max(0, r1 + r2 − d) / min(r1, r2) ≥ min_overlap`.
///
/// Pores with a non-positive radius have no overlap.
pub fn is_connectible(a: &Pore, b: &Pore, distance: f64, min_overlap: f64) -> bool {
    let smaller = a.radius.min(b.radius);
    let overlap = if smaller > 0.0 {
        (a.radius + b.radius - distance).max(0.0) / smaller
    } else {
        0.0
    };
    overlap >= min_overlap
}

/// Accept throats in ascending pore order, honouring the degree cap.
///
/// For each pore, the first `max_connections` connectible neighbours are considered; a
/// throat is emitted for the lower-indexed end only, and only while both ends are below
/// the cap. Updates `connection_count` on both ends.
pub fn select_throats(
    pores: &mut [Pore],
    table: &PairTable,
    config: &GenerationConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Throat>> {
    let cap = config.max_connections;
    let mut degree = vec![0usize; pores.len()];
    let mut throats = Vec::new();

    for i in 0..pores.len() {
        cancel.check()?;
        let candidates = table.row(i).iter().filter(|e| e.connectible).take(cap);
        for entry in candidates {
            let j = entry.neighbor;
            if i >= j || degree[i] >= cap || degree[j] >= cap {
                continue;
            }
            let Some(throat) = Throat::between(
                throats.len() as u32,
                &pores[i],
                &pores[j],
                config.throat_radius_factor,
                config.min_throat_length,
            ) else {
                continue;
            };
            degree[i] += 1;
            degree[j] += 1;
            throats.push(throat);
        }
    }

    for (pore, d) in pores.iter_mut().zip(degree) {
        pore.connection_count = d as u32;
    }
    Ok(throats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;

    fn all_pairs(pores: &[Pore], config: &GenerationConfig) -> Vec<(usize, usize)> {
        let max_length = max_throat_length(pores, config);
        let mut pairs = Vec::new();
        for i in 0..pores.len() {
            for j in i + 1..pores.len() {
                let d = pores[i].distance_to(&pores[j]);
                if d <= max_length && is_connectible(&pores[i], &pores[j], d, config.min_overlap_factor) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn lattice() -> Vec<Pore> {
        let mut pores = Vec::new();
        let mut id = 1;
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    let jitter = f64::from((id * 7) % 5) * 0.3;
                    let center = Vec3::new(f64::from(x) * 9.0 + jitter, f64::from(y) * 9.0, f64::from(z) * 9.0);
                    pores.push(Pore::sphere(id, 5.0 + jitter, center));
                    id += 1;
                }
            }
        }
        pores
    }

    #[test]
    fn test_overlap_criterion() {
        let a = Pore::sphere(1, 10.0, Vec3::zeros());
        let b = Pore::sphere(2, 10.0, Vec3::new(15.0, 0.0, 0.0));
        // overlap 5 / 10 = 0.5
        assert!(is_connectible(&a, &b, 15.0, 0.5));
        assert!(!is_connectible(&a, &b, 15.0, 0.51));
        assert!(!is_connectible(&a, &b, 25.0, 0.1));
        assert!(is_connectible(&a, &b, 25.0, 0.0));

        let point = Pore::sphere(3, 0.0, Vec3::zeros());
        assert!(!is_connectible(&a, &point, 0.0, 0.1));
    }

    #[test]
    fn test_table_matches_all_pairs_scan() {
        let pores = lattice();
        let config = GenerationConfig::default();
        let table = PairTable::build(&pores, &config, &CancellationToken::new()).unwrap();

        let mut from_table: Vec<(usize, usize)> = (0..pores.len())
            .flat_map(|i| {
                table
                    .row(i)
                    .iter()
                    .filter(move |e| e.connectible && e.neighbor > i)
                    .map(move |e| (i, e.neighbor))
            })
            .collect();
        from_table.sort_unstable();
        assert_eq!(from_table, all_pairs(&pores, &config));

        for i in 0..pores.len() {
            let row = table.row(i);
            assert!(row.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[test]
    fn test_selection_respects_cap_and_order() {
        let mut pores = lattice();
        let config = GenerationConfig {
            max_connections: 3,
            ..GenerationConfig::default()
        };
        let table = PairTable::build(&pores, &config, &CancellationToken::new()).unwrap();
        let throats = select_throats(&mut pores, &table, &config, &CancellationToken::new()).unwrap();

        assert!(!throats.is_empty());
        assert!(pores.iter().all(|p| p.connection_count <= 3));
        let total: u32 = pores.iter().map(|p| p.connection_count).sum();
        assert_eq!(total as usize, 2 * throats.len());
        for (k, t) in throats.iter().enumerate() {
            assert_eq!(t.id as usize, k);
            assert!(t.pore_id1 < t.pore_id2);
        }
    }

    #[test]
    fn test_zero_length_factor_yields_no_throats() {
        let mut pores = lattice();
        let config = GenerationConfig {
            max_throat_length_factor: 0.0,
            ..GenerationConfig::default()
        };
        let table = PairTable::build(&pores, &config, &CancellationToken::new()).unwrap();
        assert_eq!(table.entry_count(), 0);
        let throats = select_throats(&mut pores, &table, &config, &CancellationToken::new()).unwrap();
        assert!(throats.is_empty());
    }
}
