//! Immutable pore network model
//!
//! The model owns pores (ascending id), throats and the derived bulk properties. Nothing
//! mutates it after construction; simulations share it through an `Arc`.

use super::graph::ThroatGraph;
use super::properties::{directional_tortuosity, porosity};
use crate::control::CancellationToken;
use crate::core_types::{FlowAxis, Pore, Throat, Vec3};
use crate::error::{require_positive, PoreNetworkError, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box spanning `center ± radius` of every pore, in µm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Lower corner
    pub min: Vec3,
    /// Upper corner
    pub max: Vec3,
}

impl BoundingBox {
    /// Box around all pore spheres, `None` for an empty list.
    pub fn of_pores(pores: &[Pore]) -> Option<Self> {
        let first = pores.first()?;
        let r = Vec3::repeat(first.radius);
        let mut bounds = Self {
            min: first.center - r,
            max: first.center + r,
        };
        for pore in &pores[1..] {
            let r = Vec3::repeat(pore.radius);
            bounds.min = bounds.min.inf(&(pore.center - r));
            bounds.max = bounds.max.sup(&(pore.center + r));
        }
        Some(bounds)
    }

    /// Edge lengths along X, Y, Z.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Box volume in µm³.
    pub fn volume(&self) -> f64 {
        let e = self.extent();
        e.x * e.y * e.z
    }

    /// Edge length along `axis` in µm.
    pub fn length_along(&self, axis: FlowAxis) -> f64 {
        axis.component(&self.extent())
    }

    /// Face area orthogonal to `axis` in µm².
    pub fn cross_section(&self, axis: FlowAxis) -> f64 {
        let e = self.extent();
        let (a, b) = axis.orthogonal();
        e[a] * e[b]
    }
}

/// Tortuosity per axis; `+∞` where no inlet-outlet path exists
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalTortuosity {
    /// Along X
    pub x: f64,
    /// Along Y
    pub y: f64,
    /// Along Z
    pub z: f64,
}

impl DirectionalTortuosity {
    /// All axes unreachable.
    pub const UNREACHABLE: Self = Self {
        x: f64::INFINITY,
        y: f64::INFINITY,
        z: f64::INFINITY,
    };

    /// Value along `axis`.
    pub fn along(&self, axis: FlowAxis) -> f64 {
        match axis {
            FlowAxis::X => self.x,
            FlowAxis::Y => self.y,
            FlowAxis::Z => self.z,
        }
    }

    /// Arithmetic mean of the finite axes, `+∞` if none is finite.
    pub fn overall(&self) -> f64 {
        let finite: Vec<f64> = [self.x, self.y, self.z].into_iter().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            f64::INFINITY
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        }
    }
}

impl fmt::Display for DirectionalTortuosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "τx={:.3} τy={:.3} τz={:.3}", self.x, self.y, self.z)
    }
}

/// Pores, throats and derived bulk properties of one sample
#[derive(Debug, Clone)]
pub struct PoreNetworkModel {
    pores: Vec<Pore>,
    throats: Vec<Throat>,
    pixel_size: f64,
    porosity: f64,
    tortuosity: DirectionalTortuosity,
    index: FxHashMap<u32, usize>,
}

impl PoreNetworkModel {
    /// Validate an externally built network and derive its properties.
    ///
    /// Pores are reordered by id and every `connection_count` is recomputed from the
    /// throat list.
    ///
    /// # Errors
    /// - `InvalidParameter` for a non-positive pixel size
    /// - `InvalidModel` for duplicate pore ids, duplicate throat ids, self loops, unordered
    ///   throat ids, repeated pore pairs, dangling pore ids or non-finite throat geometry
    pub fn new(mut pores: Vec<Pore>, throats: Vec<Throat>, pixel_size: f64) -> Result<Self> {
        require_positive("pixel_size", pixel_size)?;
        pores.sort_by_key(|p| p.id);
        if let Some(pair) = pores.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(PoreNetworkError::InvalidModel(format!("duplicate pore id {}", pair[0].id)));
        }
        let index = index_of(&pores);

        let mut throat_ids = FxHashSet::default();
        let mut pairs = FxHashSet::default();
        let mut counts = vec![0u32; pores.len()];
        for throat in &throats {
            if !throat_ids.insert(throat.id) {
                return Err(PoreNetworkError::InvalidModel(format!("duplicate throat id {}", throat.id)));
            }
            if throat.pore_id1 >= throat.pore_id2 {
                return Err(PoreNetworkError::InvalidModel(format!(
                    "throat {} must satisfy pore_id1 < pore_id2, got {} and {}",
                    throat.id, throat.pore_id1, throat.pore_id2
                )));
            }
            if !pairs.insert((throat.pore_id1, throat.pore_id2)) {
                return Err(PoreNetworkError::InvalidModel(format!(
                    "pores {} and {} are joined by more than one throat",
                    throat.pore_id1, throat.pore_id2
                )));
            }
            let (Some(&a), Some(&b)) = (index.get(&throat.pore_id1), index.get(&throat.pore_id2)) else {
                return Err(PoreNetworkError::InvalidModel(format!(
                    "throat {} references a missing pore",
                    throat.id
                )));
            };
            if !(throat.radius.is_finite() && throat.radius >= 0.0 && throat.length.is_finite() && throat.length > 0.0)
            {
                return Err(PoreNetworkError::InvalidModel(format!(
                    "throat {} has invalid geometry (radius {}, length {})",
                    throat.id, throat.radius, throat.length
                )));
            }
            counts[a] += 1;
            counts[b] += 1;
        }
        for (pore, count) in pores.iter_mut().zip(counts) {
            pore.connection_count = count;
        }

        Self::with_properties(pores, throats, pixel_size, index, &CancellationToken::new())
    }

    /// Wrap a generator output whose pores are already id-sorted with consistent counts.
    pub(crate) fn from_generated(
        pores: Vec<Pore>,
        throats: Vec<Throat>,
        pixel_size: f64,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let index = index_of(&pores);
        Self::with_properties(pores, throats, pixel_size, index, cancel)
    }

    fn with_properties(
        pores: Vec<Pore>,
        throats: Vec<Throat>,
        pixel_size: f64,
        index: FxHashMap<u32, usize>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let porosity = porosity(&pores, &throats);
        let graph = ThroatGraph::build(pores.len(), &index, &throats);
        let tortuosity = directional_tortuosity(&pores, &throats, &graph, cancel)?;
        Ok(Self {
            pores,
            throats,
            pixel_size,
            porosity,
            tortuosity,
            index,
        })
    }

    /// Pores in ascending id order.
    pub fn pores(&self) -> &[Pore] {
        &self.pores
    }

    /// Throats in creation order.
    pub fn throats(&self) -> &[Throat] {
        &self.throats
    }

    /// Voxel pitch in m/voxel.
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Bulk porosity in `[0, 1]`.
    pub fn porosity(&self) -> f64 {
        self.porosity
    }

    /// Mean of the finite directional tortuosities, `+∞` if no axis has a path.
    pub fn tortuosity(&self) -> f64 {
        self.tortuosity.overall()
    }

    /// Tortuosity per axis.
    pub fn directional_tortuosity(&self) -> DirectionalTortuosity {
        self.tortuosity
    }

    /// Pore with the given id.
    pub fn pore(&self, id: u32) -> Option<&Pore> {
        self.index.get(&id).map(|&i| &self.pores[i])
    }

    /// Dense position of pore `id` in [`Self::pores`].
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Box spanning every pore sphere.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of_pores(&self.pores)
    }

    /// Average throats per pore, `2·|T| / |P|`.
    pub fn mean_connectivity(&self) -> f64 {
        if self.pores.is_empty() {
            0.0
        } else {
            2.0 * self.throats.len() as f64 / self.pores.len() as f64
        }
    }

    /// Adjacency over dense pore indices.
    pub fn graph(&self) -> ThroatGraph {
        ThroatGraph::build(self.pores.len(), &self.index, &self.throats)
    }

    /// Whether the model has no pores.
    pub fn is_empty(&self) -> bool {
        self.pores.is_empty()
    }
}

fn index_of(pores: &[Pore]) -> FxHashMap<u32, usize> {
    pores.iter().enumerate().map(|(i, p)| (p.id, i)).collect()
}
