//! Network generation pipeline
//!
//! Extraction → pair ranking → throat selection → flow-path enforcement → properties.
//! Every stage runs inside the context's worker pool and polls the cancellation token.

use super::config::GenerationConfig;
use super::connectivity::{select_throats, PairTable};
use super::extractor::extract_pores;
use super::flow_path::enforce_flow_path;
use super::model::PoreNetworkModel;
use crate::control::{CancellationToken, ProgressSink, ProgressTracker};
use crate::core_types::{Pore, SeparatedVolume};
use crate::error::{PoreNetworkError, Result};
use crate::solver::{ComputeContext, ProfilerScope};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

/// Builds [`PoreNetworkModel`]s from separated volumes
pub struct NetworkGenerator<'ctx> {
    context: &'ctx ComputeContext,
    config: GenerationConfig,
}

impl<'ctx> NetworkGenerator<'ctx> {
    /// Create a generator running on `context`'s worker pool.
    ///
    /// # Errors
    /// `InvalidParameter` if `config` fails validation.
    pub fn new(context: &'ctx ComputeContext, config: GenerationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { context, config })
    }

    /// Generation parameters.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Run the full pipeline on a separated volume.
    ///
    /// Progress milestones: 0, 5, 30, 50, 70, 85, 100.
    ///
    /// # Errors
    /// `Cancelled` if the token fires; no partial model is returned.
    pub fn generate(
        &self,
        input: &SeparatedVolume,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PoreNetworkModel> {
        let tracker = ProgressTracker::new(progress);
        tracker.milestone(0);
        info!(
            "Generating pore network from {} particles ({:?} voxels, pitch {} m)",
            input.particles.len(),
            input.volume.dims(),
            self.config.pixel_size
        );
        cancel.check()?;
        tracker.milestone(5);

        let pores = {
            let _scope = ProfilerScope::new("extract_pores");
            self.context.install(|| extract_pores(input, &self.config, cancel))?
        };
        tracker.milestone(30);

        self.connect(pores, &tracker, cancel)
    }

    /// Run the pipeline from already extracted pores (throats are rebuilt).
    ///
    /// Progress milestones: 30, 50, 70, 85, 100.
    ///
    /// # Errors
    /// `InvalidModel` for repeated pore ids, `Cancelled` if the token fires.
    pub fn generate_from_pores(
        &self,
        mut pores: Vec<Pore>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PoreNetworkModel> {
        let tracker = ProgressTracker::new(progress);
        pores.sort_by_key(|p| p.id);
        if let Some(pair) = pores.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(PoreNetworkError::InvalidModel(format!("duplicate pore id {}", pair[0].id)));
        }
        for pore in &mut pores {
            pore.connection_count = 0;
        }
        tracker.milestone(30);
        self.connect(pores, &tracker, cancel)
    }

    fn connect(
        &self,
        mut pores: Vec<Pore>,
        tracker: &ProgressTracker<'_>,
        cancel: &CancellationToken,
    ) -> Result<PoreNetworkModel> {
        let config = &self.config;
        self.context.install(|| {
            let table = {
                let _scope = ProfilerScope::new("rank_pairs");
                PairTable::build(&pores, config, cancel)?
            };
            tracker.milestone(50);

            let mut throats = select_throats(&mut pores, &table, config, cancel)?;
            info!(
                "Selected {} throats among {} pores ({} candidate pairs)",
                throats.len(),
                pores.len(),
                table.entry_count() / 2
            );
            tracker.milestone(70);

            if config.enforce_flow_path {
                let _scope = ProfilerScope::new("enforce_flow_path");
                enforce_flow_path(&mut pores, &mut throats, config, cancel)?;
            }
            tracker.milestone(85);

            let model = {
                let _scope = ProfilerScope::new("network_properties");
                PoreNetworkModel::from_generated(pores, throats, config.pixel_size, cancel)?
            };
            info!(
                "Pore network ready: {} pores, {} throats, porosity {:.4}, tortuosity {:.3}",
                model.pores().len(),
                model.throats().len(),
                model.porosity(),
                model.tortuosity()
            );
            tracker.milestone(100);
            Ok(model)
        })
    }

    /// Run [`Self::generate`] on a dedicated thread.
    ///
    /// # Errors
    /// `InvalidParameter` for a bad config, `WorkerPool` if the thread cannot be spawned.
    pub fn spawn(
        context: Arc<ComputeContext>,
        config: GenerationConfig,
        input: Arc<SeparatedVolume>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<PoreNetworkModel>>> {
        config.validate()?;
        std::thread::Builder::new()
            .name("pnm-generate".into())
            .spawn(move || {
                let generator = NetworkGenerator::new(&context, config)?;
                generator.generate(&input, progress.as_ref(), &cancel)
            })
            .map_err(|e| PoreNetworkError::WorkerPool(e.to_string()))
    }
}
