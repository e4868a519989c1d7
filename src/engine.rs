// Cascade propagation loop
//
// One cycle takes the working batch, gives every row a Fate and moves it to
// the matching collection. Interactions refill the working batch; decays run
// only once it is empty. Rows that must decay before being reported are
// decayed after the loop has drained.

use crate::batch::{Field, ParticleBatch, PushFields};
use crate::catalog::{Category, TypeCatalog};
use crate::config::{EngineConfig, MixingTieBreak};
use crate::cross_section::{CrossSectionTable, TabulatedCrossSections};
use crate::decay::{DecayGenerator, DecayOracle};
use crate::error::{Error, Result};
use crate::id_allocator::IdAllocator;
use crate::interaction::{HadronicGenerator, InteractionOracle};
use crate::particle::{DepthFlag, FinalKind, ProductionKind};
use crate::slant_depth::{SlantDepthOracle, SlantDepthTable};
use crate::stats::RunStats;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// What happens to a particle next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Interact,
    Decay,
    /// Stops propagating but must decay before it is reported.
    ForcedDecay(FinalKind),
    Final(FinalKind),
}

/// Rows of one batch grouped by [`Fate`].
#[derive(Debug)]
struct FateSplit {
    interact: ParticleBatch,
    decay: ParticleBatch,
    forced: ParticleBatch,
    finals: ParticleBatch,
}

/// Copy every row of `batch` into the group named by its fate. Final and
/// forced rows get their `final_kind` from the fate.
fn split_by_fate(batch: &ParticleBatch, fates: &[Fate], step: &'static str) -> Result<FateSplit> {
    if fates.len() != batch.len() {
        return Err(Error::ConservationViolated {
            step,
            input: batch.len(),
            output: fates.len(),
        });
    }
    let mut interact = Vec::new();
    let mut decay = Vec::new();
    let mut forced = Vec::new();
    let mut forced_kinds = Vec::new();
    let mut finals = Vec::new();
    let mut final_kinds = Vec::new();
    for (i, fate) in fates.iter().enumerate() {
        match *fate {
            Fate::Interact => interact.push(i),
            Fate::Decay => decay.push(i),
            Fate::ForcedDecay(kind) => {
                forced.push(i);
                forced_kinds.push(kind);
            }
            Fate::Final(kind) => {
                finals.push(i);
                final_kinds.push(kind);
            }
        }
    }

    let mut split = FateSplit {
        interact: batch.select(&interact),
        decay: batch.select(&decay),
        forced: batch.select(&forced),
        finals: batch.select(&finals),
    };
    split.forced.final_kinds_mut().copy_from_slice(&forced_kinds);
    split.finals.final_kinds_mut().copy_from_slice(&final_kinds);

    let output =
        split.interact.len() + split.decay.len() + split.forced.len() + split.finals.len();
    if output != batch.len() {
        return Err(Error::ConservationViolated {
            step,
            input: batch.len(),
            output,
        });
    }
    trace!(
        step,
        input = batch.len(),
        interact = split.interact.len(),
        decay = split.decay.len(),
        forced = split.forced.len(),
        finals = split.finals.len(),
        "split"
    );
    Ok(split)
}

/// Collection lengths and statistics at the start of a run.
struct RunMarks {
    final_particles: usize,
    archival: usize,
    generated: usize,
    stats: RunStats,
}

/// Propagates one primary at a time through the atmosphere.
///
/// The engine owns its collaborators and all particle collections. Nothing is
/// shared with other engines except, optionally, the id allocator.
pub struct CascadeEngine {
    config: EngineConfig,
    catalog: TypeCatalog,
    slant: SlantDepthOracle,
    interactions: InteractionOracle,
    decays: DecayOracle,
    ids: Arc<IdAllocator>,
    rng: StdRng,

    working: ParticleBatch,
    decay_queue: ParticleBatch,
    forced: ParticleBatch,
    final_particles: ParticleBatch,
    archival: ParticleBatch,
    generated: ParticleBatch,

    threshold: f64,
    stats: RunStats,
}

impl CascadeEngine {
    /// Build an engine using the built-in air cross-section table.
    pub fn new(
        config: EngineConfig,
        catalog: TypeCatalog,
        hadronic: Box<dyn HadronicGenerator + Send>,
        decay: Box<dyn DecayGenerator + Send>,
    ) -> Result<Self> {
        Self::with_cross_sections(
            config,
            catalog,
            hadronic,
            decay,
            Box::new(TabulatedCrossSections::air_default()),
        )
    }

    /// Build an engine with a caller-supplied cross-section table.
    pub fn with_cross_sections(
        config: EngineConfig,
        catalog: TypeCatalog,
        hadronic: Box<dyn HadronicGenerator + Send>,
        decay: Box<dyn DecayGenerator + Send>,
        cross_sections: Box<dyn CrossSectionTable + Send>,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = catalog.with_forced_decay_policy(config.forced_decay);
        let table = SlantDepthTable::new(&config.atmosphere, config.zenith_deg, config.table_points)?;
        let slant = SlantDepthOracle::new(table, cross_sections);
        if config.initial_depth > slant.max_depth() {
            return Err(Error::InvalidParam(format!(
                "initial_depth {} is below ground ({} g/cm²)",
                config.initial_depth,
                slant.max_depth()
            )));
        }
        let interactions = InteractionOracle::new(hadronic, config.target.clone());
        let decays = DecayOracle::new(
            decay,
            &catalog,
            &config.generator_decaying,
            config.max_decay_generations,
        );
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let batch = || ParticleBatch::new().with_max_capacity(config.max_batch_capacity);

        Ok(CascadeEngine {
            working: batch(),
            decay_queue: batch(),
            forced: batch(),
            final_particles: batch(),
            archival: batch(),
            generated: batch(),
            catalog,
            slant,
            interactions,
            decays,
            ids: Arc::new(IdAllocator::new()),
            rng,
            threshold: 0.0,
            stats: RunStats::default(),
            config,
        })
    }

    /// Draw ids from `ids` instead of a private allocator.
    pub fn with_id_allocator(mut self, ids: Arc<IdAllocator>) -> Self {
        self.ids = ids;
        self
    }

    /// Propagate one primary until every particle is final or archived.
    ///
    /// `threshold_energy` is in GeV, `stop_height` in cm above ground.
    pub fn run(
        &mut self,
        primary_type: i32,
        primary_energy: f64,
        threshold_energy: f64,
        stop_height: f64,
    ) -> Result<()> {
        if !(primary_energy.is_finite() && primary_energy > 0.0) {
            return Err(Error::InvalidParam(format!(
                "primary energy must be positive and finite, got {primary_energy}"
            )));
        }
        if !(threshold_energy.is_finite() && threshold_energy >= 0.0) {
            return Err(Error::InvalidParam(format!(
                "threshold energy must be non-negative and finite, got {threshold_energy}"
            )));
        }
        if !(stop_height.is_finite() && stop_height >= 0.0) {
            return Err(Error::InvalidParam(format!(
                "stop height must be non-negative and finite, got {stop_height}"
            )));
        }
        let stop_depth = self.slant.height_to_depth(stop_height);
        if self.config.initial_depth > stop_depth {
            return Err(Error::InvalidParam(format!(
                "initial depth {} lies beyond the stop depth {stop_depth}",
                self.config.initial_depth
            )));
        }
        self.slant.set_stop_depth(stop_depth)?;
        self.threshold = threshold_energy;

        if !self.config.accumulate_runs {
            self.final_particles.clear();
            self.archival.clear();
            self.generated.clear();
            self.stats.clear();
        }
        self.working.clear();
        self.decay_queue.clear();
        self.forced.clear();

        info!(
            primary_type,
            primary_energy, threshold_energy, stop_depth, "cascade run started"
        );
        let marks = RunMarks {
            final_particles: self.final_particles.len(),
            archival: self.archival.len(),
            generated: self.generated.len(),
            stats: self.stats,
        };
        let start = Instant::now();

        let cycles = match self.propagate(primary_type, primary_energy) {
            Ok(cycles) => cycles,
            Err(err) => {
                self.roll_back(&marks);
                warn!(error = %err, primary_type, primary_energy, "cascade run abandoned");
                return Err(err);
            }
        };

        let elapsed = start.elapsed();
        self.stats.elapsed += elapsed;
        self.stats.runs += 1;
        info!(
            cycles,
            final_particles = self.final_particles.len(),
            interactions = self.stats.interactions,
            decays = self.stats.decays,
            rejections = self.stats.rejections,
            elapsed_ms = elapsed.as_secs_f64() * 1e3,
            "cascade run finished"
        );
        Ok(())
    }

    /// Push the primary and cycle until every particle is final or archived.
    /// Returns the number of cycles.
    fn propagate(&mut self, primary_type: i32, primary_energy: f64) -> Result<usize> {
        self.working.push(PushFields {
            type_code: Field::Scalar(primary_type),
            energy: Field::Scalar(primary_energy),
            depth: Field::Scalar(self.config.initial_depth),
            generation: Field::Scalar(0),
            parent_id: Field::Scalar(0),
            production: Field::Scalar(ProductionKind::Primary),
        })?;
        self.working.assign_ids(&self.ids)?;
        self.generated.append(&self.working)?;

        let mut cycle = 0usize;
        while !self.working.is_empty() {
            cycle += 1;
            debug!(
                cycle,
                working = self.working.len(),
                decay_queue = self.decay_queue.len(),
                "propagation cycle"
            );
            let interacting = self.classify_working()?;
            self.dispatch_interactions(&interacting)?;
            if self.working.is_empty() {
                self.dispatch_decays()?;
            }
        }
        self.run_forced_decays()?;
        self.check_unique_ids()?;
        Ok(cycle)
    }

    /// Drop everything a failed run added. Issued ids are not returned.
    fn roll_back(&mut self, marks: &RunMarks) {
        self.working.clear();
        self.decay_queue.clear();
        self.forced.clear();
        self.final_particles.truncate(marks.final_particles);
        self.archival.truncate(marks.archival);
        self.generated.truncate(marks.generated);
        self.stats = marks.stats;
    }

    /// Fate decided without sampling depths, or `None` for rows that compete
    /// interaction against decay.
    fn fate_before_depths(&self, code: i32, energy: f64) -> Option<Fate> {
        match self.catalog.category(code) {
            Category::Final => Some(Fate::Final(FinalKind::None)),
            _ if energy <= self.threshold => {
                if self.catalog.must_decay_before_reporting(code) {
                    Some(Fate::ForcedDecay(FinalKind::BelowThreshold))
                } else {
                    Some(Fate::Final(FinalKind::BelowThreshold))
                }
            }
            Category::InteractionOnly => None,
            Category::Mixed { crossover } => {
                let interacts = energy > crossover
                    || (energy == crossover
                        && self.config.mixing_tie_break == MixingTieBreak::Interact);
                if interacts {
                    None
                } else {
                    Some(Fate::Decay)
                }
            }
            Category::DecayOnly => Some(Fate::Decay),
        }
    }

    fn reached_ground(&self, code: i32) -> Fate {
        if self.catalog.must_decay_before_reporting(code) {
            Fate::ForcedDecay(FinalKind::ReachedGround)
        } else {
            Fate::Final(FinalKind::ReachedGround)
        }
    }

    /// Empty the working batch into the final, forced-decay and decay
    /// collections and return the rows that interact next.
    fn classify_working(&mut self) -> Result<ParticleBatch> {
        let mut settled_rows = Vec::new();
        let mut settled_fates = Vec::new();
        let mut competing_rows = Vec::new();
        for i in 0..self.working.len() {
            let code = self.working.type_codes()[i];
            let energy = self.working.energies()[i];
            match self.fate_before_depths(code, energy) {
                Some(fate) => {
                    settled_rows.push(i);
                    settled_fates.push(fate);
                }
                None => competing_rows.push(i),
            }
        }

        let settled = self.working.select(&settled_rows);
        let mut competing = self.working.select(&competing_rows);
        if settled.len() + competing.len() != self.working.len() {
            return Err(Error::ConservationViolated {
                step: "energy classification",
                input: self.working.len(),
                output: settled.len() + competing.len(),
            });
        }

        self.slant.sample_depths(&mut competing, &mut self.rng);
        let stop = self.slant.stop_depth();
        let mut competing_fates = Vec::with_capacity(competing.len());
        for i in 0..competing.len() {
            let x_inter = competing.depth_inters()[i];
            let x_decay = competing.depth_decays()[i];
            let (fate, depth_stop) = if x_inter >= stop && x_decay >= stop {
                (self.reached_ground(competing.type_codes()[i]), stop)
            } else if x_inter < x_decay {
                (Fate::Interact, x_inter)
            } else {
                (Fate::Decay, x_decay)
            };
            competing.depth_stops_mut()[i] = depth_stop;
            competing_fates.push(fate);
        }

        let by_energy = split_by_fate(&settled, &settled_fates, "energy classification")?;
        let by_depth = split_by_fate(&competing, &competing_fates, "depth competition")?;
        self.working.clear();

        for split in [&by_energy, &by_depth] {
            self.final_particles.append(&split.finals)?;
            self.forced.append(&split.forced)?;
            self.decay_queue.append(&split.decay)?;
        }
        let mut interacting = by_depth.interact;
        interacting.append(&by_energy.interact)?;
        Ok(interacting)
    }

    fn dispatch_interactions(&mut self, interacting: &ParticleBatch) -> Result<()> {
        if interacting.is_empty() {
            return Ok(());
        }
        let outcome = self.interactions.run(interacting)?;
        self.stats.interactions += outcome.interactions;
        self.stats.rejections += outcome.rejected.len();

        let mut accepted = outcome.accepted;
        accepted.set_final_kind(FinalKind::Interacted);
        self.archival.append(&accepted)?;

        self.archival.append(&outcome.rejected)?;
        self.decay_queue.append(&outcome.rejected)?;

        let mut children = outcome.children;
        children.assign_ids(&self.ids)?;
        self.generated.append(&children)?;
        self.working.append(&children)?;

        debug!(
            parents = interacting.len(),
            interactions = outcome.interactions,
            rejected = outcome.rejected.len(),
            children = children.len(),
            "interactions dispatched"
        );
        Ok(())
    }

    fn dispatch_decays(&mut self) -> Result<()> {
        if self.decay_queue.is_empty() {
            return Ok(());
        }
        let mut queue = self.decay_queue.clone();
        self.decay_queue.clear();
        self.slant.sample_decay_depths(&mut queue, &mut self.rng);

        let stop = self.slant.stop_depth();
        let mut fates = Vec::with_capacity(queue.len());
        for i in 0..queue.len() {
            if queue.depth_decays()[i] >= stop {
                queue.depth_stops_mut()[i] = stop;
                fates.push(self.reached_ground(queue.type_codes()[i]));
            } else {
                queue.depth_stops_mut()[i] = queue.depth_decays()[i];
                fates.push(Fate::Decay);
            }
        }
        let split = split_by_fate(&queue, &fates, "decay depth")?;
        self.final_particles.append(&split.finals)?;
        self.forced.append(&split.forced)?;

        let outcome = self
            .decays
            .run(&split.decay, &self.slant, &self.ids, &mut self.rng)?;
        self.stats.decays += outcome.decays;

        self.archival.append(&outcome.parents)?;
        self.archival.append(&outcome.intermediates)?;
        self.generated.append(&outcome.intermediates)?;
        self.generated.append(&outcome.decayed)?;

        let mut stable = outcome.stable;
        stable.set_depth_stop(stop);
        stable.set_final_kind(FinalKind::ReachedGround);
        self.final_particles.append(&stable)?;

        self.working.append(&outcome.decayed)?;

        debug!(
            queued = queue.len(),
            at_ground = split.finals.len() + split.forced.len(),
            decays = outcome.decays,
            products = outcome.decayed.len(),
            stable = stable.len(),
            "decays dispatched"
        );
        Ok(())
    }

    /// Decay everything queued as must-decay, where it stopped, until no
    /// product needs decaying any more.
    fn run_forced_decays(&mut self) -> Result<()> {
        let stop = self.slant.stop_depth();
        let mut rounds = 0usize;
        while !self.forced.is_empty() {
            rounds += 1;
            if rounds > self.config.max_decay_generations {
                return Err(Error::DecayChainTooDeep {
                    limit: self.config.max_decay_generations,
                });
            }
            let mut batch = self.forced.clone();
            self.forced.clear();
            for i in 0..batch.len() {
                let at = batch.depths()[i].max(batch.depth_stops()[i]);
                batch.depth_decays_mut()[i] = at;
                batch.ready_flags_mut()[i] = DepthFlag::Fresh;
            }

            let outcome = self
                .decays
                .run(&batch, &self.slant, &self.ids, &mut self.rng)?;
            self.stats.decays += outcome.decays;

            self.archival.append(&outcome.parents)?;
            self.archival.append(&outcome.intermediates)?;
            self.generated.append(&outcome.intermediates)?;
            self.generated.append(&outcome.decayed)?;
            // Generator refused to decay these; report them as they are
            self.final_particles.append(&outcome.stable)?;

            let products = &outcome.decayed;
            let fates: Vec<Fate> = (0..products.len())
                .map(|i| {
                    let kind = if products.depths()[i] >= stop {
                        FinalKind::ReachedGround
                    } else {
                        FinalKind::BelowThreshold
                    };
                    if self.catalog.must_decay_before_reporting(products.type_codes()[i]) {
                        Fate::ForcedDecay(kind)
                    } else {
                        Fate::Final(kind)
                    }
                })
                .collect();
            let split = split_by_fate(products, &fates, "forced decay products")?;
            self.final_particles.append(&split.finals)?;
            self.forced.append(&split.forced)?;

            debug!(
                round = rounds,
                parents = batch.len(),
                decays = outcome.decays,
                requeued = split.forced.len(),
                "forced decays"
            );
        }
        Ok(())
    }

    /// Forget accumulated particles and statistics. Restarts ids at 1 when
    /// `reset_ids` is configured.
    pub fn reset(&mut self) {
        self.working.clear();
        self.decay_queue.clear();
        self.forced.clear();
        self.final_particles.clear();
        self.archival.clear();
        self.generated.clear();
        self.stats.clear();
        if self.config.reset_ids {
            self.ids.reset();
        }
    }

    /// Fail on the first id that appears twice among the final or the
    /// generated particles.
    ///
    /// Archival may hold a parent twice: once when the hadronic generator
    /// rejected it and once when it later decayed.
    pub fn check_unique_ids(&self) -> Result<()> {
        for batch in [&self.final_particles, &self.generated] {
            let mut seen = HashSet::with_capacity(batch.len());
            for &id in batch.ids() {
                if !seen.insert(id) {
                    return Err(Error::DuplicateId(id));
                }
            }
        }
        Ok(())
    }

    /// Particles that finished propagating, in the order they finished.
    pub fn final_particles(&self) -> &ParticleBatch {
        &self.final_particles
    }

    /// Parents consumed by interactions or decays, plus rejected parents.
    pub fn archival_particles(&self) -> &ParticleBatch {
        &self.archival
    }

    /// Every particle created, including the primary.
    pub fn generated_particles(&self) -> &ParticleBatch {
        &self.generated
    }

    /// Counters for the runs kept in the collections.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Type catalog with the configured forced-decay policy applied.
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Allocator the engine draws ids from.
    pub fn id_allocator(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    /// Stop depth of the current (or last) run.
    pub fn stop_depth(&self) -> f64 {
        self.slant.stop_depth()
    }

    /// Ground depth of the slant geometry.
    pub fn max_depth(&self) -> f64 {
        self.slant.max_depth()
    }

    /// Slant depth at `height` cm above ground.
    pub fn height_to_depth(&self, height: f64) -> f64 {
        self.slant.height_to_depth(height)
    }
}
