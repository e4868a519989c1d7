// Particle decays
//
// The decay generator decays a whole batch in one call and returns a flat
// table; this module rebuilds each descendant's depth, generation and parent
// from that table, one generation at a time.

use crate::batch::ParticleBatch;
use crate::catalog::TypeCatalog;
use crate::error::{Error, Result};
use crate::id_allocator::IdAllocator;
use crate::particle::{DepthFlag, FinalKind, ParticleRecord, ProductionKind};
use crate::slant_depth::SlantDepthOracle;
use rand::Rng;
use tracing::trace;

/// Flat output of one [`DecayGenerator::decay_batch`] call.
///
/// Rows `0..n` echo the `n` parents in order and have no parent. Every later
/// row names the earlier row it came from. `is_final` is false for rows that
/// decayed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecayRecord {
    pub parent: Vec<Option<usize>>,
    pub type_code: Vec<i32>,
    pub energy: Vec<f64>,
    pub is_final: Vec<bool>,
}

impl DecayRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, parent: Option<usize>, type_code: i32, energy: f64, is_final: bool) {
        self.parent.push(parent);
        self.type_code.push(type_code);
        self.energy.push(energy);
        self.is_final.push(is_final);
    }

    pub fn len(&self) -> usize {
        self.type_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// External decay generator.
pub trait DecayGenerator {
    /// Allow or forbid decays of `type_code` inside the generator.
    fn set_may_decay(&mut self, type_code: i32, may_decay: bool);

    /// Decay every `(type_code, energy)` parent, following all decay chains.
    fn decay_batch(&mut self, parents: &[(i32, f64)]) -> DecayRecord;
}

/// Result of one [`DecayOracle::run`].
#[derive(Debug, Clone)]
pub struct DecayOutcome {
    /// Descendants the generator left undecayed; they continue propagating.
    pub decayed: ParticleBatch,
    /// Parents the generator did not decay.
    pub stable: ParticleBatch,
    /// Parents that decayed.
    pub parents: ParticleBatch,
    /// Descendants that decayed inside the generator.
    pub intermediates: ParticleBatch,
    pub decays: usize,
}

pub struct DecayOracle {
    generator: Box<dyn DecayGenerator + Send>,
    max_generations: usize,
}

impl DecayOracle {
    /// Wrap `generator` and fix its mutability table: tracked types decay only
    /// when listed in `decaying`, listed untracked types always may.
    pub fn new(
        mut generator: Box<dyn DecayGenerator + Send>,
        catalog: &TypeCatalog,
        decaying: &[i32],
        max_generations: usize,
    ) -> Self {
        for code in catalog.tracked_codes() {
            generator.set_may_decay(code, decaying.contains(&code));
        }
        for &code in decaying {
            if !catalog.is_trackable(code) {
                generator.set_may_decay(code, true);
            }
        }
        DecayOracle {
            generator,
            max_generations,
        }
    }

    pub fn max_generations(&self) -> usize {
        self.max_generations
    }

    /// Decay `parents`. Stale decay depths are sampled first; descendants get
    /// fresh ids from `ids` and their own sampled decay depth.
    pub fn run<R: Rng>(
        &mut self,
        parents: &ParticleBatch,
        slant: &SlantDepthOracle,
        ids: &IdAllocator,
        rng: &mut R,
    ) -> Result<DecayOutcome> {
        let max_capacity = parents.max_capacity();
        let empty = || ParticleBatch::with_capacity(0).with_max_capacity(max_capacity);
        let mut parents = parents.clone();
        slant.sample_decay_depths(&mut parents, rng);

        let n = parents.len();
        if n == 0 {
            return Ok(DecayOutcome {
                decayed: empty(),
                stable: empty(),
                parents: empty(),
                intermediates: empty(),
                decays: 0,
            });
        }

        let input: Vec<(i32, f64)> = parents
            .type_codes()
            .iter()
            .copied()
            .zip(parents.energies().iter().copied())
            .collect();
        let record = self.generator.decay_batch(&input);
        check_contract(&record, &parents)?;

        let rows = self.reconstruct(&record, &parents, slant, ids, rng)?;

        let mut outcome = DecayOutcome {
            decayed: empty(),
            stable: empty(),
            parents: empty(),
            intermediates: empty(),
            decays: record.is_final.iter().filter(|f| !**f).count(),
        };
        for (row, mut r) in rows.into_iter().enumerate() {
            let is_parent = row < n;
            if record.is_final[row] {
                if is_parent {
                    outcome.stable.push_record(&r)?;
                } else {
                    outcome.decayed.push_record(&r)?;
                }
            } else {
                r.depth_stop = r.depth_decay;
                r.final_kind = FinalKind::DecayedAway;
                if is_parent {
                    outcome.parents.push_record(&r)?;
                } else {
                    outcome.intermediates.push_record(&r)?;
                }
            }
        }

        if outcome.stable.len() + outcome.parents.len() != n {
            return Err(Error::ConservationViolated {
                step: "decay dispatch",
                input: n,
                output: outcome.stable.len() + outcome.parents.len(),
            });
        }
        trace!(
            parents = n,
            decays = outcome.decays,
            products = outcome.decayed.len(),
            "decay batch done"
        );
        Ok(outcome)
    }

    /// Full records for every row of `record`, walking one generation per round.
    fn reconstruct<R: Rng>(
        &self,
        record: &DecayRecord,
        parents: &ParticleBatch,
        slant: &SlantDepthOracle,
        ids: &IdAllocator,
        rng: &mut R,
    ) -> Result<Vec<ParticleRecord>> {
        let n = parents.len();
        let m = record.len();
        let mut rows: Vec<ParticleRecord> = parents.iter().collect();
        rows.reserve(m - n);
        let mut new_ids = ids.allocate(m - n)?;
        // Placeholders, filled in below in generation order
        for row in n..m {
            let mut r = ParticleRecord::primary(record.type_code[row], record.energy[row], 0.0);
            r.id = new_ids.next().ok_or(Error::IdOverflow)?;
            r.production = ProductionKind::Decay;
            rows.push(r);
        }

        // Round in which each row was placed; parents are round 0
        let mut round_of: Vec<Option<usize>> = vec![None; m];
        round_of[..n].fill(Some(0));
        let mut remaining = m - n;
        let mut round = 0;
        while remaining > 0 {
            round += 1;
            if round > self.max_generations {
                return Err(Error::DecayChainTooDeep {
                    limit: self.max_generations,
                });
            }
            let mut placed = 0;
            for row in n..m {
                if round_of[row].is_some() {
                    continue;
                }
                let Some(p) = record.parent[row] else {
                    continue;
                };
                if round_of[p] != Some(round - 1) {
                    continue;
                }
                let depth = rows[p].depth_decay.min(slant.stop_depth()).max(rows[p].depth);
                let generation = rows[p].generation + 1;
                let parent_id = rows[p].id;
                let r = &mut rows[row];
                r.depth = depth;
                r.depth_stop = depth;
                r.generation = generation;
                r.parent_id = parent_id;
                r.depth_decay = slant.decay_depth(r.type_code, r.energy, depth, rng);
                r.ready_flag = DepthFlag::Fresh;
                round_of[row] = Some(round);
                placed += 1;
            }
            if placed == 0 {
                // Unreachable after check_contract, kept as a guard against looping
                return Err(Error::GeneratorContract(
                    "decay rows without a reachable parent".to_string(),
                ));
            }
            remaining -= placed;
        }
        Ok(rows)
    }
}

fn check_contract(record: &DecayRecord, parents: &ParticleBatch) -> Result<()> {
    let m = record.len();
    let n = parents.len();
    if record.parent.len() != m || record.energy.len() != m || record.is_final.len() != m {
        return Err(Error::GeneratorContract(
            "decay record columns have different lengths".to_string(),
        ));
    }
    if m < n {
        return Err(Error::GeneratorContract(format!(
            "decay record has {m} rows for {n} parents"
        )));
    }
    for row in 0..n {
        if record.parent[row].is_some() || record.type_code[row] != parents.type_codes()[row] {
            return Err(Error::GeneratorContract(format!(
                "row {row} does not echo parent of type {}",
                parents.type_codes()[row]
            )));
        }
    }
    for row in n..m {
        match record.parent[row] {
            Some(p) if p < row => {
                if record.is_final[p] {
                    return Err(Error::GeneratorContract(format!(
                        "row {row} descends from row {p}, which did not decay"
                    )));
                }
            }
            _ => {
                return Err(Error::GeneratorContract(format!(
                    "row {row} must name an earlier row as parent"
                )));
            }
        }
    }
    Ok(())
}
