// Shared mock generators for the integration tests
#![allow(dead_code)]

use aircascade::{
    CascadeEngine, DecayGenerator, DecayRecord, EngineConfig, HadronicGenerator, RejectionReason,
    TabulatedCrossSections, Target, TypeCatalog,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Splits the projectile into two copies of itself with half the energy each.
pub struct SplitInTwo;

impl HadronicGenerator for SplitInTwo {
    fn interact(
        &mut self,
        type_code: i32,
        energy: f64,
        _target: &Target,
    ) -> Result<Vec<(i32, f64)>, RejectionReason> {
        Ok(vec![(type_code, energy / 2.0), (type_code, energy / 2.0)])
    }
}

/// Keeps a leading particle with half the energy and adds three pions.
/// Conserves energy exactly.
pub struct LeadingParticle;

impl HadronicGenerator for LeadingParticle {
    fn interact(
        &mut self,
        type_code: i32,
        energy: f64,
        _target: &Target,
    ) -> Result<Vec<(i32, f64)>, RejectionReason> {
        if energy < 2.0 {
            return Err(RejectionReason::BelowMinimumEnergy);
        }
        Ok(vec![
            (type_code, 0.5 * energy),
            (211, 0.2 * energy),
            (-211, 0.2 * energy),
            (111, 0.1 * energy),
        ])
    }
}

/// Refuses every projectile.
pub struct AlwaysReject;

impl HadronicGenerator for AlwaysReject {
    fn interact(
        &mut self,
        _type_code: i32,
        _energy: f64,
        _target: &Target,
    ) -> Result<Vec<(i32, f64)>, RejectionReason> {
        Err(RejectionReason::UnsupportedProjectile)
    }
}

/// Emits half the energy as a photon and a 50 GeV pion. Ignores
/// conservation, which the engine does not check.
pub struct PhotonAndPion;

impl HadronicGenerator for PhotonAndPion {
    fn interact(
        &mut self,
        _type_code: i32,
        energy: f64,
        _target: &Target,
    ) -> Result<Vec<(i32, f64)>, RejectionReason> {
        Ok(vec![(22, energy / 2.0), (211, 50.0)])
    }
}

/// Counts calls made to the wrapped generator.
pub struct Counting<G> {
    pub inner: G,
    pub calls: Arc<AtomicUsize>,
}

impl<G> Counting<G> {
    pub fn new(inner: G) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Counting {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl<G: HadronicGenerator> HadronicGenerator for Counting<G> {
    fn interact(
        &mut self,
        type_code: i32,
        energy: f64,
        target: &Target,
    ) -> Result<Vec<(i32, f64)>, RejectionReason> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.interact(type_code, energy, target)
    }
}

/// Two-body and three-body decays of the common light particles. Energy is
/// shared by fixed fractions, so every decay conserves energy exactly.
/// Types never configured through `set_may_decay` are allowed to decay.
#[derive(Default)]
pub struct ScriptedDecay {
    may_decay: HashMap<i32, bool>,
}

impl ScriptedDecay {
    fn products(code: i32) -> Option<Vec<(i32, f64)>> {
        let s = code.signum();
        let products = match code.abs() {
            211 => vec![(-13 * s, 0.79), (14 * s, 0.21)],
            321 => vec![(-13 * s, 0.5), (14 * s, 0.5)],
            13 => vec![(11 * s, 0.4), (-12 * s, 0.3), (14 * s, 0.3)],
            130 | 310 => vec![(211, 0.5), (-211, 0.5)],
            111 | 221 => vec![(22, 0.5), (22, 0.5)],
            _ => return None,
        };
        Some(products)
    }

    fn decays(&self, code: i32) -> bool {
        Self::products(code).is_some() && self.may_decay.get(&code).copied().unwrap_or(true)
    }
}

impl DecayGenerator for ScriptedDecay {
    fn set_may_decay(&mut self, type_code: i32, may_decay: bool) {
        self.may_decay.insert(type_code, may_decay);
    }

    fn decay_batch(&mut self, parents: &[(i32, f64)]) -> DecayRecord {
        let mut rec = DecayRecord::new();
        for &(code, energy) in parents {
            rec.push(None, code, energy, !self.decays(code));
        }
        let mut row = 0;
        while row < rec.len() {
            if !rec.is_final[row] {
                let (code, energy) = (rec.type_code[row], rec.energy[row]);
                for (child, fraction) in Self::products(code).unwrap_or_default() {
                    rec.push(Some(row), child, fraction * energy, !self.decays(child));
                }
            }
            row += 1;
        }
        rec
    }
}

/// Never decays anything.
pub struct NoDecay;

impl DecayGenerator for NoDecay {
    fn set_may_decay(&mut self, _type_code: i32, _may_decay: bool) {}

    fn decay_batch(&mut self, parents: &[(i32, f64)]) -> DecayRecord {
        let mut rec = DecayRecord::new();
        for &(code, energy) in parents {
            rec.push(None, code, energy, true);
        }
        rec
    }
}

/// Returns an empty record, which breaks the echo-the-parents contract.
pub struct EmptyDecay;

impl DecayGenerator for EmptyDecay {
    fn set_may_decay(&mut self, _type_code: i32, _may_decay: bool) {}

    fn decay_batch(&mut self, _parents: &[(i32, f64)]) -> DecayRecord {
        DecayRecord::new()
    }
}

/// Protons and neutrons with a constant, very short interaction length.
pub fn short_nucleon_lengths(lambda: f64) -> TabulatedCrossSections {
    let mut columns = HashMap::new();
    for code in [2212, -2212, 2112, -2112] {
        columns.insert(code, vec![lambda, lambda]);
    }
    TabulatedCrossSections::new(vec![1.0e-3, 1.0e12], columns).unwrap()
}

pub fn seeded_config(seed: u64) -> EngineConfig {
    EngineConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

/// Engine with the default catalog and air cross sections.
pub fn engine<H, D>(config: EngineConfig, hadronic: H, decay: D) -> CascadeEngine
where
    H: HadronicGenerator + Send + 'static,
    D: DecayGenerator + Send + 'static,
{
    CascadeEngine::new(
        config,
        TypeCatalog::air_shower_default(),
        Box::new(hadronic),
        Box::new(decay),
    )
    .unwrap()
}

/// A realistic toy cascade: leading-particle interactions and scripted decays.
pub fn toy_engine(seed: u64) -> CascadeEngine {
    engine(seeded_config(seed), LeadingParticle, ScriptedDecay::default())
}

pub fn relative_difference(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(b.abs())
}
