// Per-particle record types shared by the batch store and the oracles

/// How a particle came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductionKind {
    #[default]
    Primary,
    Interaction,
    Decay,
}

/// Why a particle stopped being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalKind {
    #[default]
    None,
    ReachedGround,
    BelowThreshold,
    RejectedByGenerator,
    DecayedAway,
    Interacted,
}

/// Whether `depth_decay` still has to be sampled for the record's current depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthFlag {
    #[default]
    Stale,
    Fresh,
}

/// Reason code recorded on a parent the hadronic generator refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The generator does not accept this projectile type.
    UnsupportedProjectile,
    /// Centre-of-mass energy below the generator's operating minimum.
    BelowMinimumEnergy,
    /// Any other failure inside the generator.
    GeneratorFailure,
}

/// One particle, as a row copied out of a [`crate::ParticleBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleRecord {
    pub id: i64,
    pub parent_id: i64,
    pub type_code: i32,
    /// Total energy in GeV.
    pub energy: f64,
    /// Slant depth (g/cm²) where the particle was produced.
    pub depth: f64,
    pub depth_stop: f64,
    pub depth_decay: f64,
    pub depth_inter: f64,
    pub generation: i32,
    pub production: ProductionKind,
    pub final_kind: FinalKind,
    pub ready_flag: DepthFlag,
    pub rejection: Option<RejectionReason>,
}

impl ParticleRecord {
    /// A fresh primary at `depth` with no id assigned yet.
    pub fn primary(type_code: i32, energy: f64, depth: f64) -> Self {
        Self {
            id: 0,
            parent_id: 0,
            type_code,
            energy,
            depth,
            depth_stop: depth,
            depth_decay: 0.0,
            depth_inter: 0.0,
            generation: 0,
            production: ProductionKind::Primary,
            final_kind: FinalKind::None,
            ready_flag: DepthFlag::Stale,
            rejection: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_construction() {
        let p = ParticleRecord::primary(2212, 1e6, 0.0);
        assert_eq!(p.type_code, 2212);
        assert_eq!(p.energy, 1e6);
        assert_eq!(p.generation, 0);
        assert_eq!(p.production, ProductionKind::Primary);
        assert_eq!(p.final_kind, FinalKind::None);
        assert_eq!(p.ready_flag, DepthFlag::Stale);
        assert!(p.rejection.is_none());
    }
}
