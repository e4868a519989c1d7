use once_cell::sync::Lazy;
use std::collections::HashMap;

// src/data.rs
// Static particle tables: masses, lifetimes, default classification of the
// tracked air-shower particles and the proxy map used for cross sections.

/// Rest mass (GeV) and mean decay length cτ (cm) of a particle type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleProperties {
    pub mass: f64,
    pub ctau: f64,
}

impl ParticleProperties {
    /// Properties used for codes missing from the table: massless and stable.
    pub const UNKNOWN: ParticleProperties = ParticleProperties {
        mass: 0.0,
        ctau: f64::INFINITY,
    };

    pub fn is_stable(&self) -> bool {
        !self.ctau.is_finite()
    }
}

/// Mass and cτ keyed by PDG code. Charge-conjugate states are included.
pub static PARTICLE_PROPERTIES: Lazy<HashMap<i32, ParticleProperties>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let mut both = |code: i32, mass: f64, ctau: f64| {
        m.insert(code, ParticleProperties { mass, ctau });
        m.insert(-code, ParticleProperties { mass, ctau });
    };

    // Leptons
    both(11, 0.51099895e-3, f64::INFINITY);
    both(12, 0.0, f64::INFINITY);
    both(13, 0.1056584, 65865.4);
    both(14, 0.0, f64::INFINITY);
    both(15, 1.77686, 0.008703);
    both(16, 0.0, f64::INFINITY);

    // Light mesons
    both(211, 0.13957039, 780.45);
    both(321, 0.493677, 371.2);

    // Charm mesons
    both(411, 1.86966, 0.03118);
    both(421, 1.86484, 0.01229);
    both(431, 1.96835, 0.0151);

    // Baryons
    both(2212, 0.93827209, f64::INFINITY);
    both(2112, 0.93956542, 2.6391e13);
    both(3122, 1.115683, 7.89);
    both(3222, 1.18937, 2.404);
    both(3112, 1.197449, 4.434);
    both(3312, 1.32171, 4.91);
    both(3322, 1.31486, 8.71);
    both(3334, 1.67245, 2.461);
    both(4122, 2.28646, 0.00606);

    // Self-conjugate neutrals
    m.insert(22, ParticleProperties { mass: 0.0, ctau: f64::INFINITY });
    m.insert(111, ParticleProperties { mass: 0.1349768, ctau: 2.55e-6 });
    m.insert(130, ParticleProperties { mass: 0.497611, ctau: 1534.0 });
    m.insert(310, ParticleProperties { mass: 0.497611, ctau: 2.6844 });
    m.insert(221, ParticleProperties { mass: 0.547862, ctau: 1.5e-8 });
    m
});

/// Look up mass and cτ; unknown codes are treated as massless and stable.
pub fn particle_properties(code: i32) -> ParticleProperties {
    PARTICLE_PROPERTIES
        .get(&code)
        .copied()
        .unwrap_or(ParticleProperties::UNKNOWN)
}

/// Types that neither interact nor decay in the default air-shower catalog.
pub const DEFAULT_FINAL_CODES: &[i32] = &[11, -11, 12, -12, 14, -14, 16, -16, 22];

/// Types that only decay.
pub const DEFAULT_DECAY_ONLY_CODES: &[i32] = &[13, -13, 111];

/// Types that only interact.
pub const DEFAULT_INTERACTION_ONLY_CODES: &[i32] = &[2212, -2212, 2112, -2112];

/// Crossover energy (GeV) of the mixed types: above it interaction dominates,
/// below it decay.
pub static DEFAULT_MIXING_ENERGIES: Lazy<HashMap<i32, f64>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let mut both = |code: i32, energy: f64| {
        m.insert(code, energy);
        m.insert(-code, energy);
    };
    both(211, 115.0);
    both(321, 850.0);
    both(411, 3.9e7);
    both(421, 9.6e7);
    both(431, 8.5e7);
    both(3122, 9.0e4);
    m.insert(130, 205.0);
    m.insert(310, 1.2e5);
    m
});

/// Types the decay generator is allowed to decay by default.
pub const DEFAULT_GENERATOR_DECAYING: &[i32] = &[
    111, 211, -211, 321, -321, 130, 310, 411, -411, 421, -421, 431, -431, 3122, -3122, 13, -13,
];

/// Untabulated heavy hadrons mapped to a tabulated type with a similar cross
/// section: B mesons to D mesons, heavy baryons to Λ.
pub static CROSS_SECTION_PROXY: Lazy<HashMap<i32, i32>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let mut both = |code: i32, proxy: i32| {
        m.insert(code, proxy);
        m.insert(-code, -proxy);
    };
    both(511, 411);
    both(521, 421);
    both(531, 431);
    both(541, 431);
    for code in [
        3112, 3222, 3312, 3322, 3334, 4122, 4132, 4232, 4332, 5122, 5132, 5232, 5332,
    ] {
        both(code, 3122);
    }
    m
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_conjugates_share_properties() {
        assert_eq!(particle_properties(211), particle_properties(-211));
        assert_eq!(particle_properties(3122), particle_properties(-3122));
    }

    #[test]
    fn test_unknown_code_is_stable_and_massless() {
        let p = particle_properties(999_999);
        assert_eq!(p.mass, 0.0);
        assert!(p.is_stable());
    }

    #[test]
    fn test_proton_and_photon_are_stable() {
        assert!(particle_properties(2212).is_stable());
        assert!(particle_properties(22).is_stable());
        assert!(!particle_properties(13).is_stable());
    }

    #[test]
    fn test_default_lists_are_disjoint() {
        for code in DEFAULT_FINAL_CODES {
            assert!(!DEFAULT_DECAY_ONLY_CODES.contains(code));
            assert!(!DEFAULT_INTERACTION_ONLY_CODES.contains(code));
            assert!(!DEFAULT_MIXING_ENERGIES.contains_key(code));
        }
        for code in DEFAULT_INTERACTION_ONLY_CODES {
            assert!(!DEFAULT_MIXING_ENERGIES.contains_key(code));
        }
    }

    #[test]
    fn test_proxy_map_is_charge_symmetric() {
        assert_eq!(CROSS_SECTION_PROXY.get(&-511), Some(&-411));
        assert_eq!(CROSS_SECTION_PROXY.get(&4122), Some(&3122));
        assert_eq!(CROSS_SECTION_PROXY.get(&2212), None);
    }
}
