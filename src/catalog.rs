// Particle type classification
//
// Every tracked type belongs to exactly one category. Types that are not
// tracked are treated as decay-only and must decay before they can be
// reported in the final collection.

use crate::config::ForcedDecayPolicy;
use crate::data::{
    particle_properties, DEFAULT_DECAY_ONLY_CODES, DEFAULT_FINAL_CODES,
    DEFAULT_INTERACTION_ONLY_CODES, DEFAULT_MIXING_ENERGIES,
};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Fate class of a particle type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Category {
    /// Neither interacts nor decays.
    Final,
    DecayOnly,
    /// Interacts whenever above the global energy threshold; never decays.
    InteractionOnly,
    /// Interacts at or above `crossover` (GeV), decays below it.
    Mixed { crossover: f64 },
}

/// Immutable lookup from PDG code to [`Category`].
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    categories: HashMap<i32, Category>,
    forced_decay: ForcedDecayPolicy,
}

impl TypeCatalog {
    pub fn builder() -> TypeCatalogBuilder {
        TypeCatalogBuilder::default()
    }

    /// Leptons, photons, light hadrons and charm as tracked in air showers.
    pub fn air_shower_default() -> Self {
        let mut categories = HashMap::new();
        for &code in DEFAULT_FINAL_CODES {
            categories.insert(code, Category::Final);
        }
        for &code in DEFAULT_DECAY_ONLY_CODES {
            categories.insert(code, Category::DecayOnly);
        }
        for &code in DEFAULT_INTERACTION_ONLY_CODES {
            categories.insert(code, Category::InteractionOnly);
        }
        for (&code, &crossover) in DEFAULT_MIXING_ENERGIES.iter() {
            categories.insert(code, Category::Mixed { crossover });
        }
        TypeCatalog {
            categories,
            forced_decay: ForcedDecayPolicy::default(),
        }
    }

    /// Replace the rule deciding which types must decay before being reported.
    pub fn with_forced_decay_policy(mut self, policy: ForcedDecayPolicy) -> Self {
        self.forced_decay = policy;
        self
    }

    pub fn forced_decay_policy(&self) -> ForcedDecayPolicy {
        self.forced_decay
    }

    pub fn category(&self, code: i32) -> Category {
        self.categories
            .get(&code)
            .copied()
            .unwrap_or(Category::DecayOnly)
    }

    pub fn is_trackable(&self, code: i32) -> bool {
        self.categories.contains_key(&code)
    }

    /// Crossover energy of a mixed type, `None` for every other category.
    pub fn mixing_energy(&self, code: i32) -> Option<f64> {
        match self.category(code) {
            Category::Mixed { crossover } => Some(crossover),
            _ => None,
        }
    }

    /// Whether a particle of this type has to decay before it may be stored
    /// as final (below threshold or at the ground).
    pub fn must_decay_before_reporting(&self, code: i32) -> bool {
        if !self.is_trackable(code) {
            return true;
        }
        match self.forced_decay {
            ForcedDecayPolicy::Untracked => false,
            ForcedDecayPolicy::AllUnstable => {
                self.category(code) != Category::Final
                    && !particle_properties(code).is_stable()
            }
        }
    }

    /// All tracked codes, sorted.
    pub fn tracked_codes(&self) -> Vec<i32> {
        let mut codes: Vec<i32> = self.categories.keys().copied().collect();
        codes.sort_unstable();
        codes
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::air_shower_default()
    }
}

/// Collects category assignments; [`TypeCatalogBuilder::build`] rejects codes
/// assigned twice and invalid crossover energies.
#[derive(Debug, Default)]
pub struct TypeCatalogBuilder {
    entries: Vec<(i32, Category)>,
    forced_decay: ForcedDecayPolicy,
}

impl TypeCatalogBuilder {
    pub fn final_types(mut self, codes: &[i32]) -> Self {
        self.entries
            .extend(codes.iter().map(|&c| (c, Category::Final)));
        self
    }

    pub fn decay_only(mut self, codes: &[i32]) -> Self {
        self.entries
            .extend(codes.iter().map(|&c| (c, Category::DecayOnly)));
        self
    }

    pub fn interaction_only(mut self, codes: &[i32]) -> Self {
        self.entries
            .extend(codes.iter().map(|&c| (c, Category::InteractionOnly)));
        self
    }

    pub fn mixed(mut self, code: i32, crossover: f64) -> Self {
        self.entries.push((code, Category::Mixed { crossover }));
        self
    }

    pub fn forced_decay_policy(mut self, policy: ForcedDecayPolicy) -> Self {
        self.forced_decay = policy;
        self
    }

    pub fn build(self) -> Result<TypeCatalog> {
        let mut categories = HashMap::with_capacity(self.entries.len());
        for (code, category) in self.entries {
            if let Category::Mixed { crossover } = category {
                if !(crossover.is_finite() && crossover > 0.0) {
                    return Err(Error::InvalidParam(format!(
                        "crossover energy of type {code} must be positive and finite, got {crossover}"
                    )));
                }
            }
            if categories.insert(code, category).is_some() {
                return Err(Error::InvalidParam(format!(
                    "type {code} assigned to more than one category"
                )));
            }
        }
        Ok(TypeCatalog {
            categories,
            forced_decay: self.forced_decay,
        })
    }
}
