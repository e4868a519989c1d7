// Engine configuration
//
// One EngineConfig is read (or built) up front and handed to the engine,
// which owns it for its whole lifetime. Every field has a default, so a JSON
// file only needs to name what it changes.

use crate::atmosphere::ExponentialAtmosphere;
use crate::batch::DEFAULT_MAX_CAPACITY;
use crate::data::DEFAULT_GENERATOR_DECAYING;
use crate::error::{Error, Result};
use crate::interaction::Target;
use crate::slant_depth::DEFAULT_TABLE_POINTS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Safety bound on decay generations followed in one call.
pub const DEFAULT_MAX_DECAY_GENERATIONS: usize = 100;

/// Side a mixed-type particle takes when its energy equals the crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MixingTieBreak {
    #[default]
    Interact,
    Decay,
}

/// Which types have to be decayed before they may be stored as final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForcedDecayPolicy {
    /// Only types outside the tracked set.
    #[default]
    Untracked,
    /// Untracked types plus every tracked type with a finite lifetime.
    AllUnstable,
}

/// Settings for a [`crate::CascadeEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Zenith angle of the shower axis in degrees.
    pub zenith_deg: f64,
    pub atmosphere: ExponentialAtmosphere,
    /// Resolution of the height grid of the slant depth table.
    pub table_points: usize,
    pub target: Target,
    /// Seed of the engine RNG; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Slant depth (g/cm²) at which the primary starts.
    pub initial_depth: f64,
    /// Tracked types the decay generator may decay. Untracked types always may.
    pub generator_decaying: Vec<i32>,
    pub mixing_tie_break: MixingTieBreak,
    pub forced_decay: ForcedDecayPolicy,
    pub max_decay_generations: usize,
    /// Row ceiling of every particle collection.
    pub max_batch_capacity: usize,
    /// Keep final, archival and generated particles across runs.
    pub accumulate_runs: bool,
    /// Restart particle ids at 1 on [`crate::CascadeEngine::reset`].
    pub reset_ids: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            zenith_deg: 0.0,
            atmosphere: ExponentialAtmosphere::default(),
            table_points: DEFAULT_TABLE_POINTS,
            target: Target::air(),
            seed: None,
            initial_depth: 0.0,
            generator_decaying: DEFAULT_GENERATOR_DECAYING.to_vec(),
            mixing_tie_break: MixingTieBreak::default(),
            forced_decay: ForcedDecayPolicy::default(),
            max_decay_generations: DEFAULT_MAX_DECAY_GENERATIONS,
            max_batch_capacity: DEFAULT_MAX_CAPACITY,
            accumulate_runs: false,
            reset_ids: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..90.0).contains(&self.zenith_deg) {
            return Err(Error::InvalidParam(format!(
                "zenith_deg must be in [0, 90), got {}",
                self.zenith_deg
            )));
        }
        self.atmosphere.validate()?;
        self.target.validate()?;
        if self.table_points < 2 {
            return Err(Error::InvalidParam(format!(
                "table_points must be at least 2, got {}",
                self.table_points
            )));
        }
        if !(self.initial_depth.is_finite() && self.initial_depth >= 0.0) {
            return Err(Error::InvalidParam(format!(
                "initial_depth must be finite and non-negative, got {}",
                self.initial_depth
            )));
        }
        if self.max_decay_generations == 0 {
            return Err(Error::InvalidParam(
                "max_decay_generations must be at least 1".to_string(),
            ));
        }
        if self.max_batch_capacity == 0 {
            return Err(Error::InvalidParam(
                "max_batch_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
