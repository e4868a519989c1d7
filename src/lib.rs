// First, declare the modules and re-export the types for Rust usage
mod atmosphere;
mod batch;
mod catalog;
mod config;
mod cross_section;
mod data;
mod decay;
mod engine;
mod error;
mod id_allocator;
mod interaction;
mod particle;
mod slant_depth;
mod stats;
mod utilities;

pub use atmosphere::{Atmosphere, ExponentialAtmosphere};
pub use batch::{Field, ParticleBatch, PushFields, DEFAULT_MAX_CAPACITY, INITIAL_CAPACITY};
pub use catalog::{Category, TypeCatalog, TypeCatalogBuilder};
pub use config::{EngineConfig, ForcedDecayPolicy, MixingTieBreak, DEFAULT_MAX_DECAY_GENERATIONS};
pub use cross_section::{CrossSectionTable, TabulatedCrossSections};
pub use data::{particle_properties, ParticleProperties};
pub use decay::{DecayGenerator, DecayOracle, DecayOutcome, DecayRecord};
pub use engine::{CascadeEngine, Fate};
pub use error::{Error, Result};
pub use id_allocator::IdAllocator;
pub use interaction::{
    HadronicGenerator, InteractionOracle, InteractionOutcome, Target, TargetComponent,
};
pub use particle::{DepthFlag, FinalKind, ParticleRecord, ProductionKind, RejectionReason};
pub use slant_depth::{SlantDepthOracle, SlantDepthTable, DEFAULT_TABLE_POINTS};
pub use stats::RunStats;
pub use utilities::{interpolate_linear, interpolate_log_log, linspace, logspace};
