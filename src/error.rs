use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the cascade engine and its collaborators.
///
/// Generator rejections are not errors: they are recorded on the particle
/// and routed by the engine. Everything here abandons the current run.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid run or configuration parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// A particle batch would grow beyond its capacity ceiling.
    #[error("batch capacity exceeded: requested {requested} rows, ceiling is {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    /// The id counter would overflow.
    #[error("particle id counter overflow")]
    IdOverflow,

    /// A split step lost or duplicated particles.
    #[error("particle count not conserved in {step}: {input} in, {output} out")]
    ConservationViolated {
        step: &'static str,
        input: usize,
        output: usize,
    },

    /// The same id was found on two records of one collection.
    #[error("duplicate particle id {0}")]
    DuplicateId(i64),

    /// Ancestry reconstruction did not converge within the generation cap.
    #[error("decay chain deeper than {limit} generations")]
    DecayChainTooDeep { limit: usize },

    /// An external generator returned output that breaks its contract.
    #[error("generator contract violation: {0}")]
    GeneratorContract(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
