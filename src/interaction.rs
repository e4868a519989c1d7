// Hadronic interactions
//
// The event generator itself is external; this module feeds it one parent at
// a time and turns its output into child rows with provenance.

use crate::batch::{Field, ParticleBatch, PushFields};
use crate::error::{Error, Result};
use crate::particle::{FinalKind, ProductionKind, RejectionReason};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One nuclear species of the target medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetComponent {
    pub mass_number: u32,
    pub charge: u32,
    /// Fraction by number of nuclei.
    pub fraction: f64,
}

/// Fixed composition of the medium projectiles interact with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub components: Vec<TargetComponent>,
}

impl Target {
    pub fn new(components: Vec<TargetComponent>) -> Result<Self> {
        let target = Target { components };
        target.validate()?;
        Ok(target)
    }

    /// Nitrogen 0.78, oxygen 0.22.
    pub fn air() -> Self {
        Target {
            components: vec![
                TargetComponent {
                    mass_number: 14,
                    charge: 7,
                    fraction: 0.78,
                },
                TargetComponent {
                    mass_number: 16,
                    charge: 8,
                    fraction: 0.22,
                },
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(Error::InvalidParam(
                "target needs at least one component".to_string(),
            ));
        }
        for c in &self.components {
            if c.mass_number == 0 || c.charge > c.mass_number {
                return Err(Error::InvalidParam(format!(
                    "target component A = {}, Z = {} is not a nucleus",
                    c.mass_number, c.charge
                )));
            }
            if !(c.fraction.is_finite() && c.fraction > 0.0) {
                return Err(Error::InvalidParam(format!(
                    "target fraction must be positive, got {}",
                    c.fraction
                )));
            }
        }
        Ok(())
    }

    /// Number-weighted mean mass number.
    pub fn mean_mass_number(&self) -> f64 {
        let total: f64 = self.components.iter().map(|c| c.fraction).sum();
        self.components
            .iter()
            .map(|c| c.fraction * f64::from(c.mass_number))
            .sum::<f64>()
            / total
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::air()
    }
}

/// External hadronic event generator.
pub trait HadronicGenerator {
    /// Collide one projectile with `target` and return the final-state
    /// `(type_code, energy)` pairs, or the reason the collision was refused.
    fn interact(
        &mut self,
        type_code: i32,
        energy: f64,
        target: &Target,
    ) -> std::result::Result<Vec<(i32, f64)>, RejectionReason>;
}

/// Result of one [`InteractionOracle::run`].
#[derive(Debug, Clone)]
pub struct InteractionOutcome {
    /// Products of all accepted parents, without ids.
    pub children: ParticleBatch,
    /// Parents the generator interacted.
    pub accepted: ParticleBatch,
    /// Parents the generator refused, with `rejection` and `final_kind` set.
    pub rejected: ParticleBatch,
    pub interactions: usize,
}

pub struct InteractionOracle {
    generator: Box<dyn HadronicGenerator + Send>,
    target: Target,
}

impl InteractionOracle {
    pub fn new(generator: Box<dyn HadronicGenerator + Send>, target: Target) -> Self {
        InteractionOracle { generator, target }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Interact every parent at its `depth_inter`.
    pub fn run(&mut self, parents: &ParticleBatch) -> Result<InteractionOutcome> {
        let mut children = ParticleBatch::new().with_max_capacity(parents.max_capacity());
        let mut accepted_rows = Vec::with_capacity(parents.len());
        let mut rejected_rows = Vec::new();
        let mut reasons = Vec::new();

        for i in 0..parents.len() {
            let code = parents.type_codes()[i];
            let energy = parents.energies()[i];
            match self.generator.interact(code, energy, &self.target) {
                Ok(products) => {
                    let before = products.len();
                    let (codes, energies): (Vec<i32>, Vec<f64>) = products
                        .into_iter()
                        .filter(|&(_, e)| e.is_finite() && e > 0.0)
                        .unzip();
                    if codes.len() < before {
                        warn!(
                            projectile = code,
                            energy,
                            dropped = before - codes.len(),
                            "generator returned products without positive energy"
                        );
                    }
                    children.push(PushFields {
                        type_code: Field::Column(&codes),
                        energy: Field::Column(&energies),
                        depth: Field::Scalar(parents.depth_inters()[i]),
                        generation: Field::Scalar(parents.generations()[i] + 1),
                        parent_id: Field::Scalar(parents.ids()[i]),
                        production: Field::Scalar(ProductionKind::Interaction),
                    })?;
                    accepted_rows.push(i);
                }
                Err(reason) => {
                    debug!(projectile = code, energy, ?reason, "interaction rejected");
                    rejected_rows.push(i);
                    reasons.push(reason);
                }
            }
        }

        let accepted = parents.select(&accepted_rows);
        let mut rejected = parents.select(&rejected_rows);
        for (slot, reason) in rejected.rejections_mut().iter_mut().zip(reasons) {
            *slot = Some(reason);
        }
        rejected.set_final_kind(FinalKind::RejectedByGenerator);

        if accepted.len() + rejected.len() != parents.len() {
            return Err(Error::ConservationViolated {
                step: "interaction dispatch",
                input: parents.len(),
                output: accepted.len() + rejected.len(),
            });
        }

        Ok(InteractionOutcome {
            interactions: accepted.len(),
            children,
            accepted,
            rejected,
        })
    }
}
