// Slant-depth geometry and sampling of decay / interaction depths
//
// Depth is measured along a straight inclined path from the top of the
// atmosphere (flat earth). Path lengths are in cm, depths in g/cm².

use crate::atmosphere::Atmosphere;
use crate::batch::ParticleBatch;
use crate::cross_section::CrossSectionTable;
use crate::data::particle_properties;
use crate::error::{Error, Result};
use crate::particle::DepthFlag;
use crate::utilities::{interpolate_linear, linspace};
use rand::Rng;

/// Height grid used when no resolution is configured.
pub const DEFAULT_TABLE_POINTS: usize = 1000;

/// Height, path length and slant depth tabulated on a uniform height grid.
///
/// `length` is the distance to the ground along the inclined path.
#[derive(Debug, Clone)]
pub struct SlantDepthTable {
    zenith_deg: f64,
    height: Vec<f64>,
    length: Vec<f64>,
    depth: Vec<f64>,
    // Same arrays ordered by ascending depth
    rev_height: Vec<f64>,
    rev_length: Vec<f64>,
    rev_depth: Vec<f64>,
}

impl SlantDepthTable {
    pub fn new<A: Atmosphere + ?Sized>(
        atmosphere: &A,
        zenith_deg: f64,
        npoints: usize,
    ) -> Result<Self> {
        if !(0.0..90.0).contains(&zenith_deg) {
            return Err(Error::InvalidParam(format!(
                "zenith angle must be in [0, 90) degrees, got {zenith_deg}"
            )));
        }
        if npoints < 2 {
            return Err(Error::InvalidParam(format!(
                "slant depth table needs at least two points, got {npoints}"
            )));
        }
        let cos_theta = zenith_deg.to_radians().cos();
        let height = linspace(0.0, atmosphere.top_height(), npoints);
        let length: Vec<f64> = height.iter().map(|h| h / cos_theta).collect();
        let depth: Vec<f64> = height
            .iter()
            .map(|&h| atmosphere.vertical_depth(h) / cos_theta)
            .collect();

        let reversed = |v: &[f64]| v.iter().rev().copied().collect::<Vec<f64>>();
        Ok(SlantDepthTable {
            zenith_deg,
            rev_height: reversed(&height),
            rev_length: reversed(&length),
            rev_depth: reversed(&depth),
            height,
            length,
            depth,
        })
    }

    pub fn zenith_deg(&self) -> f64 {
        self.zenith_deg
    }

    /// Slant depth at ground level.
    pub fn max_depth(&self) -> f64 {
        self.depth[0]
    }

    pub fn height_to_depth(&self, height: f64) -> f64 {
        interpolate_linear(&self.height, &self.depth, height)
    }

    pub fn depth_to_height(&self, depth: f64) -> f64 {
        interpolate_linear(&self.rev_depth, &self.rev_height, depth)
    }

    /// Depth reached after travelling `length` cm down the path from `depth`.
    /// Paths that would end below ground return the ground depth.
    pub fn add_length(&self, depth: f64, length: f64) -> f64 {
        if !length.is_finite() {
            return self.max_depth();
        }
        let remaining = interpolate_linear(&self.rev_depth, &self.rev_length, depth) - length;
        interpolate_linear(&self.length, &self.depth, remaining)
    }
}

/// Samples candidate decay and interaction depths for batches of particles.
///
/// Sampled depths are clamped to `[depth, stop_depth]`; a process that cannot
/// happen before the stop depth is reported at exactly the stop depth.
pub struct SlantDepthOracle {
    table: SlantDepthTable,
    cross_sections: Box<dyn CrossSectionTable + Send>,
    stop_depth: f64,
}

impl SlantDepthOracle {
    pub fn new(table: SlantDepthTable, cross_sections: Box<dyn CrossSectionTable + Send>) -> Self {
        let stop_depth = table.max_depth();
        SlantDepthOracle {
            table,
            cross_sections,
            stop_depth,
        }
    }

    pub fn table(&self) -> &SlantDepthTable {
        &self.table
    }

    pub fn set_stop_depth(&mut self, depth: f64) -> Result<()> {
        if !(depth.is_finite() && depth >= 0.0 && depth <= self.max_depth()) {
            return Err(Error::InvalidParam(format!(
                "stop depth must lie in [0, {}] g/cm², got {depth}",
                self.max_depth()
            )));
        }
        self.stop_depth = depth;
        Ok(())
    }

    /// Depth every sampled depth is clamped to.
    pub fn stop_depth(&self) -> f64 {
        self.stop_depth
    }

    /// Ground depth of the geometry.
    ///
    /// Sampled depths never exceed [`Self::stop_depth`], so with a stop height
    /// above ground a stable particle gets `stop_depth() < max_depth()`.
    pub fn max_depth(&self) -> f64 {
        self.table.max_depth()
    }

    /// Slant depth at `height` cm above ground.
    pub fn height_to_depth(&self, height: f64) -> f64 {
        self.table.height_to_depth(height)
    }

    /// Height in cm above ground at slant depth `depth`.
    pub fn depth_to_height(&self, depth: f64) -> f64 {
        self.table.depth_to_height(depth)
    }

    fn clamp(&self, sampled: f64, depth: f64) -> f64 {
        // NaN falls through `min` to the stop depth
        sampled.min(self.stop_depth).max(depth)
    }

    /// Depth at which a particle produced at `depth` decays.
    pub fn decay_depth<R: Rng>(&self, code: i32, energy: f64, depth: f64, rng: &mut R) -> f64 {
        let props = particle_properties(code);
        if props.mass <= 0.0 || props.is_stable() {
            return self.clamp(self.stop_depth, depth);
        }
        let gamma = (energy / props.mass).max(1.0);
        let beta_gamma = ((gamma + 1.0) * (gamma - 1.0)).sqrt();
        let xi: f64 = rng.gen();
        let length = -(1.0 - xi).ln() * beta_gamma * props.ctau;
        self.clamp(self.table.add_length(depth, length), depth)
    }

    /// Depth at which a particle at `depth` interacts.
    pub fn interaction_depth<R: Rng>(
        &self,
        code: i32,
        energy: f64,
        depth: f64,
        rng: &mut R,
    ) -> f64 {
        match self.cross_sections.mean_free_path(code, energy) {
            Some(lambda) => {
                let xi: f64 = rng.gen();
                self.clamp(depth + lambda * -(1.0 - xi).ln(), depth)
            }
            None => self.clamp(self.stop_depth, depth),
        }
    }

    /// Sample `depth_inter` for every row and `depth_decay` for stale rows.
    pub fn sample_depths<R: Rng>(&self, batch: &mut ParticleBatch, rng: &mut R) {
        self.sample_decay_depths(batch, rng);
        for i in 0..batch.len() {
            let x = self.interaction_depth(
                batch.type_codes()[i],
                batch.energies()[i],
                batch.depths()[i],
                rng,
            );
            batch.depth_inters_mut()[i] = x;
        }
    }

    /// Sample `depth_decay` for rows whose flag is stale and mark them fresh.
    pub fn sample_decay_depths<R: Rng>(&self, batch: &mut ParticleBatch, rng: &mut R) {
        for i in 0..batch.len() {
            if batch.ready_flags()[i] == DepthFlag::Fresh {
                continue;
            }
            let x = self.decay_depth(
                batch.type_codes()[i],
                batch.energies()[i],
                batch.depths()[i],
                rng,
            );
            batch.depth_decays_mut()[i] = x;
            batch.ready_flags_mut()[i] = DepthFlag::Fresh;
        }
    }
}
