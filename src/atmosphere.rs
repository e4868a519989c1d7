use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Vertical profile of the atmosphere.
///
/// Heights are in cm above ground, vertical depths in g/cm² measured from the
/// top of the atmosphere.
pub trait Atmosphere {
    /// Vertical depth above height `height`.
    fn vertical_depth(&self, height: f64) -> f64;

    /// Height at which the vertical depth equals `depth`.
    fn height_at_vertical_depth(&self, depth: f64) -> f64;

    /// Height where the vertical depth is zero.
    fn top_height(&self) -> f64;
}

/// Isothermal atmosphere: density falls off as `exp(-h / scale_height)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExponentialAtmosphere {
    /// Vertical depth at ground level for an atmosphere of infinite extent (g/cm²).
    pub sea_level_depth: f64,
    /// Scale height (cm).
    pub scale_height: f64,
    /// Top of the atmosphere (cm).
    pub top: f64,
}

impl ExponentialAtmosphere {
    pub fn new(sea_level_depth: f64, scale_height: f64, top: f64) -> Result<Self> {
        let atm = ExponentialAtmosphere {
            sea_level_depth,
            scale_height,
            top,
        };
        atm.validate()?;
        Ok(atm)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("sea_level_depth", self.sea_level_depth),
            ("scale_height", self.scale_height),
            ("top", self.top),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidParam(format!(
                    "atmosphere {name} must be positive and finite, got {value}"
                )));
            }
        }
        Ok(())
    }

    fn top_term(&self) -> f64 {
        (-self.top / self.scale_height).exp()
    }
}

impl Default for ExponentialAtmosphere {
    fn default() -> Self {
        ExponentialAtmosphere {
            sea_level_depth: 1036.0,
            scale_height: 8.0e5,
            top: 112.8e5,
        }
    }
}

impl Atmosphere for ExponentialAtmosphere {
    fn vertical_depth(&self, height: f64) -> f64 {
        let h = height.clamp(0.0, self.top);
        self.sea_level_depth * ((-h / self.scale_height).exp() - self.top_term())
    }

    fn height_at_vertical_depth(&self, depth: f64) -> f64 {
        let x = depth.clamp(0.0, self.vertical_depth(0.0));
        let h = -self.scale_height * (x / self.sea_level_depth + self.top_term()).ln();
        h.clamp(0.0, self.top)
    }

    fn top_height(&self) -> f64 {
        self.top
    }
}
