use crate::data::CROSS_SECTION_PROXY;
use crate::error::{Error, Result};
use crate::utilities::{interpolate_log_log, logspace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Conversion from an inelastic cross section in mb to an interaction length
/// in g/cm² for air (mean target mass 14.5 u).
pub const MB_TO_AIR_LAMBDA: f64 = 24100.0;

/// Source of hadronic interaction lengths.
pub trait CrossSectionTable {
    /// Mean free path (g/cm²) of `code` at `energy` (GeV), or `None` when the
    /// type cannot interact.
    fn mean_free_path(&self, code: i32, energy: f64) -> Option<f64>;
}

/// Interaction lengths tabulated on a common energy grid.
///
/// Lookups between grid points use log-log interpolation and clamp at the
/// grid ends. Types without a column of their own may be routed to the column
/// of a proxy type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabulatedCrossSections {
    energy_grid: Vec<f64>,
    mean_free_paths: HashMap<i32, Vec<f64>>,
    #[serde(default)]
    proxies: HashMap<i32, i32>,
}

impl TabulatedCrossSections {
    pub fn new(energy_grid: Vec<f64>, mean_free_paths: HashMap<i32, Vec<f64>>) -> Result<Self> {
        let table = TabulatedCrossSections {
            energy_grid,
            mean_free_paths,
            proxies: HashMap::new(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Route lookups of `code` to the column of `proxy` when `code` has none.
    pub fn with_proxies(mut self, proxies: HashMap<i32, i32>) -> Self {
        self.proxies.extend(proxies);
        self
    }

    /// Power-law table for the usual air-shower hadrons, 1 GeV to 1e12 GeV.
    ///
    /// σ(E) = σ0 (E / 1 TeV)^0.065 with σ0 = 290 mb for baryons, 220 mb for
    /// pions and 190 mb for kaons and charm mesons.
    pub fn air_default() -> Self {
        let energy_grid = logspace(0.0, 12.0, 121);
        let column = |sigma0: f64| -> Vec<f64> {
            energy_grid
                .iter()
                .map(|e| MB_TO_AIR_LAMBDA / (sigma0 * (e / 1000.0).powf(0.065)))
                .collect()
        };
        let mut mean_free_paths = HashMap::new();
        for code in [2212, -2212, 2112, -2112, 3122, -3122] {
            mean_free_paths.insert(code, column(290.0));
        }
        for code in [211, -211] {
            mean_free_paths.insert(code, column(220.0));
        }
        for code in [321, -321, 130, 310, 411, -411, 421, -421, 431, -431] {
            mean_free_paths.insert(code, column(190.0));
        }
        TabulatedCrossSections {
            energy_grid,
            mean_free_paths,
            proxies: CROSS_SECTION_PROXY.clone(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: TabulatedCrossSections = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn energy_grid(&self) -> &[f64] {
        &self.energy_grid
    }

    /// Codes with a column of their own, sorted.
    pub fn tabulated_codes(&self) -> Vec<i32> {
        let mut codes: Vec<i32> = self.mean_free_paths.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    fn validate(&self) -> Result<()> {
        if self.energy_grid.len() < 2 {
            return Err(Error::InvalidParam(
                "cross-section energy grid needs at least two points".to_string(),
            ));
        }
        let ascending = self.energy_grid.windows(2).all(|w| w[0] < w[1]);
        if !ascending || self.energy_grid[0] <= 0.0 {
            return Err(Error::InvalidParam(
                "cross-section energy grid must be positive and strictly ascending".to_string(),
            ));
        }
        for (code, column) in &self.mean_free_paths {
            if column.len() != self.energy_grid.len() {
                return Err(Error::InvalidParam(format!(
                    "mean free path column of type {code} has {} values, energy grid has {}",
                    column.len(),
                    self.energy_grid.len()
                )));
            }
            if column.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                return Err(Error::InvalidParam(format!(
                    "mean free path column of type {code} must be positive and finite"
                )));
            }
        }
        Ok(())
    }

    fn column(&self, code: i32) -> Option<&Vec<f64>> {
        self.mean_free_paths.get(&code).or_else(|| {
            self.proxies
                .get(&code)
                .and_then(|proxy| self.mean_free_paths.get(proxy))
        })
    }
}

impl CrossSectionTable for TabulatedCrossSections {
    fn mean_free_path(&self, code: i32, energy: f64) -> Option<f64> {
        let column = self.column(code)?;
        Some(interpolate_log_log(&self.energy_grid, column, energy))
    }
}

impl Default for TabulatedCrossSections {
    fn default() -> Self {
        Self::air_default()
    }
}
