//! Analysis parameters and run modes.
//!
//! This module defines the structures that parameterize an analysis run:
//!
//! - [`AnalysisConfig`]: cutoffs and criteria handed to every operation
//! - [`AnalysisMode`]: which per-frame analysis the driver performs
//! - [`OutputFormat`]: how per-molecule records are written
//!
//! Nothing here is global. The driver builds one `AnalysisConfig` (from
//! defaults, settings files or code) and passes it down explicitly.

use crate::cluster::DEFAULT_OH_CUTOFF;
use crate::hbond::HBondCriterion;
use crate::order::DEFAULT_LSI_CUTOFF;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default largest closed-walk length reported by network analyses.
pub const DEFAULT_MAX_LOOP_LENGTH: usize = 10;

/// Largest closed-walk length accepted from settings files.
pub const MAX_LOOP_LENGTH_LIMIT: usize = 20;

/// Cutoffs and criteria of an analysis run.
///
/// # Default Values
///
/// - `oh_cutoff`: 4.5, the O–H search radius of molecule reconstruction
/// - `hbond`: [`HBondCriterion::CORSETTI_2013`] (3.5 and 30°)
/// - `lsi_cutoff`: 3.7
/// - `max_loop_length`: 10
///
/// Lengths are in the unit of the trajectory (Å for the usual inputs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// O–H search radius used to reconstruct molecules
    pub oh_cutoff: f64,
    /// Hydrogen-bond criterion
    pub hbond: HBondCriterion,
    /// Cutoff radius of the local structure index
    pub lsi_cutoff: f64,
    /// Longest closed walk counted in network analyses
    pub max_loop_length: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            oh_cutoff: DEFAULT_OH_CUTOFF,
            hbond: HBondCriterion::CORSETTI_2013,
            lsi_cutoff: DEFAULT_LSI_CUTOFF,
            max_loop_length: DEFAULT_MAX_LOOP_LENGTH,
        }
    }
}

/// Per-frame analysis performed by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisMode {
    /// Tetrahedral order and LSI of every molecule
    Order,
    /// Hydrogen-bond counts and closed walks of every molecule
    Network,
    /// Internal coordinates of a two-molecule frame
    Dimers,
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "order" => Ok(AnalysisMode::Order),
            "network" => Ok(AnalysisMode::Network),
            "dimers" | "dimer" => Ok(AnalysisMode::Dimers),
            other => Err(format!(
                "unknown analysis '{}', expected order, network or dimers",
                other
            )),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisMode::Order => "order",
            AnalysisMode::Network => "network",
            AnalysisMode::Dimers => "dimers",
        };
        f.write_str(name)
    }
}

/// Format of the per-molecule output records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Tab-separated rows with a header line
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}
