//! Local structural order parameters of water.
//!
//! All parameters are computed around the oxygen of one molecule from the
//! O–O distances of its neighbors:
//!
//! - orientational tetrahedral order `q = 1 − 3/8 Σ (cos ψ + 1/3)²`, summed over
//!   the 6 angles between the 4 nearest oxygens. `q = 1` for a perfect
//!   tetrahedron and lies within `[−3, 1]`
//! - translational tetrahedral order `Sk = 1 − Σ (dᵢ − d̄)² / (12 d̄²)` of the 4
//!   nearest O–O distances
//! - local structure index (LSI), the variance of the gaps between consecutive
//!   neighbor shells up to the cutoff

use crate::cell::Cell;
use crate::cluster::Cluster;
use crate::error::{Result, WaterError};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Default LSI cutoff radius.
pub const DEFAULT_LSI_CUTOFF: f64 = 3.7;

/// Tetrahedral order parameters of one molecule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TetrahedralOrder {
    /// Orientational order `q`
    pub q: f64,
    /// Translational order `Sk`
    pub sk: f64,
}

/// Orientational tetrahedral order of four neighbors around `center`.
///
/// Angles are measured under the minimum-image convention of `cell`.
pub fn orientational_order(
    cell: &Cell,
    center: &Vector3<f64>,
    neighbors: &[Vector3<f64>; 4],
) -> Result<f64> {
    let mut sum = 0.0;
    for j in 0..3 {
        for k in (j + 1)..4 {
            let psi = cell.angle(&neighbors[j], center, &neighbors[k])?;
            sum += (psi.cos() + 1.0 / 3.0).powi(2);
        }
    }
    Ok(1.0 - 3.0 / 8.0 * sum)
}

/// Translational tetrahedral order of the four nearest neighbor distances.
pub fn translational_order(distances: &[f64; 4]) -> f64 {
    let mean = distances.iter().sum::<f64>() / 4.0;
    let spread: f64 = distances.iter().map(|d| (d - mean).powi(2)).sum();
    1.0 - spread / (12.0 * mean * mean)
}

/// Local structure index of ascending neighbor distances.
///
/// Keeps every distance below `cutoff` plus the first one at or beyond it,
/// and returns the mean squared deviation of the gaps between consecutive
/// kept distances.
///
/// # Errors
///
/// Returns [`WaterError::InsufficientNeighbors`] if fewer than two distances
/// are kept.
pub fn local_structure_index(sorted: &[f64], cutoff: f64) -> Result<f64> {
    let inside = sorted.iter().take_while(|&&d| d < cutoff).count();
    let kept = &sorted[..(inside + 1).min(sorted.len())];
    if kept.len() < 2 {
        return Err(WaterError::InsufficientNeighbors(format!(
            "local structure index needs 2 neighbor distances, {} available",
            kept.len()
        )));
    }

    let gaps: Vec<f64> = kept.windows(2).map(|w| w[1] - w[0]).collect();
    let n = gaps.len() as f64;
    let mean = gaps.iter().sum::<f64>() / n;
    Ok(gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n)
}

/// Other molecules sorted by O–O distance to `mol`, as `(distance, molecule)`.
fn sorted_neighbors(cluster: &mut Cluster, mol: usize) -> Result<Vec<(f64, usize)>> {
    cluster.molecule(mol)?;
    let roo = cluster.oo_distances();
    let mut neighbors: Vec<(f64, usize)> = roo
        .row(mol)
        .iter()
        .enumerate()
        .filter(|&(other, _)| other != mol)
        .map(|(other, &d)| (d, other))
        .collect();
    neighbors.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(neighbors)
}

/// Tetrahedral order parameters of molecule `mol` from its 4 nearest oxygens.
///
/// # Errors
///
/// Returns [`WaterError::InsufficientNeighbors`] if the cluster has fewer than
/// four other molecules.
pub fn tetrahedral_order(cluster: &mut Cluster, mol: usize) -> Result<TetrahedralOrder> {
    let neighbors = sorted_neighbors(cluster, mol)?;
    if neighbors.len() < 4 {
        return Err(WaterError::InsufficientNeighbors(format!(
            "molecule {} has {} neighbors, tetrahedral order needs 4",
            mol,
            neighbors.len()
        )));
    }

    let nearest = [neighbors[0], neighbors[1], neighbors[2], neighbors[3]];
    let molecules = cluster.molecules();
    let center = cluster.position(molecules[mol].oxygen);
    let positions = nearest.map(|(_, other)| *cluster.position(molecules[other].oxygen));

    let q = orientational_order(cluster.cell(), center, &positions)?;
    let sk = translational_order(&nearest.map(|(d, _)| d));
    Ok(TetrahedralOrder { q, sk })
}

/// Local structure index of molecule `mol`.
pub fn lsi(cluster: &mut Cluster, mol: usize, cutoff: f64) -> Result<f64> {
    let distances: Vec<f64> = sorted_neighbors(cluster, mol)?
        .into_iter()
        .map(|(d, _)| d)
        .collect();
    local_structure_index(&distances, cutoff)
}
