//! Internal coordinates of water dimers.
//!
//! A dimer is described by twelve coordinates: the O–O distance and the
//! spherical angles of the O–O axis, the four O–H bond lengths, the two H–O–H
//! angles, and the Euler angles `(α, β, γ)` giving the orientation of the
//! second molecule. The angles are only meaningful in a canonical frame, so
//! the usual sequence is:
//!
//! 1. [`find_roles_and_sort`] to pick donor and acceptor and list the donated
//!    hydrogen first
//! 2. [`Cluster::center_and_orient`] on the donor
//! 3. [`Cluster::mol_above_xy`] on the acceptor
//! 4. [`dimer_coordinates`] and [`hbond_coordinates`]
//!
//! [`Cluster::center_and_orient`]: crate::cluster::Cluster::center_and_orient
//! [`Cluster::mol_above_xy`]: crate::cluster::Cluster::mol_above_xy

use crate::cell::vector_angle;
use crate::cluster::Cluster;
use crate::error::{Result, WaterError};
use crate::geometry::{bisector, euler_rotation, normalize, plane_normal, spherical_angles};
use crate::hbond::{resolve_roles, HBond};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Twelve internal coordinates of a dimer. Lengths in the cell unit, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimerCoordinates {
    /// O–O distance
    pub r_oo: f64,
    /// Azimuth of the O1→O2 axis
    pub phi: f64,
    /// Polar angle of the O1→O2 axis
    pub theta: f64,
    /// O1–H11 distance
    pub r_oh11: f64,
    /// O1–H12 distance
    pub r_oh12: f64,
    /// O2–H21 distance
    pub r_oh21: f64,
    /// O2–H22 distance
    pub r_oh22: f64,
    /// H–O–H angle of molecule 1
    pub hoh1: f64,
    /// H–O–H angle of molecule 2
    pub hoh2: f64,
    /// In-plane Euler angle of molecule 2, within `[0, π]`
    pub alpha: f64,
    /// Polar angle of the plane normal of molecule 2
    pub beta: f64,
    /// Azimuth of the plane normal of molecule 2
    pub gamma: f64,
}

impl DimerCoordinates {
    /// Coordinates in output order.
    pub fn to_array(&self) -> [f64; 12] {
        [
            self.r_oo, self.phi, self.theta, self.r_oh11, self.r_oh12, self.r_oh21,
            self.r_oh22, self.hoh1, self.hoh2, self.alpha, self.beta, self.gamma,
        ]
    }
}

/// Geometry of a single O–H···O contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HBondCoordinates {
    /// `d(Od, H) − d(Oa, H)`
    pub nu: f64,
    /// `d(Od, H) + d(Oa, H)`
    pub mu: f64,
    /// Donor oxygen to hydrogen distance
    pub d_donor_h: f64,
    /// Acceptor oxygen to hydrogen distance
    pub d_acceptor_h: f64,
    /// Angle `Od–H–Oa` in radians
    pub angle_od_h_oa: f64,
}

/// Donor, acceptor and hydrogens of the closest O–H contact between `a` and `b`.
///
/// No bonding criterion is applied.
pub fn find_dimer_roles(cluster: &Cluster, a: usize, b: usize) -> Result<HBond> {
    resolve_roles(cluster, a, b)
}

/// Lists the donated hydrogen first in the donor molecule.
pub fn donor_hydrogen_first(cluster: &mut Cluster, roles: &HBond) -> Result<()> {
    let donor = cluster.molecule(roles.donor)?;
    if !donor.hydrogens.contains(&roles.donor_hydrogen) {
        return Err(WaterError::InvalidTopology(format!(
            "atom {} is not a hydrogen of molecule {}",
            roles.donor_hydrogen, roles.donor
        )));
    }
    if donor.hydrogens[0] != roles.donor_hydrogen {
        cluster.swap_hydrogens(roles.donor)?;
    }
    Ok(())
}

/// [`find_dimer_roles`] followed by [`donor_hydrogen_first`].
pub fn find_roles_and_sort(cluster: &mut Cluster, a: usize, b: usize) -> Result<HBond> {
    let roles = find_dimer_roles(cluster, a, b)?;
    donor_hydrogen_first(cluster, &roles)?;
    Ok(roles)
}

/// Internal coordinates of the dimer formed by `mol1` and `mol2`.
///
/// Distances and angles use the minimum-image convention. The Euler angles
/// describe molecule 2 in the current axes: `(γ, β)` are the azimuth and polar
/// angle of its plane normal, `α` the unsigned angle between its H–H bisector
/// and `+x` once the normal has been rotated onto `+z`.
///
/// # Errors
///
/// - [`WaterError::InvalidTopology`] if `mol1 == mol2` or a molecule does not exist
/// - [`WaterError::DegenerateGeometry`] for coincident oxygens or a linear molecule
pub fn dimer_coordinates(
    cluster: &Cluster,
    mol1: usize,
    mol2: usize,
) -> Result<DimerCoordinates> {
    if mol1 == mol2 {
        return Err(WaterError::InvalidTopology(format!(
            "dimer coordinates need two different molecules, got {} twice",
            mol1
        )));
    }
    let [o1, h11, h12] = cluster.molecule(mol1)?.atoms();
    let [o2, h21, h22] = cluster.molecule(mol2)?.atoms();

    let r_oo = cluster.distance(o1, o2);
    let (phi, theta) = spherical_angles(&normalize(&cluster.displacement(o1, o2))?);

    let u1 = normalize(&cluster.displacement(o2, h21))?;
    let u2 = normalize(&cluster.displacement(o2, h22))?;
    let (gamma, beta) = spherical_angles(&plane_normal(&u1, &u2)?);
    let rotation = euler_rotation(0.0, -beta, -gamma);
    let b = bisector(&(rotation * u1), &(rotation * u2))?;
    let alpha = vector_angle(&b, &Vector3::x())?;

    Ok(DimerCoordinates {
        r_oo,
        phi,
        theta,
        r_oh11: cluster.distance(o1, h11),
        r_oh12: cluster.distance(o1, h12),
        r_oh21: cluster.distance(o2, h21),
        r_oh22: cluster.distance(o2, h22),
        hoh1: cluster.angle(h11, o1, h12)?,
        hoh2: cluster.angle(h21, o2, h22)?,
        alpha,
        beta,
        gamma,
    })
}

/// Hydrogen-bond coordinates for `donor`, `acceptor` and the donated hydrogen atom.
///
/// # Errors
///
/// Returns [`WaterError::InvalidTopology`] if `donor_h` is not a hydrogen of
/// the donor molecule, and [`WaterError::DegenerateGeometry`] if the hydrogen
/// coincides with one of the oxygens.
pub fn hbond_coordinates(
    cluster: &Cluster,
    donor: usize,
    acceptor: usize,
    donor_h: usize,
) -> Result<HBondCoordinates> {
    let donor_mol = cluster.molecule(donor)?;
    let acceptor_o = cluster.molecule(acceptor)?.oxygen;
    if !donor_mol.hydrogens.contains(&donor_h) {
        return Err(WaterError::InvalidTopology(format!(
            "atom {} is not a hydrogen of donor molecule {}",
            donor_h, donor
        )));
    }

    let d_donor_h = cluster.distance(donor_mol.oxygen, donor_h);
    let d_acceptor_h = cluster.distance(acceptor_o, donor_h);
    Ok(HBondCoordinates {
        nu: d_donor_h - d_acceptor_h,
        mu: d_donor_h + d_acceptor_h,
        d_donor_h,
        d_acceptor_h,
        angle_od_h_oa: cluster.angle(donor_mol.oxygen, donor_h, acceptor_o)?,
    })
}
