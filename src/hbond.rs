//! Hydrogen-bond detection between water molecules.
//!
//! Bonds are decided with a geometric distance and angle criterion. The
//! default, [`HBondCriterion::CORSETTI_2013`], follows Corsetti et al.,
//! J. Chem. Phys. 139, 194502 (2013), Appendix B:
//!
//! 1. The O···O distance must not exceed `r_cut` (3.5 Å)
//! 2. The angle `Oa–Od–Hd` must not exceed `theta_cut` (30°)
//!
//! # Role resolution
//!
//! Among the four intermolecular O–H distances of a pair, the smallest one
//! names the donated hydrogen, and through it the donor and acceptor. Only
//! that single candidate is tested against the angle criterion; when it
//! fails the pair is not bonded, even if another O–H combination would pass.
//!
//! # Network
//!
//! [`HBondNetwork`] evaluates every unordered pair of a cluster once and
//! stores the result as a directed 0/1 adjacency matrix, `A[donor][acceptor]`.
//! Powers of that matrix count closed donor→acceptor walks.

use crate::cluster::Cluster;
use crate::error::{Result, WaterError};
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Distance and angle thresholds for a hydrogen bond.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HBondCriterion {
    /// Largest O···O distance of a bonded pair
    pub r_cut: f64,
    /// Largest `Oa–Od–Hd` angle of a bonded pair, in degrees
    pub theta_cut_deg: f64,
}

impl HBondCriterion {
    /// Corsetti et al. (2013): 3.5 Å and 30°.
    pub const CORSETTI_2013: Self = Self {
        r_cut: 3.5,
        theta_cut_deg: 30.0,
    };

    /// Angle threshold in radians.
    pub fn theta_cut(&self) -> f64 {
        self.theta_cut_deg.to_radians()
    }
}

impl Default for HBondCriterion {
    fn default() -> Self {
        Self::CORSETTI_2013
    }
}

/// Roles of two molecules in a (candidate) hydrogen bond.
///
/// `donor` and `acceptor` are molecule indices; the hydrogens are atom indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HBond {
    /// Donor molecule
    pub donor: usize,
    /// Acceptor molecule
    pub acceptor: usize,
    /// Hydrogen of the donor pointing at the acceptor
    pub donor_hydrogen: usize,
    /// The other hydrogen of the donor
    pub passive_hydrogen: usize,
}

/// Outcome of classifying a pair of molecules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HBondState {
    /// No hydrogen bond
    NotBonded,
    /// Hydrogen bond with the given roles
    Bonded(HBond),
}

impl HBondState {
    /// Whether the pair is bonded.
    pub fn is_bonded(&self) -> bool {
        matches!(self, HBondState::Bonded(_))
    }

    /// `+1` if `mol` donates, `-1` if it accepts, `0` otherwise.
    pub fn sign_for(&self, mol: usize) -> i8 {
        match self {
            HBondState::Bonded(bond) if bond.donor == mol => 1,
            HBondState::Bonded(bond) if bond.acceptor == mol => -1,
            _ => 0,
        }
    }
}

/// Assigns donor and acceptor roles from the closest intermolecular O–H contact.
///
/// The four candidates are checked in the order `Oa–Hb1`, `Oa–Hb2`,
/// `Ob–Ha1`, `Ob–Ha2`; on exact ties the first one wins. No bonding
/// criterion is applied.
///
/// # Errors
///
/// Returns [`WaterError::InvalidTopology`] if `a == b` or either molecule
/// does not exist.
pub fn resolve_roles(cluster: &Cluster, a: usize, b: usize) -> Result<HBond> {
    if a == b {
        return Err(WaterError::InvalidTopology(format!(
            "cannot assign hydrogen-bond roles within molecule {}",
            a
        )));
    }
    let ma = cluster.molecule(a)?;
    let mb = cluster.molecule(b)?;
    let [ha1, ha2] = ma.hydrogens;
    let [hb1, hb2] = mb.hydrogens;

    let candidates = [
        (cluster.distance(ma.oxygen, hb1), b, a, hb1, hb2),
        (cluster.distance(ma.oxygen, hb2), b, a, hb2, hb1),
        (cluster.distance(mb.oxygen, ha1), a, b, ha1, ha2),
        (cluster.distance(mb.oxygen, ha2), a, b, ha2, ha1),
    ];

    let mut best = candidates[0];
    for candidate in candidates.iter().skip(1) {
        if candidate.0 < best.0 {
            best = *candidate;
        }
    }

    let (_, donor, acceptor, donor_hydrogen, passive_hydrogen) = best;
    Ok(HBond {
        donor,
        acceptor,
        donor_hydrogen,
        passive_hydrogen,
    })
}

/// Decides whether molecules `a` and `b` are hydrogen bonded.
///
/// The distance cache of the cluster is used when present.
///
/// # Errors
///
/// - [`WaterError::InvalidTopology`] if either molecule does not exist
/// - [`WaterError::DegenerateGeometry`] if the donor O coincides with its H
///   or with the acceptor O
pub fn classify(
    cluster: &Cluster,
    a: usize,
    b: usize,
    criterion: &HBondCriterion,
) -> Result<HBondState> {
    let oa = cluster.molecule(a)?.oxygen;
    let ob = cluster.molecule(b)?.oxygen;
    if a == b {
        return Ok(HBondState::NotBonded);
    }
    if cluster.distance(oa, ob) > criterion.r_cut {
        return Ok(HBondState::NotBonded);
    }

    let bond = resolve_roles(cluster, a, b)?;
    let donor_o = cluster.molecule(bond.donor)?.oxygen;
    let acceptor_o = cluster.molecule(bond.acceptor)?.oxygen;
    let theta = cluster.angle(acceptor_o, donor_o, bond.donor_hydrogen)?;

    if theta <= criterion.theta_cut() {
        Ok(HBondState::Bonded(bond))
    } else {
        Ok(HBondState::NotBonded)
    }
}

/// Directed hydrogen-bond network of a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct HBondNetwork {
    adjacency: DMatrix<i64>,
    bonds: Vec<HBond>,
}

impl HBondNetwork {
    /// Classifies every unordered pair of molecules once.
    ///
    /// Fills the cluster's distance cache before classifying.
    pub fn build(cluster: &mut Cluster, criterion: &HBondCriterion) -> Result<Self> {
        cluster.distance_matrix();
        let cluster = &*cluster;

        let n = cluster.num_molecules();
        let mut adjacency = DMatrix::zeros(n, n);
        let mut bonds = Vec::new();

        for a in 0..n {
            for b in (a + 1)..n {
                if let HBondState::Bonded(bond) = classify(cluster, a, b, criterion)? {
                    adjacency[(bond.donor, bond.acceptor)] = 1;
                    bonds.push(bond);
                }
            }
        }

        debug!(
            "Found {} hydrogen bonds among {} molecules",
            bonds.len(),
            n
        );

        Ok(Self { adjacency, bonds })
    }

    /// Adjacency matrix, `1` at `(donor, acceptor)` for every bond.
    pub fn adjacency(&self) -> &DMatrix<i64> {
        &self.adjacency
    }

    /// Bonds in the order they were found.
    pub fn bonds(&self) -> &[HBond] {
        &self.bonds
    }

    /// Number of molecules (nodes).
    pub fn num_molecules(&self) -> usize {
        self.adjacency.nrows()
    }

    /// Whether `donor` donates a hydrogen bond to `acceptor`.
    pub fn donates_to(&self, donor: usize, acceptor: usize) -> bool {
        self.adjacency[(donor, acceptor)] != 0
    }

    /// Number of bonds accepted by `mol` (column sum).
    pub fn n_accepted(&self, mol: usize) -> i64 {
        self.adjacency.column(mol).sum()
    }

    /// Number of bonds donated by `mol` (row sum).
    pub fn n_donated(&self, mol: usize) -> i64 {
        self.adjacency.row(mol).sum()
    }

    /// Closed directed walks through each molecule.
    ///
    /// Entry `[mol][k - 1]` is `(A^k)[mol][mol]` for `k = 1..=max_len`,
    /// the number of donor→acceptor walks of length `k` that start and end
    /// at `mol`.
    ///
    /// # Errors
    ///
    /// Returns [`WaterError::InvalidTopology`] if a walk count of some length
    /// does not fit in an `i64`.
    pub fn closed_walks(&self, max_len: usize) -> Result<Vec<Vec<i64>>> {
        let n = self.num_molecules();
        let mut walks = vec![Vec::with_capacity(max_len); n];
        let mut power = self.adjacency.clone();

        for k in 1..=max_len {
            if k > 1 {
                power = checked_product(&power, &self.adjacency).ok_or_else(|| {
                    WaterError::InvalidTopology(format!(
                        "number of closed walks of length {} overflows",
                        k
                    ))
                })?;
            }
            for (mol, row) in walks.iter_mut().enumerate() {
                row.push(power[(mol, mol)]);
            }
        }
        Ok(walks)
    }
}

/// `a * b`, or `None` on integer overflow.
fn checked_product(a: &DMatrix<i64>, b: &DMatrix<i64>) -> Option<DMatrix<i64>> {
    let mut out = DMatrix::zeros(a.nrows(), b.ncols());
    for i in 0..a.nrows() {
        for j in 0..b.ncols() {
            let mut sum = 0i64;
            for k in 0..a.ncols() {
                sum = sum.checked_add(a[(i, k)].checked_mul(b[(k, j)])?)?;
            }
            out[(i, j)] = sum;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::cluster::DEFAULT_OH_CUTOFF;
    use crate::frame::Atom;
    use nalgebra::Vector3;

    /// Donor at the origin with one H along +x, acceptor on the x axis at `r_oo`.
    fn pair(r_oo: f64, donor_h: Vector3<f64>) -> Cluster {
        let acceptor = Vector3::new(r_oo, 0.0, 0.0);
        let atoms = vec![
            Atom::new("O", Vector3::zeros()),
            Atom::new("H", donor_h),
            Atom::new("H", Vector3::new(-0.24, 0.0, 0.93)),
            Atom::new("O", acceptor),
            Atom::new("H", acceptor + Vector3::new(0.24, 0.93, 0.0)),
            Atom::new("H", acceptor + Vector3::new(0.24, -0.46, 0.8)),
        ];
        let mut cluster = Cluster::new(atoms, Cell::cubic(20.0).unwrap()).unwrap();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        cluster
    }

    #[test]
    fn test_bonded_pair() {
        let cluster = pair(2.8, Vector3::new(0.957, 0.0, 0.0));
        let state = classify(&cluster, 0, 1, &HBondCriterion::default()).unwrap();
        match state {
            HBondState::Bonded(bond) => {
                assert_eq!(bond.donor, 0);
                assert_eq!(bond.acceptor, 1);
                assert_eq!(bond.donor_hydrogen, 1);
                assert_eq!(bond.passive_hydrogen, 2);
            }
            HBondState::NotBonded => panic!("expected a hydrogen bond"),
        }
        assert_eq!(state.sign_for(0), 1);
        assert_eq!(state.sign_for(1), -1);

        // argument order does not change the roles
        let swapped = classify(&cluster, 1, 0, &HBondCriterion::default()).unwrap();
        assert_eq!(swapped, state);
        assert_eq!(swapped.sign_for(1), -1);
    }

    #[test]
    fn test_far_pair_not_bonded() {
        let cluster = pair(5.0, Vector3::new(0.957, 0.0, 0.0));
        let state = classify(&cluster, 0, 1, &HBondCriterion::default()).unwrap();
        assert_eq!(state, HBondState::NotBonded);
        assert_eq!(state.sign_for(0), 0);
    }

    #[test]
    fn test_angle_criterion() {
        // closest contact is still H1 of the donor, but at 90° from the O–O axis
        let cluster = pair(2.8, Vector3::new(0.0, 0.957, 0.0));
        let bond = resolve_roles(&cluster, 0, 1).unwrap();
        assert_eq!(bond.donor, 0);
        assert_eq!(bond.donor_hydrogen, 1);
        let state = classify(&cluster, 0, 1, &HBondCriterion::default()).unwrap();
        assert_eq!(state, HBondState::NotBonded);

        let loose = HBondCriterion {
            r_cut: 3.5,
            theta_cut_deg: 95.0,
        };
        assert!(classify(&cluster, 0, 1, &loose).unwrap().is_bonded());
    }

    #[test]
    fn test_same_molecule() {
        let cluster = pair(2.8, Vector3::new(0.957, 0.0, 0.0));
        let state = classify(&cluster, 1, 1, &HBondCriterion::default()).unwrap();
        assert_eq!(state, HBondState::NotBonded);
        assert!(resolve_roles(&cluster, 1, 1).is_err());
    }

    #[test]
    fn test_bond_across_periodic_boundary() {
        let mut cluster = pair(2.8, Vector3::new(0.957, 0.0, 0.0));
        // put the donor on the far side of the cell
        let shift = Vector3::new(-20.0, 20.0, 0.0);
        let moved: Vec<usize> = cluster.molecules()[0].atoms().to_vec();
        let atoms: Vec<Atom> = cluster
            .atoms()
            .iter()
            .enumerate()
            .map(|(i, atom)| {
                let mut atom = atom.clone();
                if moved.contains(&i) {
                    atom.position += shift;
                }
                atom
            })
            .collect();
        let molecules = cluster.molecules().to_vec();
        cluster = Cluster::new(atoms, cluster.cell().clone()).unwrap();
        cluster.set_molecules(molecules).unwrap();

        let state = classify(&cluster, 0, 1, &HBondCriterion::default()).unwrap();
        assert!(state.is_bonded());
    }

    /// Three molecules on an equilateral triangle, each donating to the next.
    fn cyclic_trimer() -> Cluster {
        let r = 2.8;
        let oxygens = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(r, 0.0, 0.0),
            Vector3::new(0.5 * r, 0.5 * 3.0f64.sqrt() * r, 0.0),
        ];
        let mut atoms = Vec::new();
        for i in 0..3 {
            let o = oxygens[i];
            let towards = (oxygens[(i + 1) % 3] - o).normalize();
            atoms.push(Atom::new("O", o));
            atoms.push(Atom::new("H", o + towards * 0.96));
            atoms.push(Atom::new("H", o + Vector3::new(0.0, 0.0, 0.96)));
        }
        let mut cluster = Cluster::new(atoms, Cell::cubic(20.0).unwrap()).unwrap();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        cluster
    }

    #[test]
    fn test_cyclic_trimer_network() {
        let mut cluster = cyclic_trimer();
        let network = HBondNetwork::build(&mut cluster, &HBondCriterion::default()).unwrap();

        assert_eq!(network.num_molecules(), 3);
        assert_eq!(network.bonds().len(), 3);
        for mol in 0..3 {
            assert!(network.donates_to(mol, (mol + 1) % 3));
            assert!(!network.donates_to((mol + 1) % 3, mol));
            assert_eq!(network.n_accepted(mol), 1);
            assert_eq!(network.n_donated(mol), 1);
        }

        let walks = network.closed_walks(6).unwrap();
        for row in &walks {
            assert_eq!(row, &vec![0, 0, 1, 0, 0, 1]);
        }
    }

    #[test]
    fn test_network_of_isolated_molecules() {
        let mut cluster = pair(5.0, Vector3::new(0.957, 0.0, 0.0));
        let network = HBondNetwork::build(&mut cluster, &HBondCriterion::default()).unwrap();
        assert!(network.bonds().is_empty());
        assert_eq!(network.adjacency().sum(), 0);
        assert_eq!(network.closed_walks(3).unwrap(), vec![vec![0, 0, 0]; 2]);
    }

    #[test]
    fn test_classify_checks_molecule_exists() {
        let cluster = pair(2.8, Vector3::new(0.957, 0.0, 0.0));
        let criterion = HBondCriterion::default();
        assert!(matches!(
            classify(&cluster, 99, 99, &criterion),
            Err(WaterError::InvalidTopology(_))
        ));
        assert!(matches!(
            classify(&cluster, 99, 0, &criterion),
            Err(WaterError::InvalidTopology(_))
        ));
    }

    /// Five molecules, each donating to the next two.
    fn tournament() -> HBondNetwork {
        let n = 5;
        let adjacency = DMatrix::from_fn(n, n, |i, j| {
            if j == (i + 1) % n || j == (i + 2) % n {
                1
            } else {
                0
            }
        });
        HBondNetwork {
            adjacency,
            bonds: Vec::new(),
        }
    }

    #[test]
    fn test_closed_walks_of_tournament() {
        let walks = tournament().closed_walks(20).unwrap();
        // 0→1→3→0, 0→2→3→0 and 0→2→4→0
        assert_eq!(walks[0][..3], [0, 0, 3]);
        assert!(walks.iter().all(|row| row.len() == 20 && row == &walks[0]));
    }

    #[test]
    fn test_closed_walks_overflow() {
        assert!(matches!(
            tournament().closed_walks(70),
            Err(WaterError::InvalidTopology(_))
        ));
    }
}
