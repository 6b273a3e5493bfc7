//! Water clusters: molecule reconstruction, distance caches and rigid transforms.
//!
//! A [`Cluster`] owns one sequence of atom records, the periodic [`Cell`] and
//! the list of [`Molecule`]s, each holding the indices of its oxygen and two
//! hydrogens. Molecules are reconstructed from bare coordinates with
//! [`Cluster::find_molecules`].
//!
//! # Distance caches
//!
//! The full atom distance matrix and the O–O matrix are computed lazily on
//! first use and kept until [`Cluster::invalidate`] is called. Every method
//! that moves atoms or reorders them calls `invalidate` itself.
//!
//! # Rigid transforms
//!
//! Rotations and mirrors are applied to the atoms *and* to the cell, so
//! fractional coordinates and minimum-image distances survive every rigid
//! transform. Translations leave the cell unchanged.

use crate::cell::{vector_angle, Cell};
use crate::error::{Result, WaterError};
use crate::frame::{Atom, Element, Frame};
use crate::geometry::{align_with_z, bisector, euler_rotation, normalize, plane_normal};
use log::{debug, warn};
use nalgebra::{DMatrix, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Default O–H search radius used while reconstructing molecules.
pub const DEFAULT_OH_CUTOFF: f64 = 4.5;

/// Upper bound on wrapping passes before giving up.
const MAX_WRAP_PASSES: usize = 8;

/// Atom indices of one water molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Molecule {
    /// Index of the oxygen atom
    pub oxygen: usize,
    /// Indices of the two hydrogen atoms
    pub hydrogens: [usize; 2],
}

impl Molecule {
    /// Creates a molecule from its oxygen and hydrogen indices.
    pub fn new(oxygen: usize, h1: usize, h2: usize) -> Self {
        Self {
            oxygen,
            hydrogens: [h1, h2],
        }
    }

    /// Indices as `[O, H1, H2]`.
    pub fn atoms(&self) -> [usize; 3] {
        [self.oxygen, self.hydrogens[0], self.hydrogens[1]]
    }

    /// Whether `atom` belongs to this molecule.
    pub fn contains(&self, atom: usize) -> bool {
        self.atoms().contains(&atom)
    }
}

/// Atoms of a frame partitioned into water molecules.
#[derive(Debug, Clone)]
pub struct Cluster {
    atoms: Vec<Atom>,
    cell: Cell,
    molecules: Vec<Molecule>,
    distances: Option<DMatrix<f64>>,
    oo_distances: Option<DMatrix<f64>>,
}

impl Cluster {
    /// Creates a cluster without molecules from atom records and a cell.
    ///
    /// # Errors
    ///
    /// Returns [`WaterError::InvalidTopology`] if `atoms` is empty.
    pub fn new(atoms: Vec<Atom>, cell: Cell) -> Result<Self> {
        if atoms.is_empty() {
            return Err(WaterError::InvalidTopology(
                "number of atoms must be larger than 0".to_string(),
            ));
        }
        Ok(Self {
            atoms,
            cell,
            molecules: Vec::new(),
            distances: None,
            oo_distances: None,
        })
    }

    /// Creates a cluster from a frame and reconstructs its molecules.
    pub fn from_frame(frame: Frame, oh_cutoff: f64) -> Result<Self> {
        let (atoms, cell) = frame.into_parts();
        let mut cluster = Self::new(atoms, cell)?;
        cluster.find_molecules(oh_cutoff)?;
        Ok(cluster)
    }

    /// Atom records.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Current cell. Rotated and mirrored along with the atoms.
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Molecules in oxygen frame order.
    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    /// Number of atoms.
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Number of molecules found so far.
    pub fn num_molecules(&self) -> usize {
        self.molecules.len()
    }

    /// Position of atom `i`.
    pub fn position(&self, i: usize) -> &Vector3<f64> {
        &self.atoms[i].position
    }

    /// Molecule `index`.
    ///
    /// # Errors
    ///
    /// Returns [`WaterError::InvalidTopology`] if there is no such molecule.
    pub fn molecule(&self, index: usize) -> Result<Molecule> {
        self.molecules.get(index).copied().ok_or_else(|| {
            WaterError::InvalidTopology(format!(
                "molecule {} requested but the cluster has {} molecules",
                index,
                self.molecules.len()
            ))
        })
    }

    /// Partitions the atoms into water molecules.
    ///
    /// Oxygens are visited in frame order. Each takes the two closest
    /// hydrogens, among those not yet assigned and closer than `cutoff`
    /// (minimum image). Distance ties go to the hydrogen that comes first in
    /// the frame. The cutoff only prunes the search.
    ///
    /// This is a greedy assignment, not a global optimum: in strained or
    /// ambiguous geometries an early oxygen can take a hydrogen that a later
    /// one would have matched better.
    ///
    /// # Errors
    ///
    /// - [`WaterError::InvalidTopology`] if a label is neither `O` nor `H`, the
    ///   atom count is not a multiple of 3, or there are not two H per O
    /// - [`WaterError::InsufficientNeighbors`] if some oxygen finds fewer than
    ///   two free hydrogens within the cutoff
    pub fn find_molecules(&mut self, cutoff: f64) -> Result<()> {
        let mut oxygens = Vec::new();
        let mut hydrogens = Vec::new();
        for (i, atom) in self.atoms.iter().enumerate() {
            match atom.element() {
                Some(Element::Oxygen) => oxygens.push(i),
                Some(Element::Hydrogen) => hydrogens.push(i),
                None => {
                    return Err(WaterError::InvalidTopology(format!(
                        "atom {} has label '{}', expected O or H",
                        i, atom.label
                    )))
                }
            }
        }

        if self.atoms.len() % 3 != 0 {
            return Err(WaterError::InvalidTopology(format!(
                "{} atoms cannot form whole water molecules",
                self.atoms.len()
            )));
        }
        if hydrogens.len() != 2 * oxygens.len() {
            return Err(WaterError::InvalidTopology(format!(
                "found {} O and {} H, expected two H per O",
                oxygens.len(),
                hydrogens.len()
            )));
        }

        let mut assigned = vec![false; self.atoms.len()];
        let mut molecules = Vec::with_capacity(oxygens.len());

        for &io in &oxygens {
            let mut candidates: Vec<(f64, usize)> = hydrogens
                .iter()
                .filter(|&&ih| !assigned[ih])
                .map(|&ih| (self.distance(io, ih), ih))
                .filter(|&(d, _)| d < cutoff)
                .collect();

            if candidates.len() < 2 {
                return Err(WaterError::InsufficientNeighbors(format!(
                    "oxygen {} has {} free hydrogens within {:.3}",
                    io,
                    candidates.len(),
                    cutoff
                )));
            }

            // stable: equal distances keep frame order
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
            let (h1, h2) = (candidates[0].1, candidates[1].1);
            assigned[h1] = true;
            assigned[h2] = true;
            molecules.push(Molecule::new(io, h1, h2));
        }

        debug!(
            "Reconstructed {} water molecules from {} atoms",
            molecules.len(),
            self.atoms.len()
        );

        self.molecules = molecules;
        self.oo_distances = None;
        Ok(())
    }

    /// Replaces the molecule list with a known partition.
    ///
    /// # Errors
    ///
    /// Returns [`WaterError::InvalidTopology`] unless every atom appears in
    /// exactly one molecule and each molecule is made of one O and two H.
    pub fn set_molecules(&mut self, molecules: Vec<Molecule>) -> Result<()> {
        let mut seen = vec![false; self.atoms.len()];
        for (m, molecule) in molecules.iter().enumerate() {
            for (slot, &atom) in molecule.atoms().iter().enumerate() {
                let expected = if slot == 0 {
                    Element::Oxygen
                } else {
                    Element::Hydrogen
                };
                let element = self.atoms.get(atom).and_then(Atom::element);
                if element != Some(expected) {
                    return Err(WaterError::InvalidTopology(format!(
                        "molecule {} slot {} must reference an {} atom",
                        m, slot, expected
                    )));
                }
                if seen[atom] {
                    return Err(WaterError::InvalidTopology(format!(
                        "atom {} belongs to more than one molecule",
                        atom
                    )));
                }
                seen[atom] = true;
            }
        }
        if let Some(orphan) = seen.iter().position(|&s| !s) {
            return Err(WaterError::InvalidTopology(format!(
                "atom {} is not part of any molecule",
                orphan
            )));
        }

        self.molecules = molecules;
        self.oo_distances = None;
        Ok(())
    }

    /// Drops the cached distance matrices.
    pub fn invalidate(&mut self) {
        self.distances = None;
        self.oo_distances = None;
    }

    /// Minimum-image distance between atoms `i` and `j`, from the cache when present.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        match &self.distances {
            Some(d) => d[(i, j)],
            None => self
                .cell
                .distance(&self.atoms[i].position, &self.atoms[j].position),
        }
    }

    /// Minimum-image displacement from atom `i` to atom `j`.
    pub fn displacement(&self, i: usize, j: usize) -> Vector3<f64> {
        self.cell
            .displacement(&self.atoms[i].position, &self.atoms[j].position)
    }

    /// Minimum-image angle `end1 – vertex – end2` between atoms, in radians.
    pub fn angle(&self, end1: usize, vertex: usize, end2: usize) -> Result<f64> {
        self.cell.angle(
            &self.atoms[end1].position,
            &self.atoms[vertex].position,
            &self.atoms[end2].position,
        )
    }

    /// Symmetric, zero-diagonal matrix of all minimum-image atom distances.
    pub fn distance_matrix(&mut self) -> &DMatrix<f64> {
        let matrix = match self.distances.take() {
            Some(matrix) => matrix,
            None => {
                let n = self.atoms.len();
                let mut matrix = DMatrix::zeros(n, n);
                for i in 0..n {
                    for j in 0..i {
                        let d = self
                            .cell
                            .distance(&self.atoms[i].position, &self.atoms[j].position);
                        matrix[(i, j)] = d;
                        matrix[(j, i)] = d;
                    }
                }
                matrix
            }
        };
        self.distances.insert(matrix)
    }

    /// O–O distance matrix indexed by molecule.
    ///
    /// Taken from the full distance matrix when it is cached, computed
    /// directly otherwise.
    pub fn oo_distances(&mut self) -> &DMatrix<f64> {
        let matrix = match self.oo_distances.take() {
            Some(matrix) => matrix,
            None => {
                let n = self.molecules.len();
                let mut matrix = DMatrix::zeros(n, n);
                for a in 0..n {
                    for b in 0..a {
                        let d = self.distance(self.molecules[a].oxygen, self.molecules[b].oxygen);
                        matrix[(a, b)] = d;
                        matrix[(b, a)] = d;
                    }
                }
                matrix
            }
        };
        self.oo_distances.insert(matrix)
    }

    /// Translates every atom by `shift`.
    pub fn translate(&mut self, shift: &Vector3<f64>) {
        for atom in self.atoms.iter_mut() {
            atom.position += shift;
        }
        self.invalidate();
    }

    /// Rotates every atom, and the cell, by `rotation`.
    pub fn rotate(&mut self, rotation: &Rotation3<f64>) {
        for atom in self.atoms.iter_mut() {
            atom.position = rotation * atom.position;
        }
        self.cell = self.cell.rotated(rotation);
        self.invalidate();
    }

    /// Applies the Euler rotation `Rz(α)·Ry(β)·Rz(γ)` to every atom (radians).
    pub fn euler_rotate(&mut self, alpha: f64, beta: f64, gamma: f64) {
        self.rotate(&euler_rotation(alpha, beta, gamma));
    }

    /// Mirrors every atom, and the cell, through the xy plane.
    pub fn mirror_xy(&mut self) {
        for atom in self.atoms.iter_mut() {
            atom.position.z = -atom.position.z;
        }
        self.cell = self.cell.mirrored_xy();
        self.invalidate();
    }

    /// Mirrors the cluster through the xy plane if the oxygen of `mol` lies below it.
    ///
    /// Returns whether a mirror was applied.
    pub fn mol_above_xy(&mut self, mol: usize) -> Result<bool> {
        let oxygen = self.molecule(mol)?.oxygen;
        if self.atoms[oxygen].position.z < 0.0 {
            self.mirror_xy();
            return Ok(true);
        }
        Ok(false)
    }

    /// Whether every atom has fractional coordinates within `[-0.5, 0.5]`.
    pub fn is_wrapped(&self) -> bool {
        self.atoms.iter().all(|atom| {
            self.cell
                .to_fractional(&atom.position)
                .iter()
                .all(|s| (-0.5..=0.5).contains(s))
        })
    }

    /// Shifts atoms by whole lattice vectors until the cluster is wrapped.
    ///
    /// Minimum-image distances are unchanged. Returns `false` if the
    /// coordinates could not be wrapped (non-finite positions).
    pub fn wrap(&mut self) -> bool {
        let mut passes = 0;
        while !self.is_wrapped() {
            if passes == MAX_WRAP_PASSES {
                warn!(
                    "Coordinates still outside the primary cell after {} wrapping passes",
                    passes
                );
                return false;
            }
            for atom in self.atoms.iter_mut() {
                let shift = self
                    .cell
                    .to_fractional(&atom.position)
                    .map(f64::round_ties_even);
                if shift != Vector3::zeros() {
                    atom.position -= self.cell.to_cartesian(&shift);
                }
            }
            passes += 1;
        }

        if passes > 0 {
            debug!("Wrapped coordinates in {} pass(es)", passes);
            self.invalidate();
        }
        true
    }

    /// Centers the cluster on molecule `mol` and orients it canonically.
    ///
    /// After the call the molecule's oxygen sits at the origin, every atom is
    /// at its minimum image around it, the H–O–H plane normal (`OH1 × OH2`)
    /// points along `+z` and the H–H bisector along `+x`.
    ///
    /// When the bisector ends up with a y component of exactly zero no
    /// in-plane rotation is applied, so a bisector along `-x` stays there.
    ///
    /// # Errors
    ///
    /// - [`WaterError::InvalidTopology`] if `mol` does not exist
    /// - [`WaterError::DegenerateGeometry`] if the molecule is linear, has a
    ///   zero-length O–H arm or the coordinates cannot be wrapped
    pub fn center_and_orient(&mut self, mol: usize) -> Result<()> {
        let molecule = self.molecule(mol)?;
        let [io, ih1, ih2] = molecule.atoms();

        let origin = self.atoms[io].position;
        self.translate(&-origin);
        if !self.wrap() {
            return Err(WaterError::DegenerateGeometry(
                "coordinates cannot be wrapped into the cell".to_string(),
            ));
        }

        let u = normalize(&self.displacement(io, ih1))?;
        let v = normalize(&self.displacement(io, ih2))?;
        let normal = plane_normal(&u, &v)?;
        self.rotate(&align_with_z(&normal));

        let b = bisector(&self.displacement(io, ih1), &self.displacement(io, ih2))?;
        let alpha = vector_angle(&b, &Vector3::x())?;
        if b.y > 0.0 {
            self.euler_rotate(0.0, 0.0, -alpha);
        } else if b.y < 0.0 {
            self.euler_rotate(0.0, 0.0, alpha);
        }

        Ok(())
    }

    /// Swaps atom records `i` and `j`, keeping every molecule pointing at its own atoms.
    ///
    /// # Errors
    ///
    /// Returns [`WaterError::InvalidTopology`] if either atom does not exist.
    pub fn swap_atoms(&mut self, i: usize, j: usize) -> Result<()> {
        let n = self.atoms.len();
        if i >= n || j >= n {
            return Err(WaterError::InvalidTopology(format!(
                "cannot swap atoms {} and {} in a cluster of {} atoms",
                i, j, n
            )));
        }
        if i == j {
            return Ok(());
        }
        self.atoms.swap(i, j);

        let remap = |idx: &mut usize| {
            if *idx == i {
                *idx = j;
            } else if *idx == j {
                *idx = i;
            }
        };
        for molecule in self.molecules.iter_mut() {
            remap(&mut molecule.oxygen);
            for h in molecule.hydrogens.iter_mut() {
                remap(h);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Exchanges which hydrogen of molecule `mol` is listed first.
    pub fn swap_hydrogens(&mut self, mol: usize) -> Result<()> {
        self.molecule(mol)?;
        self.molecules[mol].hydrogens.swap(0, 1);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// O–H bond vectors of a rigid water in its own frame (bisector along +y).
    const H1: [f64; 3] = [0.757, 0.586, 0.0];
    const H2: [f64; 3] = [-0.757, 0.586, 0.0];

    /// Water molecule with oxygen at `o`, rotated by `rotation`.
    pub(crate) fn water(o: Vector3<f64>, rotation: &Rotation3<f64>) -> Vec<Atom> {
        vec![
            Atom::new("O", o),
            Atom::new("H", o + rotation * Vector3::from(H1)),
            Atom::new("H", o + rotation * Vector3::from(H2)),
        ]
    }

    fn three_waters() -> Cluster {
        let mut atoms = Vec::new();
        atoms.extend(water(Vector3::new(1.0, 1.0, 1.0), &Rotation3::identity()));
        atoms.extend(water(
            Vector3::new(6.0, 1.0, 1.0),
            &Rotation3::from_euler_angles(0.4, 0.2, 1.0),
        ));
        atoms.extend(water(
            Vector3::new(1.0, 6.0, 6.0),
            &Rotation3::from_euler_angles(-1.2, 0.7, 0.1),
        ));
        Cluster::new(atoms, Cell::cubic(12.0).unwrap()).unwrap()
    }

    #[test]
    fn test_find_molecules_three_waters() {
        let mut cluster = three_waters();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        assert_eq!(cluster.num_molecules(), 3);
        for (m, molecule) in cluster.molecules().iter().enumerate() {
            assert_eq!(molecule.oxygen, 3 * m);
            let mut h = molecule.hydrogens;
            h.sort_unstable();
            assert_eq!(h, [3 * m + 1, 3 * m + 2]);
        }
    }

    #[test]
    fn test_find_molecules_shuffled_order() {
        // O O H H H H with molecules split across the periodic boundary
        let cell = Cell::cubic(10.0).unwrap();
        let atoms = vec![
            Atom::new("O", Vector3::new(9.8, 5.0, 5.0)),
            Atom::new("O", Vector3::new(4.0, 5.0, 5.0)),
            Atom::new("H", Vector3::new(4.7, 5.6, 5.0)),
            Atom::new("H", Vector3::new(0.55, 5.6, 5.0)),
            Atom::new("H", Vector3::new(3.3, 5.6, 5.0)),
            Atom::new("H", Vector3::new(9.05, 5.6, 5.0)),
        ];
        let mut cluster = Cluster::new(atoms, cell).unwrap();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        let molecules = cluster.molecules();
        assert_eq!(molecules[0].oxygen, 0);
        let mut h0 = molecules[0].hydrogens;
        h0.sort_unstable();
        assert_eq!(h0, [3, 5]);
        let mut h1 = molecules[1].hydrogens;
        h1.sort_unstable();
        assert_eq!(h1, [2, 4]);
    }

    #[test]
    fn test_find_molecules_rejects_unknown_label() {
        let mut atoms = water(Vector3::new(1.0, 1.0, 1.0), &Rotation3::identity());
        atoms[1].label = "C".to_string();
        let mut cluster = Cluster::new(atoms, Cell::cubic(10.0).unwrap()).unwrap();
        assert!(matches!(
            cluster.find_molecules(DEFAULT_OH_CUTOFF),
            Err(WaterError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_find_molecules_rejects_wrong_ratio() {
        let atoms = vec![
            Atom::new("O", Vector3::new(0.0, 0.0, 0.0)),
            Atom::new("O", Vector3::new(3.0, 0.0, 0.0)),
            Atom::new("H", Vector3::new(0.9, 0.0, 0.0)),
        ];
        let mut cluster = Cluster::new(atoms, Cell::cubic(10.0).unwrap()).unwrap();
        assert!(matches!(
            cluster.find_molecules(DEFAULT_OH_CUTOFF),
            Err(WaterError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_find_molecules_insufficient_neighbors() {
        let mut cluster = three_waters();
        assert!(matches!(
            cluster.find_molecules(0.5),
            Err(WaterError::InsufficientNeighbors(_))
        ));
    }

    #[test]
    fn test_greedy_assignment_removes_taken_hydrogens() {
        // The first oxygen grabs the two hydrogens nearest to it; the second
        // one has to settle for the remaining pair.
        let atoms = vec![
            Atom::new("O", Vector3::new(0.0, 0.0, 0.0)),
            Atom::new("O", Vector3::new(1.5, 0.0, 0.0)),
            Atom::new("H", Vector3::new(0.9, 0.0, 0.0)),
            Atom::new("H", Vector3::new(-0.9, 0.0, 0.0)),
            Atom::new("H", Vector3::new(2.4, 0.0, 0.0)),
            Atom::new("H", Vector3::new(1.5, 1.0, 0.0)),
        ];
        let mut cluster = Cluster::new(atoms, Cell::cubic(20.0).unwrap()).unwrap();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        assert_eq!(cluster.molecules()[0], Molecule::new(0, 2, 3));
        assert_eq!(cluster.molecules()[1], Molecule::new(1, 4, 5));
    }

    #[test]
    fn test_set_molecules_validates_partition() {
        let mut cluster = three_waters();
        let good = vec![
            Molecule::new(0, 1, 2),
            Molecule::new(3, 4, 5),
            Molecule::new(6, 7, 8),
        ];
        cluster.set_molecules(good).unwrap();

        let duplicated = vec![
            Molecule::new(0, 1, 2),
            Molecule::new(3, 4, 4),
            Molecule::new(6, 7, 8),
        ];
        assert!(cluster.set_molecules(duplicated).is_err());

        let wrong_slot = vec![
            Molecule::new(1, 0, 2),
            Molecule::new(3, 4, 5),
            Molecule::new(6, 7, 8),
        ];
        assert!(cluster.set_molecules(wrong_slot).is_err());
    }

    #[test]
    fn test_distance_matrix_symmetric_and_cached() {
        let mut cluster = three_waters();
        let n = cluster.num_atoms();
        let d = cluster.distance_matrix().clone();
        for i in 0..n {
            assert_eq!(d[(i, i)], 0.0);
            for j in 0..n {
                assert_eq!(d[(i, j)], d[(j, i)]);
            }
        }
        assert!(cluster.distances.is_some());
        cluster.translate(&Vector3::new(0.1, 0.0, 0.0));
        assert!(cluster.distances.is_none());
        assert!(cluster.oo_distances.is_none());
    }

    #[test]
    fn test_oo_distances_match_direct() {
        let mut direct = three_waters();
        direct.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        let mut from_full = direct.clone();
        from_full.distance_matrix();

        let a = direct.oo_distances().clone();
        let b = from_full.oo_distances().clone();
        assert_eq!(a.nrows(), 3);
        assert!((a - b).norm() < 1e-12);
    }

    #[test]
    fn test_wrap_after_lattice_translation() {
        let cell = Cell::from_vectors(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(1.0, 11.0, 0.0),
            Vector3::new(-2.0, 1.0, 9.0),
        )
        .unwrap();
        let atoms = water(Vector3::new(0.5, -0.3, 0.2), &Rotation3::identity());
        let mut cluster = Cluster::new(atoms, cell.clone()).unwrap();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        let before = cluster.distance_matrix().clone();

        let shift = cell.lattice_vector(0) * 3.0 - cell.lattice_vector(1) * 2.0
            + cell.lattice_vector(2) * 5.0;
        cluster.translate(&shift);
        assert!(!cluster.is_wrapped());

        assert!(cluster.wrap());
        assert!(cluster.is_wrapped());
        let after = cluster.distance_matrix().clone();
        assert!((before - after).norm() < 1e-9);
    }

    #[test]
    fn test_center_and_orient_canonical_frame() {
        let rotations = [
            Rotation3::from_euler_angles(0.3, -0.8, 2.1),
            Rotation3::from_euler_angles(-2.5, 1.2, -0.4),
            Rotation3::from_euler_angles(PI, 0.1, 0.7),
        ];
        for rotation in rotations.iter() {
            let mut atoms = water(Vector3::new(9.6, 0.2, 4.0), rotation);
            atoms.extend(water(
                Vector3::new(2.0, 3.0, 3.0),
                &Rotation3::from_euler_angles(0.5, 0.5, 0.5),
            ));
            let mut cluster = Cluster::new(atoms, Cell::cubic(10.0).unwrap()).unwrap();
            cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
            let d_before = cluster.distance_matrix().clone();

            cluster.center_and_orient(0).unwrap();

            let [io, ih1, ih2] = cluster.molecules()[0].atoms();
            assert!(cluster.position(io).norm() < 1e-12);
            let h1 = cluster.position(ih1);
            let h2 = cluster.position(ih2);
            let b = (h1 + h2).normalize();
            assert!((b - Vector3::x()).norm() < 1e-9, "bisector {:?}", b);
            let n = h1.cross(h2).normalize();
            assert!((n - Vector3::z()).norm() < 1e-9, "normal {:?}", n);

            let d_after = cluster.distance_matrix().clone();
            assert!((d_before - d_after).norm() < 1e-9);
        }
    }

    #[test]
    fn test_mirror_and_mol_above_xy() {
        let mut atoms = water(Vector3::new(0.0, 0.0, 0.0), &Rotation3::identity());
        atoms.extend(water(Vector3::new(0.0, 1.0, -2.8), &Rotation3::identity()));
        let mut cluster = Cluster::new(atoms, Cell::cubic(20.0).unwrap()).unwrap();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();

        assert!(!cluster.mol_above_xy(0).unwrap());
        assert!(cluster.mol_above_xy(1).unwrap());
        assert!((cluster.position(3).z - 2.8).abs() < 1e-12);
        assert!(!cluster.mol_above_xy(1).unwrap());
    }

    #[test]
    fn test_swap_atoms_keeps_molecules_consistent() {
        let mut cluster = three_waters();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        let positions: Vec<[Vector3<f64>; 3]> = cluster
            .molecules()
            .iter()
            .map(|m| m.atoms().map(|i| *cluster.position(i)))
            .collect();

        cluster.swap_atoms(1, 5).unwrap();
        cluster.swap_atoms(0, 6).unwrap();

        for (m, molecule) in cluster.molecules().iter().enumerate() {
            let now = molecule.atoms().map(|i| *cluster.position(i));
            assert_eq!(now, positions[m]);
            assert_eq!(cluster.atoms()[molecule.oxygen].label, "O");
        }
    }

    #[test]
    fn test_swap_atoms_out_of_range() {
        let mut cluster = three_waters();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        assert!(matches!(
            cluster.swap_atoms(0, 9),
            Err(WaterError::InvalidTopology(_))
        ));
        assert!(matches!(
            cluster.swap_atoms(42, 42),
            Err(WaterError::InvalidTopology(_))
        ));
        assert_eq!(cluster.atoms()[0].label, "O");
    }

    #[test]
    fn test_center_and_orient_rejects_unwrappable_coordinates() {
        let mut cluster = three_waters();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        cluster.atoms[4].position = Vector3::new(f64::NAN, 0.0, 0.0);
        assert!(matches!(
            cluster.center_and_orient(0),
            Err(WaterError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_swap_hydrogens() {
        let mut cluster = three_waters();
        cluster.find_molecules(DEFAULT_OH_CUTOFF).unwrap();
        let [_, h1, h2] = cluster.molecules()[1].atoms();
        cluster.swap_hydrogens(1).unwrap();
        assert_eq!(cluster.molecules()[1].hydrogens, [h2, h1]);
        assert!(cluster.swap_hydrogens(7).is_err());
    }
}
