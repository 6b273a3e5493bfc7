//! Snapshots of labeled atoms in a periodic cell.
//!
//! A [`Frame`] is the validated, immutable form of one trajectory entry: an
//! ordered sequence of [`Atom`] records and the [`Cell`] they live in. It is
//! turned into a mutable [`Cluster`](crate::cluster::Cluster) for analysis.

use crate::cell::Cell;
use crate::error::{Result, WaterError};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chemical element of an atom in a water frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    /// Oxygen, label `"O"`
    Oxygen,
    /// Hydrogen, label `"H"`
    Hydrogen,
}

impl Element {
    /// Parses an atom label. Only the exact labels `"O"` and `"H"` are recognized.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "O" => Some(Element::Oxygen),
            "H" => Some(Element::Hydrogen),
            _ => None,
        }
    }

    /// Canonical label of the element.
    pub fn label(self) -> &'static str {
        match self {
            Element::Oxygen => "O",
            Element::Hydrogen => "H",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the positions handed to [`Frame::new`] are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordinateKind {
    /// Cartesian positions, in the length unit of the cell
    #[default]
    Cartesian,
    /// Fractional positions in the basis of the lattice vectors
    Crystal,
}

/// A single atom: its type label and cartesian position.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Type label as read from the input (`"O"` or `"H"` for water)
    pub label: String,
    /// Cartesian position
    pub position: Vector3<f64>,
}

impl Atom {
    /// Creates an atom from a label and a position.
    pub fn new(label: impl Into<String>, position: Vector3<f64>) -> Self {
        Self {
            label: label.into(),
            position,
        }
    }

    /// Element of the atom, if the label is a water element.
    pub fn element(&self) -> Option<Element> {
        Element::from_label(&self.label)
    }
}

/// Validated snapshot: atoms plus the cell they belong to.
#[derive(Debug, Clone)]
pub struct Frame {
    atoms: Vec<Atom>,
    cell: Cell,
}

impl Frame {
    /// Builds a frame from a declared atom count and parsed `(label, [x, y, z])` records.
    ///
    /// With [`CoordinateKind::Crystal`] the records are fractional coordinates
    /// and are converted to cartesian positions with the cell matrix.
    ///
    /// # Errors
    ///
    /// Returns [`WaterError::InvalidTopology`] if `declared_atoms` is zero or
    /// does not match the number of records.
    pub fn new(
        declared_atoms: usize,
        cell: Cell,
        records: Vec<(String, [f64; 3])>,
        kind: CoordinateKind,
    ) -> Result<Self> {
        if declared_atoms < 1 {
            return Err(WaterError::InvalidTopology(
                "number of atoms must be larger than 0".to_string(),
            ));
        }
        if records.len() != declared_atoms {
            return Err(WaterError::InvalidTopology(format!(
                "frame declares {} atoms but {} records were given",
                declared_atoms,
                records.len()
            )));
        }

        let atoms = records
            .into_iter()
            .map(|(label, xyz)| {
                let r = Vector3::from(xyz);
                let position = match kind {
                    CoordinateKind::Cartesian => r,
                    CoordinateKind::Crystal => cell.to_cartesian(&r),
                };
                Atom { label, position }
            })
            .collect();

        Ok(Self { atoms, cell })
    }

    /// Builds a frame directly from atom records.
    pub fn from_atoms(atoms: Vec<Atom>, cell: Cell) -> Result<Self> {
        if atoms.is_empty() {
            return Err(WaterError::InvalidTopology(
                "number of atoms must be larger than 0".to_string(),
            ));
        }
        Ok(Self { atoms, cell })
    }

    /// Atom records in frame order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Simulation cell.
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Number of atoms.
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Minimum-image distance between atoms `i` and `j`.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.cell
            .distance(&self.atoms[i].position, &self.atoms[j].position)
    }

    /// Splits the frame into its atoms and cell.
    pub fn into_parts(self) -> (Vec<Atom>, Cell) {
        (self.atoms, self.cell)
    }
}
