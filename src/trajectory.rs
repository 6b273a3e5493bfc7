//! Reading and writing multi-frame XYZ trajectories.
//!
//! A trajectory is a sequence of frames, each in the usual XYZ layout:
//!
//! ```text
//! 6
//! dimer 1
//! O   0.000  0.000  0.000
//! H   0.757  0.586  0.000
//! H  -0.757  0.586  0.000
//! O   2.900  0.000  0.000
//! H   3.300  0.800  0.300
//! H   3.300 -0.800  0.300
//! ```
//!
//! Frames follow each other until the end of the file. Blank lines between
//! frames and at the end are ignored; extra columns after `z` are ignored.
//! The cell is not part of the file and is supplied when a [`RawFrame`] is
//! turned into a [`Frame`].
//!
//! # Examples
//!
//! ```
//! use waterpack::trajectory::parse_trajectory;
//!
//! let text = "1\nsingle atom\nO 0.0 0.0 0.0\n";
//! let frames = parse_trajectory(text).unwrap();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].comment, "single atom");
//! ```

use crate::cell::Cell;
use crate::frame::{Atom, CoordinateKind, Frame};
use lazy_static::lazy_static;
use nalgebra::Vector3;
use regex::Regex;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

lazy_static! {
    // Numbers such as 1, -0.032, 1.2e-4 or .5
    static ref FLOAT_RE: String = r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?".to_string();

    // Atom count line: "  192"
    static ref COUNT_RE: Regex = Regex::new(r"^\s*(\d+)\s*$").unwrap();

    // Atom line: "O  1.234  -0.5  3e-1  [anything]"
    static ref ATOM_RE: Regex = Regex::new(&format!(
        r"^\s*([A-Za-z][A-Za-z0-9_]*)\s+({0})\s+({0})\s+({0})(?:\s.*)?$",
        *FLOAT_RE
    ))
    .unwrap();
}

/// Error type for trajectory reading.
#[derive(Error, Debug)]
pub enum ParseError {
    /// I/O error when reading the file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed content, with the 1-based line number
    #[error("Parse error at line {line}: {message}")]
    Format {
        /// Line where the problem was found
        line: usize,
        /// What was expected
        message: String,
    },
}

/// Type alias for parse operation results
type Result<T> = std::result::Result<T, ParseError>;

/// One frame as read from the file, before a cell is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Atom count declared on the first line of the frame
    pub declared_atoms: usize,
    /// Comment line, without surrounding whitespace
    pub comment: String,
    /// `(label, [x, y, z])` records in file order
    pub records: Vec<(String, [f64; 3])>,
    /// Line number of the atom count line
    pub line: usize,
}

impl RawFrame {
    /// Builds a validated [`Frame`] in `cell`.
    pub fn into_frame(self, cell: &Cell, kind: CoordinateKind) -> crate::error::Result<Frame> {
        Frame::new(self.declared_atoms, cell.clone(), self.records, kind)
    }
}

/// Parses every frame of a trajectory held in memory.
pub fn parse_trajectory(text: &str) -> Result<Vec<RawFrame>> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l)).peekable();
    let mut frames = Vec::new();

    loop {
        while matches!(lines.peek(), Some((_, l)) if l.trim().is_empty()) {
            lines.next();
        }
        let Some((count_line, count_text)) = lines.next() else {
            break;
        };

        let declared_atoms: usize = COUNT_RE
            .captures(count_text)
            .and_then(|caps| caps[1].parse().ok())
            .ok_or_else(|| ParseError::Format {
                line: count_line,
                message: format!("expected an atom count, found '{}'", count_text.trim()),
            })?;

        let comment = match lines.next() {
            Some((_, l)) => l.trim().to_string(),
            None => {
                return Err(ParseError::Format {
                    line: count_line + 1,
                    message: "file ended before the comment line".to_string(),
                })
            }
        };

        let mut records = Vec::with_capacity(declared_atoms);
        for k in 0..declared_atoms {
            let (line, atom_text) = lines.next().ok_or_else(|| ParseError::Format {
                line: count_line + 2 + k,
                message: format!(
                    "file ended after {} of {} atom lines",
                    k, declared_atoms
                ),
            })?;
            records.push(parse_atom_line(line, atom_text)?);
        }

        frames.push(RawFrame {
            declared_atoms,
            comment,
            records,
            line: count_line,
        });
    }

    Ok(frames)
}

fn parse_atom_line(line: usize, text: &str) -> Result<(String, [f64; 3])> {
    let caps = ATOM_RE.captures(text).ok_or_else(|| ParseError::Format {
        line,
        message: format!("expected 'label x y z', found '{}'", text.trim()),
    })?;

    let mut xyz = [0.0; 3];
    for (k, value) in xyz.iter_mut().enumerate() {
        *value = caps[k + 2].parse().map_err(|_| ParseError::Format {
            line,
            message: format!("invalid coordinate '{}'", &caps[k + 2]),
        })?;
    }
    Ok((caps[1].to_string(), xyz))
}

/// Reads and parses a trajectory file.
pub fn read_trajectory(path: &Path) -> Result<Vec<RawFrame>> {
    let content = fs::read_to_string(path)?;
    parse_trajectory(&content)
}

/// Formats atoms as one XYZ frame.
///
/// With `marker` an extra `He` atom is appended at that point, which helps
/// to visualize a direction or a center next to the molecules.
pub fn format_xyz(atoms: &[Atom], comment: &str, marker: Option<&Vector3<f64>>) -> String {
    let count = atoms.len() + usize::from(marker.is_some());
    let mut out = String::new();
    let _ = writeln!(out, "{}", count);
    let _ = writeln!(out, "{}", comment);
    for atom in atoms {
        write_atom(&mut out, &atom.label, &atom.position);
    }
    if let Some(point) = marker {
        write_atom(&mut out, "He", point);
    }
    out
}

fn write_atom(out: &mut String, label: &str, r: &Vector3<f64>) {
    let _ = writeln!(out, "{:<4}{:16.8}{:16.8}{:16.8}", label, r.x, r.y, r.z);
}
