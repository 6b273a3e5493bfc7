//! Per-molecule result records and their text and JSON renderings.
//!
//! Every analysis produces a flat record per molecule (or per dimer). Records
//! are written either as tab-separated text rows, where each field is cut to a
//! fixed number of characters, or as one JSON object per line.

use crate::config::OutputFormat;
use crate::dimer::{DimerCoordinates, HBondCoordinates};
use serde::{Deserialize, Serialize};
use std::io::Write;
use thiserror::Error;

/// Errors raised while writing records.
#[derive(Error, Debug)]
pub enum ReportError {
    /// I/O error on the output stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A result row that can be rendered as text or JSON.
pub trait Record: Serialize {
    /// Column names of the text rendering.
    fn header() -> Vec<String>
    where
        Self: Sized;

    /// Field values in column order, not yet truncated.
    fn fields(&self) -> Vec<String>;
}

/// Order parameters of one molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Frame index in the trajectory
    pub frame: usize,
    /// Molecule index in the frame
    pub molecule: usize,
    /// Orientational tetrahedral order
    pub q: f64,
    /// Translational tetrahedral order
    pub sk: f64,
    /// Local structure index
    pub lsi: f64,
}

impl Record for OrderRecord {
    fn header() -> Vec<String> {
        ["frame", "mol", "q", "Sk", "LSI"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.frame.to_string(),
            self.molecule.to_string(),
            self.q.to_string(),
            self.sk.to_string(),
            self.lsi.to_string(),
        ]
    }
}

/// Hydrogen-bond counts of one molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Frame index in the trajectory
    pub frame: usize,
    /// Molecule index in the frame
    pub molecule: usize,
    /// Bonds accepted
    pub n_accepted: i64,
    /// Bonds donated
    pub n_donated: i64,
    /// Closed walks of length 1, 2, ... through the molecule
    pub closed_walks: Vec<i64>,
}

impl NetworkRecord {
    /// Column names for walks up to `max_len`.
    pub fn header_for(max_len: usize) -> Vec<String> {
        let mut header: Vec<String> = ["frame", "mol", "Nacc", "Ndon"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        header.extend((1..=max_len).map(|k| format!("N{}", k)));
        header
    }
}

impl Record for NetworkRecord {
    fn header() -> Vec<String> {
        Self::header_for(crate::config::DEFAULT_MAX_LOOP_LENGTH)
    }

    fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.frame.to_string(),
            self.molecule.to_string(),
            self.n_accepted.to_string(),
            self.n_donated.to_string(),
        ];
        fields.extend(self.closed_walks.iter().map(|n| n.to_string()));
        fields
    }
}

/// Internal and hydrogen-bond coordinates of one dimer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimerRecord {
    /// Frame index in the trajectory
    pub frame: usize,
    /// Donor molecule
    pub donor: usize,
    /// Acceptor molecule
    pub acceptor: usize,
    /// Twelve dimer coordinates
    pub coordinates: DimerCoordinates,
    /// Hydrogen-bond coordinates
    pub hbond: HBondCoordinates,
}

impl Record for DimerRecord {
    fn header() -> Vec<String> {
        [
            "rOO", "phi", "theta", "rOH11", "rOH12", "rOH21", "rOH22", "HOH1", "HOH2", "alpha",
            "beta", "gamma", "nu", "mu", "dOdH", "dOaH", "OdHOa",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// The `Od–H–Oa` angle is written in degrees, every other angle in radians.
    fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .coordinates
            .to_array()
            .iter()
            .map(|x| x.to_string())
            .collect();
        fields.extend(
            [
                self.hbond.nu,
                self.hbond.mu,
                self.hbond.d_donor_h,
                self.hbond.d_acceptor_h,
                self.hbond.angle_od_h_oa.to_degrees(),
            ]
            .iter()
            .map(|x| x.to_string()),
        );
        fields
    }
}

/// Keeps the first `width` characters of a field.
pub fn truncate_field(field: &str, width: usize) -> &str {
    match field.char_indices().nth(width) {
        Some((end, _)) => &field[..end],
        None => field,
    }
}

/// Tab-separated text row with every field cut to `width` characters.
pub fn text_row<R: Record>(record: &R, width: usize) -> String {
    record
        .fields()
        .iter()
        .map(|f| truncate_field(f, width))
        .collect::<Vec<_>>()
        .join("\t")
}

/// Single-line JSON rendering of a record.
pub fn json_line<R: Record>(record: &R) -> Result<String, ReportError> {
    Ok(serde_json::to_string(record)?)
}

/// Writes records in the requested format.
///
/// Text output starts with a `#`-prefixed header line built from `header`.
pub fn write_records<R: Record, W: Write>(
    out: &mut W,
    records: &[R],
    header: &[String],
    format: OutputFormat,
    width: usize,
) -> Result<(), ReportError> {
    match format {
        OutputFormat::Text => {
            writeln!(out, "# {}", header.join("\t"))?;
            for record in records {
                writeln!(out, "{}", text_row(record, width))?;
            }
        }
        OutputFormat::Json => {
            for record in records {
                writeln!(out, "{}", json_line(record)?)?;
            }
        }
    }
    Ok(())
}
