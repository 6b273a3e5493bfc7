//! Error taxonomy shared by the geometry, reconstruction and analysis modules.
//!
//! Every error is raised at the point where a precondition is violated and is
//! propagated unchanged to the caller. Nothing in the library retries or
//! produces partial results for the offending frame; the frame driver decides
//! whether to skip, abort or log.

use thiserror::Error;

/// Errors raised while building or analyzing a water cluster.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaterError {
    /// Singular or otherwise unusable lattice matrix
    #[error("Invalid cell: {0}")]
    InvalidCell(String),
    /// Atom labels, counts or the O:H ratio do not describe whole water molecules
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
    /// A neighbor search found fewer candidates than the operation needs
    #[error("Insufficient neighbors: {0}")]
    InsufficientNeighbors(String),
    /// Zero-length or collinear vectors where a direction or plane is required
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

/// Type alias for results of cluster operations
pub type Result<T> = std::result::Result<T, WaterError>;
