#![deny(missing_docs)]

//! waterpack - Hydrogen-Bond Networks and Structural Order of Liquid Water
//!
//! waterpack analyzes molecular-dynamics trajectories of water. It rebuilds
//! the molecules of every frame from bare O/H coordinates under periodic
//! boundary conditions, detects hydrogen bonds, and computes per-molecule
//! structural order parameters and dimer internal coordinates.
//!
//! # Overview
//!
//! Every frame goes through the same pipeline:
//!
//! 1. **Molecules**: each oxygen takes its two nearest free hydrogens
//!    (minimum image), giving a list of `(O, H, H)` index triplets
//! 2. **Analysis** on the rebuilt [`Cluster`]:
//!    - hydrogen-bond network with accepted/donated counts and closed loops
//!    - tetrahedral order `q`, translational order `Sk` and the local
//!      structure index (LSI)
//!    - dimer coordinates in the canonical frame of the donor molecule
//! 3. **Records**: one row per molecule (or dimer), as text or JSON lines
//!
//! # Hydrogen-Bond Criterion
//!
//! The default follows Corsetti et al. (2013): two molecules are bonded when
//!
//! ```text
//! r(O···O) <= 3.5 Å   and   angle(Oa-Od-Hd) <= 30°
//! ```
//!
//! where the donor and its hydrogen are taken from the shortest
//! intermolecular O–H contact of the pair.
//!
//! # Order Parameters
//!
//! ```text
//! q   = 1 - 3/8 Σ_{j<k} (cos ψ_jk + 1/3)²       (4 nearest oxygens)
//! Sk  = 1 - Σ (d_i - d̄)² / (12 d̄²)              (4 nearest O–O distances)
//! LSI = mean squared deviation of the gaps between neighbor shells
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use waterpack::cell::Cell;
//! use waterpack::config::AnalysisConfig;
//! use waterpack::driver::{analyze_order_frame, run_trajectory};
//! use waterpack::frame::CoordinateKind;
//! use waterpack::trajectory::read_trajectory;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let frames = read_trajectory(Path::new("water.xyz"))?;
//!     let cell = Cell::cubic(14.7222)?;
//!     let config = AnalysisConfig::default();
//!
//!     let report = run_trajectory(frames, &cell, CoordinateKind::Cartesian, |frame, i| {
//!         analyze_order_frame(frame, i, &config)
//!     });
//!     for record in &report.records {
//!         println!("{} {} {}", record.q, record.sk, record.lsi);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cell`](cell/index.html) - Periodic cell and minimum-image geometry
//! - [`geometry`](geometry/index.html) - Vector helpers and Euler rotations
//! - [`frame`](frame/index.html) - Atoms and validated frames
//! - [`cluster`](cluster/index.html) - Molecule reconstruction and rigid transforms
//! - [`hbond`](hbond/index.html) - Hydrogen-bond criterion and network
//! - [`order`](order/index.html) - Tetrahedral order and local structure index
//! - [`dimer`](dimer/index.html) - Dimer internal coordinates
//! - [`config`](config/index.html) - Analysis parameters
//! - [`settings`](settings/index.html) - Settings files
//! - [`trajectory`](trajectory/index.html) - XYZ trajectory reading and writing
//! - [`report`](report/index.html) - Output records
//! - [`driver`](driver/index.html) - Per-frame analyses and the trajectory loop
//!
//! # References
//!
//! - Corsetti, F.; Artacho, E.; Soler, J. M.; Alexandre, S. S.; Fernández-Serra, M.-V.
//!   *J. Chem. Phys.* **2013**, 139, 194502.
//!   [DOI: 10.1063/1.4832141](https://doi.org/10.1063/1.4832141)

pub mod cell;
pub mod cluster;
pub mod config;
pub mod dimer;
pub mod driver;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod hbond;
pub mod order;
pub mod report;
pub mod settings;
pub mod trajectory;

pub use cell::Cell;
pub use cluster::{Cluster, Molecule};
pub use config::AnalysisConfig;
pub use error::{Result, WaterError};
pub use frame::{Atom, Frame};
