//! Per-frame analyses and the trajectory loop.
//!
//! Each `analyze_*_frame` function takes one [`Frame`], rebuilds its
//! molecules and returns the records of that frame. Errors never leave the
//! frame they occur in: [`run_trajectory`] logs them, skips the frame and
//! carries on with the next one.

use crate::cell::Cell;
use crate::cluster::Cluster;
use crate::config::{AnalysisConfig, AnalysisMode, OutputFormat};
use crate::dimer::{dimer_coordinates, find_roles_and_sort, hbond_coordinates};
use crate::error::{Result, WaterError};
use crate::frame::{CoordinateKind, Frame};
use crate::hbond::HBondNetwork;
use crate::order::{lsi, tetrahedral_order};
use crate::report::{write_records, DimerRecord, NetworkRecord, OrderRecord, Record, ReportError};
use crate::trajectory::RawFrame;
use log::{debug, info, warn};
use std::io::Write;

/// Records of a whole trajectory and how many frames were used.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryReport<R> {
    /// Records of every analyzed frame, in frame order
    pub records: Vec<R>,
    /// Frames that produced records
    pub frames_analyzed: usize,
    /// Frames skipped because of an error
    pub frames_skipped: usize,
}

/// Frame counts of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames that produced records
    pub frames_analyzed: usize,
    /// Frames skipped because of an error
    pub frames_skipped: usize,
}

/// Tetrahedral order and LSI of every molecule in `frame`.
pub fn analyze_order_frame(
    frame: Frame,
    index: usize,
    config: &AnalysisConfig,
) -> Result<Vec<OrderRecord>> {
    let mut cluster = Cluster::from_frame(frame, config.oh_cutoff)?;
    cluster.distance_matrix();

    let mut records = Vec::with_capacity(cluster.num_molecules());
    for mol in 0..cluster.num_molecules() {
        let order = tetrahedral_order(&mut cluster, mol)?;
        let structure_index = lsi(&mut cluster, mol, config.lsi_cutoff)?;
        records.push(OrderRecord {
            frame: index,
            molecule: mol,
            q: order.q,
            sk: order.sk,
            lsi: structure_index,
        });
    }
    Ok(records)
}

/// Hydrogen-bond counts and closed walks of every molecule in `frame`.
pub fn analyze_network_frame(
    frame: Frame,
    index: usize,
    config: &AnalysisConfig,
) -> Result<Vec<NetworkRecord>> {
    let mut cluster = Cluster::from_frame(frame, config.oh_cutoff)?;
    let network = HBondNetwork::build(&mut cluster, &config.hbond)?;
    let walks = network.closed_walks(config.max_loop_length)?;

    Ok(walks
        .into_iter()
        .enumerate()
        .map(|(mol, closed_walks)| NetworkRecord {
            frame: index,
            molecule: mol,
            n_accepted: network.n_accepted(mol),
            n_donated: network.n_donated(mol),
            closed_walks,
        })
        .collect())
}

/// Dimer and hydrogen-bond coordinates of a two-molecule frame.
///
/// The donor is put in its canonical frame and the acceptor above the xy
/// plane before the coordinates are taken.
pub fn analyze_dimer_frame(
    frame: Frame,
    index: usize,
    config: &AnalysisConfig,
) -> Result<DimerRecord> {
    let (atoms, cell) = frame.into_parts();
    let mut cluster = Cluster::new(atoms, cell)?;
    cluster.wrap();
    cluster.find_molecules(config.oh_cutoff)?;
    if cluster.num_molecules() != 2 {
        return Err(WaterError::InvalidTopology(format!(
            "a dimer frame needs 2 molecules, found {}",
            cluster.num_molecules()
        )));
    }

    let roles = find_roles_and_sort(&mut cluster, 0, 1)?;
    debug!(
        "Frame {}: molecule {} donates H{} to molecule {}",
        index, roles.donor, roles.donor_hydrogen, roles.acceptor
    );
    cluster.center_and_orient(roles.donor)?;
    cluster.mol_above_xy(roles.acceptor)?;

    Ok(DimerRecord {
        frame: index,
        donor: roles.donor,
        acceptor: roles.acceptor,
        coordinates: dimer_coordinates(&cluster, roles.donor, roles.acceptor)?,
        hbond: hbond_coordinates(&cluster, roles.donor, roles.acceptor, roles.donor_hydrogen)?,
    })
}

/// Runs `analyze` on every frame, skipping the frames that fail.
pub fn run_trajectory<R, F>(
    frames: Vec<RawFrame>,
    cell: &Cell,
    kind: CoordinateKind,
    mut analyze: F,
) -> TrajectoryReport<R>
where
    F: FnMut(Frame, usize) -> Result<Vec<R>>,
{
    let total = frames.len();
    let mut report = TrajectoryReport {
        records: Vec::new(),
        frames_analyzed: 0,
        frames_skipped: 0,
    };

    for (index, raw) in frames.into_iter().enumerate() {
        let line = raw.line;
        match raw
            .into_frame(cell, kind)
            .and_then(|frame| analyze(frame, index))
        {
            Ok(records) => {
                report.records.extend(records);
                report.frames_analyzed += 1;
            }
            Err(e) => {
                warn!("Skipping frame {} (line {}): {}", index, line, e);
                report.frames_skipped += 1;
            }
        }
    }

    info!(
        "Analyzed {} of {} frames ({} skipped)",
        report.frames_analyzed, total, report.frames_skipped
    );
    report
}

/// Runs the analysis selected by `mode` and writes its records to `out`.
#[allow(clippy::too_many_arguments)]
pub fn run_analysis<W: Write>(
    mode: AnalysisMode,
    frames: Vec<RawFrame>,
    cell: &Cell,
    kind: CoordinateKind,
    config: &AnalysisConfig,
    format: OutputFormat,
    width: usize,
    out: &mut W,
) -> std::result::Result<RunSummary, ReportError> {
    info!("Running {} analysis on {} frames", mode, frames.len());
    match mode {
        AnalysisMode::Order => {
            let report = run_trajectory(frames, cell, kind, |frame, i| {
                analyze_order_frame(frame, i, config)
            });
            finish(report, &OrderRecord::header(), format, width, out)
        }
        AnalysisMode::Network => {
            let report = run_trajectory(frames, cell, kind, |frame, i| {
                analyze_network_frame(frame, i, config)
            });
            let header = NetworkRecord::header_for(config.max_loop_length);
            finish(report, &header, format, width, out)
        }
        AnalysisMode::Dimers => {
            let report = run_trajectory(frames, cell, kind, |frame, i| {
                analyze_dimer_frame(frame, i, config).map(|record| vec![record])
            });
            finish(report, &DimerRecord::header(), format, width, out)
        }
    }
}

fn finish<R: Record, W: Write>(
    report: TrajectoryReport<R>,
    header: &[String],
    format: OutputFormat,
    width: usize,
    out: &mut W,
) -> std::result::Result<RunSummary, ReportError> {
    write_records(out, &report.records, header, format, width)?;
    Ok(RunSummary {
        frames_analyzed: report.frames_analyzed,
        frames_skipped: report.frames_skipped,
    })
}
