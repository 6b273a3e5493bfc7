//! waterpack Command-Line Interface
//!
//! Entry point of the `waterpack` program. It parses the command line, loads
//! the settings files, reads the trajectory and writes one record per
//! molecule (or per dimer) to standard output. Log messages go to standard
//! error so that the records can be piped into other tools.
//!
//! # Usage
//!
//! 1. **Analysis** (`waterpack <order|network|dimers> <trajectory> <box_length> [options]`):
//!    Analyzes every frame of an XYZ trajectory in a cubic box
//!
//! 2. **Settings Template** (`waterpack template [path]`):
//!    Writes a commented settings file with every default value
//!
//! # Options
//!
//! - `--json` / `--text` - Output format, overriding the settings files
//! - `--crystal` - Coordinates are fractional instead of Cartesian
//! - `--config <file>` - Use this settings file instead of the usual layers
//!
//! # Examples
//!
//! ```bash
//! # Tetrahedral order and LSI of every molecule
//! waterpack order water.xyz 14.7222 > order.dat
//!
//! # Hydrogen-bond counts and closed loops as JSON lines
//! waterpack network water.xyz 14.7222 --json > network.jsonl
//!
//! # Dimer coordinates of a two-molecule trajectory
//! waterpack dimers dimer.xyz 30.0
//!
//! # Settings template in the current directory
//! waterpack template
//! ```

use log::LevelFilter;
use std::env;
use std::error::Error;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use waterpack::cell::Cell;
use waterpack::config::{AnalysisMode, OutputFormat};
use waterpack::driver::run_analysis;
use waterpack::frame::CoordinateKind;
use waterpack::settings::{SettingsManager, SETTINGS_FILE_NAME};
use waterpack::trajectory::read_trajectory;

/// Options of an analysis command.
#[derive(Debug)]
struct AnalysisArgs {
    mode: AnalysisMode,
    trajectory: String,
    box_length: f64,
    format: Option<OutputFormat>,
    kind: CoordinateKind,
    config_file: Option<String>,
}

/// Main entry point for waterpack.
///
/// # Command-Line Arguments
///
/// - `waterpack <mode> <trajectory> <box_length> [options]`: Run an analysis
/// - `waterpack template [path]`: Create a settings template
/// - `waterpack --help`: Display help information
///
/// Exits with code 1 when the arguments are invalid or the run fails.
fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("waterpack");
    if args.len() < 2 {
        print_usage(program);
        process::exit(1);
    }

    check_help_flags(&args);

    match args[1].as_str() {
        "template" => {
            init_logger(LevelFilter::Info);
            let path = args.get(2).map(String::as_str).unwrap_or(SETTINGS_FILE_NAME);
            match run_create_settings_template(Path::new(path)) {
                Ok(()) => {
                    println!("✓ Settings template created successfully!");
                    println!("  Output file: {}", path);
                    println!("\nNext steps:");
                    println!("  1. Review and edit the cutoffs and output options");
                    println!(
                        "  2. Keep it as ./{} to have it loaded automatically",
                        SETTINGS_FILE_NAME
                    );
                }
                Err(e) => {
                    eprintln!("Error creating settings template: {}", e);
                    process::exit(1);
                }
            }
        }
        _ => {
            let parsed = match parse_analysis_args(&args[1..]) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    print_usage(program);
                    process::exit(1);
                }
            };
            if let Err(e) = run_analysis_command(&parsed) {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
}

/// Prints help and exits when `-h` or `--help` appears anywhere.
fn check_help_flags(args: &[String]) {
    if args.iter().skip(1).any(|a| a == "--help" || a == "-h") {
        print_help(&args[0]);
        process::exit(0);
    }
}

fn print_help(program_name: &str) {
    println!("waterpack - Hydrogen-bond networks and structural order of water");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("Analyses:");
    println!("  order     Tetrahedral order q, translational order Sk and LSI per molecule");
    println!("  network   Accepted/donated hydrogen bonds and closed walks per molecule");
    println!("  dimers    Twelve dimer coordinates and hydrogen-bond coordinates per frame");
    println!();
    println!("Options:");
    println!("  --json            One JSON object per line");
    println!("  --text            Tab-separated rows with a header line");
    println!("  --crystal         Coordinates are fractional");
    println!("  --config <file>   Read settings from this file only");
    println!();
    println!("Settings are read from the system, user and ./{} files,", SETTINGS_FILE_NAME);
    println!("later files overriding earlier ones. RUST_LOG overrides the log level.");
    println!();
    println!("Examples:");
    println!("  {} order water.xyz 14.7222", program_name);
    println!("  {} network water.xyz 14.7222 --json", program_name);
    println!("  {} template", program_name);
}

/// Prints usage information to stderr.
fn print_usage(program_name: &str) {
    eprintln!("waterpack - Hydrogen-bond networks and structural order of water");
    eprintln!();
    eprintln!("Usage:");
    eprintln!(
        "  {} <order|network|dimers> <trajectory> <box_length> [options]",
        program_name
    );
    eprintln!("                    Analyze every frame of an XYZ trajectory");
    eprintln!();
    eprintln!("  {} template [path]", program_name);
    eprintln!("                    Create a settings template file");
    eprintln!();
    eprintln!("Run '{} --help' for the list of options.", program_name);
}

/// Parses `<mode> <trajectory> <box_length> [options]`.
fn parse_analysis_args(args: &[String]) -> Result<AnalysisArgs, String> {
    let mut positional = Vec::new();
    let mut format = None;
    let mut kind = CoordinateKind::Cartesian;
    let mut config_file = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => format = Some(OutputFormat::Json),
            "--text" => format = Some(OutputFormat::Text),
            "--crystal" => kind = CoordinateKind::Crystal,
            "--config" => {
                let file = iter.next().ok_or("--config needs a file argument")?;
                config_file = Some(file.clone());
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option '{}'", flag)),
            _ => positional.push(arg.as_str()),
        }
    }

    let [mode, trajectory, box_length] = positional[..] else {
        return Err(format!(
            "expected <mode> <trajectory> <box_length>, got {} arguments",
            positional.len()
        ));
    };

    let box_length: f64 = box_length
        .parse()
        .map_err(|_| format!("invalid box length '{}'", box_length))?;

    Ok(AnalysisArgs {
        mode: mode.parse()?,
        trajectory: trajectory.to_string(),
        box_length,
        format,
        kind,
        config_file,
    })
}

/// Writes the settings template, refusing to overwrite an existing file.
fn run_create_settings_template(path: &Path) -> Result<(), Box<dyn Error>> {
    if path.exists() {
        return Err(format!(
            "{} already exists. Please remove it first or choose a different location.",
            path.display()
        )
        .into());
    }

    SettingsManager::create_template(path)?;
    Ok(())
}

/// Logger writing to stderr at `level`, with `RUST_LOG`-style `filters` on top.
fn logger_builder(level: LevelFilter, filters: Option<&str>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .format_timestamp_millis();
    if let Some(filters) = filters {
        builder.parse_filters(filters);
    }
    builder
}

fn init_logger(level: LevelFilter) {
    let filters = env::var("RUST_LOG").ok();
    logger_builder(level, filters.as_deref()).init();
}

/// Runs one analysis over a whole trajectory.
fn run_analysis_command(args: &AnalysisArgs) -> Result<(), Box<dyn Error>> {
    let manager = match &args.config_file {
        Some(file) => SettingsManager::from_file(Path::new(file))?,
        None => SettingsManager::load()?,
    };

    init_logger(manager.logging().level_filter());
    log::info!("Configuration loaded from: {}", manager.config_source());

    let config = manager.analysis_config();
    let format = args.format.unwrap_or(manager.output().format);
    let cell = Cell::cubic(args.box_length)?;

    let frames = read_trajectory(Path::new(&args.trajectory))?;
    log::info!("Read {} frames from {}", frames.len(), args.trajectory);

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let summary = run_analysis(
        args.mode,
        frames,
        &cell,
        args.kind,
        &config,
        format,
        manager.output().field_width,
        &mut out,
    )?;
    out.flush()?;

    if summary.frames_analyzed == 0 && summary.frames_skipped > 0 {
        return Err(format!("all {} frames were skipped", summary.frames_skipped).into());
    }
    Ok(())
}
