//! Settings files for waterpack.
//!
//! Default cutoffs, output options and the log level can be changed through
//! INI-format settings files. Files are applied on top of each other, later
//! ones overriding earlier ones key by key:
//!
//! 1. Built-in defaults
//! 2. System settings (`/etc/waterpack/waterpack.cfg`)
//! 3. User settings (`~/.config/waterpack/waterpack.cfg`)
//! 4. Local settings (`./waterpack.cfg`)
//!
//! # Settings File Format
//!
//! ```ini
//! [cutoffs]
//! oh_cutoff = 4.5
//! hbond_distance = 3.5
//! hbond_angle = 30.0
//! lsi_cutoff = 3.7
//!
//! [network]
//! max_loop_length = 10
//!
//! [output]
//! format = text
//! field_width = 8
//!
//! [logging]
//! level = info
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use waterpack::settings::SettingsManager;
//!
//! let settings = SettingsManager::load().unwrap();
//! let config = settings.analysis_config();
//! println!("H-bond cutoff: {}", config.hbond.r_cut);
//! ```

use crate::config::{
    AnalysisConfig, OutputFormat, DEFAULT_MAX_LOOP_LENGTH, MAX_LOOP_LENGTH_LIMIT,
};
use crate::hbond::HBondCriterion;
use configparser::ini::Ini;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the settings file in every searched directory.
pub const SETTINGS_FILE_NAME: &str = "waterpack.cfg";

/// Errors that can occur while loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading or writing a settings file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// INI parsing error
    #[error("INI parsing error: {0}")]
    IniParse(String),
    /// Invalid settings value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

type Section = HashMap<String, Option<String>>;

/// All program settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Cutoffs and criteria
    pub cutoffs: CutoffSettings,
    /// Network analysis settings
    pub network: NetworkSettings,
    /// Output settings
    pub output: OutputSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Distance and angle cutoffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoffSettings {
    /// O–H search radius of molecule reconstruction (default: 4.5)
    pub oh_cutoff: f64,
    /// Largest O···O distance of a hydrogen bond (default: 3.5)
    pub hbond_distance: f64,
    /// Largest Oa–Od–Hd angle of a hydrogen bond in degrees (default: 30)
    pub hbond_angle: f64,
    /// Local structure index cutoff (default: 3.7)
    pub lsi_cutoff: f64,
}

impl Default for CutoffSettings {
    fn default() -> Self {
        let config = AnalysisConfig::default();
        Self {
            oh_cutoff: config.oh_cutoff,
            hbond_distance: config.hbond.r_cut,
            hbond_angle: config.hbond.theta_cut_deg,
            lsi_cutoff: config.lsi_cutoff,
        }
    }
}

/// Hydrogen-bond network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Longest closed walk to count (default: 10)
    pub max_loop_length: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_loop_length: DEFAULT_MAX_LOOP_LENGTH,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Record format (default: text)
    pub format: OutputFormat,
    /// Characters kept per field in text output (default: 8)
    pub field_width: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            field_width: 8,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level: error, warn, info, debug or trace (default: info)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    /// Level filter for `env_logger`, `Info` when the level is not recognized.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Settings {
    /// Analysis parameters described by these settings.
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            oh_cutoff: self.cutoffs.oh_cutoff,
            hbond: HBondCriterion {
                r_cut: self.cutoffs.hbond_distance,
                theta_cut_deg: self.cutoffs.hbond_angle,
            },
            lsi_cutoff: self.cutoffs.lsi_cutoff,
            max_loop_length: self.network.max_loop_length,
        }
    }
}

/// Loads settings files and gives access to the merged result.
pub struct SettingsManager {
    settings: Settings,
    config_source: String,
}

impl SettingsManager {
    /// Loads the system, user and local settings files that exist.
    ///
    /// A file that cannot be read or parsed is skipped with a warning and the
    /// remaining layers are still applied.
    pub fn load() -> Result<Self, ConfigError> {
        let mut paths = Vec::new();
        if let Some(system_path) = Self::get_system_config_path() {
            paths.push(("system", system_path));
        }
        if let Some(user_path) = Self::get_user_config_path() {
            paths.push(("user", user_path));
        }
        paths.push(("local", PathBuf::from(SETTINGS_FILE_NAME)));

        let mut settings = Settings::default();
        let mut config_source = "built-in defaults".to_string();

        for (kind, path) in paths {
            if !path.exists() {
                continue;
            }
            match Self::apply_file(&path, &mut settings) {
                Ok(()) => {
                    config_source = format!("{} config ({})", kind, path.display());
                    debug!("Loaded {} settings from: {}", kind, path.display());
                }
                Err(e) => {
                    warn!(
                        "Failed to load {} settings from {}: {}",
                        kind,
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok(Self {
            settings,
            config_source,
        })
    }

    /// Loads defaults overridden by a single settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        Self::apply_file(path, &mut settings)?;
        Ok(Self {
            settings,
            config_source: format!("file ({})", path.display()),
        })
    }

    /// Describes where the settings came from.
    pub fn config_source(&self) -> &str {
        &self.config_source
    }

    /// Merged settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Analysis parameters from the merged settings.
    pub fn analysis_config(&self) -> AnalysisConfig {
        self.settings.analysis_config()
    }

    /// Output settings.
    pub fn output(&self) -> &OutputSettings {
        &self.settings.output
    }

    /// Logging settings.
    pub fn logging(&self) -> &LoggingSettings {
        &self.settings.logging
    }

    /// Reads one INI file and applies the keys it sets.
    fn apply_file(path: &Path, settings: &mut Settings) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::apply_str(&content, settings)
    }

    fn apply_str(content: &str, settings: &mut Settings) -> Result<(), ConfigError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|e| ConfigError::IniParse(format!("Failed to parse INI: {}", e)))?;
        let map = ini.get_map_ref();

        if let Some(section) = map.get("cutoffs") {
            Self::parse_cutoffs(section, &mut settings.cutoffs)?;
        }
        if let Some(section) = map.get("network") {
            Self::parse_network(section, &mut settings.network)?;
        }
        if let Some(section) = map.get("output") {
            Self::parse_output(section, &mut settings.output)?;
        }
        if let Some(section) = map.get("logging") {
            Self::parse_logging(section, &mut settings.logging)?;
        }
        Ok(())
    }

    fn parse_cutoffs(section: &Section, cutoffs: &mut CutoffSettings) -> Result<(), ConfigError> {
        if let Some(value) = Self::positive_f64(section, "oh_cutoff")? {
            cutoffs.oh_cutoff = value;
        }
        if let Some(value) = Self::positive_f64(section, "hbond_distance")? {
            cutoffs.hbond_distance = value;
        }
        if let Some(value) = Self::positive_f64(section, "hbond_angle")? {
            if value > 180.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "hbond_angle must not exceed 180 degrees: {}",
                    value
                )));
            }
            cutoffs.hbond_angle = value;
        }
        if let Some(value) = Self::positive_f64(section, "lsi_cutoff")? {
            cutoffs.lsi_cutoff = value;
        }
        Ok(())
    }

    fn parse_network(section: &Section, network: &mut NetworkSettings) -> Result<(), ConfigError> {
        if let Some(Some(value)) = section.get("max_loop_length") {
            network.max_loop_length = value.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("Invalid max_loop_length: {}", value))
            })?;
            if network.max_loop_length > MAX_LOOP_LENGTH_LIMIT {
                return Err(ConfigError::InvalidValue(format!(
                    "max_loop_length must not exceed {}: {}",
                    MAX_LOOP_LENGTH_LIMIT, network.max_loop_length
                )));
            }
        }
        Ok(())
    }

    fn parse_output(section: &Section, output: &mut OutputSettings) -> Result<(), ConfigError> {
        if let Some(Some(value)) = section.get("format") {
            output.format = value.parse().map_err(ConfigError::InvalidValue)?;
        }
        if let Some(Some(value)) = section.get("field_width") {
            output.field_width = value.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("Invalid field_width: {}", value))
            })?;
            if output.field_width == 0 {
                return Err(ConfigError::InvalidValue(
                    "field_width must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn parse_logging(section: &Section, logging: &mut LoggingSettings) -> Result<(), ConfigError> {
        if let Some(Some(level)) = section.get("level") {
            if level.parse::<log::LevelFilter>().is_err() {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid log level: {}",
                    level
                )));
            }
            logging.level = level.to_lowercase();
        }
        Ok(())
    }

    /// Parses a strictly positive, finite number if the key is present.
    fn positive_f64(section: &Section, key: &str) -> Result<Option<f64>, ConfigError> {
        let Some(Some(raw)) = section.get(key) else {
            return Ok(None);
        };
        let value: f64 = raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("Invalid {}: {}", key, raw)))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "{} must be a positive number: {}",
                key, raw
            )));
        }
        Ok(Some(value))
    }

    /// Gets the system settings file path.
    fn get_system_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            Some(PathBuf::from("/etc/waterpack").join(SETTINGS_FILE_NAME))
        }
        #[cfg(windows)]
        {
            std::env::var("PROGRAMDATA")
                .ok()
                .map(|pd| PathBuf::from(pd).join("waterpack").join(SETTINGS_FILE_NAME))
        }
    }

    /// Gets the user settings file path.
    fn get_user_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            std::env::var("HOME").ok().map(|home| {
                PathBuf::from(home)
                    .join(".config")
                    .join("waterpack")
                    .join(SETTINGS_FILE_NAME)
            })
        }
        #[cfg(windows)]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|appdata| PathBuf::from(appdata).join("waterpack").join(SETTINGS_FILE_NAME))
        }
    }
}

impl SettingsManager {
    /// Writes a settings file listing every option with its default value.
    pub fn create_template(path: &Path) -> Result<(), ConfigError> {
        fs::write(path, Self::generate_template_content())?;
        info!("Created settings template at: {}", path.display());
        Ok(())
    }

    fn generate_template_content() -> String {
        let defaults = Settings::default();
        let format = match defaults.output.format {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        };
        format!(
            r#"# waterpack settings
#
# Files are applied in this order, later files overriding earlier ones:
#
# 1. /etc/waterpack/waterpack.cfg
# 2. ~/.config/waterpack/waterpack.cfg
# 3. ./waterpack.cfg
#
# Keys left out keep the built-in defaults shown below.

[cutoffs]
# O-H search radius used to group atoms into molecules
oh_cutoff = {}

# Hydrogen bond: largest O-O distance and largest Oa-Od-Hd angle (degrees)
hbond_distance = {}
hbond_angle = {}

# Local structure index cutoff radius
lsi_cutoff = {}

[network]
# Closed walks of length 1..max_loop_length are counted per molecule (at most 20)
max_loop_length = {}

[output]
# text: tab-separated rows, json: one JSON object per line
format = {}

# Characters kept per field in text output
field_width = {}

[logging]
# error, warn, info, debug or trace
level = {}
"#,
            defaults.cutoffs.oh_cutoff,
            defaults.cutoffs.hbond_distance,
            defaults.cutoffs.hbond_angle,
            defaults.cutoffs.lsi_cutoff,
            defaults.network.max_loop_length,
            format,
            defaults.output.field_width,
            defaults.logging.level,
        )
    }
}
