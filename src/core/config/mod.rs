//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$SYNAPDEX_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/synapdex/config.toml`
//! 3. `~/.synapdex/config.toml` (canonical write location)
//!
//! Missing files are not an error; defaults apply.
//!
//! # Example
//!
//! ```no_run
//! use synapdex::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! let thresholds = config.sweep_thresholds();
//! println!("induction >= {}", thresholds.induction);
//! ```

pub mod schema;

pub use schema::{AnalysisConfig, CellClassConfig, HoldingConfig, SweepConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::stims::{CellClasses, HoldingBands, SweepCriteria, SweepThresholds};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SYNAPDEX_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let analysis: AnalysisConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        analysis.validate()?;

        Ok(Self {
            analysis,
            path: Some(path.to_path_buf()),
        })
    }

    fn find() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("synapdex/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".synapdex/config.toml"))
            .filter(|path| path.exists())
    }

    /// Get the canonical path for the config file.
    ///
    /// Returns `~/.synapdex/config.toml`.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".synapdex/config.toml"))
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed, writes to a temp file in the
    /// same directory, then renames over the destination.
    pub fn write(path: &Path, config: &AnalysisConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    /// Default cache snapshot location, if configured.
    pub fn cache_path(&self) -> Option<&Path> {
        self.analysis.cache_path.as_deref()
    }

    /// Sweep thresholds; defaults to 5 (induction) and 10 (recovery).
    pub fn sweep_thresholds(&self) -> SweepThresholds {
        let defaults = SweepThresholds::default();
        let sweeps = self.analysis.sweeps.as_ref();
        SweepThresholds {
            induction: sweeps
                .and_then(|s| s.induction)
                .unwrap_or(defaults.induction),
            recovery: sweeps
                .and_then(|s| s.recovery)
                .unwrap_or(defaults.recovery),
        }
    }

    /// Cre-type classes; each list falls back to the built-in one.
    pub fn cell_classes(&self) -> CellClasses {
        let defaults = CellClasses::default();
        let classes = self.analysis.cell_classes.as_ref();
        CellClasses {
            inhibitory: classes
                .and_then(|c| c.inhibitory.clone())
                .unwrap_or(defaults.inhibitory),
            excitatory: classes
                .and_then(|c| c.excitatory.clone())
                .unwrap_or(defaults.excitatory),
        }
    }

    /// Holding acceptance bands in mV.
    pub fn holding_bands(&self) -> HoldingBands {
        let defaults = HoldingBands::default();
        let holding = self.analysis.holding.as_ref();
        HoldingBands {
            inhibitory: holding
                .and_then(|h| h.inhibitory)
                .unwrap_or(defaults.inhibitory),
            excitatory: holding
                .and_then(|h| h.excitatory)
                .unwrap_or(defaults.excitatory),
        }
    }

    /// Criteria for the sweep-threshold report.
    pub fn sweep_criteria(&self) -> SweepCriteria {
        SweepCriteria {
            thresholds: self.sweep_thresholds(),
            classes: self.cell_classes(),
            bands: self.holding_bands(),
        }
    }

    /// Path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
