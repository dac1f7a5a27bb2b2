//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! cache_path = "/data/expts.json"
//!
//! [sweeps]
//! induction = 5
//! recovery = 10
//!
//! [cell_classes]
//! inhibitory = ["sst", "pvalb", "vip"]
//! excitatory = ["tlx3", "sim1", "rorb"]
//!
//! [holding]
//! inhibitory = [-60, -50]
//! excitatory = [-75, -65]
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: thresholds must be positive, bands
//! must be ordered, and a cre-type may belong to only one class.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Analysis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Default cache snapshot location
    pub cache_path: Option<PathBuf>,

    /// Sweep count thresholds
    pub sweeps: Option<SweepConfig>,

    /// Cre-type classification
    pub cell_classes: Option<CellClassConfig>,

    /// Holding potential acceptance bands (mV)
    pub holding: Option<HoldingConfig>,
}

impl AnalysisConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(sweeps) = &self.sweeps {
            for (name, value) in [("induction", sweeps.induction), ("recovery", sweeps.recovery)] {
                if value == Some(0) {
                    return Err(ConfigError::InvalidValue(format!(
                        "sweeps.{name} must be at least 1"
                    )));
                }
            }
        }

        if let Some(classes) = &self.cell_classes {
            if let (Some(inh), Some(exc)) = (&classes.inhibitory, &classes.excitatory) {
                if let Some(both) = inh.iter().find(|t| exc.contains(*t)) {
                    return Err(ConfigError::InvalidValue(format!(
                        "cre type '{both}' is listed as both inhibitory and excitatory"
                    )));
                }
            }
        }

        if let Some(holding) = &self.holding {
            for (name, band) in [("inhibitory", holding.inhibitory), ("excitatory", holding.excitatory)] {
                if let Some([low, high]) = band {
                    if low > high {
                        return Err(ConfigError::InvalidValue(format!(
                            "holding.{name} band [{low}, {high}] is reversed"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Minimum sweep counts for a connection to count toward a stimulus set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Threshold for induction stimulus sets (default: 5)
    pub induction: Option<usize>,

    /// Threshold for recovery stimulus sets (default: 10)
    pub recovery: Option<usize>,
}

/// Cre-type class membership.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CellClassConfig {
    pub inhibitory: Option<Vec<String>>,
    pub excitatory: Option<Vec<String>>,
}

/// Inclusive holding bands in millivolts, `[low, high]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HoldingConfig {
    pub inhibitory: Option<[i32; 2]>,
    pub excitatory: Option<[i32; 2]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_threshold_rejected() {
        let config = AnalysisConfig {
            sweeps: Some(SweepConfig {
                induction: Some(0),
                recovery: None,
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlapping_classes_rejected() {
        let config = AnalysisConfig {
            cell_classes: Some(CellClassConfig {
                inhibitory: Some(vec!["sst".into()]),
                excitatory: Some(vec!["tlx3".into(), "sst".into()]),
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sst"));
    }

    #[test]
    fn reversed_band_rejected() {
        let config = AnalysisConfig {
            holding: Some(HoldingConfig {
                inhibitory: Some([-50, -60]),
                excitatory: None,
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_toml() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [sweeps]
            recovery = 12

            [holding]
            excitatory = [-80, -70]
            "#,
        )
        .unwrap();
        assert_eq!(config.sweeps.unwrap().recovery, Some(12));
        assert_eq!(config.holding.unwrap().excitatory, Some([-80, -70]));
    }
}
