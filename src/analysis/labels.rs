//! analysis::labels
//!
//! Biocytin fill rates and record sanity checks.

use std::fmt;

use tracing::warn;

use crate::core::types::ExperimentId;
use crate::store::ExperimentList;

/// Biocytin fill counts among cells with biocytin data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelSummary {
    pub qc_passed: usize,
    pub qc_biocytin: usize,
    /// Cells with a cre-type.
    pub dye_filled: usize,
    pub dye_biocytin: usize,
}

fn percent(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * n as f64 / total as f64
    }
}

impl LabelSummary {
    pub fn qc_percent(&self) -> f64 {
        percent(self.qc_biocytin, self.qc_passed)
    }

    pub fn dye_percent(&self) -> f64 {
        percent(self.dye_biocytin, self.dye_filled)
    }
}

/// A record that is missing expected annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckWarning {
    NoCreTypes(ExperimentId),
    /// No label other than biocytin.
    NoFluorescentLabels(ExperimentId),
    NoRegion(ExperimentId),
}

impl fmt::Display for CheckWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckWarning::NoCreTypes(id) => write!(f, "experiment {id} has no cre-type labels"),
            CheckWarning::NoFluorescentLabels(id) => {
                write!(f, "experiment {id} has no fluorescent labels")
            }
            CheckWarning::NoRegion(id) => write!(f, "experiment {id} has no region"),
        }
    }
}

impl ExperimentList {
    /// Count biocytin fills; cells without biocytin data are ignored.
    pub fn label_summary(&self) -> LabelSummary {
        let mut summary = LabelSummary::default();
        for cell in self.iter().flat_map(|e| e.cells.values()) {
            let Some(biocytin) = cell.labels.get("biocytin") else {
                continue;
            };
            let filled = biocytin == "+";
            if cell.pass_qc {
                summary.qc_passed += 1;
                summary.qc_biocytin += usize::from(filled);
            }
            if cell.cre_type.is_some() {
                summary.dye_filled += 1;
                summary.dye_biocytin += usize::from(filled);
            }
        }
        summary
    }

    /// Flag records without cre-types, fluorescent labels or region.
    pub fn check(&self) -> Vec<CheckWarning> {
        let mut warnings = Vec::new();
        for expt in self {
            if expt.cre_types.is_empty() {
                warnings.push(CheckWarning::NoCreTypes(expt.id.clone()));
            }
            if expt.labels.iter().all(|l| l == "biocytin") {
                warnings.push(CheckWarning::NoFluorescentLabels(expt.id.clone()));
            }
            if expt.region.is_none() {
                warnings.push(CheckWarning::NoRegion(expt.id.clone()));
            }
        }
        for warning in &warnings {
            warn!("{warning}");
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::experiment::{Cell, Experiment};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn id(key: &str) -> ExperimentId {
        ExperimentId::new("a.txt", key).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 1, 1).unwrap()
    }

    #[test]
    fn biocytin_rates() {
        let expt = Experiment::builder(id("1"), date())
            .cell(Cell::new(1).cre_type("sst").pass_qc(true).label("biocytin", "+"))
            .cell(Cell::new(2).cre_type("sst").label("biocytin", "-"))
            .cell(Cell::new(3).pass_qc(true).label("biocytin", "-"))
            .cell(Cell::new(4).cre_type("sst").pass_qc(true))
            .build()
            .unwrap();
        let list = ExperimentList::from_experiments([Arc::new(expt)]).unwrap();

        let summary = list.label_summary();
        assert_eq!(
            summary,
            LabelSummary {
                qc_passed: 2,
                qc_biocytin: 1,
                dye_filled: 2,
                dye_biocytin: 1,
            }
        );
        assert_eq!(summary.qc_percent(), 50.0);
        assert_eq!(LabelSummary::default().dye_percent(), 0.0);
    }

    #[test]
    fn check_flags_missing_annotations() {
        let bare = Experiment::builder(id("1"), date())
            .label("biocytin")
            .build()
            .unwrap();
        let full = Experiment::builder(id("2"), date())
            .cre_type("sst")
            .label("biocytin")
            .label("AF488")
            .region("V1")
            .build()
            .unwrap();
        let list = ExperimentList::from_experiments([Arc::new(bare), Arc::new(full)]).unwrap();

        assert_eq!(
            list.check(),
            vec![
                CheckWarning::NoCreTypes(id("1")),
                CheckWarning::NoFluorescentLabels(id("1")),
                CheckWarning::NoRegion(id("1")),
            ]
        );
    }
}
