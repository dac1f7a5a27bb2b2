//! core::experiment
//!
//! Experiment records: cells, probed pairs, realized connections and the
//! per-sweep stimulus log.
//!
//! Records are produced by a [`RecordFactory`](crate::core::factory::RecordFactory)
//! or read back from a cache snapshot, and are never mutated afterwards.
//! Repositories share them through `Arc`.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use synapdex::core::experiment::{Cell, Experiment};
//! use synapdex::core::types::{ExperimentId, TypePair};
//!
//! let id = ExperimentId::new("expts.txt", "1").unwrap();
//! let date = NaiveDate::from_ymd_opt(2017, 5, 1).unwrap();
//! let expt = Experiment::builder(id, date)
//!     .cell(Cell::new(1).cre_type("sst").position([0.0, 0.0, 0.0]))
//!     .cell(Cell::new(2).cre_type("pvalb").position([50e-6, 0.0, 0.0]))
//!     .connected(1, 2)
//!     .probed(2, 1)
//!     .build()
//!     .unwrap();
//!
//! let summary = expt.summary();
//! assert_eq!(summary[&TypePair::new("sst", "pvalb")].connected, 1);
//! assert_eq!(summary[&TypePair::new("pvalb", "sst")].unconnected, 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{CellId, ExperimentId, TypePair, UNKNOWN_CRE_TYPE};

/// Errors from record validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExperimentError {
    #[error("experiment {id}: {kind} pair {pre}->{post} references unknown cell {missing}")]
    UnknownCell {
        id: String,
        kind: &'static str,
        pre: CellId,
        post: CellId,
        missing: CellId,
    },

    #[error("experiment {id}: duplicate cell {cell}")]
    DuplicateCell { id: String, cell: CellId },

    #[error("experiment {id}: connection {pre}->{post} was not probed")]
    UnprobedConnection {
        id: String,
        pre: CellId,
        post: CellId,
    },

    #[error("experiment {id}: {field} is not a finite number")]
    NonFinite { id: String, field: String },
}

/// A recorded cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cell {
    pub cell_id: CellId,
    pub cre_type: Option<String>,
    /// Label name to observation, e.g. `biocytin` to `+`.
    pub labels: BTreeMap<String, String>,
    pub pass_qc: bool,
    /// Position in metres.
    pub position: Option<[f64; 3]>,
}

impl Cell {
    pub fn new(cell_id: CellId) -> Self {
        Self {
            cell_id,
            cre_type: None,
            labels: BTreeMap::new(),
            pass_qc: false,
            position: None,
        }
    }

    pub fn cre_type(mut self, cre_type: impl Into<String>) -> Self {
        self.cre_type = Some(cre_type.into());
        self
    }

    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn pass_qc(mut self, pass: bool) -> Self {
        self.pass_qc = pass;
        self
    }

    pub fn position(mut self, position: [f64; 3]) -> Self {
        self.position = Some(position);
        self
    }

    /// Cre-type, or [`UNKNOWN_CRE_TYPE`] when none was recorded.
    pub fn cre_label(&self) -> &str {
        self.cre_type.as_deref().unwrap_or(UNKNOWN_CRE_TYPE)
    }

    /// Euclidean distance in metres; `None` if either position is missing.
    pub fn distance(&self, other: &Cell) -> Option<f64> {
        let (a, b) = (self.position?, other.position?);
        let sq: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum();
        Some(sq.sqrt())
    }
}

/// Stimulus metadata for one headstage in one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepInfo {
    pub stim_name: String,
    pub clamp_mode: String,
    /// Holding potential in volts.
    pub holding: f64,
}

/// Headstage to stimulus metadata for one sweep.
pub type SweepSummary = BTreeMap<u32, SweepInfo>;

/// Free-form experiment conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentInfo {
    /// External solution description, e.g. `"2mM Ca"`.
    pub solution: Option<String>,
    /// Bath temperature as written in the record, e.g. `"34C"`.
    pub temperature: Option<String>,
    pub extra: BTreeMap<String, String>,
}

/// Connectivity counts and distances for one ordered cre-type pair.
///
/// Distances are in metres; `None` marks a pair whose distance was not
/// measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairSummary {
    pub connected: usize,
    pub unconnected: usize,
    pub connected_distances: Vec<Option<f64>>,
    pub unconnected_distances: Vec<Option<f64>>,
}

impl PairSummary {
    /// Total pairs probed.
    pub fn probed(&self) -> usize {
        self.connected + self.unconnected
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &PairSummary) {
        self.connected += other.connected;
        self.unconnected += other.unconnected;
        self.connected_distances
            .extend_from_slice(&other.connected_distances);
        self.unconnected_distances
            .extend_from_slice(&other.unconnected_distances);
    }
}

/// One multipatch experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Experiment {
    pub id: ExperimentId,
    /// Short display number assigned by the record source.
    pub summary_id: Option<u32>,
    pub date: NaiveDate,
    pub region: Option<String>,
    /// Animal age in days.
    pub age: Option<u32>,
    pub cre_types: Vec<String>,
    /// Fluorescent and histological labels used in the experiment.
    pub labels: Vec<String>,
    pub cells: BTreeMap<CellId, Cell>,
    pub connections: BTreeSet<(CellId, CellId)>,
    pub probed: BTreeSet<(CellId, CellId)>,
    pub info: ExperimentInfo,
    pub sweeps: Vec<SweepSummary>,
}

impl Experiment {
    /// Start building a record.
    pub fn builder(id: ExperimentId, date: NaiveDate) -> ExperimentBuilder {
        ExperimentBuilder::new(id, date)
    }

    pub fn n_connections_probed(&self) -> usize {
        self.probed.len()
    }

    pub fn n_connections(&self) -> usize {
        self.connections.len()
    }

    /// Per cre-type pair connectivity over every probed pair.
    pub fn summary(&self) -> BTreeMap<TypePair, PairSummary> {
        let mut summary: BTreeMap<TypePair, PairSummary> = BTreeMap::new();
        for (pre, post) in &self.probed {
            let (Some(c1), Some(c2)) = (self.cells.get(pre), self.cells.get(post)) else {
                continue;
            };
            let entry = summary
                .entry(TypePair::new(c1.cre_label(), c2.cre_label()))
                .or_default();
            let distance = c1.distance(c2);
            if self.connections.contains(&(*pre, *post)) {
                entry.connected += 1;
                entry.connected_distances.push(distance);
            } else {
                entry.unconnected += 1;
                entry.unconnected_distances.push(distance);
            }
        }
        summary
    }

    /// Distinct short stimulus names used across all sweeps, sorted.
    pub fn list_stims(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .sweeps
            .iter()
            .flat_map(|sweep| sweep.values())
            .map(|info| short_stim_name(&info.stim_name))
            .collect();
        names.into_iter().collect()
    }

    /// Check that every pair references a known cell, every connection
    /// was probed, and every stored float is finite.
    pub fn validate(&self) -> Result<(), ExperimentError> {
        for (kind, pairs) in [("connection", &self.connections), ("probed", &self.probed)] {
            for &(pre, post) in pairs {
                for cell in [pre, post] {
                    if !self.cells.contains_key(&cell) {
                        return Err(ExperimentError::UnknownCell {
                            id: self.id.to_string(),
                            kind,
                            pre,
                            post,
                            missing: cell,
                        });
                    }
                }
            }
        }
        if let Some(&(pre, post)) = self.connections.difference(&self.probed).next() {
            return Err(ExperimentError::UnprobedConnection {
                id: self.id.to_string(),
                pre,
                post,
            });
        }
        self.check_finite()
    }

    // JSON has no encoding for NaN or infinity.
    fn check_finite(&self) -> Result<(), ExperimentError> {
        let non_finite = |field: String| ExperimentError::NonFinite {
            id: self.id.to_string(),
            field,
        };
        for cell in self.cells.values() {
            if cell.position.is_some_and(|p| p.iter().any(|v| !v.is_finite())) {
                return Err(non_finite(format!("cell {} position", cell.cell_id)));
            }
        }
        for (index, sweep) in self.sweeps.iter().enumerate() {
            for (headstage, info) in sweep {
                if !info.holding.is_finite() {
                    return Err(non_finite(format!(
                        "sweep {index} headstage {headstage} holding"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Shorten an acquisition stimulus name.
///
/// Drops the `PulseTrain_` family prefix (keeping a leading `S` for the
/// short-pulse variant) and the `_DA_0` channel suffix.
///
/// ```
/// use synapdex::core::experiment::short_stim_name;
///
/// assert_eq!(short_stim_name("PulseTrain_50Hz_DA_0"), "50Hz");
/// assert_eq!(short_stim_name("SPulseTrain_10Hz_DA_0"), "S10Hz");
/// assert_eq!(short_stim_name("TargetV"), "TargetV");
/// ```
pub fn short_stim_name(stim: &str) -> String {
    let stim = if let Some(rest) = stim.strip_prefix("PulseTrain_") {
        rest.to_string()
    } else if let Some(rest) = stim.strip_prefix("SPulseTrain_") {
        format!("S{rest}")
    } else {
        stim.to_string()
    };
    match stim.strip_suffix("_DA_0") {
        Some(base) => base.to_string(),
        None => stim,
    }
}

/// Builder for [`Experiment`].
pub struct ExperimentBuilder {
    expt: Experiment,
    duplicate: Option<CellId>,
}

impl ExperimentBuilder {
    pub fn new(id: ExperimentId, date: NaiveDate) -> Self {
        Self {
            expt: Experiment {
                id,
                summary_id: None,
                date,
                region: None,
                age: None,
                cre_types: Vec::new(),
                labels: Vec::new(),
                cells: BTreeMap::new(),
                connections: BTreeSet::new(),
                probed: BTreeSet::new(),
                info: ExperimentInfo::default(),
                sweeps: Vec::new(),
            },
            duplicate: None,
        }
    }

    pub fn summary_id(mut self, summary_id: u32) -> Self {
        self.expt.summary_id = Some(summary_id);
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.expt.region = Some(region.into());
        self
    }

    pub fn age(mut self, days: u32) -> Self {
        self.expt.age = Some(days);
        self
    }

    /// Add an experiment-level cre-type; repeats are ignored.
    pub fn cre_type(mut self, cre_type: impl Into<String>) -> Self {
        let cre_type = cre_type.into();
        if !self.expt.cre_types.contains(&cre_type) {
            self.expt.cre_types.push(cre_type);
        }
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.expt.labels.contains(&label) {
            self.expt.labels.push(label);
        }
        self
    }

    pub fn solution(mut self, solution: impl Into<String>) -> Self {
        self.expt.info.solution = Some(solution.into());
        self
    }

    pub fn temperature(mut self, temperature: impl Into<String>) -> Self {
        self.expt.info.temperature = Some(temperature.into());
        self
    }

    pub fn info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.expt.info.extra.insert(key.into(), value.into());
        self
    }

    pub fn cell(mut self, cell: Cell) -> Self {
        let id = cell.cell_id;
        if self.expt.cells.insert(id, cell).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(id);
        }
        self
    }

    /// Record a probed pair that showed no connection.
    pub fn probed(mut self, pre: CellId, post: CellId) -> Self {
        self.expt.probed.insert((pre, post));
        self
    }

    /// Record a realized connection; it also counts as probed.
    pub fn connected(mut self, pre: CellId, post: CellId) -> Self {
        self.expt.probed.insert((pre, post));
        self.expt.connections.insert((pre, post));
        self
    }

    pub fn sweep(mut self, sweep: SweepSummary) -> Self {
        self.expt.sweeps.push(sweep);
        self
    }

    /// Validate and finish.
    pub fn build(self) -> Result<Experiment, ExperimentError> {
        if let Some(cell) = self.duplicate {
            return Err(ExperimentError::DuplicateCell {
                id: self.expt.id.to_string(),
                cell,
            });
        }
        self.expt.validate()?;
        Ok(self.expt)
    }
}
