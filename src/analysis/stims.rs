//! analysis::stims
//!
//! Per-connection stimulus histograms and the sweep-threshold report.
//!
//! Sweep logs are keyed by headstage, which is the cell id minus one. For
//! each realized connection the stimulus name comes from the presynaptic
//! headstage while the clamp mode and holding potential come from the
//! postsynaptic one.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::experiment::{short_stim_name, Cell, Experiment};
use crate::core::types::{CellId, TypePair};
use crate::store::ExperimentList;

/// Identifies one stimulus condition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StimKey {
    pub clamp_mode: String,
    /// Short stimulus name with any short-pulse marker removed.
    pub stim_name: String,
    /// Holding potential rounded to the nearest 5 mV.
    pub holding_mv: i32,
}

impl StimKey {
    /// Ordering used by reports: clamp mode, then the leading `H`-delimited
    /// token (numbers before text), then holding from depolarized to
    /// hyperpolarized.
    pub fn report_cmp(&self, other: &Self) -> Ordering {
        self.clamp_mode
            .cmp(&other.clamp_mode)
            .then_with(|| name_rank(&self.stim_name).cmp(&name_rank(&other.stim_name)))
            .then_with(|| other.holding_mv.cmp(&self.holding_mv))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NameRank<'a> {
    Numeric(u64),
    Text(&'a str),
}

fn name_rank(name: &str) -> NameRank<'_> {
    let token = name.split('H').next().unwrap_or_default();
    match token.parse::<u64>() {
        Ok(n) if token.bytes().all(|b| b.is_ascii_digit()) => NameRank::Numeric(n),
        _ => NameRank::Text(name),
    }
}

/// Sweep counts for one stimulus condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimCounts {
    pub standard: usize,
    pub short_pulse: usize,
}

impl StimCounts {
    pub fn total(&self) -> usize {
        self.standard + self.short_pulse
    }
}

/// A realized connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub experiment: Arc<Experiment>,
    /// Position of the experiment in the list it came from.
    pub index: usize,
    pub pre: Cell,
    pub post: Cell,
    /// Present when stimuli were requested.
    pub stims: Option<BTreeMap<StimKey, StimCounts>>,
}

impl ConnectionInfo {
    pub fn type_pair(&self) -> TypePair {
        TypePair::new(self.pre.cre_label(), self.post.cre_label())
    }

    /// Pre/post distance in metres.
    pub fn distance(&self) -> Option<f64> {
        self.pre.distance(&self.post)
    }
}

/// Round a holding potential in volts to the nearest 5 mV.
pub fn holding_mv(volts: f64) -> i32 {
    (5.0 * (volts * 1000.0 / 5.0).round_ties_even()) as i32
}

fn headstage(cell: CellId) -> Option<u32> {
    cell.checked_sub(1)
}

/// Stimulus histogram for one connection.
pub fn stim_histogram(expt: &Experiment, pre: CellId, post: CellId) -> BTreeMap<StimKey, StimCounts> {
    let mut stims: BTreeMap<StimKey, StimCounts> = BTreeMap::new();
    let (Some(hs_pre), Some(hs_post)) = (headstage(pre), headstage(post)) else {
        return stims;
    };
    for sweep in &expt.sweeps {
        let (Some(info_pre), Some(info_post)) = (sweep.get(&hs_pre), sweep.get(&hs_post)) else {
            continue;
        };
        let mut name = short_stim_name(&info_pre.stim_name);
        let short_pulse = name.starts_with(['S', 's']);
        if short_pulse {
            name = name[1..].to_string();
        }
        let counts = stims
            .entry(StimKey {
                clamp_mode: info_post.clamp_mode.clone(),
                stim_name: name,
                holding_mv: holding_mv(info_post.holding),
            })
            .or_default();
        if short_pulse {
            counts.short_pulse += 1;
        } else {
            counts.standard += 1;
        }
    }
    stims
}

/// Minimum sweep counts for a connection to count toward a stimulus set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepThresholds {
    pub induction: usize,
    pub recovery: usize,
}

impl Default for SweepThresholds {
    fn default() -> Self {
        Self {
            induction: 5,
            recovery: 10,
        }
    }
}

impl SweepThresholds {
    /// Recovery threshold for recovery protocols, induction otherwise.
    pub fn for_stim(&self, key: &StimKey) -> usize {
        if key.stim_name.contains("recovery") {
            self.recovery
        } else {
            self.induction
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellClass {
    Inhibitory,
    Excitatory,
    Unclassified,
}

/// Cre-type lists used to classify presynaptic cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellClasses {
    pub inhibitory: Vec<String>,
    pub excitatory: Vec<String>,
}

impl Default for CellClasses {
    fn default() -> Self {
        Self {
            inhibitory: ["sst", "pvalb", "vip"].map(String::from).to_vec(),
            excitatory: ["tlx3", "sim1", "rorb"].map(String::from).to_vec(),
        }
    }
}

impl CellClasses {
    pub fn classify(&self, cre_type: &str) -> CellClass {
        if self.inhibitory.iter().any(|t| t == cre_type) {
            CellClass::Inhibitory
        } else if self.excitatory.iter().any(|t| t == cre_type) {
            CellClass::Excitatory
        } else {
            CellClass::Unclassified
        }
    }
}

/// Inclusive holding ranges (mV) accepted per presynaptic class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldingBands {
    pub inhibitory: [i32; 2],
    pub excitatory: [i32; 2],
}

impl Default for HoldingBands {
    fn default() -> Self {
        Self {
            inhibitory: [-60, -50],
            excitatory: [-75, -65],
        }
    }
}

impl HoldingBands {
    /// Unclassified cells accept any holding.
    pub fn accepts(&self, class: CellClass, holding_mv: i32) -> bool {
        let [lo, hi] = match class {
            CellClass::Inhibitory => self.inhibitory,
            CellClass::Excitatory => self.excitatory,
            CellClass::Unclassified => return true,
        };
        (lo..=hi).contains(&holding_mv)
    }
}

/// Everything the sweep-threshold report is parameterized on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepCriteria {
    pub thresholds: SweepThresholds,
    pub classes: CellClasses,
    pub bands: HoldingBands,
}

/// Sweep-threshold report rows for one pair type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepThresholdGroup {
    pub pair: TypePair,
    pub connected: usize,
    pub probed: usize,
    /// Stimulus sets with the number of connections meeting the threshold.
    pub stim_sets: Vec<(StimKey, usize)>,
}

impl ExperimentList {
    /// Realized connections, optionally restricted to one ordered type pair.
    pub fn connection_summary(
        &self,
        type_filter: Option<&TypePair>,
        list_stims: bool,
    ) -> Vec<ConnectionInfo> {
        let mut summary = Vec::new();
        for (index, expt) in self.iter().enumerate() {
            for &(pre, post) in &expt.connections {
                let (Some(c1), Some(c2)) = (expt.cells.get(&pre), expt.cells.get(&post)) else {
                    continue;
                };
                if type_filter.is_some_and(|f| f.pre != c1.cre_label() || f.post != c2.cre_label()) {
                    continue;
                }
                summary.push(ConnectionInfo {
                    experiment: Arc::clone(expt),
                    index,
                    pre: c1.clone(),
                    post: c2.clone(),
                    stims: list_stims.then(|| stim_histogram(expt, pre, post)),
                });
            }
        }
        summary
    }

    /// Per pair type and stimulus condition, the total sweep count of each
    /// connection.
    pub fn connection_stim_summary(&self) -> BTreeMap<TypePair, BTreeMap<StimKey, Vec<usize>>> {
        let mut summary: BTreeMap<TypePair, BTreeMap<StimKey, Vec<usize>>> = BTreeMap::new();
        for conn in self.connection_summary(None, true) {
            let per_type = summary.entry(conn.type_pair()).or_default();
            for (stim, counts) in conn.stims.into_iter().flatten() {
                per_type.entry(stim).or_default().push(counts.total());
            }
        }
        summary
    }

    /// Count, per pair type and stimulus set, the connections with enough
    /// sweeps.
    ///
    /// Sets outside the holding band of the presynaptic class, and sets
    /// with no qualifying connection, are left out.
    pub fn sweep_threshold_report(&self, criteria: &SweepCriteria) -> Vec<SweepThresholdGroup> {
        let connectivity = self.connectivity_summary(None);
        self.connection_stim_summary()
            .into_iter()
            .map(|(pair, stims)| {
                let (connected, probed) = connectivity
                    .get(&pair)
                    .map(|s| (s.connected, s.probed()))
                    .unwrap_or_default();
                let class = criteria.classes.classify(&pair.pre);

                let mut stim_sets: Vec<(StimKey, usize)> = stims
                    .into_iter()
                    .filter(|(key, _)| criteria.bands.accepts(class, key.holding_mv))
                    .map(|(key, sweeps)| {
                        let threshold = criteria.thresholds.for_stim(&key);
                        let n = sweeps.iter().filter(|n| **n >= threshold).count();
                        (key, n)
                    })
                    .filter(|(_, n)| *n > 0)
                    .collect();
                stim_sets.sort_by(|a, b| a.0.report_cmp(&b.0));

                SweepThresholdGroup {
                    pair,
                    connected,
                    probed,
                    stim_sets,
                }
            })
            .collect()
    }
}
