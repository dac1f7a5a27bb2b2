//! analysis::connectivity
//!
//! Cross-experiment connectivity rollups.
//!
//! Probabilities are computed from distance measurements: a probed pair
//! without a recorded distance contributes to the raw counts but not to any
//! probability, including the unrestricted one. A pair type with no
//! distance measurements has a NaN probability and sorts last.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::experiment::PairSummary;
use crate::core::types::TypePair;
use crate::store::ExperimentList;

/// Aggregated connectivity per ordered cre-type pair.
pub type ConnectivitySummary = BTreeMap<TypePair, PairSummary>;

/// Radii (metres) at which connection probability is reported.
pub const PROBABILITY_RADII: [f64; 3] = [f64::INFINITY, 250e-6, 100e-6];

/// One row of the ranked connectivity report. Distances are in µm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityRow {
    pub pair: TypePair,
    pub connected: usize,
    pub probed: usize,
    /// Connection probability (%), unrestricted
    pub percent: f64,
    /// Connection probability (%) within 250 µm
    pub percent_250um: f64,
    /// Connection probability (%) within 100 µm
    pub percent_100um: f64,
    pub mean_connected_um: f64,
    pub mean_unconnected_um: f64,
    pub mean_distance_um: f64,
}

/// Connected / probed counts for one matrix cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatrixCell {
    pub connected: usize,
    pub probed: usize,
}

impl MatrixCell {
    /// Connected fraction; `None` when nothing was probed.
    pub fn fraction(&self) -> Option<f64> {
        (self.probed > 0).then(|| self.connected as f64 / self.probed as f64)
    }
}

/// One probed pair for distance-dependence analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceSample {
    /// Metres, if measured
    pub distance: Option<f64>,
    pub connected: bool,
}

/// Fraction of distance measurements within `radius` that are connections.
///
/// Returns NaN when no measurement falls within the radius.
pub fn probability_within(summary: &PairSummary, radius: f64) -> f64 {
    let within = |ds: &[Option<f64>]| ds.iter().flatten().filter(|d| **d <= radius).count();
    let c = within(&summary.connected_distances);
    let t = c + within(&summary.unconnected_distances);
    c as f64 / t as f64
}

/// Mean of the measured values; NaN if there are none.
pub fn nan_mean<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a Option<f64>>,
{
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    sum / n as f64
}

impl ConnectivityRow {
    pub fn from_summary(pair: TypePair, summary: &PairSummary) -> Self {
        let [all, r250, r100] = PROBABILITY_RADII.map(|r| 100.0 * probability_within(summary, r));
        let both = summary
            .connected_distances
            .iter()
            .chain(&summary.unconnected_distances);
        Self {
            pair,
            connected: summary.connected,
            probed: summary.probed(),
            percent: all,
            percent_250um: r250,
            percent_100um: r100,
            mean_connected_um: nan_mean(&summary.connected_distances) * 1e6,
            mean_unconnected_um: nan_mean(&summary.unconnected_distances) * 1e6,
            mean_distance_um: nan_mean(both) * 1e6,
        }
    }

    /// Ranking order: descending by percent, probed, pre, post.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        let pct = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v };
        pct(other.percent)
            .total_cmp(&pct(self.percent))
            .then_with(|| other.probed.cmp(&self.probed))
            .then_with(|| other.pair.pre.cmp(&self.pair.pre))
            .then_with(|| other.pair.post.cmp(&self.pair.post))
    }
}

impl ExperimentList {
    /// Aggregate every record's per-pair summary.
    ///
    /// With a filter, only that exact ordered pair is accumulated.
    pub fn connectivity_summary(&self, type_filter: Option<&TypePair>) -> ConnectivitySummary {
        let mut summary = ConnectivitySummary::new();
        for expt in self {
            for (pair, counts) in expt.summary() {
                if type_filter.is_some_and(|f| *f != pair) {
                    continue;
                }
                summary.entry(pair).or_default().merge(&counts);
            }
        }
        summary
    }

    /// Total (probed, connected) over all records.
    pub fn n_connections_probed(&self) -> (usize, usize) {
        self.iter().fold((0, 0), |(p, c), expt| {
            (p + expt.n_connections_probed(), c + expt.n_connections())
        })
    }

    /// Connectivity rows sorted by [`ConnectivityRow::rank_cmp`].
    pub fn ranked_connectivity(&self, type_filter: Option<&TypePair>) -> Vec<ConnectivityRow> {
        let mut rows: Vec<_> = self
            .connectivity_summary(type_filter)
            .into_iter()
            .map(|(pair, summary)| ConnectivityRow::from_summary(pair, &summary))
            .collect();
        rows.sort_by(ConnectivityRow::rank_cmp);
        rows
    }

    /// Connected / probed grid, `rows` as pre-types and `cols` as post-types.
    pub fn connectivity_matrix(&self, rows: &[&str], cols: &[&str]) -> Vec<Vec<MatrixCell>> {
        let summary = self.connectivity_summary(None);
        rows.iter()
            .map(|pre| {
                cols.iter()
                    .map(|post| {
                        summary
                            .get(&TypePair::new(*pre, *post))
                            .map(|s| MatrixCell {
                                connected: s.connected,
                                probed: s.probed(),
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }

    /// Every probed pair of the given types with its distance and outcome.
    pub fn distance_profile(&self, pre_type: &str, post_type: &str) -> Vec<DistanceSample> {
        let mut samples = Vec::new();
        for expt in self {
            for (i, j) in &expt.probed {
                let (Some(ci), Some(cj)) = (expt.cells.get(i), expt.cells.get(j)) else {
                    continue;
                };
                if ci.cre_type.as_deref() != Some(pre_type)
                    || cj.cre_type.as_deref() != Some(post_type)
                {
                    continue;
                }
                samples.push(DistanceSample {
                    distance: ci.distance(cj),
                    connected: expt.connections.contains(&(*i, *j)),
                });
            }
        }
        samples
    }

    /// Mean animal age over records that have one.
    pub fn mean_age(&self) -> Option<f64> {
        let ages: Vec<f64> = self.iter().filter_map(|e| e.age).map(f64::from).collect();
        (!ages.is_empty()).then(|| ages.iter().sum::<f64>() / ages.len() as f64)
    }
}
