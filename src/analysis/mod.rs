//! analysis
//!
//! Aggregations over an [`ExperimentList`](crate::store::ExperimentList).
//!
//! Everything here reads the repository and returns plain data; rendering
//! lives in [`ui::report`](crate::ui::report).

pub mod connectivity;
pub mod labels;
pub mod stims;

pub use connectivity::{ConnectivityRow, ConnectivitySummary, DistanceSample, MatrixCell};
pub use labels::{CheckWarning, LabelSummary};
pub use stims::{
    CellClass, CellClasses, ConnectionInfo, HoldingBands, StimCounts, StimKey, SweepCriteria,
    SweepThresholdGroup, SweepThresholds,
};
