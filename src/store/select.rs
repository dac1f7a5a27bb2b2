//! store::select
//!
//! Multi-predicate selection.
//!
//! A [`Selection`] holds independently optional filters. A record is kept
//! only if it satisfies every filter that is set. The result is a new
//! [`ExperimentList`] sharing the same records.
//!
//! # Calcium
//!
//! The calcium category is derived from the `solution` metadata: `2mM` is
//! high, `1.3mM` is low. When a high/low filter is set, a record with no
//! solution at all is excluded before any other filter runs and reported as
//! [`SelectionWarning::MissingSolution`]; a solution with neither marker is
//! reported as [`SelectionWarning::UnrecognizedSolution`]. Both are data
//! problems rather than non-matches, so they are returned separately from
//! the result.
//!
//! # Example
//!
//! ```
//! use synapdex::store::{Calcium, Selection};
//!
//! let selection = Selection::new()
//!     .region("V1")
//!     .age(40, 60)
//!     .calcium(Calcium::High);
//! assert!(selection.is_active());
//! assert!(!Selection::new().is_active());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use super::ExperimentList;
use crate::core::experiment::Experiment;
use crate::core::types::ExperimentId;

/// Errors from building a selection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("invalid calcium category '{0}', must be one of: high, low, compare")]
    InvalidCalcium(String),
}

/// External calcium concentration category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Calcium {
    /// 2 mM external calcium
    High,
    /// 1.3 mM external calcium
    Low,
    /// No categorical filtering
    Compare,
}

impl Calcium {
    /// Category of a solution description, if it carries a known marker.
    pub fn from_solution(solution: &str) -> Option<Self> {
        if solution.contains("2mM") {
            Some(Calcium::High)
        } else if solution.contains("1.3mM") {
            Some(Calcium::Low)
        } else {
            None
        }
    }
}

impl FromStr for Calcium {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Calcium::High),
            "low" => Ok(Calcium::Low),
            "compare" => Ok(Calcium::Compare),
            _ => Err(SelectionError::InvalidCalcium(s.to_string())),
        }
    }
}

impl fmt::Display for Calcium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Calcium::High => "high",
            Calcium::Low => "low",
            Calcium::Compare => "compare",
        };
        f.write_str(name)
    }
}

/// Data problems found while selecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionWarning {
    /// Calcium filter active but the record has no solution metadata.
    MissingSolution(ExperimentId),
    /// Calcium filter active but the solution names no known concentration.
    UnrecognizedSolution { id: ExperimentId, solution: String },
}

impl fmt::Display for SelectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionWarning::MissingSolution(id) => {
                write!(f, "external calcium concentration not set for experiment {id}")
            }
            SelectionWarning::UnrecognizedSolution { id, solution } => write!(
                f,
                "unrecognized calcium concentration {solution:?} for experiment {id}"
            ),
        }
    }
}

/// Filters for [`ExperimentList::select`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Earliest experiment date (inclusive)
    pub start: Option<NaiveDate>,
    /// Latest experiment date (inclusive)
    pub stop: Option<NaiveDate>,
    /// Exact region
    pub region: Option<String>,
    /// Acceptable source files
    pub source_files: Option<BTreeSet<String>>,
    /// Acceptable cre-types; a record matches if it has any of them
    pub cre_types: Option<Vec<String>>,
    pub calcium: Option<Calcium>,
    /// Inclusive age range in days
    pub age: Option<(u32, u32)>,
    /// Leading two characters of the temperature metadata
    pub temperature: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, date: NaiveDate) -> Self {
        self.start = Some(date);
        self
    }

    pub fn stop(mut self, date: NaiveDate) -> Self {
        self.stop = Some(date);
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn source_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    pub fn cre_types<I, S>(mut self, cre_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cre_types = Some(cre_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn calcium(mut self, calcium: Calcium) -> Self {
        self.calcium = Some(calcium);
        self
    }

    pub fn age(mut self, min: u32, max: u32) -> Self {
        self.age = Some((min, max));
        self
    }

    pub fn temperature(mut self, prefix: impl Into<String>) -> Self {
        self.temperature = Some(prefix.into());
        self
    }

    /// Whether any filter is set.
    pub fn is_active(&self) -> bool {
        *self != Self::default()
    }

    /// Active high/low category, ignoring `Compare`.
    fn calcium_category(&self) -> Option<Calcium> {
        self.calcium.filter(|c| *c != Calcium::Compare)
    }
}

/// Why a record was left out.
enum Verdict {
    Keep,
    Drop,
    BeforeStart,
    AfterStop,
    Warn(SelectionWarning),
}

fn judge(sel: &Selection, expt: &Experiment) -> Verdict {
    let category = match sel.calcium_category() {
        Some(_) => match expt.info.solution.as_deref() {
            Some(solution) => Calcium::from_solution(solution).ok_or_else(|| {
                SelectionWarning::UnrecognizedSolution {
                    id: expt.id.clone(),
                    solution: solution.to_string(),
                }
            }),
            None => return Verdict::Warn(SelectionWarning::MissingSolution(expt.id.clone())),
        },
        None => Ok(Calcium::Compare),
    };

    if sel.start.is_some_and(|start| expt.date < start) {
        return Verdict::BeforeStart;
    }
    if sel.stop.is_some_and(|stop| expt.date > stop) {
        return Verdict::AfterStop;
    }
    if let Some(region) = &sel.region {
        if expt.region.as_ref() != Some(region) {
            return Verdict::Drop;
        }
    }
    if let Some(files) = &sel.source_files {
        if !files.contains(expt.id.source()) {
            return Verdict::Drop;
        }
    }
    if let Some(cre_types) = &sel.cre_types {
        if !cre_types.iter().any(|t| expt.cre_types.contains(t)) {
            return Verdict::Drop;
        }
    }
    if let Some(wanted) = sel.calcium_category() {
        match category {
            Ok(found) if found == wanted => {}
            Ok(_) => return Verdict::Drop,
            Err(warning) => return Verdict::Warn(warning),
        }
    }
    if let Some((min, max)) = sel.age {
        if !expt.age.is_some_and(|age| (min..=max).contains(&age)) {
            return Verdict::Drop;
        }
    }
    if let Some(prefix) = &sel.temperature {
        let matches = expt
            .info
            .temperature
            .as_deref()
            .is_some_and(|t| t.chars().take(2).collect::<String>() == *prefix);
        if !matches {
            return Verdict::Drop;
        }
    }
    Verdict::Keep
}

/// A selected view plus the data problems met on the way.
#[derive(Debug)]
pub struct SelectionResult {
    pub list: ExperimentList,
    pub warnings: Vec<SelectionWarning>,
}

impl ExperimentList {
    /// Select the records matching every filter in `selection`.
    ///
    /// Warnings are logged; use [`select_with_warnings`](Self::select_with_warnings)
    /// to inspect them.
    pub fn select(&self, selection: &Selection) -> ExperimentList {
        self.select_with_warnings(selection).list
    }

    /// Like [`select`](Self::select), also returning per-record warnings.
    pub fn select_with_warnings(&self, selection: &Selection) -> SelectionResult {
        let mut list = ExperimentList::new(None);
        let mut warnings = Vec::new();

        for expt in self {
            match judge(selection, expt) {
                Verdict::Keep => {
                    list.by_id.insert(expt.id.clone(), Arc::clone(expt));
                    list.experiments.push(Arc::clone(expt));
                }
                Verdict::Drop => {}
                Verdict::BeforeStart => list.start_skip.push(expt.id.clone()),
                Verdict::AfterStop => list.stop_skip.push(expt.id.clone()),
                Verdict::Warn(warning) => {
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        SelectionResult { list, warnings }
    }
}
