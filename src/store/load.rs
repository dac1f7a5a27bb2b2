//! store::load
//!
//! Record load pipeline.
//!
//! Each top-level entry of a parsed file resolves to one [`EntryOutcome`]:
//! it is loaded, skipped because its id is already present, or failed. A
//! failed entry never stops the batch; failures are collected in the
//! [`LoadReport`] together with the entry text so they can be fixed at the
//! source.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use thiserror::Error;
use tracing::{info, warn};

use super::cache::CacheError;
use super::ExperimentList;
use crate::core::entry::{EntryId, EntryTree, ParseError};
use crate::core::experiment::Experiment;
use crate::core::factory::RecordFactory;
use crate::core::types::ExperimentId;

/// Errors that abort a whole load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// What happened to one top-level entry.
#[derive(Debug)]
pub enum EntryOutcome {
    Loaded(Experiment),
    SkippedAlreadyCached(ExperimentId),
    Failed(LoadFailure),
}

/// A top-level entry the factory could not turn into a record.
#[derive(Debug)]
pub struct LoadFailure {
    /// `file:line` of the entry.
    pub location: String,
    /// The entry subtree as text.
    pub content: String,
    pub error: anyhow::Error,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.location)?;
        writeln!(f, "{}", self.content)?;
        write!(f, "{:?}", self.error)
    }
}

/// Summary of one load.
#[derive(Debug)]
pub struct LoadReport {
    pub source: PathBuf,
    pub loaded: usize,
    /// Entries or snapshot records whose id was already present.
    pub skipped: usize,
    pub failures: Vec<LoadFailure>,
    /// Set when a snapshot was rejected as a whole (version mismatch).
    pub discarded: Option<CacheError>,
}

impl LoadReport {
    pub(crate) fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            loaded: 0,
            skipped: 0,
            failures: Vec::new(),
            discarded: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.discarded.is_none()
    }
}

/// Resolve one top-level entry.
///
/// `known` reports whether an id is already loaded.
pub fn load_entry<F, K>(tree: &EntryTree, entry: EntryId, factory: &F, known: K) -> EntryOutcome
where
    F: RecordFactory,
    K: Fn(&ExperimentId) -> bool,
{
    let built = factory.id_from_entry(tree, entry).and_then(|id| {
        if known(&id) {
            return Ok(Err(id));
        }
        let expt = factory.build(tree, entry)?;
        if expt.id != id {
            return Err(anyhow!(
                "record id {} does not match entry id {}",
                expt.id,
                id
            ));
        }
        expt.validate()?;
        Ok(Ok(expt))
    });

    match built {
        Ok(Ok(expt)) => EntryOutcome::Loaded(expt),
        Ok(Err(id)) => EntryOutcome::SkippedAlreadyCached(id),
        Err(error) => EntryOutcome::Failed(LoadFailure {
            location: tree[entry].location(),
            content: tree.render(entry),
            error,
        }),
    }
}

impl ExperimentList {
    /// Parse a record file and load every top-level entry.
    ///
    /// # Errors
    ///
    /// Only unreadable files and indentation errors abort the load;
    /// per-record failures are returned in the report.
    pub fn load_text<F: RecordFactory>(
        &mut self,
        path: &Path,
        factory: &F,
    ) -> Result<LoadReport, LoadError> {
        let tree = EntryTree::parse_file(path)?;
        let mut report = self.load_entries(&tree, factory);
        report.source = path.to_path_buf();
        Ok(report)
    }

    /// Load every top-level entry of an already parsed tree.
    pub fn load_entries<F: RecordFactory>(&mut self, tree: &EntryTree, factory: &F) -> LoadReport {
        let source = tree
            .top_level()
            .first()
            .and_then(|id| tree[*id].source())
            .unwrap_or(Path::new(""));
        let mut report = LoadReport::new(source);

        for &entry in tree.top_level() {
            match load_entry(tree, entry, factory, |id| self.contains(id)) {
                EntryOutcome::Loaded(expt) => {
                    if let Err(e) = self.append(Arc::new(expt)) {
                        report.failures.push(LoadFailure {
                            location: tree[entry].location(),
                            content: tree.render(entry),
                            error: e.into(),
                        });
                        continue;
                    }
                    report.loaded += 1;
                }
                EntryOutcome::SkippedAlreadyCached(_) => report.skipped += 1,
                EntryOutcome::Failed(failure) => report.failures.push(failure),
            }
        }

        if !report.failures.is_empty() {
            warn!("errors loading {} experiments:", report.failures.len());
            for failure in &report.failures {
                warn!("=======================\n{}", failure);
            }
        }
        if report.skipped > 0 {
            info!(
                "skipped loading {} experiments (already cached)",
                report.skipped
            );
        }

        self.sort();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Context};
    use chrono::NaiveDate;

    /// Entries look like `key` or `key fail`.
    struct KeyFactory;

    impl RecordFactory for KeyFactory {
        fn id_from_entry(&self, tree: &EntryTree, entry: EntryId) -> anyhow::Result<ExperimentId> {
            let key = tree[entry].head().split_whitespace().next().unwrap_or("");
            Ok(ExperimentId::new("test.txt", key)?)
        }

        fn build(&self, tree: &EntryTree, entry: EntryId) -> anyhow::Result<Experiment> {
            let id = self.id_from_entry(tree, entry)?;
            if tree[entry].head().ends_with("fail") {
                bail!("bad record");
            }
            let date = NaiveDate::from_ymd_opt(2017, 1, 1).context("date")?;
            Ok(Experiment::builder(id, date).build()?)
        }
    }

    fn tree(text: &str) -> EntryTree {
        EntryTree::parse_str(text, None).unwrap()
    }

    #[test]
    fn outcome_variants() {
        let t = tree("1\n2 fail\n3\n");
        let top = t.top_level();

        assert!(matches!(
            load_entry(&t, top[0], &KeyFactory, |_| false),
            EntryOutcome::Loaded(_)
        ));
        assert!(matches!(
            load_entry(&t, top[1], &KeyFactory, |_| false),
            EntryOutcome::Failed(_)
        ));
        assert!(matches!(
            load_entry(&t, top[2], &KeyFactory, |_| true),
            EntryOutcome::SkippedAlreadyCached(_)
        ));
    }

    #[test]
    fn failures_do_not_abort_batch() {
        let mut list = ExperimentList::new(None);
        let report = list.load_entries(&tree("3\n1 fail\n2\n- detail\n4 fail\n"), &KeyFactory);

        assert_eq!(report.loaded, 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(list.len(), 2);
        assert!(!report.is_clean());
        assert!(report.failures[0].content.starts_with("1 fail"));
        assert!(format!("{}", report.failures[0]).contains("bad record"));
    }

    #[test]
    fn known_ids_are_skipped() {
        let mut list = ExperimentList::new(None);
        list.load_entries(&tree("1\n2\n"), &KeyFactory);
        let report = list.load_entries(&tree("2\n3\n"), &KeyFactory);

        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn duplicate_within_file_is_skipped() {
        let mut list = ExperimentList::new(None);
        let report = list.load_entries(&tree("1\n1\n"), &KeyFactory);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn result_is_sorted() {
        let mut list = ExperimentList::new(None);
        list.load_entries(&tree("b\na\nc\n"), &KeyFactory);
        let keys: Vec<_> = list.iter().map(|e| e.id.key().to_string()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn mismatched_id_fails() {
        struct Liar;
        impl RecordFactory for Liar {
            fn id_from_entry(&self, _: &EntryTree, _: EntryId) -> anyhow::Result<ExperimentId> {
                Ok(ExperimentId::new("f", "1")?)
            }
            fn build(&self, _: &EntryTree, _: EntryId) -> anyhow::Result<Experiment> {
                let date = NaiveDate::from_ymd_opt(2017, 1, 1).context("date")?;
                Ok(Experiment::builder(ExperimentId::new("f", "2")?, date).build()?)
            }
        }

        let t = tree("x\n");
        let outcome = load_entry(&t, t.top_level()[0], &Liar, |_| false);
        match outcome {
            EntryOutcome::Failed(f) => assert!(f.error.to_string().contains("does not match")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
