//! store
//!
//! The experiment repository.
//!
//! # Modules
//!
//! - [`load`] - Record load pipeline (text files through a [`RecordFactory`])
//! - [`cache`] - Versioned snapshot persistence
//! - [`select`] - Multi-predicate selection producing new views
//!
//! # Architecture
//!
//! An [`ExperimentList`] keeps records in an ordered `Vec` plus an id index.
//! Both hold the same `Arc<Experiment>`; every insertion goes through
//! [`ExperimentList::append`], which keeps them consistent. Views returned
//! by [`ExperimentList::select`] share the records of the list they were
//! selected from.
//!
//! Records are immutable. Sharing them across views needs no
//! synchronization as long as that holds; code that ever mutates a record
//! must introduce it.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! # use synapdex::core::entry::{EntryId, EntryTree};
//! # use synapdex::core::experiment::Experiment;
//! # use synapdex::core::factory::RecordFactory;
//! # use synapdex::core::types::ExperimentId;
//! use synapdex::store::{ExperimentList, Selection};
//! # struct Grammar;
//! # impl RecordFactory for Grammar {
//! #     fn id_from_entry(&self, _: &EntryTree, _: EntryId) -> anyhow::Result<ExperimentId> { unimplemented!() }
//! #     fn build(&self, _: &EntryTree, _: EntryId) -> anyhow::Result<Experiment> { unimplemented!() }
//! # }
//!
//! let mut expts = ExperimentList::open("cache/expts.json");
//! expts.load(Path::new("data/expts.txt"), &Grammar).unwrap();
//! expts.write_cache().unwrap();
//!
//! let v1 = expts.select(&Selection::new().region("V1").age(40, 60));
//! println!("{} experiments in V1", v1.len());
//! ```

pub mod cache;
pub mod load;
pub mod select;

pub use cache::{CacheError, CACHE_KIND, CACHE_VERSION};
pub use load::{EntryOutcome, LoadError, LoadFailure, LoadReport};
pub use select::{Calcium, Selection, SelectionError, SelectionResult, SelectionWarning};

use std::collections::HashMap;
use std::ops::Index;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::core::experiment::Experiment;
use crate::core::factory::RecordFactory;
use crate::core::types::ExperimentId;

/// Errors from repository mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("experiment {0} is already present")]
    Duplicate(ExperimentId),
}

/// Ordered, indexed collection of experiments.
#[derive(Debug, Clone, Default)]
pub struct ExperimentList {
    experiments: Vec<Arc<Experiment>>,
    by_id: HashMap<ExperimentId, Arc<Experiment>>,
    cache: Option<PathBuf>,
    start_skip: Vec<ExperimentId>,
    stop_skip: Vec<ExperimentId>,
}

impl ExperimentList {
    /// Create an empty list. `cache` is where [`write_cache`](Self::write_cache)
    /// will write.
    pub fn new(cache: Option<PathBuf>) -> Self {
        Self {
            cache,
            ..Self::default()
        }
    }

    /// Create a list with a cache destination and load whatever it holds.
    ///
    /// The destination is read as a snapshot whatever its extension. Any
    /// failure to read it is logged and the list starts empty.
    pub fn open(cache: impl Into<PathBuf>) -> Self {
        let cache = cache.into();
        let mut list = Self::new(Some(cache.clone()));
        if cache.exists() {
            if let Err(e) = list.load_snapshot(&cache) {
                warn!("error reading cache file {}: {}", cache.display(), e);
                let destination = list.cache.take();
                list = Self::new(destination);
            }
        }
        list
    }

    /// Build a list from existing records, in order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if two records share an id.
    pub fn from_experiments<I>(experiments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = Arc<Experiment>>,
    {
        let mut list = Self::default();
        for expt in experiments {
            list.append(expt)?;
        }
        Ok(list)
    }

    /// Load records from a file.
    ///
    /// Files with the `.json` extension are read as cache snapshots; anything
    /// else goes through the text parser and `factory`. Records whose id is
    /// already present are skipped. The list is re-sorted afterwards.
    pub fn load<F: RecordFactory>(
        &mut self,
        path: &Path,
        factory: &F,
    ) -> Result<LoadReport, LoadError> {
        if cache::is_snapshot_path(path) {
            self.load_snapshot(path)
        } else {
            self.load_text(path, factory)
        }
    }

    /// Add a record at the end.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id is already present.
    pub fn append(&mut self, expt: Arc<Experiment>) -> Result<(), StoreError> {
        if self.by_id.contains_key(&expt.id) {
            return Err(StoreError::Duplicate(expt.id.clone()));
        }
        self.by_id.insert(expt.id.clone(), Arc::clone(&expt));
        self.experiments.push(expt);
        Ok(())
    }

    /// Stable sort by experiment key.
    pub fn sort(&mut self) {
        self.experiments
            .sort_by(|a, b| a.id.key().cmp(b.id.key()));
    }

    /// Stable sort by an arbitrary key.
    pub fn sort_by_key<K, F>(&mut self, mut f: F)
    where
        K: Ord,
        F: FnMut(&Experiment) -> K,
    {
        self.experiments.sort_by_key(|e| f(&**e));
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Experiment>> {
        self.experiments.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Experiment>> {
        self.experiments.get(index)
    }

    pub fn get_by_id(&self, id: &ExperimentId) -> Option<&Arc<Experiment>> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &ExperimentId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Position of a record in the current order.
    pub fn position(&self, id: &ExperimentId) -> Option<usize> {
        self.experiments.iter().position(|e| &e.id == id)
    }

    /// Configured cache destination.
    pub fn cache_path(&self) -> Option<&Path> {
        self.cache.as_deref()
    }

    /// Ids dropped by the start-date bound of the selection that built this list.
    pub fn start_skip(&self) -> &[ExperimentId] {
        &self.start_skip
    }

    /// Ids dropped by the stop-date bound of the selection that built this list.
    pub fn stop_skip(&self) -> &[ExperimentId] {
        &self.stop_skip
    }
}

impl Index<usize> for ExperimentList {
    type Output = Arc<Experiment>;

    fn index(&self, index: usize) -> &Arc<Experiment> {
        &self.experiments[index]
    }
}

impl<'a> IntoIterator for &'a ExperimentList {
    type Item = &'a Arc<Experiment>;
    type IntoIter = std::slice::Iter<'a, Arc<Experiment>>;

    fn into_iter(self) -> Self::IntoIter {
        self.experiments.iter()
    }
}
