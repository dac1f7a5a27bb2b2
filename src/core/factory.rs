//! core::factory
//!
//! The seam between the generic record parser and the lab-specific grammar
//! that turns one parsed entry into an [`Experiment`].
//!
//! Implementations receive the whole [`EntryTree`] together with the id of a
//! top-level entry, so they can walk that entry's subtree. Both methods may
//! fail; the load pipeline reports the failure and moves on to the next
//! entry.

use anyhow::Result;

use super::entry::{EntryId, EntryTree};
use super::experiment::Experiment;
use super::types::ExperimentId;

/// Builds experiment records from parsed entries.
pub trait RecordFactory {
    /// Extract the identifier of a top-level entry without building it.
    ///
    /// Must be cheap and side-effect free; it is called for every entry,
    /// including ones that are already cached.
    fn id_from_entry(&self, tree: &EntryTree, entry: EntryId) -> Result<ExperimentId>;

    /// Build the full record for a top-level entry.
    fn build(&self, tree: &EntryTree, entry: EntryId) -> Result<Experiment>;
}

impl<F: RecordFactory + ?Sized> RecordFactory for &F {
    fn id_from_entry(&self, tree: &EntryTree, entry: EntryId) -> Result<ExperimentId> {
        (**self).id_from_entry(tree, entry)
    }

    fn build(&self, tree: &EntryTree, entry: EntryId) -> Result<Experiment> {
        (**self).build(tree, entry)
    }
}
