//! Synapdex - indexing and connectivity statistics for multipatch experiments
//!
//! Synapdex parses indentation-structured experiment notes into records,
//! keeps them in a versioned on-disk cache, filters them with composable
//! selections and aggregates connectivity across the result.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, the record parser, configuration
//! - [`store`] - The experiment repository: loading, caching, selection
//! - [`analysis`] - Connectivity, stimulus and labeling aggregations
//! - [`ui`] - Text reports and verbosity-gated output
//!
//! The grammar of an individual record is not part of this crate. Hosts
//! supply it through [`core::factory::RecordFactory`].
//!
//! # Invariants
//!
//! 1. Record ids are unique within a repository
//! 2. Records are immutable once loaded and shared through `Arc`
//! 3. A cache snapshot with a different format version is never read
//! 4. One malformed record never aborts a load

pub mod analysis;
pub mod core;
pub mod store;
pub mod ui;
