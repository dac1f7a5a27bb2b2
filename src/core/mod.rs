//! core
//!
//! Core domain types, the record parser, and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ExperimentId, TypePair, Checksum
//! - [`entry`] - Indentation-delimited record parser
//! - [`experiment`] - Experiment, Cell and sweep records
//! - [`factory`] - Seam for the lab-specific record grammar
//! - [`config`] - Configuration schema and loading

pub mod config;
pub mod entry;
pub mod experiment;
pub mod factory;
pub mod types;
