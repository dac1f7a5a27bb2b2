//! ui
//!
//! Textual reports and load summaries.
//!
//! # Modules
//!
//! - [`report`] - Render repository summaries as text
//! - [`output`] - Load summary lines, logged through `tracing`
//!
//! # Design
//!
//! Renderers never print. Hosts decide where the rendered text goes.

pub mod output;
pub mod report;
