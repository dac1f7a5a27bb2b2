//! ui::output
//!
//! Load summaries for hosts.
//!
//! Diagnostics go through `tracing` like the rest of the crate; a host that
//! installs no subscriber sees nothing.

use tracing::{debug, info, warn};

use crate::store::LoadReport;

/// One-line summary of a load.
pub fn format_load_report(report: &LoadReport) -> String {
    let mut line = format!(
        "{}: {} loaded, {} skipped, {} failed",
        report.source.display(),
        report.loaded,
        report.skipped,
        report.failures.len()
    );
    if let Some(discarded) = &report.discarded {
        line.push_str(&format!(" (cache discarded: {})", discarded));
    }
    line
}

/// Log a load summary: info when clean, a warning otherwise. Failure
/// details are logged at debug level.
pub fn log_load_report(report: &LoadReport) {
    if report.is_clean() {
        info!("{}", format_load_report(report));
    } else {
        warn!("{}", format_load_report(report));
    }
    for failure in &report.failures {
        debug!("{}", failure);
    }
}
