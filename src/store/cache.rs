//! store::cache
//!
//! Versioned snapshot persistence.
//!
//! # Format
//!
//! A snapshot is a JSON document:
//!
//! ```json
//! {
//!   "kind": "synapdex.experiment-cache",
//!   "schema_version": 3,
//!   "checksum": "<sha-256 of the canonical records JSON>",
//!   "records": [ ... ]
//! }
//! ```
//!
//! # Version Gate
//!
//! The envelope (`kind`, `schema_version`) is read before anything else.
//! A snapshot written with any other version is discarded whole; there is
//! no migration. Rebuild it from the text records instead.
//!
//! # Writes
//!
//! Writes go to a temp file in the destination directory, are synced, then
//! renamed over the destination, so a crash never leaves a truncated cache.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::load::{LoadError, LoadReport};
use super::ExperimentList;
use crate::core::experiment::{Experiment, ExperimentError};
use crate::core::types::Checksum;

/// The kind identifier for cache snapshots.
pub const CACHE_KIND: &str = "synapdex.experiment-cache";

/// Current snapshot schema version.
pub const CACHE_VERSION: u32 = 3;

/// File extension that marks a snapshot when loading by path.
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write cache file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse cache: {0}")]
    Parse(String),

    #[error("failed to serialize cache: {0}")]
    Serialize(String),

    #[error("invalid kind '{found}', expected '{}'", CACHE_KIND)]
    InvalidKind { found: String },

    #[error("incompatible cache version ({found} != {})", CACHE_VERSION)]
    VersionMismatch { found: u32 },

    #[error("corrupt cache: {0}")]
    Corrupt(String),

    #[error("invalid record: {0}")]
    InvalidRecord(#[from] ExperimentError),

    #[error("experiment list has no cache file; cannot write cache")]
    NoDestination,
}

#[derive(Debug, Deserialize)]
struct CacheEnvelope {
    kind: String,
    schema_version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Snapshot {
    kind: String,
    schema_version: u32,
    checksum: Checksum,
    records: serde_json::Value,
}

/// Whether `path` names a snapshot rather than a text record file.
pub fn is_snapshot_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION)
}

fn checksum(records: &serde_json::Value) -> Result<Checksum, CacheError> {
    let canonical =
        serde_json::to_string(records).map_err(|e| CacheError::Serialize(e.to_string()))?;
    Ok(Checksum::compute(canonical.as_bytes()))
}

/// Parse snapshot text with version dispatch.
///
/// # Errors
///
/// Returns `CacheError::VersionMismatch` for any version other than
/// [`CACHE_VERSION`]; other variants mean the snapshot is unreadable.
pub fn parse_snapshot(json: &str) -> Result<Vec<Experiment>, CacheError> {
    let envelope: CacheEnvelope =
        serde_json::from_str(json).map_err(|e| CacheError::Parse(e.to_string()))?;

    if envelope.kind != CACHE_KIND {
        return Err(CacheError::InvalidKind {
            found: envelope.kind,
        });
    }
    if envelope.schema_version != CACHE_VERSION {
        return Err(CacheError::VersionMismatch {
            found: envelope.schema_version,
        });
    }

    let snapshot: Snapshot =
        serde_json::from_str(json).map_err(|e| CacheError::Parse(e.to_string()))?;

    let actual = checksum(&snapshot.records)?;
    if actual != snapshot.checksum {
        return Err(CacheError::Corrupt(format!(
            "checksum mismatch (stored {}, computed {})",
            snapshot.checksum, actual
        )));
    }

    let records: Vec<Experiment> =
        serde_json::from_value(snapshot.records).map_err(|e| CacheError::Parse(e.to_string()))?;
    for record in &records {
        record.validate()?;
    }
    Ok(records)
}

/// Serialize records into snapshot text.
///
/// # Errors
///
/// Returns `CacheError::InvalidRecord` if a record fails validation, so a
/// snapshot that could not be read back is never produced.
pub fn render_snapshot<'a, I>(records: I) -> Result<String, CacheError>
where
    I: IntoIterator<Item = &'a Experiment>,
{
    let records: Vec<&Experiment> = records.into_iter().collect();
    for record in &records {
        record.validate()?;
    }
    let records =
        serde_json::to_value(&records).map_err(|e| CacheError::Serialize(e.to_string()))?;
    let snapshot = Snapshot {
        kind: CACHE_KIND.to_string(),
        schema_version: CACHE_VERSION,
        checksum: checksum(&records)?,
        records,
    };
    serde_json::to_string(&snapshot).map_err(|e| CacheError::Serialize(e.to_string()))
}

/// Read and parse a snapshot file.
pub fn read_snapshot(path: &Path) -> Result<Vec<Experiment>, CacheError> {
    let json = fs::read_to_string(path).map_err(|e| CacheError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_snapshot(&json)
}

/// Write a snapshot file atomically.
pub fn write_snapshot<'a, I>(path: &Path, records: I) -> Result<(), CacheError>
where
    I: IntoIterator<Item = &'a Experiment>,
{
    let contents = render_snapshot(records)?;
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| CacheError::Write { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err(path))?;
    }

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&temp_path).map_err(write_err(temp_path.as_path()))?;
        file.write_all(contents.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(write_err(temp_path.as_path()))?;
    }

    fs::rename(&temp_path, path).map_err(write_err(path))?;
    Ok(())
}

impl ExperimentList {
    /// Load a snapshot into this list.
    ///
    /// A version mismatch is not an error: the snapshot is discarded, a
    /// warning is logged, and the report carries the reason.
    pub fn load_snapshot(&mut self, path: &Path) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::new(path);

        let records = match read_snapshot(path) {
            Ok(records) => records,
            Err(e @ CacheError::VersionMismatch { .. }) => {
                warn!("ignoring cache file {} due to {}", path.display(), e);
                report.discarded = Some(e);
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        for record in records {
            match self.append(Arc::new(record)) {
                Ok(()) => report.loaded += 1,
                Err(_) => report.skipped += 1,
            }
        }
        debug!(
            "loaded {} experiments from cache {}",
            report.loaded,
            path.display()
        );

        self.sort();
        Ok(report)
    }

    /// Write every record to the configured cache destination.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NoDestination` if the list was created without a
    /// cache path.
    pub fn write_cache(&self) -> Result<(), CacheError> {
        let path = self.cache_path().ok_or(CacheError::NoDestination)?;
        write_snapshot(path, self.iter().map(|e| &**e))?;
        debug!("wrote {} experiments to {}", self.len(), path.display());
        Ok(())
    }
}
