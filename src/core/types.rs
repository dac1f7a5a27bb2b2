//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ExperimentId`] - Composite identifier (source file + experiment key)
//! - [`CellId`] - Numeric cell identifier within one experiment
//! - [`TypePair`] - Ordered (pre, post) cre-type pair
//! - [`Checksum`] - Content hash used to detect corrupted cache snapshots
//!
//! # Examples
//!
//! ```
//! use synapdex::core::types::{ExperimentId, TypePair};
//!
//! let id = ExperimentId::new("2017-05.txt", "1494887423.24").unwrap();
//! assert_eq!(id.key(), "1494887423.24");
//!
//! let pair = TypePair::new("sst", "pvalb");
//! assert_ne!(pair, pair.reversed());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Cre-type label used for cells that have no recorded cre-type.
pub const UNKNOWN_CRE_TYPE: &str = "unknown";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid experiment id: {0}")]
    InvalidExperimentId(String),
}

/// Identifier of one experiment.
///
/// The first component is the file the record was read from, the second is
/// the experiment key inside that file. Repositories sort by the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExperimentId {
    source: String,
    key: String,
}

impl ExperimentId {
    /// Create a new identifier.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidExperimentId` if the key is empty.
    pub fn new(source: impl Into<String>, key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(TypeError::InvalidExperimentId(
                "experiment key cannot be empty".into(),
            ));
        }
        Ok(Self {
            source: source.into(),
            key,
        })
    }

    /// The source file component.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The secondary key (sort key).
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.key)
    }
}

/// Cell identifier, unique within an experiment.
///
/// Cell ids are 1-based; the recording headstage is `id - 1`.
pub type CellId = u32;

/// Ordered (pre-synaptic, post-synaptic) cre-type pair.
///
/// Order matters: `(a, b)` and `(b, a)` are distinct connection types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypePair {
    pub pre: String,
    pub post: String,
}

impl TypePair {
    pub fn new(pre: impl Into<String>, post: impl Into<String>) -> Self {
        Self {
            pre: pre.into(),
            post: post.into(),
        }
    }

    /// Pair with pre and post swapped.
    pub fn reversed(&self) -> Self {
        Self {
            pre: self.post.clone(),
            post: self.pre.clone(),
        }
    }
}

impl fmt::Display for TypePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.pre, self.post)
    }
}

/// SHA-256 content hash, hex encoded.
///
/// # Example
///
/// ```
/// use synapdex::core::types::Checksum;
///
/// let a = Checksum::compute(b"records");
/// let b = Checksum::compute(b"records");
/// assert_eq!(a, b);
/// assert_ne!(a, Checksum::compute(b"other"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Hash a byte payload.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the checksum as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
