// src/error.rs
//! Error taxonomy for a pipeline run.
//!
//! Per-record and per-source failures are recoverable: they are logged at their
//! boundary and counted as run warnings. Only [`PipelineError::StoreWriteFailure`]
//! aborts a run.

use std::path::PathBuf;
use std::time::Duration;

/// A single raw record could not be turned into an article.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("malformed input from {source_id}: {reason}")]
    MalformedInput { source_id: String, reason: String },
}

/// A source adapter failed for this run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source {source_id} unavailable: {reason}")]
    Unavailable { source_id: String, reason: String },
    #[error("source {source_id} timed out after {after:?}")]
    Timeout { source_id: String, after: Duration },
}

impl SourceError {
    pub fn unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            Self::Unavailable { source_id, .. } | Self::Timeout { source_id, .. } => source_id,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Persisted-state failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store at {path} is locked by another writer")]
    Locked { path: PathBuf },
    #[error("store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store document at {path} is not valid: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Run-level failure. Surfaced as a distinct process exit code.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("store write failure: {0}")]
    StoreWriteFailure(#[source] StoreError),
}
