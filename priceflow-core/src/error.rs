//! Structured error types for stage and run failures.
//!
//! Every stage fails fast with a [`StageError`]. The pipeline wraps it in a
//! [`RunError`] that records which stage was active, without altering the
//! underlying error.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::pipeline::PipelineState;

/// Coarse classification of a [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceUnavailable,
    InvalidPrice,
    DegenerateSeries,
    PersistenceError,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("invalid price for {symbol} at {timestamp}: {value:?}")]
    InvalidPrice {
        symbol: String,
        timestamp: DateTime<Utc>,
        value: String,
    },

    #[error("degenerate series for {symbol}: {reason}")]
    DegenerateSeries { symbol: String, reason: String },

    #[error("persistence failed at {}: {reason}", path.display())]
    PersistenceError { path: PathBuf, reason: String },
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            StageError::InvalidPrice { .. } => ErrorKind::InvalidPrice,
            StageError::DegenerateSeries { .. } => ErrorKind::DegenerateSeries,
            StageError::PersistenceError { .. } => ErrorKind::PersistenceError,
        }
    }

    /// The symbol the failure is attributed to, when there is one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            StageError::InvalidPrice { symbol, .. }
            | StageError::DegenerateSeries { symbol, .. } => Some(symbol.as_str()),
            _ => None,
        }
    }

    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        StageError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StageError::PersistenceError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A failed pipeline run: the stage that was active and what went wrong.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct RunError {
    pub stage: PipelineState,
    #[source]
    pub source: StageError,
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.source.symbol()
    }
}
