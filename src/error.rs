//! Pipeline error taxonomy
//!
//! Per-record and per-byte problems (bad field counts, undecodable bytes) never show up
//! here: ingestion absorbs and counts them. Everything in this enum aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An input produced zero usable records
    #[error("No valid chunks found in {}. Check the CSV file for issues.", path.display())]
    EmptyInput { path: PathBuf },

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Charset label not known to encoding_rs
    #[error("unknown encoding label '{label}'")]
    UnknownEncoding { label: String },

    /// I/O failure while reading an input file
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Chunk directory or chunk file problem (missing, conflicting, unreadable, corrupt)
    #[error("chunk storage error at {}: {message}", path.display())]
    Storage { path: PathBuf, message: String },

    /// Workspace or report I/O failure
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The workspace guard refused to wipe a directory
    #[error("refusing to wipe {}: {reason}", path.display())]
    UnsafeWipe { path: PathBuf, reason: String },
}

impl PipelineError {
    pub(crate) fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the "nothing to compare" condition that terminates the process
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Self::EmptyInput { .. })
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PipelineError>;
